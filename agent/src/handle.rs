use sysinfo::{Pid, ProcessRefreshKind, System};

use crate::error::MetricsError;

/// Handle to the accounting record of the running process.
///
/// Acquired once and never reassigned; it always refers to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pid: Pid,
}

impl ProcessHandle {
    /// Resolve the current process and check that the host actually tracks it.
    pub fn current() -> Result<Self, MetricsError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(MetricsError::Initialization(format!(
                "sysinfo does not support {}",
                std::env::consts::OS
            )));
        }

        let pid = sysinfo::get_current_pid()
            .map_err(|e| MetricsError::Initialization(format!("cannot resolve own pid: {e}")))?;

        let mut sys = System::new();
        if !sys.refresh_process_specifics(pid, ProcessRefreshKind::new()) {
            return Err(MetricsError::Initialization(format!(
                "process {pid} not visible in process accounting"
            )));
        }

        Ok(Self { pid })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }
}
