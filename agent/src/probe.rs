use sysinfo::{ProcessRefreshKind, System};

use crate::error::MetricsError;
use crate::handle::ProcessHandle;
use crate::metric::Metric;

/// Host facility that can sample CPU utilization.
///
/// Utilization is measured since the previous call on the same probe, so the
/// first reading of a fresh probe has no baseline and is usually 0.0.
pub trait CpuProbe {
    /// Whole-system CPU usage in percent.
    fn system_cpu_usage(&mut self) -> Result<f32, MetricsError>;

    /// CPU usage of one process in percent.
    fn process_cpu_usage(&mut self, handle: &ProcessHandle) -> Result<f32, MetricsError>;
}

/// [`CpuProbe`] backed by `sysinfo`.
///
/// Each probe keeps its own `System`, so two probes never share a baseline.
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuProbe for SysinfoProbe {
    fn system_cpu_usage(&mut self) -> Result<f32, MetricsError> {
        self.system.refresh_cpu();

        if self.system.cpus().is_empty() {
            return Err(MetricsError::unavailable(
                Metric::TotalCpuUtilization,
                "no CPUs reported by host",
            ));
        }

        checked(
            Metric::TotalCpuUtilization,
            self.system.global_cpu_info().cpu_usage(),
        )
    }

    fn process_cpu_usage(&mut self, handle: &ProcessHandle) -> Result<f32, MetricsError> {
        let pid = handle.pid();
        self.system.refresh_cpu();

        // Returns false if the process is not found.
        if !self
            .system
            .refresh_process_specifics(pid, ProcessRefreshKind::new().with_cpu())
        {
            return Err(MetricsError::unavailable(
                Metric::ProcessCpuUtilization,
                format!("process {pid} not found"),
            ));
        }

        let usage = self
            .system
            .process(pid)
            .map(|p| p.cpu_usage())
            .ok_or_else(|| {
                MetricsError::unavailable(
                    Metric::ProcessCpuUtilization,
                    format!("no accounting record for process {pid}"),
                )
            })?;

        checked(Metric::ProcessCpuUtilization, usage)
    }
}

fn checked(metric: Metric, usage: f32) -> Result<f32, MetricsError> {
    if usage.is_finite() && usage >= 0.0 {
        Ok(usage)
    } else {
        Err(MetricsError::unavailable(
            metric,
            format!("host reported invalid usage {usage}"),
        ))
    }
}
