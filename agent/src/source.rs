use std::iter::FusedIterator;

use sysinfo::{ProcessRefreshKind, System};

use crate::config::{AgentConfig, ThreadCountMode};
use crate::error::MetricsError;
use crate::handle::ProcessHandle;
use crate::metric::Metric;
use crate::probe::{CpuProbe, SysinfoProbe};
use crate::threads::ThreadRegistry;

/// Samples host CPU, process CPU and live thread count for the current process.
///
/// Every method hands out an independent, infinite sequence: `next()` never
/// returns `None`, and each `Some` holds either a reading or the error of
/// that single pull. A failed pull does not end the sequence.
///
/// CPU sequences measure usage since their own previous pull, so their first
/// value is a warm-up reading (usually 0.0) and should not be trusted.
#[derive(Debug, Clone)]
pub struct ProcessMetricsSource {
    handle: ProcessHandle,
    threads: ThreadSource,
}

#[derive(Debug, Clone)]
enum ThreadSource {
    Runtime(ThreadRegistry),
    Os,
}

impl ProcessMetricsSource {
    /// Acquire the handle of the current process. Thread counts come from
    /// [`ThreadRegistry::global`].
    pub fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            handle: ProcessHandle::current()?,
            threads: ThreadSource::Runtime(ThreadRegistry::global().clone()),
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, MetricsError> {
        let source = Self::new()?;
        Ok(match config.thread_count {
            ThreadCountMode::Runtime => source,
            ThreadCountMode::Os => source.with_os_threads(),
        })
    }

    /// Count threads from `registry` instead of the global one.
    pub fn with_registry(mut self, registry: ThreadRegistry) -> Self {
        self.threads = ThreadSource::Runtime(registry);
        self
    }

    /// Count the kernel tasks of the process instead of registered threads.
    pub fn with_os_threads(mut self) -> Self {
        self.threads = ThreadSource::Os;
        self
    }

    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    pub fn thread_count_mode(&self) -> ThreadCountMode {
        match self.threads {
            ThreadSource::Runtime(_) => ThreadCountMode::Runtime,
            ThreadSource::Os => ThreadCountMode::Os,
        }
    }

    /// Whole-system CPU utilization in percent (0–100).
    pub fn system_cpu_utilization(&self) -> CpuUtilization {
        CpuUtilization::system(SysinfoProbe::new())
    }

    /// CPU utilization of this process in percent, scaled per core, so it
    /// may exceed 100 on multi-core hosts.
    pub fn process_cpu_utilization(&self) -> CpuUtilization {
        CpuUtilization::process(SysinfoProbe::new(), self.handle)
    }

    /// Number of live threads, always at least 1.
    pub fn active_thread_count(&self) -> ActiveThreadCount {
        let counter = match &self.threads {
            ThreadSource::Runtime(registry) => Counter::Runtime(registry.clone()),
            ThreadSource::Os => Counter::Os {
                system: System::new(),
                handle: self.handle,
            },
        };
        ActiveThreadCount { counter }
    }
}

/// What a [`CpuUtilization`] sequence measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuScope {
    System,
    Process(ProcessHandle),
}

/// Infinite sequence of CPU utilization readings.
pub struct CpuUtilization<P = SysinfoProbe> {
    probe: P,
    scope: CpuScope,
}

impl<P: CpuProbe> CpuUtilization<P> {
    pub fn new(probe: P, scope: CpuScope) -> Self {
        Self { probe, scope }
    }

    pub fn system(probe: P) -> Self {
        Self::new(probe, CpuScope::System)
    }

    pub fn process(probe: P, handle: ProcessHandle) -> Self {
        Self::new(probe, CpuScope::Process(handle))
    }

    pub fn scope(&self) -> CpuScope {
        self.scope
    }

    pub fn metric(&self) -> Metric {
        match self.scope {
            CpuScope::System => Metric::TotalCpuUtilization,
            CpuScope::Process(_) => Metric::ProcessCpuUtilization,
        }
    }
}

impl<P: CpuProbe> Iterator for CpuUtilization<P> {
    type Item = Result<f32, MetricsError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reading = match &self.scope {
            CpuScope::System => self.probe.system_cpu_usage(),
            CpuScope::Process(handle) => self.probe.process_cpu_usage(handle),
        };
        Some(reading)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl<P: CpuProbe> FusedIterator for CpuUtilization<P> {}

/// Infinite sequence of live thread counts.
pub struct ActiveThreadCount {
    counter: Counter,
}

enum Counter {
    Runtime(ThreadRegistry),
    Os {
        system: System,
        handle: ProcessHandle,
    },
}

impl Iterator for ActiveThreadCount {
    type Item = Result<usize, MetricsError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reading = match &mut self.counter {
            Counter::Runtime(registry) => Ok(registry.active_count()),
            Counter::Os { system, handle } => os_thread_count(system, handle),
        };
        Some(reading)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl FusedIterator for ActiveThreadCount {}

fn os_thread_count(system: &mut System, handle: &ProcessHandle) -> Result<usize, MetricsError> {
    let pid = handle.pid();
    // Only the full process scan fills in the task lists; a single-process
    // refresh leaves them empty.
    system.refresh_processes_specifics(ProcessRefreshKind::new());

    let process = system.process(pid).ok_or_else(|| {
        MetricsError::unavailable(
            Metric::ThreadActiveCount,
            format!("process {pid} not found"),
        )
    })?;

    let tasks = process.tasks().ok_or_else(|| {
        MetricsError::unavailable(
            Metric::ThreadActiveCount,
            format!("host does not list tasks of process {pid}"),
        )
    })?;

    // The main thread shares the process pid; count it exactly once.
    Ok(tasks.iter().filter(|&&tid| tid != pid).count() + 1)
}
