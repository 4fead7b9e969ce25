use serde::Serialize;
use std::fmt;

/// The meters published by the agent, one per sequence of
/// [`ProcessMetricsSource`](crate::source::ProcessMetricsSource).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    #[serde(rename = "instance_pvm_total_cpu_utilization")]
    TotalCpuUtilization,
    #[serde(rename = "instance_pvm_process_cpu_utilization")]
    ProcessCpuUtilization,
    #[serde(rename = "instance_pvm_thread_active_count")]
    ThreadActiveCount,
}

impl Metric {
    pub const ALL: [Metric; 3] = [
        Metric::TotalCpuUtilization,
        Metric::ProcessCpuUtilization,
        Metric::ThreadActiveCount,
    ];

    /// Meter name as reported downstream.
    pub fn meter_name(self) -> &'static str {
        match self {
            Metric::TotalCpuUtilization => "instance_pvm_total_cpu_utilization",
            Metric::ProcessCpuUtilization => "instance_pvm_process_cpu_utilization",
            Metric::ThreadActiveCount => "instance_pvm_thread_active_count",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.meter_name())
    }
}
