//! PVM meters: host CPU, process CPU and live thread count of the running
//! process, exposed as infinite pull-based sequences.

pub mod config;
pub mod error;
pub mod handle;
pub mod metric;
pub mod probe;
pub mod sampler;
pub mod source;
pub mod threads;

pub use error::MetricsError;
pub use metric::Metric;
pub use source::{ActiveThreadCount, CpuScope, CpuUtilization, ProcessMetricsSource};
pub use threads::ThreadRegistry;
