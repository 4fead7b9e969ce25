use thiserror::Error;

use crate::metric::Metric;

/// Errors surfaced by the metrics source.
///
/// Nothing here is retried or logged internally: every failure goes straight
/// back to whoever pulled the value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    /// The host cannot provide process accounting for the current process.
    #[error("process accounting unavailable: {0}")]
    Initialization(String),

    /// A single pull could not obtain a reading.
    #[error("{metric} unavailable: {reason}")]
    MetricUnavailable { metric: Metric, reason: String },
}

impl MetricsError {
    pub fn unavailable(metric: Metric, reason: impl Into<String>) -> Self {
        MetricsError::MetricUnavailable {
            metric,
            reason: reason.into(),
        }
    }

    /// Which meter failed, if this is a per-pull error.
    pub fn metric(&self) -> Option<Metric> {
        match self {
            MetricsError::MetricUnavailable { metric, .. } => Some(*metric),
            MetricsError::Initialization(_) => None,
        }
    }
}
