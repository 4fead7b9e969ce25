use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::MetricsError;
use crate::metric::Metric;
use crate::probe::{CpuProbe, SysinfoProbe};
use crate::source::{ActiveThreadCount, CpuUtilization, ProcessMetricsSource};

/// One reading of one meter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterSample {
    pub name: Metric,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Pulls every meter once per tick.
pub struct Sampler<P = SysinfoProbe> {
    total_cpu: CpuUtilization<P>,
    process_cpu: CpuUtilization<P>,
    threads: ActiveThreadCount,
}

impl Sampler {
    pub fn from_source(source: &ProcessMetricsSource) -> Self {
        Self::new(
            source.system_cpu_utilization(),
            source.process_cpu_utilization(),
            source.active_thread_count(),
        )
    }
}

impl<P: CpuProbe> Sampler<P> {
    pub fn new(
        total_cpu: CpuUtilization<P>,
        process_cpu: CpuUtilization<P>,
        threads: ActiveThreadCount,
    ) -> Self {
        Self {
            total_cpu,
            process_cpu,
            threads,
        }
    }

    /// Pull each meter once. Meters whose pull failed are left out.
    pub fn poll_once(&mut self) -> Vec<MeterSample> {
        let timestamp = Utc::now();
        let readings = [
            (
                self.total_cpu.metric(),
                pull(&mut self.total_cpu).map(f64::from),
            ),
            (
                self.process_cpu.metric(),
                pull(&mut self.process_cpu).map(f64::from),
            ),
            (
                Metric::ThreadActiveCount,
                pull(&mut self.threads).map(|n| n as f64),
            ),
        ];

        readings
            .into_iter()
            .filter_map(|(name, value)| match value {
                Some(value) => Some(MeterSample {
                    name,
                    value,
                    timestamp,
                }),
                None => {
                    debug!(meter = %name, "Skipping meter for this tick");
                    None
                }
            })
            .collect()
    }
}

fn pull<T, I>(sequence: &mut I) -> Option<T>
where
    I: Iterator<Item = Result<T, MetricsError>>,
{
    match sequence.next()? {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Metric pull failed: {e}");
            None
        }
    }
}

/// Sample on a fixed interval and write each sample as a JSON line to `out`.
///
/// Stops after `ticks` ticks when given, otherwise on Ctrl-C.
pub async fn run<P: CpuProbe, W: Write>(
    mut sampler: Sampler<P>,
    interval: Duration,
    ticks: Option<u64>,
    out: &mut W,
) -> Result<()> {
    let mut timer = tokio::time::interval(interval);
    let mut done = 0u64;

    // One listener for the whole run so a Ctrl-C during a tick is not lost.
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = timer.tick() => {}
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping sampler");
                return Ok(());
            }
        }

        let samples = sampler.poll_once();
        debug!(count = samples.len(), "Collected samples");

        for sample in &samples {
            serde_json::to_writer(&mut *out, sample)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        done += 1;
        if ticks.is_some_and(|limit| done >= limit) {
            info!(ticks = done, "Tick limit reached");
            return Ok(());
        }
    }
}
