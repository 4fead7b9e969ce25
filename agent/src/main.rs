use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use pvm_agent::config::AgentConfig;
use pvm_agent::sampler::{self, Sampler};
use pvm_agent::{ProcessMetricsSource, ThreadRegistry};

/// PVM agent — samples host CPU, process CPU and thread count.
#[derive(Parser, Debug)]
#[command(name = "pvm-agent", version, about)]
struct Cli {
    /// Path to a TOML configuration file (optional).
    #[arg(short, long)]
    config: Option<String>,

    /// Override the sampling interval in seconds.
    #[arg(short, long)]
    interval: Option<u64>,

    /// Stop after this many ticks instead of running until interrupted.
    #[arg(short, long)]
    ticks: Option<u64>,
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only samples.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pvm_agent=info".into()),
        )
        .init();

    let cli = Cli::parse();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting PVM agent");

    let mut cfg = if let Some(ref path) = cli.config {
        AgentConfig::from_file(path)?
    } else {
        AgentConfig::default()
    };
    if let Some(secs) = cli.interval {
        anyhow::ensure!(secs > 0, "--interval must be at least 1");
        cfg.report_interval_secs = secs;
    }
    info!(
        interval = cfg.report_interval_secs,
        thread_count = ?cfg.thread_count,
        "Configuration loaded"
    );

    let source = ProcessMetricsSource::from_config(&cfg)?;
    info!(pid = %source.handle().pid(), "Process handle acquired");

    // Built by hand so the runtime's own threads show up in the thread count.
    let runtime = ThreadRegistry::global().tokio_runtime(None)?;
    runtime.block_on(sampler::run(
        Sampler::from_source(&source),
        Duration::from_secs(cfg.report_interval_secs),
        cli.ticks,
        &mut std::io::stdout(),
    ))
}
