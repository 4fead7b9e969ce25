use anyhow::Result;
use serde::Deserialize;

/// How `instance_pvm_thread_active_count` is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadCountMode {
    /// Threads spawned through the agent's `ThreadRegistry`, plus the main thread.
    #[default]
    Runtime,
    /// Kernel tasks of the process as seen by the host (Linux only).
    Os,
}

/// Agent configuration loaded from a TOML file or defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Seconds between two samples of every meter.
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,

    #[serde(default)]
    pub thread_count: ThreadCountMode,
}

fn default_report_interval() -> u64 {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval(),
            thread_count: ThreadCountMode::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AgentConfig = toml::de::from_str(contents)?;
        if config.report_interval_secs == 0 {
            anyhow::bail!("report_interval_secs must be at least 1");
        }
        Ok(config)
    }
}
