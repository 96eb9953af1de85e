use serde::{Deserialize, Serialize};

/// Engine tuning knobs, loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Samples retained per `(service, metric)` key. Oldest are dropped
    /// silently on overflow.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Maximum concurrent channel sends per dispatch.
    #[serde(default = "default_dispatch_pool_size")]
    pub dispatch_pool_size: usize,

    /// Per-channel delivery timeout in seconds.
    #[serde(default = "default_channel_timeout_secs")]
    pub channel_timeout_secs: u64,

    /// Interval between periodic re-evaluations of active alerts.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            dispatch_pool_size: default_dispatch_pool_size(),
            channel_timeout_secs: default_channel_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_history_capacity() -> usize {
    100
}

fn default_dispatch_pool_size() -> usize {
    5
}

fn default_channel_timeout_secs() -> u64 {
    10
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl EngineConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
