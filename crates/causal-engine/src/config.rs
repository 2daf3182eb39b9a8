use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for the cache's background tickers and diagnostics (spec §5,
/// §6, §7). Loaded from a YAML file with environment overrides, in the
/// order defaults → file → env, mirroring how the rest of the pipeline's
/// functions are configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CausalCacheConfig {
    /// Seconds between successive migration sweeps of the unmerged store
    /// into the causal cut (spec §4.10, §6 `MIGRATE_THRESHOLD`).
    pub migrate_threshold_secs: u64,
    /// Seconds between successive reports of this node's key set to the
    /// membership/monitoring service (spec §4.11, §6
    /// `CAUSAL_CACHE_REPORT_THRESHOLD`).
    pub report_threshold_secs: u64,
    /// Ticks an in-preparation head may sit unresolved before it is logged
    /// as stuck (spec §7 Open Question 4: diagnostic only, never auto-dne).
    /// Unlike the two thresholds above this counts event-loop turns, not
    /// wall-clock time — it only needs a rough ordering of "how long ago",
    /// not a real cadence.
    pub stuck_after_ticks: u64,
}

impl Default for CausalCacheConfig {
    fn default() -> Self {
        Self {
            migrate_threshold_secs: 10,
            report_threshold_secs: 5,
            stuck_after_ticks: 100_000,
        }
    }
}

const REPORT_THRESHOLD_ENV: &str = "CAUSAL_CACHE_REPORT_THRESHOLD";
const MIGRATE_THRESHOLD_ENV: &str = "CAUSAL_CACHE_MIGRATE_THRESHOLD";
const STUCK_AFTER_ENV: &str = "CAUSAL_CACHE_STUCK_AFTER_TICKS";

impl CausalCacheConfig {
    /// Reads `path` if it exists, falling back to defaults, then applies any
    /// of the `CAUSAL_CACHE_*` environment overrides on top.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => serde_yaml::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(ConfigError::Io(err)),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn migrate_interval(&self) -> Duration {
        Duration::from_secs(self.migrate_threshold_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_threshold_secs)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env_u64(REPORT_THRESHOLD_ENV) {
            self.report_threshold_secs = v;
        }
        if let Some(v) = parse_env_u64(MIGRATE_THRESHOLD_ENV) {
            self.migrate_threshold_secs = v;
        }
        if let Some(v) = parse_env_u64(STUCK_AFTER_ENV) {
            self.stuck_after_ticks = v;
        }
    }
}

fn parse_env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
