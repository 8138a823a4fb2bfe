//! Tracing/logging initialization.

use anyhow::{Context, bail};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Subscriber settings. `RUST_LOG`, when set, overrides `default_filter`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// JSON lines when true, human-readable output otherwise.
    pub json: bool,
    pub default_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json: true,
            default_filter: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// Reads `WARDEN_LOG_FORMAT` (`json` or `pretty`) and `WARDEN_LOG_FILTER`.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Ok(format) = std::env::var("WARDEN_LOG_FORMAT") {
            config.json = match format.as_str() {
                "json" => true,
                "pretty" => false,
                other => bail!("WARDEN_LOG_FORMAT must be json or pretty, got {other:?}"),
            };
        }
        if let Ok(filter) = std::env::var("WARDEN_LOG_FILTER") {
            EnvFilter::try_new(&filter).context("WARDEN_LOG_FILTER is not a valid filter")?;
            config.default_filter = filter;
        }
        Ok(config)
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    // An already installed subscriber wins.
    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(&ObservabilityConfig::default());
        init(&ObservabilityConfig {
            json: false,
            default_filter: "debug".into(),
        });
        ::tracing::info!("still logging");
    }

    #[test]
    fn defaults_to_json_at_info() {
        let config = ObservabilityConfig::default();
        assert!(config.json);
        assert_eq!(config.default_filter, "info");
    }
}
