//! Command-layer configuration.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

pub const PRECONDITION_STRATEGY_ENV: &str = "WARDEN_PRECONDITION_STRATEGY";
pub const COMMAND_TIMEOUT_ENV: &str = "WARDEN_COMMAND_TIMEOUT_MS";
pub const PASSWORD_MIN_LENGTH_ENV: &str = "WARDEN_PASSWORD_MIN_LENGTH";

/// How cross-aggregate preconditions of user grants are gathered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreconditionStrategy {
    /// One batched query against the secondary field index.
    #[default]
    Search,
    /// Replay the user, project and org streams.
    Replay,
}

impl FromStr for PreconditionStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(Self::Search),
            "replay" => Ok(Self::Replay),
            other => bail!("unknown precondition strategy {other:?} (expected search or replay)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub precondition_strategy: PreconditionStrategy,
    /// Upper bound for each store call when the context has no deadline.
    pub command_timeout_ms: Option<u64>,
    pub password_min_length: usize,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            precondition_strategy: PreconditionStrategy::Search,
            command_timeout_ms: None,
            password_min_length: 8,
        }
    }
}

impl CommandConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup; unset keys
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(PRECONDITION_STRATEGY_ENV) {
            config.precondition_strategy = raw
                .parse()
                .with_context(|| format!("invalid {PRECONDITION_STRATEGY_ENV}"))?;
        }
        if let Some(raw) = lookup(COMMAND_TIMEOUT_ENV) {
            let ms: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{COMMAND_TIMEOUT_ENV} must be milliseconds"))?;
            config.command_timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(raw) = lookup(PASSWORD_MIN_LENGTH_ENV) {
            config.password_min_length = raw
                .trim()
                .parse()
                .with_context(|| format!("{PASSWORD_MIN_LENGTH_ENV} must be a number"))?;
        }
        Ok(config)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_ms.map(Duration::from_millis)
    }
}
