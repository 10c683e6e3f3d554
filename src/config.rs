//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! field has a default, so a missing section or an empty file is valid.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::types::DEFAULT_BREAK_MINUTES;

/// Upper bound for `reality_check.summary_interval_mins` (one day).
pub const MAX_SUMMARY_INTERVAL_MINS: i64 = 24 * 60;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub reality_check: RealityCheckConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppSection {
    /// Directory for `JsonFileStore::from_config`.
    pub storage_dir: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            storage_dir: "calmbet_state".to_string(),
        }
    }
}

/// Tuning for the periodic session-summary prompt.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RealityCheckConfig {
    pub poll_interval_secs: u64,
    /// Time since the last summary that triggers a new one.
    pub summary_interval_mins: i64,
    /// Session actions since the last summary that trigger a new one.
    pub action_count: u32,
    /// Share of the daily stake limit that triggers a summary.
    pub daily_stake_fraction: f64,
    /// Length of the break offered by the prompt.
    pub break_minutes: u32,
}

impl Default for RealityCheckConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            summary_interval_mins: 60,
            action_count: 10,
            daily_stake_fraction: 0.5,
            break_minutes: DEFAULT_BREAK_MINUTES,
        }
    }
}

impl RealityCheckConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn summary_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.summary_interval_mins.clamp(1, MAX_SUMMARY_INTERVAL_MINS))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "calmbet=info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let rc = &self.reality_check;
        anyhow::ensure!(
            rc.summary_interval_mins > 0 && rc.summary_interval_mins <= MAX_SUMMARY_INTERVAL_MINS,
            "reality_check.summary_interval_mins must be within 1..={MAX_SUMMARY_INTERVAL_MINS}"
        );
        anyhow::ensure!(rc.action_count > 0, "reality_check.action_count must be positive");
        anyhow::ensure!(
            rc.daily_stake_fraction > 0.0 && rc.daily_stake_fraction <= 1.0,
            "reality_check.daily_stake_fraction must be within (0, 1]"
        );
        anyhow::ensure!(rc.break_minutes > 0, "reality_check.break_minutes must be positive");
        Ok(())
    }
}
