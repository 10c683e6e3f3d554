//! Structured logging setup.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `cfg.filter`. JSON output is used when `cfg.json`
/// is set or `CALMBET_LOG_JSON` is present in the environment. Fails if a
/// subscriber is already installed.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.filter))
        .unwrap_or_else(|_| EnvFilter::new("calmbet=info"));

    let json_logging = cfg.json || std::env::var("CALMBET_LOG_JSON").is_ok();

    let installed = if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .try_init()
    } else {
        fmt().with_env_filter(env_filter).with_target(true).try_init()
    };

    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
