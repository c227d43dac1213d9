// 📜 Logging - tracing subscriber setup for the CLI
// The library only emits `tracing` events; the binary installs the subscriber once

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `--log-level` values; `debug` adds duplicate groups and plan fingerprints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Install the global subscriber; `RUST_LOG` directives override `level`
pub fn init_logging(level: LogLevel) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(level).into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_values_map_to_filters() {
        assert_eq!(LogLevel::from_str("warn", true).unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("DEBUG", true).unwrap(), LogLevel::Debug);
        assert!(LogLevel::from_str("verbose", true).is_err());
        assert_eq!(LevelFilter::from(LogLevel::default()), LevelFilter::INFO);
    }
}
