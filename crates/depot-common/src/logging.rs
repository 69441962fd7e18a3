//! Logging configuration and initialization
//!
//! Centralized tracing setup for depot binaries. Supports console and/or
//! daily-rotated file output, text or JSON formatting, and extra filter
//! directives for per-module levels.
//!
//! Use the `tracing` macros (`info!`, `warn!`, ...) with structured fields:
//!
//! ```rust,ignore
//! info!(user = %user.username, zone = %zone.name, "zone provisioned");
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Minimum level to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(anyhow::anyhow!("invalid log level: {other}")),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Console,
    File,
    Both,
}

impl std::str::FromStr for LogTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" | "stdout" => Ok(LogTarget::Console),
            "file" => Ok(LogTarget::File),
            "both" => Ok(LogTarget::Both),
            other => Err(anyhow::anyhow!("invalid log target: {other}")),
        }
    }
}

/// Line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!("invalid log format: {other}")),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub target: LogTarget,
    pub format: LogFormat,
    /// Directory for rotated log files (target `file`/`both`)
    pub log_dir: PathBuf,
    /// File prefix, e.g. "depot-server" -> depot-server.2025-06-01.log
    pub file_prefix: String,
    /// Extra directives, e.g. "sqlx=warn,tower_http=debug"
    pub filter_directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            target: LogTarget::Console,
            format: LogFormat::Text,
            log_dir: PathBuf::from("./logs"),
            file_prefix: "depot".to_string(),
            filter_directives: None,
        }
    }
}

impl LogConfig {
    /// Load from `DEPOT_LOG_*` environment variables, falling back to
    /// defaults with the given file prefix.
    ///
    /// - `DEPOT_LOG_LEVEL`: trace | debug | info | warn | error
    /// - `DEPOT_LOG_TARGET`: console | file | both
    /// - `DEPOT_LOG_FORMAT`: text | json
    /// - `DEPOT_LOG_DIR`: directory for rotated files
    /// - `DEPOT_LOG_FILTER`: extra filter directives
    pub fn from_env(file_prefix: &str) -> Result<Self> {
        let mut config = Self {
            file_prefix: file_prefix.to_string(),
            ..Self::default()
        };

        if let Ok(level) = std::env::var("DEPOT_LOG_LEVEL") {
            config.level = level.parse()?;
        }
        if let Ok(target) = std::env::var("DEPOT_LOG_TARGET") {
            config.target = target.parse()?;
        }
        if let Ok(format) = std::env::var("DEPOT_LOG_FORMAT") {
            config.format = format.parse()?;
        }
        if let Ok(dir) = std::env::var("DEPOT_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Ok(filter) = std::env::var("DEPOT_LOG_FILTER") {
            config.filter_directives = Some(filter);
        }

        Ok(config)
    }
}

/// Initialize the global tracing subscriber. Call once at startup.
///
/// Returns the appender guard when file output is enabled; the caller must
/// keep it alive for the process lifetime or buffered lines are lost.
pub fn init_logging(config: &LogConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let mut filter = EnvFilter::from_default_env()
        .add_directive(config.level.as_tracing_level().into());

    if let Some(ref directives) = config.filter_directives {
        for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
            filter = filter.add_directive(
                directive
                    .trim()
                    .parse()
                    .with_context(|| format!("bad log filter directive: {directive}"))?,
            );
        }
    }

    let file_writer = match config.target {
        LogTarget::Console => None,
        LogTarget::File | LogTarget::Both => {
            std::fs::create_dir_all(&config.log_dir).with_context(|| {
                format!("failed to create log directory {}", config.log_dir.display())
            })?;
            let appender =
                tracing_appender::rolling::daily(&config.log_dir, format!("{}.log", config.file_prefix));
            Some(tracing_appender::non_blocking(appender))
        },
    };

    let console = matches!(config.target, LogTarget::Console | LogTarget::Both);

    let registry = tracing_subscriber::registry().with(filter);
    let guard = match (config.format, file_writer) {
        (LogFormat::Text, None) => {
            registry.with(fmt::layer().with_writer(std::io::stdout)).init();
            None
        },
        (LogFormat::Json, None) => {
            registry
                .with(fmt::layer().json().with_writer(std::io::stdout))
                .init();
            None
        },
        (LogFormat::Text, Some((writer, guard))) => {
            let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
            if console {
                registry
                    .with(file_layer)
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .init();
            } else {
                registry.with(file_layer).init();
            }
            Some(guard)
        },
        (LogFormat::Json, Some((writer, guard))) => {
            let file_layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            if console {
                registry
                    .with(file_layer)
                    .with(fmt::layer().json().with_writer(std::io::stdout))
                    .init();
            } else {
                registry.with(file_layer).init();
            }
            Some(guard)
        },
    };

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_levels() {
        assert_eq!("debug".parse::<LogLevel>().ok(), Some(LogLevel::Debug));
        assert_eq!("WARN".parse::<LogLevel>().ok(), Some(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn parses_targets_and_formats() {
        assert_eq!("both".parse::<LogTarget>().ok(), Some(LogTarget::Both));
        assert_eq!("stdout".parse::<LogTarget>().ok(), Some(LogTarget::Console));
        assert_eq!("json".parse::<LogFormat>().ok(), Some(LogFormat::Json));
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn env_overrides_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.target, LogTarget::Console);
    }
}
