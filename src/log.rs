//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `level` in [`LogConfig`] (if set)
//! 2. `WORKDAG_LOG` environment variable (a level or a full filter
//!    directive such as `workdag::store=debug`)
//! 3. default to `info`
//!
//! Output goes to stderr.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "WORKDAG_LOG";

/// Log levels, mirroring `tracing::Level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: Option<LogLevel>,
    pub with_target: bool,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: None,
            with_target: true,
            ansi: false,
        }
    }
}

/// Filter directive from the configured level, then the environment value.
fn directive(level: Option<LogLevel>, env: Option<&str>) -> String {
    if let Some(level) = level {
        return level.as_str().to_string();
    }
    match env.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => match LogLevel::parse(value) {
            Some(level) => level.as_str().to_string(),
            None if EnvFilter::try_new(value).is_ok() => value.to_string(),
            None => LogLevel::Info.as_str().to_string(),
        },
        None => LogLevel::Info.as_str().to_string(),
    }
}

/// Install the global subscriber.
///
/// Returns `false` when a global subscriber was already installed, which
/// happens when a host process set up its own logging first.
pub fn init(config: &LogConfig) -> bool {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let filter = EnvFilter::new(directive(config.level, env.as_deref()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.with_target)
        .with_ansi(config.ansi)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init()
        .is_ok()
}
