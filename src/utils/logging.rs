//! Subscriber setup shared by the CLI and the server
//!
//! `RUST_LOG` wins over the configured level when it is set.

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// How log lines are filtered and formatted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    /// Prefix lines with the emitting module
    pub include_target: bool,
    pub include_thread_ids: bool,
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    /// Interactive terminal output at `INFO`
    fn default() -> Self {
        Self {
            level: Level::INFO,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// `DEBUG` with module and thread, for tracing inference workers
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            include_target: true,
            include_thread_ids: true,
            ..Self::default()
        }
    }

    /// Plain, uncolored lines for log collectors
    pub fn production() -> Self {
        Self {
            include_target: true,
            ansi_colors: false,
            ..Self::default()
        }
    }

    pub fn with_level(self, level: Level) -> Self {
        Self { level, ..self }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()))
    }
}

/// Install the global subscriber; fails if one is already installed
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(config.filter())
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("cannot install log subscriber: {}", e))
}
