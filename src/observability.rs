//! Logging setup.
//!
//! Application code only uses `tracing` macros; this module installs the
//! subscriber once at startup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for development
    #[default]
    Pretty,
    /// One JSON object per line, for log aggregation
    Json,
    /// Single-line text
    Compact,
}

impl LogFormat {
    fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info,consultorio=debug,tower_http=info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// - `LOG_FORMAT`: "pretty", "json" or "compact" (default: "pretty")
    /// - `RUST_LOG`: filter directive, read by the subscriber itself
    pub fn from_env() -> Self {
        Self {
            log_format: std::env::var("LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or_default(),
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("Invalid log filter: {0}")]
    Filter(String),
    #[error("Failed to init tracing: {0}")]
    Init(String),
}

/// Install the global tracing subscriber.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), ObservabilityError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| ObservabilityError::Filter(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.log_format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(true).with_line_number(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact().with_target(true)).try_init(),
    };

    result.map_err(|e| ObservabilityError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("COMPACT"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("whatever"), LogFormat::Pretty);
    }
}
