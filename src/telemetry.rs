use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Full filter override, e.g. `TRACKER_LOG=admissions_tracker::workflows::feeds=trace`.
pub const FILTER_ENV: &str = "TRACKER_LOG";

#[derive(Debug)]
pub enum TelemetryError {
    LogLevel { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::LogLevel { value, .. } => {
                write!(f, "TRACKER_LOG_LEVEL '{value}' is not a log level")
            }
            TelemetryError::Subscriber(err) => {
                write!(f, "tracker logging already initialised: {err}")
            }
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::LogLevel { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

/// Tracker events at `level`; dependencies only at warn.
pub fn default_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    let level = level.trim();
    EnvFilter::try_new(format!("warn,{}={level}", env!("CARGO_CRATE_NAME"))).map_err(|source| {
        TelemetryError::LogLevel {
            value: level.to_string(),
            source,
        }
    })
}

/// Installs the process subscriber. Reports go to stdout, so logs are written to stderr.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_env(FILTER_ENV) {
        Ok(filter) => filter,
        Err(_) => default_filter(&config.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}
