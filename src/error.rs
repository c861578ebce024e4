use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::admissions::{DatastoreError, ImportError};
use crate::workflows::feeds::FeedError;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Json(serde_json::Error),
    Feed(FeedError),
    Import(ImportError),
    Datastore(DatastoreError),
    /// A command needs data that no earlier command has produced yet.
    NothingLoaded(&'static str),
    UnknownSubject(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Json(err) => write!(f, "output error: {}", err),
            AppError::Feed(err) => write!(f, "feed error: {}", err),
            AppError::Import(err) => write!(f, "import error: {}", err),
            AppError::Datastore(err) => write!(f, "datastore error: {}", err),
            AppError::NothingLoaded(what) => write!(f, "no {} loaded yet", what),
            AppError::UnknownSubject(unit) => write!(f, "no subject with unit code {}", unit),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::Feed(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::Datastore(err) => Some(err),
            AppError::NothingLoaded(_) | AppError::UnknownSubject(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<FeedError> for AppError {
    fn from(value: FeedError) -> Self {
        Self::Feed(value)
    }
}

impl From<ImportError> for AppError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

impl From<DatastoreError> for AppError {
    fn from(value: DatastoreError) -> Self {
        Self::Datastore(value)
    }
}
