use crate::workflows::feeds::predictions::HeadingPattern;
use chrono::{Datelike, Duration, Local};
use sha2::{Digest, Sha256};
use std::env;
use std::fmt;
use std::path::PathBuf;

const LICENCE_SALT: &str = "1234567890";

/// Distinguishes runtime behavior for different stages of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub tenant: TenantConfig,
    pub paths: PathConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("TRACKER_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let establishment_no =
            env::var("TRACKER_ESTABLISHMENT_NO").unwrap_or_else(|_| "12345".to_string());
        let centre_no = env::var("TRACKER_CENTRE_NO").unwrap_or_else(|_| "67890".to_string());
        if establishment_no.trim().is_empty() || centre_no.trim().is_empty() {
            return Err(ConfigError::MissingTenant);
        }

        let app_year = match env::var("TRACKER_APP_YEAR") {
            Ok(value) => value
                .trim()
                .parse::<i32>()
                .map_err(|_| ConfigError::InvalidYear(value))?,
            Err(_) => default_app_year(),
        };

        let snapshot_prefix = env::var("TRACKER_SNAPSHOT_PREFIX").unwrap_or_else(|_| {
            format!("applicant_status_report_{app_year}_{establishment_no}")
        });

        let prediction_heading = env::var("TRACKER_PREDICTION_HEADING")
            .unwrap_or_else(|_| "KS5 % UCAS Grade".to_string());
        if HeadingPattern::parse(&prediction_heading).is_none() {
            return Err(ConfigError::InvalidPredictionHeading(prediction_heading));
        }

        let paths = PathConfig {
            snapshot_dir: path_var("TRACKER_SNAPSHOT_DIR", "./downloads"),
            exams_dir: path_var("TRACKER_EXAMS_DIR", "./examsin"),
            data_dir: path_var("TRACKER_DATA_DIR", "./data"),
            snapshot_prefix,
            prediction_heading,
        };

        let log_level = env::var("TRACKER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            tenant: TenantConfig {
                establishment_no,
                centre_no,
                app_year,
            },
            paths,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// The admissions year rolls over in mid-September, once results season has closed.
fn default_app_year() -> i32 {
    (Local::now().date_naive() + Duration::weeks(16)).year()
}

fn path_var(key: &str, default: &str) -> PathBuf {
    PathBuf::from(env::var(key).unwrap_or_else(|_| default.to_string()))
}

/// Identity of the licensed establishment and its exam centre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    pub establishment_no: String,
    pub centre_no: String,
    pub app_year: i32,
}

impl TenantConfig {
    /// Token stamped into every datastore; a store written for another tenant is refused.
    pub fn licence_token(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.establishment_no.as_bytes());
        hasher.update(self.centre_no.as_bytes());
        hasher.update(LICENCE_SALT.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Where feeds are discovered and datastores are written.
#[derive(Debug, Clone)]
pub struct PathConfig {
    pub snapshot_dir: PathBuf,
    pub exams_dir: PathBuf,
    pub data_dir: PathBuf,
    pub snapshot_prefix: String,
    pub prediction_heading: String,
}

impl PathConfig {
    pub fn prediction_pattern(&self) -> Result<HeadingPattern, ConfigError> {
        HeadingPattern::parse(&self.prediction_heading)
            .ok_or_else(|| ConfigError::InvalidPredictionHeading(self.prediction_heading.clone()))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingTenant,
    InvalidYear(String),
    InvalidPredictionHeading(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingTenant => write!(
                f,
                "TRACKER_ESTABLISHMENT_NO and TRACKER_CENTRE_NO must not be empty"
            ),
            ConfigError::InvalidYear(value) => {
                write!(f, "TRACKER_APP_YEAR must be a year, got '{value}'")
            }
            ConfigError::InvalidPredictionHeading(value) => write!(
                f,
                "TRACKER_PREDICTION_HEADING must mark the subject with a single '%', got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
