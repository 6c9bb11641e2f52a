use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::workflows::registration::SchemaRevision;

/// Distinguishes runtime behavior for different stages of the client.
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

pub const MIN_RESET_DELAY_SECS: u64 = 3;
pub const MAX_RESET_DELAY_SECS: u64 = 10;

/// Top-level configuration for the registration client.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub form: FormConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let raw_base_url =
            env::var("APP_API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
        let base_url = Url::parse(raw_base_url.trim()).map_err(|source| {
            ConfigError::InvalidBaseUrl {
                value: raw_base_url.clone(),
                source,
            }
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(base_url.scheme().to_string()));
        }

        let request_timeout_secs = env::var("APP_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;
        if request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let storage_path = env::var("APP_SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("applicant-registration.json"));
        let download_dir = env::var("APP_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let reset_delay_secs = env::var("APP_RESET_DELAY_SECS")
            .unwrap_or_else(|_| MIN_RESET_DELAY_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidResetDelay)?;
        if !(MIN_RESET_DELAY_SECS..=MAX_RESET_DELAY_SECS).contains(&reset_delay_secs) {
            return Err(ConfigError::InvalidResetDelay);
        }

        let raw_revision = env::var("APP_SCHEMA_REVISION").unwrap_or_else(|_| "current".to_string());
        let revision = SchemaRevision::parse(&raw_revision)
            .ok_or(ConfigError::UnknownSchemaRevision(raw_revision))?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            api: ApiConfig {
                base_url,
                request_timeout: Duration::from_secs(request_timeout_secs),
            },
            session: SessionConfig {
                storage_path,
                download_dir,
            },
            form: FormConfig {
                revision,
                reset_delay: Duration::from_secs(reset_delay_secs),
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Remote registry endpoint settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
}

/// Where the durable session and downloaded documents live.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub storage_path: PathBuf,
    pub download_dir: PathBuf,
}

/// Form behavior: which schema revision validates input and how long a
/// successful submission stays on screen before the form resets.
#[derive(Debug, Clone)]
pub struct FormConfig {
    pub revision: SchemaRevision,
    pub reset_delay: Duration,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            revision: SchemaRevision::Current,
            reset_delay: Duration::from_secs(MIN_RESET_DELAY_SECS),
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidBaseUrl {
        value: String,
        source: url::ParseError,
    },
    UnsupportedScheme(String),
    InvalidTimeout,
    InvalidResetDelay,
    UnknownSchemaRevision(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBaseUrl { value, .. } => {
                write!(f, "APP_API_BASE_URL '{}' is not a valid URL", value)
            }
            ConfigError::UnsupportedScheme(scheme) => {
                write!(f, "APP_API_BASE_URL must use http or https, found '{scheme}'")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "APP_REQUEST_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::InvalidResetDelay => write!(
                f,
                "APP_RESET_DELAY_SECS must be between {MIN_RESET_DELAY_SECS} and {MAX_RESET_DELAY_SECS}"
            ),
            ConfigError::UnknownSchemaRevision(value) => {
                write!(f, "APP_SCHEMA_REVISION '{value}' is not one of: current, legacy")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidBaseUrl { source, .. } => Some(source),
            _ => None,
        }
    }
}
