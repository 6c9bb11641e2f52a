use crate::config::{AppEnvironment, TelemetryConfig};
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { value, .. } => {
                write!(f, "invalid log filter '{value}' in RUST_LOG or APP_LOG_LEVEL")
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::EnvFilter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

/// How log lines are rendered for one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStyle {
    pub ansi: bool,
    pub target: bool,
    pub compact: bool,
}

impl LogStyle {
    pub fn for_environment(environment: AppEnvironment) -> Self {
        match environment {
            AppEnvironment::Development => Self {
                ansi: true,
                target: true,
                compact: false,
            },
            AppEnvironment::Test | AppEnvironment::Production => Self {
                ansi: false,
                target: false,
                compact: true,
            },
        }
    }
}

/// `RUST_LOG` wins over the configured level when set.
fn build_filter(override_directives: Option<&str>, log_level: &str) -> Result<EnvFilter, TelemetryError> {
    let directives = override_directives
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(log_level);
    EnvFilter::try_new(directives).map_err(|source| TelemetryError::EnvFilter {
        value: directives.to_string(),
        source,
    })
}

/// Install the global subscriber on stderr so stdout stays free for command
/// output.
pub fn init(config: &TelemetryConfig, environment: AppEnvironment) -> Result<(), TelemetryError> {
    let override_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = build_filter(override_directives.as_deref(), &config.log_level)?;
    let style = LogStyle::for_environment(environment);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(style.target)
        .with_ansi(style.ansi);
    let installed = if style.compact {
        builder.compact().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_takes_precedence_over_configured_level() {
        assert!(build_filter(Some("applicant_registration=debug"), "not==valid").is_ok());
    }

    #[test]
    fn blank_override_falls_back_to_configured_level() {
        assert!(build_filter(Some("  "), "warn").is_ok());
        assert!(build_filter(None, "info").is_ok());
    }

    #[test]
    fn invalid_level_is_reported_with_its_value() {
        let err = build_filter(None, "registry=loudest").expect_err("unknown level rejected");
        assert!(matches!(
            &err,
            TelemetryError::EnvFilter { value, .. } if value == "registry=loudest"
        ));
        assert!(err.to_string().contains("registry=loudest"));
    }

    #[test]
    fn development_logs_are_richer_than_production() {
        let development = LogStyle::for_environment(AppEnvironment::Development);
        let production = LogStyle::for_environment(AppEnvironment::Production);
        assert!(development.ansi && development.target && !development.compact);
        assert!(!production.ansi && production.compact);
        assert_eq!(
            LogStyle::for_environment(AppEnvironment::Test),
            production
        );
    }
}
