use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::PrettyFields;
use tracing_subscriber::EnvFilter;

const CRATE_NAME: &str = "newrelic_k8s_selector";
const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("init logging error: `{0}`")]
    TryInitError(String),
}

#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub(crate) level: LogLevel,
}

pub struct Logging;

impl Logging {
    /// Installs the global fmt subscriber. `LOG_LEVEL` overrides the configured level.
    pub fn try_init(config: &LoggingConfig) -> Result<(), LoggingError> {
        tracing_subscriber::fmt()
            .with_env_filter(config.logging_filter()?)
            .fmt_fields(PrettyFields::new())
            .try_init()
            .map_err(|_| {
                LoggingError::TryInitError("unable to set global logging subscriber".to_string())
            })?;

        debug!("Logging initialized successfully");
        Ok(())
    }
}

impl LoggingConfig {
    fn crate_directive(&self) -> Result<Directive, LoggingError> {
        let level = self.level.as_level().to_string().to_lowercase();
        format!("{CRATE_NAME}={level}")
            .parse::<Directive>()
            .map_err(|err| LoggingError::TryInitError(err.to_string()))
    }

    fn logging_filter(&self) -> Result<EnvFilter, LoggingError> {
        Ok(EnvFilter::builder()
            .with_default_directive(self.crate_directive()?)
            .with_env_var(LOG_LEVEL_ENV)
            .from_env_lossy())
    }
}

#[derive(Debug, PartialEq, Clone)]
pub(crate) struct LogLevel(Level);

impl LogLevel {
    fn as_level(&self) -> Level {
        self.0
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self(Level::INFO)
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value_str = String::deserialize(deserializer)?;
        Level::from_str(&value_str)
            .map(LogLevel)
            .map_err(serde::de::Error::custom)
    }
}
