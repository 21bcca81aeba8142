use anyhow::Result;
use config::Config;
use serde::Deserialize;

/// Default number of retries for a write unit of work.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay of the retry backoff, in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u8,
}

/// Retry behaviour of write units of work on transient storage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay for `base * attempt + random(0, base)` backoff.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    /// ## Summary
    /// Loads configuration from `.env`, an optional `config.toml` and `KUNAI_`
    /// environment variables, in increasing precedence.
    ///
    /// Nested keys use `__`, e.g. `KUNAI_RETRY__MAX_RETRIES` sets `retry.max_retries`.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::load_with(None)
    }

    /// Loads with `vars` standing in for the process environment when given.
    fn load_with(vars: Option<config::Map<String, String>>) -> Result<Self> {
        Ok(Self::builder()?
            .add_source(config::File::with_name("config.toml").required(false))
            .add_source(
                config::Environment::with_prefix("KUNAI")
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?
            .try_deserialize::<Settings>()?)
    }

    /// ## Summary
    /// Loads configuration from a TOML string on top of the defaults.
    ///
    /// ## Errors
    /// Returns an error if the TOML is malformed or required keys are missing.
    pub fn from_toml(toml: &str) -> Result<Self> {
        Ok(Self::builder()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Settings>()?)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("database.max_connections", 4)?
            .set_default("retry.max_retries", DEFAULT_MAX_RETRIES)?
            .set_default("retry.base_delay_ms", DEFAULT_RETRY_BASE_DELAY_MS)?
            .set_default("logging.level", "debug")?)
    }
}
