use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

/// Number of years past the requested year that a time-zone transition index
/// materializes in one expansion pass.
pub const DEFAULT_EXTRA_COVERAGE_YEARS: i32 = 5;

/// Default consumer-side cap on occurrences pulled from a possibly infinite rule.
pub const DEFAULT_MAX_OCCURRENCES: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub recurrence: RecurrenceConfig,
    pub timezone: TimezoneConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecurrenceConfig {
    pub max_occurrences: usize,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimezoneConfig {
    pub extra_coverage_years: i32,
    pub minimum_expansion_year: Option<i32>,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            extra_coverage_years: DEFAULT_EXTRA_COVERAGE_YEARS,
            minimum_expansion_year: None,
        }
    }
}

impl Settings {
    /// ## Summary
    /// Loads configuration from environment variables and an optional `config.toml`
    /// into a `Settings`. Environment variables take precedence over defaults.
    ///
    /// Nested keys are joined with a double underscore, so
    /// `RECURRENCE__MAX_OCCURRENCES` sets `recurrence.max_occurrences`.
    ///
    /// ## Errors
    /// Returns an error if building the configuration, deserializing it, or
    /// validating the result fails.
    pub fn load() -> Result<Self> {
        Self::load_from(environment())
    }

    fn load_from(environment: Environment) -> Result<Self> {
        let settings = Config::builder()
            .set_default("logging.level", "debug")?
            .set_default(
                "recurrence.max_occurrences",
                i64::try_from(DEFAULT_MAX_OCCURRENCES)?,
            )?
            .set_default(
                "timezone.extra_coverage_years",
                i64::from(DEFAULT_EXTRA_COVERAGE_YEARS),
            )?
            // Environment
            .add_source(environment)
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        Ok(settings)
    }

    /// ## Summary
    /// Checks that the loaded values are usable by the recurrence engine.
    ///
    /// ## Errors
    /// Returns `CoreError::ValidationError` naming the first offending key.
    pub fn validate(&self) -> CoreResult<()> {
        if self.recurrence.max_occurrences == 0 {
            return Err(CoreError::ValidationError(
                "recurrence.max_occurrences must be at least 1".to_string(),
            ));
        }
        if self.timezone.extra_coverage_years < 0 {
            return Err(CoreError::ValidationError(format!(
                "timezone.extra_coverage_years must not be negative, got {}",
                self.timezone.extra_coverage_years
            )));
        }
        Ok(())
    }
}

/// Field names contain single underscores, so sections are split on `__`.
fn environment() -> Environment {
    Environment::default()
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> Result<Settings> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    tracing::debug!(
        level = %settings.logging.level,
        max_occurrences = settings.recurrence.max_occurrences,
        extra_coverage_years = settings.timezone.extra_coverage_years,
        "Settings loaded"
    );
    Ok(settings)
}
