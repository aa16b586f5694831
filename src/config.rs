use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_DATABASE_URL: &str = "sqlite://revenue_forecast.db?mode=rwc";
const CONFIG_DIR: &str = "config";
const DEFAULT_SMOOTHING_ALPHA: f64 = 0.3;
const DEFAULT_CONFIDENCE_BAND: f64 = 0.3;
const DEFAULT_PERIOD_STEP_DAYS: i64 = 30;
const DEFAULT_FALLBACK_DAYS_PER_PERIOD: f64 = 30.0;
const DEFAULT_FALLBACK_AVERAGE_SALE: f64 = 1000.0;

/// Heuristic policy parameters of a forecast run.
///
/// The horizon itself is fixed at [`crate::ml::HORIZON`] periods; everything
/// else here can be tuned per deployment.
#[derive(Clone, Debug, Deserialize, Validate, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ForecastSettings {
    /// Exponential smoothing factor applied to the monthly total series
    #[serde(default = "default_smoothing_alpha")]
    #[validate(custom = "validate_smoothing_alpha")]
    pub smoothing_alpha: f64,

    /// Relative half-width of the confidence band (0.3 => ±30%)
    #[serde(default = "default_confidence_band")]
    #[validate(custom = "validate_confidence_band")]
    pub confidence_band: f64,

    /// Days between consecutive forecast dates
    #[serde(default = "default_period_step_days")]
    #[validate(range(min = 1, max = 366))]
    pub period_step_days: i64,

    /// Multiplier turning the average sale value into a per-period estimate
    #[serde(default = "default_fallback_days_per_period")]
    #[validate(custom = "validate_non_negative")]
    pub fallback_days_per_period: f64,

    /// Average sale value assumed when the tenant has no sales at all
    #[serde(default = "default_fallback_average_sale")]
    #[validate(custom = "validate_non_negative")]
    pub fallback_average_sale: f64,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            smoothing_alpha: default_smoothing_alpha(),
            confidence_band: default_confidence_band(),
            period_step_days: default_period_step_days(),
            fallback_days_per_period: default_fallback_days_per_period(),
            fallback_average_sale: default_fallback_average_sale(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Forecast policy parameters
    #[serde(default)]
    #[validate]
    pub forecast: ForecastSettings,
}

impl AppConfig {
    /// Creates a new configuration with defaults for everything but the essentials
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            forecast: ForecastSettings::default(),
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.is_production() && self.database_url.starts_with("sqlite:") {
            let mut err = ValidationError::new("database_url_sqlite_in_production");
            err.message = Some(
                "SQLite is only supported outside production. Set APP__DATABASE_URL to a Postgres URL."
                    .into(),
            );
            errors.add("database_url", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    5
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_smoothing_alpha() -> f64 {
    DEFAULT_SMOOTHING_ALPHA
}
fn default_confidence_band() -> f64 {
    DEFAULT_CONFIDENCE_BAND
}
fn default_period_step_days() -> i64 {
    DEFAULT_PERIOD_STEP_DAYS
}
fn default_fallback_days_per_period() -> f64 {
    DEFAULT_FALLBACK_DAYS_PER_PERIOD
}
fn default_fallback_average_sale() -> f64 {
    DEFAULT_FALLBACK_AVERAGE_SALE
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_smoothing_alpha(alpha: f64) -> Result<(), ValidationError> {
    if !alpha.is_finite() || alpha <= 0.0 || alpha > 1.0 {
        let mut err = ValidationError::new("smoothing_alpha");
        err.message = Some("smoothing_alpha must be a finite value in (0.0, 1.0]".into());
        return Err(err);
    }
    Ok(())
}

fn validate_confidence_band(band: f64) -> Result<(), ValidationError> {
    if !band.is_finite() || band < 0.0 || band >= 1.0 {
        let mut err = ValidationError::new("confidence_band");
        err.message = Some("confidence_band must be a finite value in [0.0, 1.0)".into());
        return Err(err);
    }
    Ok(())
}

fn validate_non_negative(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("value must be finite and non-negative".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("revenue_forecast={},sea_orm=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(CONFIG_DIR)
}

/// Same as [`load_config`], reading files from `config_dir`.
pub fn load_config_from(config_dir: &str) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(config_dir).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir
        );
    }

    let config = Config::builder()
        .set_default("database_url", DEFAULT_DATABASE_URL)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", config_dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
