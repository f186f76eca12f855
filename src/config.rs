use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Object storage configuration (third-party bucket API, treated as a black box)
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Base endpoint of the bucket API
    #[serde(default = "default_storage_endpoint")]
    pub endpoint: String,

    /// Bucket name objects are written into
    #[serde(default = "default_storage_bucket")]
    pub bucket: String,

    /// Bearer token for the bucket API
    #[serde(default)]
    pub token: String,

    /// Base URL that serves uploaded objects publicly
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Maximum accepted upload size in bytes
    #[serde(default = "default_upload_max_bytes")]
    pub upload_max_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_storage_endpoint(),
            bucket: default_storage_bucket(),
            token: String::new(),
            public_base_url: None,
            upload_max_bytes: default_upload_max_bytes(),
        }
    }
}

fn default_storage_endpoint() -> String {
    "http://localhost:9000".to_string()
}

fn default_storage_bucket() -> String {
    "supply-hub".to_string()
}

fn default_upload_max_bytes() -> usize {
    10 * 1024 * 1024
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    pub jwt_expiration: usize,

    /// Refresh token expiration in seconds
    pub refresh_token_expiration: usize,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// CORS: allow credentials
    #[serde(default)]
    pub cors_allow_credentials: bool,

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

    /// JWT issuer claim
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// JWT audience claim
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
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

fn default_auth_issuer() -> String {
    "supply-hub-auth".to_string()
}

fn default_auth_audience() -> String {
    "supply-hub-api".to_string()
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    if secret == DEV_DEFAULT_JWT_SECRET
        && std::env::var("ENVIRONMENT").map(|e| e == "production") == Ok(true)
    {
        return Err(ValidationError::new(
            "development JWT secret must not be used in production",
        ));
    }
    Ok(())
}

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl AppConfig {
    /// Construct a configuration directly; used by tests and embedded setups.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        refresh_token_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            refresh_token_expiration,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            storage: StorageConfig::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
            || self.environment.eq_ignore_ascii_case("test")
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Load configuration from `config/{default,<env>}.toml` overlaid with
/// `APP__`-prefixed environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("environment", environment.clone())?
        .set_default("host", "0.0.0.0")?
        .set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?
        .set_default("jwt_expiration", 1800)?
        .set_default("refresh_token_expiration", 7 * 24 * 60 * 60)?
        .set_default("database_url", "sqlite://supply_hub.db?mode=rwc")?;

    let default_file = Path::new(CONFIG_DIR).join("default.toml");
    if default_file.exists() {
        builder = builder.add_source(File::from(default_file));
    }
    let env_file = Path::new(CONFIG_DIR).join(format!("{environment}.toml"));
    if env_file.exists() {
        builder = builder.add_source(File::from(env_file));
    }

    let cfg: AppConfig = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    cfg.validate()?;
    info!(environment = %cfg.environment, "Configuration loaded");
    Ok(cfg)
}

/// Initialise the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".to_string(),
            DEV_DEFAULT_JWT_SECRET.to_string(),
            1800,
            86_400,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        )
    }

    #[test]
    fn development_config_validates() {
        let cfg = test_config();
        assert!(cfg.validate().is_ok());
        assert!(cfg.is_development());
        assert!(cfg.should_allow_permissive_cors());
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let mut cfg = test_config();
        cfg.jwt_secret = "too-short".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn production_requires_explicit_cors() {
        let mut cfg = test_config();
        cfg.environment = "production".to_string();
        assert!(!cfg.should_allow_permissive_cors());
        cfg.cors_allow_any_origin = true;
        assert!(cfg.should_allow_permissive_cors());
    }
}
