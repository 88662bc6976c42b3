//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use crate::logging::mask_secret;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// `None` when running with `SKIP_EXTERNALS=true`
    pub database: Option<DatabaseConfig>,
    pub logging: LoggingConfig,
    pub gateway: GatewayConfig,
    pub settlement: SettlementConfig,
    pub skip_externals: bool,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
    pub run_migrations: bool,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// How inbound callback signatures are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMode {
    /// Mismatching signatures are rejected.
    Strict,
    /// Signatures are not enforced. Local and sandbox use only.
    Sandbox,
}

impl SignatureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureMode::Strict => "strict",
            SignatureMode::Sandbox => "sandbox",
        }
    }
}

impl FromStr for SignatureMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "strict" => Ok(SignatureMode::Strict),
            "sandbox" => Ok(SignatureMode::Sandbox),
            other => Err(ConfigError::InvalidValue(format!(
                "MOMO_SIGNATURE_MODE must be 'strict' or 'sandbox', got '{}'",
                other
            ))),
        }
    }
}

/// MoMo gateway credentials and endpoints
#[derive(Clone)]
pub struct GatewayConfig {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub redirect_url: String,
    pub ipn_url: String,
    pub request_type: String,
    pub lang: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub signature_mode: SignatureMode,
}

// Keys never reach the logs, even through `{:?}`.
impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("partner_code", &self.partner_code)
            .field("access_key", &mask_secret(&self.access_key))
            .field("secret_key", &mask_secret(&self.secret_key))
            .field("endpoint", &self.endpoint)
            .field("redirect_url", &self.redirect_url)
            .field("ipn_url", &self.ipn_url)
            .field("request_type", &self.request_type)
            .field("lang", &self.lang)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("signature_mode", &self.signature_mode)
            .finish()
    }
}

/// Settlement rules
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// The single currency payments are accepted in
    pub currency: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        let skip_externals = env_flag("SKIP_EXTERNALS")?;
        let database = if skip_externals {
            None
        } else {
            Some(DatabaseConfig::from_env()?)
        };

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database,
            logging: LoggingConfig::from_env()?,
            gateway: GatewayConfig::from_env()?,
            settlement: SettlementConfig::from_env()?,
            skip_externals,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.logging.validate()?;
        self.gateway.validate()?;
        self.settlement.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
            run_migrations: env_flag("RUN_MIGRATIONS")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            partner_code: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            endpoint: "https://test-payment.momo.vn".to_string(),
            redirect_url: String::new(),
            ipn_url: String::new(),
            request_type: "captureWallet".to_string(),
            lang: "vi".to_string(),
            timeout_secs: 30,
            max_retries: 1,
            signature_mode: SignatureMode::Strict,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(GatewayConfig {
            partner_code: required_var("MOMO_PARTNER_CODE")?,
            access_key: required_var("MOMO_ACCESS_KEY")?,
            secret_key: required_var("MOMO_SECRET_KEY")?,
            endpoint: env::var("MOMO_ENDPOINT").unwrap_or(defaults.endpoint),
            redirect_url: env::var("MOMO_REDIRECT_URL").unwrap_or_default(),
            ipn_url: required_var("MOMO_IPN_URL")?,
            request_type: env::var("MOMO_REQUEST_TYPE").unwrap_or(defaults.request_type),
            lang: env::var("MOMO_LANG").unwrap_or(defaults.lang),
            timeout_secs: env::var("MOMO_TIMEOUT_SECS")
                .unwrap_or_else(|_| defaults.timeout_secs.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MOMO_TIMEOUT_SECS".to_string()))?,
            max_retries: env::var("MOMO_MAX_RETRIES")
                .unwrap_or_else(|_| defaults.max_retries.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MOMO_MAX_RETRIES".to_string()))?,
            signature_mode: env::var("MOMO_SIGNATURE_MODE")
                .unwrap_or_else(|_| SignatureMode::Strict.as_str().to_string())
                .parse()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("MOMO_PARTNER_CODE", &self.partner_code),
            ("MOMO_ACCESS_KEY", &self.access_key),
            ("MOMO_SECRET_KEY", &self.secret_key),
            ("MOMO_IPN_URL", &self.ipn_url),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingVariable(name.to_string()));
            }
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "MOMO_ENDPOINT must be a valid URL".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("MOMO_TIMEOUT_SECS".to_string()));
        }

        Ok(())
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            currency: "VND".to_string(),
        }
    }
}

impl SettlementConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(SettlementConfig {
            currency: env::var("SETTLEMENT_CURRENCY")
                .unwrap_or_else(|_| "VND".to_string())
                .trim()
                .to_uppercase(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::ValidationFailed(format!(
                "SETTLEMENT_CURRENCY must be a 3-letter ISO code, got '{}'",
                self.currency
            )));
        }

        Ok(())
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVariable(name.to_string()))
}

fn env_flag(name: &str) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(false),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> GatewayConfig {
        GatewayConfig {
            partner_code: "MOMO".to_string(),
            access_key: "F8BBA842ECF85".to_string(),
            secret_key: "K951B6PE1waDMi640xX08PD3vg6EkVlz".to_string(),
            ipn_url: "https://api.example.com/webhooks/momo".to_string(),
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_signature_mode_parsing() {
        assert_eq!(
            "strict".parse::<SignatureMode>().unwrap(),
            SignatureMode::Strict
        );
        assert_eq!(
            " Sandbox ".parse::<SignatureMode>().unwrap(),
            SignatureMode::Sandbox
        );
        assert!("production".parse::<SignatureMode>().is_err());
        assert!("".parse::<SignatureMode>().is_err());
    }

    #[test]
    fn test_gateway_config_validation() {
        assert!(gateway().validate().is_ok());

        let missing_secret = GatewayConfig {
            secret_key: "".to_string(),
            ..gateway()
        };
        assert!(matches!(
            missing_secret.validate(),
            Err(ConfigError::MissingVariable(name)) if name == "MOMO_SECRET_KEY"
        ));

        let zero_timeout = GatewayConfig {
            timeout_secs: 0,
            ..gateway()
        };
        assert!(zero_timeout.validate().is_err());

        let bad_endpoint = GatewayConfig {
            endpoint: "test-payment.momo.vn".to_string(),
            ..gateway()
        };
        assert!(bad_endpoint.validate().is_err());
    }

    #[test]
    fn test_gateway_debug_masks_keys() {
        let rendered = format!("{:?}", gateway());
        assert!(!rendered.contains("K951B6PE1waDMi640xX08PD3vg6EkVlz"));
        assert!(!rendered.contains("F8BBA842ECF85"));
        assert!(rendered.contains("MOMO"));
    }

    #[test]
    fn test_settlement_currency_validation() {
        assert!(SettlementConfig {
            currency: "VND".to_string()
        }
        .validate()
        .is_ok());
        assert!(SettlementConfig {
            currency: "dong".to_string()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_database_pool_bounds() {
        let config = DatabaseConfig {
            url: "postgres://localhost/tourbook".to_string(),
            max_connections: 5,
            min_connections: 10,
            connection_timeout: 30,
            idle_timeout: None,
            run_migrations: false,
        };
        assert!(config.validate().is_err());
    }
}
