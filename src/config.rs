//! Application configuration module
//! Handles environment variable loading, Duitku settings sanitization and validation

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use crate::payments::fee::{FeePolicy, FeeType};
use crate::payments::methods::{default_methods, PaymentMethodDescriptor, RedirectTarget};
use crate::payments::types::Environment;

const DEFAULT_EXPIRY_MINUTES: u32 = 60;
const DEFAULT_ORDER_PREFIX: &str = "DPAY";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CHECK_INTERVAL_MS: u64 = 3000;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub duitku: DuitkuSettings,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration. Without a URL the in-memory order store is used.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64, // seconds
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

/// Storefront pages the buyer is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontUrls {
    pub public_base_url: String,
    pub callback_url: String,
}

impl StorefrontUrls {
    /// "Order received" page, used as Duitku `returnUrl`.
    pub fn order_received_url(&self, order_id: i64) -> String {
        format!("{}/checkout/order-received/{}", self.public_base_url, order_id)
    }

    pub fn checkout_url(&self) -> String {
        format!("{}/checkout", self.public_base_url)
    }

    /// Host-side page showing VA / QR / retail code details.
    pub fn payment_page_url(&self, order_id: i64) -> String {
        format!("{}/checkout/order-pay/{}", self.public_base_url, order_id)
    }

    pub fn status_endpoint(&self) -> String {
        format!("{}/api/payments/status", self.public_base_url)
    }
}

/// Sanitized, read-only Duitku settings shared by every component.
#[derive(Debug, Clone)]
pub struct DuitkuSettings {
    pub merchant_code: String,
    pub api_key: String,
    pub environment: Environment,
    pub expiry_minutes: u32,
    pub enable_logging: bool,
    pub merchant_order_prefix: String,
    pub customer_va_name: String,
    pub storefront: StorefrontUrls,
    pub api_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub check_interval_ms: u64,
    pub nonce_secret: String,
    pub methods: Vec<PaymentMethodDescriptor>,
}

/// Duitku settings as they arrive from file/environment, before sanitization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDuitkuSettings {
    pub merchant_code: Option<String>,
    pub api_key: Option<String>,
    pub environment: Option<String>,
    pub expiry_period: Option<String>,
    pub enable_logging: Option<String>,
    pub merchant_order_prefix: Option<String>,
    pub customer_va_name: Option<String>,
    pub public_base_url: Option<String>,
    pub callback_url: Option<String>,
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<String>,
    pub check_interval_ms: Option<String>,
    pub nonce_secret: Option<String>,
    #[serde(default)]
    pub methods: HashMap<String, RawMethodSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMethodSettings {
    pub enabled: Option<String>,
    pub title: Option<String>,
    pub fee_type: Option<String>,
    pub fee_value: Option<String>,
    pub expiry_period: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            duitku: DuitkuSettings::load()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;

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
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
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

impl DuitkuSettings {
    /// Layered load: optional TOML file (`DUITKU_CONFIG_FILE`, default `duitku`)
    /// under `DUITKU_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let file = env::var("DUITKU_CONFIG_FILE").unwrap_or_else(|_| "duitku".to_string());
        let raw = ::config::Config::builder()
            .add_source(::config::File::with_name(&file).required(false))
            .add_source(
                ::config::Environment::with_prefix("DUITKU")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<RawDuitkuSettings>()?;

        Self::sanitize(raw)
    }

    /// The one canonical sanitizer: trims every value, fills defaults for
    /// absent or empty keys, merges method overrides into the built-ins.
    pub fn sanitize(raw: RawDuitkuSettings) -> Result<Self, ConfigError> {
        let merchant_code = required(raw.merchant_code, "DUITKU_MERCHANT_CODE")?;
        let api_key = required(raw.api_key, "DUITKU_API_KEY")?;

        let environment = match clean(raw.environment).map(|v| v.to_lowercase()).as_deref() {
            None | Some("development") | Some("sandbox") => Environment::Development,
            Some("production") => Environment::Production,
            Some(_) => {
                return Err(ConfigError::InvalidValue(
                    "DUITKU_ENVIRONMENT must be development or production".to_string(),
                ))
            }
        };

        let expiry_minutes = parse_minutes(raw.expiry_period, "DUITKU_EXPIRY_PERIOD")?
            .unwrap_or(DEFAULT_EXPIRY_MINUTES);

        let enable_logging = match clean(raw.enable_logging) {
            None => true,
            Some(v) => parse_flag(&v)
                .ok_or_else(|| ConfigError::InvalidValue("DUITKU_ENABLE_LOGGING".to_string()))?,
        };

        let merchant_order_prefix = clean(raw.merchant_order_prefix)
            .unwrap_or_else(|| DEFAULT_ORDER_PREFIX.to_string());
        if !merchant_order_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ConfigError::InvalidValue(
                "DUITKU_MERCHANT_ORDER_PREFIX must be alphanumeric".to_string(),
            ));
        }

        let public_base_url = clean(raw.public_base_url)
            .unwrap_or_else(|| "http://127.0.0.1:8000".to_string())
            .trim_end_matches('/')
            .to_string();
        require_http_url(&public_base_url, "DUITKU_PUBLIC_BASE_URL")?;

        let callback_url = clean(raw.callback_url)
            .unwrap_or_else(|| format!("{}/duitku/callback", public_base_url));
        require_http_url(&callback_url, "DUITKU_CALLBACK_URL")?;

        let api_base_url = clean(raw.api_base_url).map(|v| v.trim_end_matches('/').to_string());
        if let Some(url) = &api_base_url {
            require_http_url(url, "DUITKU_API_BASE_URL")?;
        }

        let request_timeout_secs = parse_positive(
            raw.request_timeout_secs,
            "DUITKU_REQUEST_TIMEOUT_SECS",
        )?
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let check_interval_ms = parse_positive(raw.check_interval_ms, "DUITKU_CHECK_INTERVAL_MS")?
            .unwrap_or(DEFAULT_CHECK_INTERVAL_MS);

        let nonce_secret = clean(raw.nonce_secret).unwrap_or_else(|| api_key.clone());
        let customer_va_name =
            clean(raw.customer_va_name).unwrap_or_else(|| merchant_code.clone());

        let methods = merge_methods(raw.methods)?;

        Ok(DuitkuSettings {
            merchant_code,
            api_key,
            environment,
            expiry_minutes,
            enable_logging,
            merchant_order_prefix,
            customer_va_name,
            storefront: StorefrontUrls {
                public_base_url,
                callback_url,
            },
            api_base_url,
            request_timeout_secs,
            check_interval_ms,
            nonce_secret,
            methods,
        })
    }

    pub fn inquiry_url(&self) -> String {
        match &self.api_base_url {
            Some(base) => format!("{}/webapi/api/merchant/v2/inquiry", base),
            None => self.environment.inquiry_endpoint().to_string(),
        }
    }

    pub fn merchant_order_id(&self, order_id: i64) -> String {
        format!("{}-{}", self.merchant_order_prefix, order_id)
    }

    /// Inverse of `merchant_order_id`; `None` when the prefix or the id is wrong.
    pub fn order_id_from_merchant_order_id(&self, merchant_order_id: &str) -> Option<i64> {
        merchant_order_id
            .trim()
            .strip_prefix(&self.merchant_order_prefix)?
            .strip_prefix('-')?
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
    }

    pub fn method(&self, id: &str) -> Option<&PaymentMethodDescriptor> {
        self.methods.iter().find(|m| m.id == id)
    }

    /// Page the buyer lands on right after checkout.
    pub fn checkout_redirect(
        &self,
        method: &PaymentMethodDescriptor,
        order_id: i64,
        payment_url: Option<&str>,
    ) -> Option<String> {
        match method.redirect {
            RedirectTarget::GatewayPaymentUrl => payment_url.map(str::to_string),
            RedirectTarget::HostPaymentPage => Some(self.storefront.payment_page_url(order_id)),
        }
    }
}

fn merge_methods(
    overrides: HashMap<String, RawMethodSettings>,
) -> Result<Vec<PaymentMethodDescriptor>, ConfigError> {
    let mut methods = default_methods();

    for (key, raw) in overrides {
        let id = key.trim().to_lowercase();
        let method = methods
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ConfigError::InvalidValue(format!("unknown payment method: {}", id)))?;

        if let Some(enabled) = clean(raw.enabled) {
            method.enabled = parse_flag(&enabled).ok_or_else(|| {
                ConfigError::InvalidValue(format!("methods.{}.enabled", id))
            })?;
        }
        if let Some(title) = clean(raw.title) {
            method.title = title;
        }
        if let Some(fee_type) = clean(raw.fee_type) {
            method.fee.fee_type = FeeType::from_str(&fee_type)
                .map_err(|_| ConfigError::InvalidValue(format!("methods.{}.fee_type", id)))?;
        }
        if let Some(fee_value) = clean(raw.fee_value) {
            let value = Decimal::from_str(&fee_value)
                .map_err(|_| ConfigError::InvalidValue(format!("methods.{}.fee_value", id)))?;
            if value.is_sign_negative() {
                return Err(ConfigError::InvalidValue(format!(
                    "methods.{}.fee_value cannot be negative",
                    id
                )));
            }
            method.fee = FeePolicy {
                fee_type: method.fee.fee_type,
                fee_value: value,
            };
        }
        method.expiry_minutes =
            parse_minutes(raw.expiry_period, &format!("methods.{}.expiry_period", id))?
                .or(method.expiry_minutes);
    }

    Ok(methods)
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, name: &str) -> Result<String, ConfigError> {
    clean(value).ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Some(true),
        "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn parse_minutes(value: Option<String>, name: &str) -> Result<Option<u32>, ConfigError> {
    match clean(value) {
        None => Ok(None),
        Some(v) => match v.parse::<u32>() {
            Ok(minutes) if minutes >= 1 => Ok(Some(minutes)),
            _ => Err(ConfigError::InvalidValue(format!(
                "{} must be a whole number of minutes >= 1",
                name
            ))),
        },
    }
}

fn parse_positive(value: Option<String>, name: &str) -> Result<Option<u64>, ConfigError> {
    match clean(value) {
        None => Ok(None),
        Some(v) => match v.parse::<u64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::InvalidValue(name.to_string())),
        },
    }
}

fn require_http_url(url: &str, name: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(format!(
            "{} must be a valid URL",
            name
        )))
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}
