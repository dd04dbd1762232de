//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CATALOGUE_PAGE_SIZE` - Products per catalogue page (default: 30)
//! - `SEARCH_REINDEX_INTERVAL_SECS` - Search index rebuild period (default: 900)
//! - `ORDER_NOTIFY_EMAIL` - Operator inbox copied on every new order
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name (default: production)
//!
//! ## Optional (SMS, all or none)
//! - `SMS_API_URL` - SMS gateway endpoint
//! - `SMS_API_KEY` - SMS gateway bearer key
//! - `SMS_SENDER` - Sender name shown to recipients
//!
//! ## Optional (SMTP, all or none)
//! - `SMTP_HOST` - SMTP server hostname
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `SMTP_USERNAME` - SMTP authentication username
//! - `SMTP_PASSWORD` - SMTP authentication password
//! - `SMTP_FROM` - Email sender address

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use agora_commerce::notify::{SmsConfig, SmtpConfig};

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CATALOGUE_PAGE_SIZE: u32 = 30;
const MAX_CATALOGUE_PAGE_SIZE: u32 = 200;
const DEFAULT_REINDEX_INTERVAL_SECS: u64 = 900;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Products per catalogue page
    pub catalogue_page_size: u32,
    /// How often the search index is rebuilt
    pub search_reindex_interval: Duration,
    /// SMS gateway, if configured
    pub sms: Option<SmsConfig>,
    /// SMTP relay, if configured
    pub smtp: Option<SmtpConfig>,
    /// Operator inbox for new-order copies
    pub order_notify_email: Option<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: String,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let catalogue_page_size = parse_page_size(
            &get_env_or_default("CATALOGUE_PAGE_SIZE", &DEFAULT_CATALOGUE_PAGE_SIZE.to_string()),
        )?;
        let search_reindex_interval = get_env_or_default(
            "SEARCH_REINDEX_INTERVAL_SECS",
            &DEFAULT_REINDEX_INTERVAL_SECS.to_string(),
        )
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| {
            ConfigError::InvalidEnvVar("SEARCH_REINDEX_INTERVAL_SECS".to_string(), e.to_string())
        })?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            catalogue_page_size,
            search_reindex_interval,
            sms: sms_from_env()?,
            smtp: smtp_from_env()?,
            order_notify_email: get_optional_env("ORDER_NOTIFY_EMAIL"),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_env_or_default("SENTRY_ENVIRONMENT", "production"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies should carry the `Secure` flag.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Load SMS gateway settings. All three variables must be set together.
fn sms_from_env() -> Result<Option<SmsConfig>, ConfigError> {
    let api_url = get_optional_env("SMS_API_URL");
    let api_key = get_optional_env("SMS_API_KEY");
    let sender = get_optional_env("SMS_SENDER");

    match (api_url, api_key, sender) {
        (Some(api_url), Some(api_key), Some(sender)) => {
            validate_secret_strength(&api_key, "SMS_API_KEY")?;
            Ok(Some(SmsConfig {
                api_url,
                api_key: SecretString::from(api_key),
                sender,
            }))
        }
        (None, None, None) => Ok(None),
        _ => Err(ConfigError::InvalidEnvVar(
            "SMS_*".to_string(),
            "SMS_API_URL, SMS_API_KEY and SMS_SENDER must be set together".to_string(),
        )),
    }
}

/// Load SMTP settings. Host, username, password and sender go together.
fn smtp_from_env() -> Result<Option<SmtpConfig>, ConfigError> {
    let host = get_optional_env("SMTP_HOST");
    let username = get_optional_env("SMTP_USERNAME");
    let password = get_optional_env("SMTP_PASSWORD");
    let from_address = get_optional_env("SMTP_FROM");

    match (host, username, password, from_address) {
        (Some(host), Some(username), Some(password), Some(from_address)) => {
            validate_secret_strength(&password, "SMTP_PASSWORD")?;
            let port = get_env_or_default("SMTP_PORT", "587")
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;
            Ok(Some(SmtpConfig {
                host,
                port,
                username,
                password: SecretString::from(password),
                from_address,
            }))
        }
        (None, None, None, None) => Ok(None),
        _ => Err(ConfigError::InvalidEnvVar(
            "SMTP_*".to_string(),
            "SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD and SMTP_FROM must be set together"
                .to_string(),
        )),
    }
}

fn parse_page_size(value: &str) -> Result<u32, ConfigError> {
    let size = value
        .parse::<u32>()
        .map_err(|e| ConfigError::InvalidEnvVar("CATALOGUE_PAGE_SIZE".to_string(), e.to_string()))?;
    if size == 0 || size > MAX_CATALOGUE_PAGE_SIZE {
        return Err(ConfigError::InvalidEnvVar(
            "CATALOGUE_PAGE_SIZE".to_string(),
            format!("must be between 1 and {MAX_CATALOGUE_PAGE_SIZE}"),
        ));
    }
    Ok(size)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            catalogue_page_size: DEFAULT_CATALOGUE_PAGE_SIZE,
            search_reindex_interval: Duration::from_secs(DEFAULT_REINDEX_INTERVAL_SECS),
            sms: None,
            smtp: None,
            order_notify_email: None,
            sentry_dsn: None,
            sentry_environment: "test".to_string(),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // 50% a, 50% b
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_parse_page_size() {
        assert_eq!(parse_page_size("24").unwrap(), 24);
        assert!(parse_page_size("0").is_err());
        assert!(parse_page_size("1000").is_err());
        assert!(parse_page_size("many").is_err());
    }

    #[test]
    fn test_socket_addr_and_cookie_security() {
        let mut config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config.secure_cookies());

        config.base_url = "https://shop.example.org".to_string();
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = test_config();
        config.sms = Some(SmsConfig {
            api_url: "https://sms.invalid/send".to_string(),
            api_key: SecretString::from("k9$Lq2!vZ7@pW4#tR8"),
            sender: "Agora".to_string(),
        });

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("https://sms.invalid/send"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("k9$Lq2!vZ7@pW4#tR8"));
    }
}
