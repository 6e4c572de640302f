//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `QUICKBITE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `FRONTEND_URL` - Public URL of the web app (checkout redirects and CORS origin)
//! - `JWT_SECRET` - HS256 signing secret shared with the token issuer
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//!
//! ## Optional
//! - `QUICKBITE_HOST` - Bind address (default: 127.0.0.1)
//! - `QUICKBITE_PORT` - Listen port (default: 4000)
//! - `ADMIN_API_TOKEN` - Token for admin order routes (admin routes disabled when unset)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `CHECKOUT_CURRENCY` - ISO 4217 currency code for checkout (default: inr)
//! - `DELIVERY_FEE` - Flat delivery charge in major units (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default Stripe API endpoint.
pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

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

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public URL of the frontend (no trailing slash)
    pub frontend_url: Url,
    /// Token verification settings
    pub auth: AuthConfig,
    /// Payment processor settings
    pub payments: PaymentsConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Token verification configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 secret for customer tokens
    pub jwt_secret: SecretString,
    /// Shared token for admin routes
    pub admin_token: Option<SecretString>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field(
                "admin_token",
                &self.admin_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Stripe Checkout configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PaymentsConfig {
    /// Stripe secret key (`sk_live_...` / `sk_test_...`)
    pub stripe_secret_key: SecretString,
    /// Stripe API base URL
    pub stripe_api_base: Url,
    /// Lowercase ISO 4217 currency code
    pub currency: String,
    /// Flat delivery charge added to every order
    pub delivery_fee: Decimal,
}

impl std::fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("stripe_secret_key", &"[REDACTED]")
            .field("stripe_api_base", &self.stripe_api_base.as_str())
            .field("currency", &self.currency)
            .field("delivery_fee", &self.delivery_fee)
            .finish()
    }
}

impl ApiConfig {
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

        let database_url = get_database_url("QUICKBITE_DATABASE_URL")?;
        let host = parse_env("QUICKBITE_HOST", "127.0.0.1")?;
        let port = parse_env("QUICKBITE_PORT", "4000")?;
        let frontend_url = parse_base_url("FRONTEND_URL", &get_required_env("FRONTEND_URL")?)?;

        Ok(Self {
            database_url,
            host,
            port,
            frontend_url,
            auth: AuthConfig::from_env()?,
            payments: PaymentsConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Frontend origin (`scheme://host[:port]`) for CORS.
    #[must_use]
    pub fn frontend_origin(&self) -> String {
        self.frontend_url.origin().ascii_serialization()
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "JWT_SECRET")?;

        let admin_token = match get_optional_env("ADMIN_API_TOKEN") {
            Some(value) => {
                validate_secret_strength(&value, "ADMIN_API_TOKEN")?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        Ok(Self {
            jwt_secret,
            admin_token,
        })
    }
}

impl PaymentsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let stripe_api_base = parse_base_url(
            "STRIPE_API_BASE",
            &get_env_or_default("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE),
        )?;

        let currency = get_env_or_default("CHECKOUT_CURRENCY", "inr").to_ascii_lowercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_CURRENCY".to_string(),
                format!("expected a 3-letter ISO code, got '{currency}'"),
            ));
        }

        let delivery_fee: Decimal = parse_env("DELIVERY_FEE", "30")?;
        validate_delivery_fee(delivery_fee)?;

        Ok(Self {
            stripe_secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            stripe_api_base,
            currency,
            delivery_fee,
        })
    }
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

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an absolute http(s) URL and strip any trailing slash from its path.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    let trimmed = url.path().trim_end_matches('/').to_owned();
    url.set_path(&trimmed);
    Ok(url)
}

/// Reject delivery fees the processor cannot charge exactly.
fn validate_delivery_fee(fee: Decimal) -> Result<(), ConfigError> {
    if fee.is_sign_negative() && !fee.is_zero() {
        return Err(ConfigError::InvalidEnvVar(
            "DELIVERY_FEE".to_string(),
            "must not be negative".to_string(),
        ));
    }
    if !quickbite_core::fits_minor_units(fee) {
        return Err(ConfigError::InvalidEnvVar(
            "DELIVERY_FEE".to_string(),
            format!(
                "must have at most {} decimal places",
                quickbite_core::MINOR_UNIT_SCALE
            ),
        ));
    }
    Ok(())
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
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
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
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
pub(crate) mod tests {
    use super::*;

    /// Configuration used by unit tests across the crate.
    pub(crate) fn test_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://localhost/quickbite_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 4000,
            frontend_url: Url::parse("http://localhost:5173").unwrap(),
            auth: AuthConfig {
                jwt_secret: SecretString::from("k9$Vq2!mZ7#pL4@xR8&tN1*wB6^cF3%h"),
                admin_token: Some(SecretString::from("adm-7Hq!2zP9#rX4")),
            },
            payments: PaymentsConfig {
                stripe_secret_key: SecretString::from("sk_test_51HqLyjWDstQbdR7"),
                stripe_api_base: Url::parse(DEFAULT_STRIPE_API_BASE).unwrap(),
                currency: "inr".to_string(),
                delivery_fee: Decimal::from(30),
            },
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-stripe-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_stripe_key_shape() {
        assert!(validate_secret_strength("sk_test_51HqLyjWDstQbdR7", "STRIPE_SECRET_KEY").is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        let short = SecretString::from("short");
        assert!(validate_secret_length(&short, "JWT_SECRET").is_err());
        let long = SecretString::from("a".repeat(32));
        assert!(validate_secret_length(&long, "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_parse_base_url_strips_trailing_slash() {
        let url = parse_base_url("FRONTEND_URL", "https://quickbite.example.app/").unwrap();
        assert_eq!(url.as_str(), "https://quickbite.example.app/");
        let url = parse_base_url("FRONTEND_URL", "https://host.app/shop/").unwrap();
        assert_eq!(url.path(), "/shop");
    }

    #[test]
    fn test_validate_delivery_fee() {
        assert!(validate_delivery_fee(Decimal::from(30)).is_ok());
        assert!(validate_delivery_fee(Decimal::new(4999, 2)).is_ok());
        assert!(validate_delivery_fee(Decimal::from(-1)).is_err());
        assert!(validate_delivery_fee(Decimal::new(12345, 3)).is_err());
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("FRONTEND_URL", "ftp://host.app").is_err());
        assert!(parse_base_url("FRONTEND_URL", "not a url").is_err());
    }

    #[test]
    fn test_socket_addr_and_origin() {
        let config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.port(), 4000);
        assert_eq!(config.frontend_origin(), "http://localhost:5173");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = test_config();
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_51HqLyjWDstQbdR7"));
        assert!(!debug_output.contains("adm-7Hq!2zP9#rX4"));
    }
}
