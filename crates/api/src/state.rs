//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::auth::TokenVerifier;
use crate::services::checkout::CheckoutService;
use crate::services::payments::{PaymentError, StripeClient};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    stripe: StripeClient,
    tokens: TokenVerifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the Stripe client cannot be built from the
    /// configured secret key.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, PaymentError> {
        let stripe = StripeClient::new(&config.payments)?;
        let tokens = TokenVerifier::new(config.auth.jwt_secret.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                tokens,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Stripe client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Get a reference to the customer token verifier.
    #[must_use]
    pub fn tokens(&self) -> &TokenVerifier {
        &self.inner.tokens
    }

    /// Checkout service borrowing this state's resources.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        let config = self.config();
        CheckoutService::new(
            self.pool(),
            self.stripe(),
            &config.payments,
            &config.frontend_url,
        )
    }
}
