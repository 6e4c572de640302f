//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors are answered with the
//! JSON envelope `{ "success": false, "message": "..." }`; server faults are
//! captured to Sentry and their details never reach the client.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use quickbite_core::ValidationError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::payments::PaymentError;

/// Message for rejected or missing customer tokens.
pub const NOT_AUTHORIZED: &str = "Not authorized, login again";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Payment provider call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Order placement or verification failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Token verification failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A server fault reported to the client with an operation-specific message.
    #[error("{message}: {source}")]
    Context {
        message: &'static str,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Replace the client-facing message of a server fault.
    ///
    /// Client errors (bad input, missing records) keep their own message.
    #[must_use]
    pub fn context(self, message: &'static str) -> Self {
        if self.is_server_fault() {
            Self::Context {
                message,
                source: Box::new(self),
            }
        } else {
            self
        }
    }

    /// Whether this error is the server's fault (captured to Sentry).
    #[must_use]
    pub fn is_server_fault(&self) -> bool {
        match self {
            Self::Database(err) | Self::Checkout(CheckoutError::Repository(err)) => {
                !matches!(err, RepositoryError::NotFound | RepositoryError::Conflict(_))
            }
            Self::Payment(_)
            | Self::Checkout(CheckoutError::Payment(_))
            | Self::Internal(_)
            | Self::Context { .. } => true,
            _ => false,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) | Self::Checkout(CheckoutError::Repository(err)) => {
                repository_status(err)
            }
            Self::Payment(_) | Self::Checkout(CheckoutError::Payment(_)) => StatusCode::BAD_GATEWAY,
            Self::Checkout(err) => match err {
                CheckoutError::UserNotFound | CheckoutError::OrderNotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Auth(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Context { source, .. } => source.status(),
        }
    }

    /// Message sent to the client.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Database(err) | Self::Checkout(CheckoutError::Repository(err)) => match err {
                RepositoryError::NotFound => "Not found".to_string(),
                RepositoryError::Conflict(msg) => msg.clone(),
                _ => "Internal server error".to_string(),
            },
            Self::Payment(_) | Self::Checkout(CheckoutError::Payment(_)) => {
                "Payment provider error".to_string()
            }
            Self::Checkout(err) => checkout_message(err).to_string(),
            Self::Auth(_) => NOT_AUTHORIZED.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg) => msg.clone(),
            Self::RateLimited => "Too many requests".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Context { message, .. } => (*message).to_string(),
        }
    }
}

const fn checkout_message(err: &CheckoutError) -> &'static str {
    match err {
        CheckoutError::Validation(ValidationError::NoItems) => "No items provided",
        CheckoutError::Validation(_) | CheckoutError::Money(_) => "Invalid item in order",
        CheckoutError::MissingAddress => "Missing delivery address",
        CheckoutError::UserNotFound => "User not found",
        CheckoutError::OrderNotFound => "Order not found",
        CheckoutError::SessionMismatch => "Session does not match order",
        CheckoutError::Repository(_) | CheckoutError::Payment(_) => "Internal server error",
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = json!({
            "success": false,
            "message": self.client_message(),
        });

        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

/// JSON extractor whose rejections use the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn envelope(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Order not found".to_string());
        assert_eq!(err.to_string(), "Not found: Order not found");

        let err = AppError::BadRequest("Missing data".to_string());
        assert_eq!(err.to_string(), "Bad request: Missing data");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::Expired)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::Api {
                status: 500,
                message: "boom".to_string()
            })),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_envelope_hides_internal_details() {
        let (status, body) = envelope(AppError::Internal("pool exhausted".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_checkout_errors_map_to_client_messages() {
        let (status, body) =
            envelope(CheckoutError::Validation(ValidationError::NoItems).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No items provided");

        let (status, body) = envelope(CheckoutError::OrderNotFound.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Order not found");

        let (status, body) = envelope(CheckoutError::SessionMismatch.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Session does not match order");
    }

    #[tokio::test]
    async fn test_context_replaces_server_fault_message() {
        let err = AppError::Internal("disk full".to_string()).context("Error adding to cart");
        let (status, body) = envelope(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Error adding to cart");
    }

    #[tokio::test]
    async fn test_context_keeps_client_error_message() {
        let err = AppError::NotFound("User not found".to_string()).context("Error fetching cart");
        let (status, body) = envelope(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");
    }

    #[tokio::test]
    async fn test_payment_context_keeps_gateway_status() {
        let err = AppError::Payment(PaymentError::InvalidRequest("bad id".to_string()))
            .context("Error verifying payment");
        let (status, body) = envelope(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["message"], "Error verifying payment");
    }
}
