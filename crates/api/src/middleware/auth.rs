//! Authentication extractors.
//!
//! Customers authenticate with a bearer token (`Authorization: Bearer <jwt>`,
//! or the older `token: <jwt>` header the web client still sends). Operators
//! call admin routes with a shared `x-admin-token`.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::error::{AppError, NOT_AUTHORIZED, set_sentry_user};
use crate::models::CurrentUser;
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Legacy header carrying the raw token.
pub const TOKEN_HEADER: &str = "token";

/// Header carrying the operator token for admin routes.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Extractor that requires a verified customer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, user {}!", user.id)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

/// Pull the token from `Authorization: Bearer` or the `token` header.
fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    })
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or(AppError::Auth(AuthError::MissingToken))?;

        let id = state.tokens().verify(token).map_err(|e| {
            debug!(error = %e, "Rejected customer token");
            AppError::Auth(e)
        })?;

        tracing::Span::current().record("user_id", tracing::field::display(id));
        set_sentry_user(&id);

        Ok(Self(CurrentUser { id }))
    }
}

/// Extractor that requires the operator token.
///
/// Admin routes are closed (403) when no `ADMIN_API_TOKEN` is configured.
pub struct RequireAdmin;

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config().auth.admin_token.as_ref() else {
            return Err(AppError::Forbidden("Admin access is disabled".to_string()));
        };

        let provided = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(NOT_AUTHORIZED.to_string()))?;

        if !constant_time_compare(expected.expose_secret(), provided) {
            return Err(AppError::Forbidden("Admin access denied".to_string()));
        }

        Ok(Self)
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("adm-token", "adm-token"));
        assert!(!constant_time_compare("adm-token", "adm-tokex"));
        assert!(!constant_time_compare("adm-token", "adm-toke"));
    }

    #[test]
    fn test_bearer_token_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("zzz.yyy.xxx"));
        assert_eq!(token_from_headers(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn test_legacy_token_header() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static(" zzz.yyy.xxx "));
        assert_eq!(token_from_headers(&headers), Some("zzz.yyy.xxx"));
    }

    #[test]
    fn test_non_bearer_authorization_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(token_from_headers(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(token_from_headers(&headers), None);
    }
}
