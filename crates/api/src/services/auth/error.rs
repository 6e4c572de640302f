//! Token verification error types.

use thiserror::Error;

/// Errors that can occur while verifying or issuing tokens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No token was sent with the request.
    #[error("missing token")]
    MissingToken,

    /// Token is not three base64url segments of valid JSON.
    #[error("malformed token: {0}")]
    Malformed(&'static str),

    /// Token header names an algorithm other than HS256.
    #[error("unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature does not match the payload.
    #[error("invalid token signature")]
    InvalidSignature,

    /// Token `exp` claim is in the past.
    #[error("token expired")]
    Expired,

    /// Token carries no usable user id claim.
    #[error("token has no user id")]
    MissingSubject,

    /// Signing key was rejected by the MAC.
    #[error("invalid signing key")]
    InvalidKey,
}
