//! Bearer token verification.
//!
//! Customer tokens are HS256 JWTs issued by the login service and signed with
//! the shared `JWT_SECRET`. This module only verifies them (and can mint
//! tokens for operators via the CLI); it never handles passwords.
//!
//! The user id is read from the first present claim of `id`, `userId`, or
//! `_id`. Issuers have used all three, and some send the id as a string.

mod error;

pub use error::AuthError;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use quickbite_core::UserId;

type HmacSha256 = Hmac<Sha256>;

/// The only accepted signing algorithm.
const ALGORITHM: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default, rename = "userId")]
    user_id: Option<serde_json::Value>,
    #[serde(default, rename = "_id")]
    underscore_id: Option<serde_json::Value>,
    #[serde(default)]
    exp: Option<i64>,
}

#[derive(Debug, Serialize)]
struct IssuedClaims {
    id: UserId,
    iat: i64,
    exp: i64,
}

impl Claims {
    fn subject(&self) -> Option<UserId> {
        [&self.id, &self.user_id, &self.underscore_id]
            .into_iter()
            .flatten()
            .find(|value| !value.is_null())
            .and_then(user_id_from_claim)
    }
}

/// Interpret a claim value as a user id (number or numeric string).
fn user_id_from_claim(value: &serde_json::Value) -> Option<UserId> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(UserId::new),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Verifies (and issues) HS256 customer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenVerifier {
    /// Create a verifier for tokens signed with `secret`.
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| AuthError::InvalidKey)
    }

    /// Verify a token and return the user it identifies.
    ///
    /// # Errors
    ///
    /// Returns an `AuthError` describing why the token was rejected.
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let mut parts = token.trim().split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed("expected three segments"));
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::Malformed("signature is not base64url"))?;

        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        // Constant-time comparison
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        let claims: Claims = decode_segment(payload_b64)?;
        if let Some(exp) = claims.exp
            && exp <= Utc::now().timestamp()
        {
            return Err(AuthError::Expired);
        }

        claims.subject().ok_or(AuthError::MissingSubject)
    }

    /// Issue a token for `user_id` valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidKey` if the secret cannot key the MAC.
    pub fn issue(&self, user_id: UserId, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let header = Header {
            alg: ALGORITHM.to_owned(),
            typ: Some("JWT".to_owned()),
        };
        let claims = IssuedClaims {
            id: user_id,
            iat: now,
            exp: now.saturating_add(ttl.num_seconds()),
        };

        let header_b64 = encode_segment(&header)?;
        let payload_b64 = encode_segment(&claims)?;

        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{header_b64}.{payload_b64}.{signature}"))
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::Malformed("segment is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed("segment is not valid JSON"))
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, AuthError> {
    let json = serde_json::to_vec(value).map_err(|_| AuthError::Malformed("unserializable claims"))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
