//! Token minting for operators and local testing.
//!
//! # Usage
//!
//! ```bash
//! qb-cli token issue --user-id 12 --ttl-hours 24
//! ```
//!
//! # Environment Variables
//!
//! - `QUICKBITE_DATABASE_URL` (or `DATABASE_URL`) - used to check the user exists
//! - `JWT_SECRET` - signing key shared with the API

use chrono::Duration;
use quickbite_api::db::UserRepository;
use quickbite_api::services::auth::TokenVerifier;
use quickbite_core::UserId;
use secrecy::SecretString;

use super::{CommandError, connect, env_var};

/// Longest lifetime a minted token may have (30 days).
pub const MAX_TTL_HOURS: i64 = 24 * 30;

fn ttl(hours: i64) -> Result<Duration, CommandError> {
    if (1..=MAX_TTL_HOURS).contains(&hours) {
        Ok(Duration::hours(hours))
    } else {
        Err(CommandError::InvalidTtl(hours))
    }
}

/// Sign a token for an existing user.
///
/// # Errors
///
/// Returns an error if the user does not exist, `JWT_SECRET` is unset, or the
/// lifetime is out of range.
pub async fn issue(user_id: i32, ttl_hours: i64) -> Result<String, CommandError> {
    let ttl = ttl(ttl_hours)?;
    let pool = connect().await?;
    let secret = SecretString::from(env_var("JWT_SECRET", None)?);

    let user_id = UserId::new(user_id);
    if UserRepository::new(&pool).get_by_id(user_id).await?.is_none() {
        return Err(CommandError::UserNotFound(user_id.as_i32()));
    }

    let token = TokenVerifier::new(secret).issue(user_id, ttl)?;
    tracing::info!("Issued token for user {} valid for {} hours", user_id, ttl_hours);
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_bounds() {
        assert!(ttl(1).is_ok());
        assert!(ttl(MAX_TTL_HOURS).is_ok());
        assert!(matches!(ttl(0), Err(CommandError::InvalidTtl(0))));
        assert!(ttl(MAX_TTL_HOURS + 1).is_err());
    }
}
