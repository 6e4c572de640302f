//! Customer account commands.
//!
//! # Usage
//!
//! ```bash
//! qb-cli user create -n "Asha Rao" -e asha@example.com
//! ```
//!
//! End-user signup lives in the login service; this is for seeding and
//! support.

use quickbite_api::db::UserRepository;

use super::{CommandError, connect};

/// Basic shape check; the login service does real validation.
fn looks_like_email(email: &str) -> bool {
    email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
}

/// Create a customer and return its id.
///
/// # Errors
///
/// Returns an error if the email is malformed or already registered, or the
/// database is unreachable.
pub async fn create(name: &str, email: &str) -> Result<i32, CommandError> {
    let email = email.trim().to_lowercase();
    if !looks_like_email(&email) {
        return Err(CommandError::InvalidEmail(email));
    }

    let pool = connect().await?;

    tracing::info!("Creating user: {} <{}>", name, email);
    let user = UserRepository::new(&pool).create(name.trim(), &email).await?;

    tracing::info!("User created successfully! ID: {}", user.id);
    Ok(user.id.as_i32())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("asha@example.com"));
        assert!(!looks_like_email("asha.example.com"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("asha@localhost"));
    }
}
