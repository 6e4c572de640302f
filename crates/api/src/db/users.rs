//! User repository for database operations.
//!
//! Carts live on the user row as JSONB. Cart updates are plain
//! read-modify-write: the handler loads the cart, changes it, and writes the
//! whole object back.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;

use quickbite_core::{CartData, UserId};

use super::RepositoryError;
use crate::models::User;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    cart_data: Json<CartData>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            cart: row.cart_data.0.normalized(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails (including a
    /// `cart_data` value that is not a valid cart object).
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, name, email, cart_data, created_at, updated_at
            FROM quickbite.users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Create a new user with an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str, email: &str) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO quickbite.users (name, email)
            VALUES ($1, $2)
            RETURNING id, name, email, cart_data, created_at, updated_at
            ",
        )
        .bind(name)
        .bind(email)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("email already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    /// Replace a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self, cart), fields(items = cart.iter().count()))]
    pub async fn save_cart(&self, id: UserId, cart: &CartData) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE quickbite.users
            SET cart_data = $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(Json(cart))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Empty a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn clear_cart(&self, id: UserId) -> Result<(), RepositoryError> {
        self.save_cart(id, &CartData::new()).await
    }
}
