//! Subcommand implementations.

pub mod migrate;
pub mod token;
pub mod user;

use quickbite_api::db::RepositoryError;
use quickbite_api::services::auth::AuthError;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No user with this id.
    #[error("No user with id {0}")]
    UserNotFound(i32),

    /// Token could not be signed.
    #[error("Token error: {0}")]
    Token(#[from] AuthError),

    /// Token lifetime out of range.
    #[error("Token lifetime must be between 1 and {max} hours, got {0}", max = token::MAX_TTL_HOURS)]
    InvalidTtl(i64),
}

/// Read a variable, falling back to a second name.
fn env_var(primary: &'static str, fallback: Option<&'static str>) -> Result<String, CommandError> {
    std::env::var(primary)
        .ok()
        .or_else(|| fallback.and_then(|name| std::env::var(name).ok()))
        .filter(|v| !v.is_empty())
        .ok_or(CommandError::MissingEnvVar(primary))
}

/// Connect to the QuickBite database named by the environment.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = env_var("QUICKBITE_DATABASE_URL", Some("DATABASE_URL"))?;

    tracing::info!("Connecting to QuickBite database...");
    Ok(PgPool::connect(&database_url).await?)
}
