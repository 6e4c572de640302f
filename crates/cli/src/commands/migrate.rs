//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! qb-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `QUICKBITE_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migration files live in `crates/api/migrations/` and are embedded at
//! build time.

use super::{CommandError, connect};

/// Run the API database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    quickbite_api::db::run_migrations(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
