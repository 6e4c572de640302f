//! QuickBite CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! qb-cli migrate
//!
//! # Create a customer
//! qb-cli user create -n "Asha Rao" -e asha@example.com
//!
//! # Mint a bearer token for a customer (testing/support)
//! qb-cli token issue --user-id 12 --ttl-hours 24
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "qb-cli")]
#[command(author, version, about = "QuickBite CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage customers
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Mint customer tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new customer
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Sign a token for an existing customer
    Issue {
        /// Customer id
        #[arg(long)]
        user_id: i32,

        /// Token lifetime in hours
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create { name, email } => {
                let id = commands::user::create(&name, &email).await?;
                #[allow(clippy::print_stdout)]
                {
                    println!("{id}");
                }
            }
        },
        Commands::Token { action } => match action {
            TokenAction::Issue { user_id, ttl_hours } => {
                let token = commands::token::issue(user_id, ttl_hours).await?;
                #[allow(clippy::print_stdout)]
                {
                    println!("{token}");
                }
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_token_issue() {
        let cli = Cli::try_parse_from(["qb-cli", "token", "issue", "--user-id", "12"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Token {
                action: TokenAction::Issue {
                    user_id: 12,
                    ttl_hours: 24
                }
            })
        ));
    }
}
