//! Operator CLI for the `users` collection.
//!
//! # Usage
//!
//! ```bash
//! # Elevate (or create) an account
//! pathforge-admin reconcile d11@gmail.com --role admin
//! pathforge-admin reconcile d11@gmail.com --role admin --strict
//!
//! # Inspect
//! pathforge-admin check d11@gmail.com
//! pathforge-admin list
//! ```

use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use futures::StreamExt;

use pathforge_admin::config::AppConfig;
use pathforge_admin::db;
use pathforge_admin::reconcile::{reconcile, Mode, Outcome};
use pathforge_admin::users::repo::PgUserStore;
use pathforge_admin::users::{Identity, Role, UserRecord, UserStore};

/// Inspect and reconcile user records and their roles
#[derive(Parser, Debug)]
#[command(name = "pathforge-admin")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ensure a user record exists with the given role
    Reconcile {
        /// Email of the identity to reconcile
        email: String,

        /// Desired role (student, admin)
        #[arg(short, long)]
        role: String,

        /// Fail instead of creating when no record exists
        #[arg(long)]
        strict: bool,

        /// Auth provider UID, written once at creation
        #[arg(long)]
        external_id: Option<String>,
    },

    /// Show one user record by email
    Check {
        /// Email to look up
        email: String,
    },

    /// List every user record
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| format!("pathforge_admin={level},sqlx=warn"));
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

async fn run(command: Command) -> anyhow::Result<ExitCode> {
    let config = AppConfig::from_env().context("load configuration")?;
    let pool = db::connect(&config).await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::warn!(error = %e, "migration failed; continuing against existing schema");
    }

    let store = PgUserStore::new(pool);
    match command {
        Command::Reconcile {
            email,
            role,
            strict,
            external_id,
        } => {
            let identity = Identity::new(&email, external_id.as_deref())?;
            let role = Role::parse(&role)?;
            let mode = if strict { Mode::Strict } else { Mode::Upsert };

            match reconcile(&store, &identity, role, mode).await? {
                Outcome::Created(user) => {
                    println!("created {} with role {}", user.email, user.role);
                    Ok(ExitCode::SUCCESS)
                }
                Outcome::Updated(user) => {
                    println!("updated {} to role {}", user.email, user.role);
                    Ok(ExitCode::SUCCESS)
                }
                Outcome::Unchanged(user) => {
                    println!("{} already has role {}", user.email, user.role);
                    Ok(ExitCode::SUCCESS)
                }
                Outcome::NotFound => {
                    eprintln!(
                        "{} not found; re-run without --strict to create it",
                        identity.email()
                    );
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Check { email } => {
            let identity = Identity::new(&email, None)?;
            match store.find_by_email(identity.email()).await? {
                Some(user) => {
                    print_user(&user);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("{} not found", identity.email());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::List => {
            let mut total = 0usize;
            let mut users = store.list_users();
            while let Some(user) = users.next().await {
                print_user(&user?);
                total += 1;
            }
            println!("total users: {total}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_user(user: &UserRecord) {
    println!("{}", user.email);
    println!("  role: {}", user.role);
    println!(
        "  external id: {}",
        user.external_id.as_deref().unwrap_or("(not linked)")
    );
    println!("  updated: {}", user.updated_at);
}
