//! # Command Line Interface
//!
//! Runs the HTTP server, applies database migrations and issues locally
//! signed tokens for development.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use crate::api::{start_api_server, AppState};
use crate::auth::LocalSignedProvider;
use crate::config::{AppConfig, AuthProviderKind, DatabaseConfig};
use crate::observability::{init_logging, log_config_info};
use crate::storage::{
    create_pool, get_migration_version, list_applied_migrations, run_migrations,
    validate_migrations, MigrationInfo,
};
use crate::{APP_NAME, VERSION};

#[derive(Parser)]
#[command(name = "tenancy")]
#[command(about = "Multi-tenant account backend")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL override
    #[arg(long, global = true)]
    pub database_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve,

    /// Apply pending database migrations
    Migrate {
        /// Only report applied migrations and whether the schema is current
        #[arg(long)]
        status: bool,
    },

    /// Issue a token signed with the local secret
    IssueToken {
        /// Subject id placed in the `sub` claim
        #[arg(long)]
        subject: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        name: Option<String>,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => serve(cli.database_url).await,
        Commands::Migrate { status } => {
            let mut database = DatabaseConfig::from_env();
            if let Some(url) = cli.database_url {
                database.url = url;
            }
            handle_migrate(&database, status).await
        }
        Commands::IssueToken { subject, email, name } => {
            issue_token(&subject, &email, name.as_deref())
        }
    }
}

async fn serve(database_url: Option<String>) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(url) = database_url {
        config.database.url = url;
        config.validate()?;
    }

    init_logging(&config.observability)?;
    tracing::info!(app_name = APP_NAME, version = VERSION, "Starting tenancy account backend");
    log_config_info(&config);

    let pool = create_pool(&config.database).await?;
    let state = AppState::new(&config, pool)?;

    start_api_server(&config.server, state).await?;
    Ok(())
}

async fn handle_migrate(config: &DatabaseConfig, status_only: bool) -> anyhow::Result<()> {
    // Migrations are driven explicitly here, never implicitly by pool creation
    let config = DatabaseConfig { auto_migrate: false, ..config.clone() };
    let pool = create_pool(&config).await?;

    if !status_only {
        println!("Running database migrations...");
        run_migrations(&pool).await?;
        println!("Migrations completed successfully");
    }

    let version = get_migration_version(&pool).await?;
    let migrations = list_applied_migrations(&pool).await?;
    if migrations.is_empty() {
        println!("No migrations have been applied");
    } else {
        println!("Applied migrations (current version {}):", version);
        print_migrations_table(&migrations);
    }

    if !validate_migrations(&pool).await? {
        bail!("Database schema has pending migrations");
    }
    println!("Database schema is up to date");
    Ok(())
}

fn issue_token(subject: &str, email: &str, name: Option<&str>) -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    if config.auth.provider != AuthProviderKind::Local {
        bail!("Tokens can only be issued when the local auth provider is configured");
    }

    let provider = LocalSignedProvider::from_config(&config.auth);
    let token = provider.issue_token(subject, Some(email), name)?;
    println!("{}", token);
    Ok(())
}

/// Print migrations in a formatted table
fn print_migrations_table(migrations: &[MigrationInfo]) {
    println!();
    println!("{:<15} {:<50} {:<25} {:<10}", "Version", "Description", "Applied On", "Time (ms)");
    println!("{}", "-".repeat(100));

    for migration in migrations {
        println!(
            "{:<15} {:<50} {:<25} {:<10}",
            migration.version,
            truncate_string(&migration.description, 48),
            migration.installed_on.format("%Y-%m-%d %H:%M:%S"),
            migration.execution_time
        );
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
