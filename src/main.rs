use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use brick_orm::{
    config::{Config, defaults::DEFAULT_CONFIG_FILE},
    database::{Database, migrations::MigrationRunner},
    observability,
};

#[derive(Parser)]
#[command(name = "brick-orm")]
#[command(version)]
#[command(about = "Apply and inspect brick-orm database migrations")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path (defaults to $BRICK_CONFIG or brick.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    dsn: Option<String>,

    /// Root of the per-platform migration directories
    #[arg(short, long, value_name = "DIR")]
    migrations: Option<PathBuf>,

    /// Migration platform directory to use instead of the detected one
    #[arg(long, value_name = "NAME")]
    dialect: Option<String>,

    /// Log level
    #[arg(short = 'v', long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply every pending migration
    Migrate,
    /// List applied migrations
    Status,
    /// List migrations that would be applied
    Pending,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };

    // Override config with CLI arguments
    if let Some(dsn) = cli.dsn {
        config.database.dsn = dsn;
    }
    if let Some(migrations) = cli.migrations {
        config.database.migrations_path = migrations;
    }
    if cli.dialect.is_some() {
        config.database.dialect = cli.dialect;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.database.validate()?;

    observability::init_tracing(&config.logging)?;
    info!("Starting brick-orm v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Init { force } => {
            let path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            if path.exists() && !force {
                bail!("{} already exists, pass --force to overwrite it", path.display());
            }
            Config::default().write_to_file(&path)?;
        }
        Command::Migrate => {
            let database = Database::connect(&config.database).await?;
            let report = MigrationRunner::from_config(&config.database)
                .run(&database.connection())
                .await;
            database.close().await?;

            let report = report?;
            for migration in &report.applied {
                println!("applied  {}  {}", migration.version, migration.name);
            }
            println!(
                "{}: {} applied, {} already up to date",
                report.platform,
                report.applied_count(),
                report.skipped
            );
        }
        Command::Status => {
            let database = Database::connect(&config.database).await?;
            let applied = MigrationRunner::applied(&database.connection()).await;
            database.close().await?;

            let applied = applied?;
            if applied.is_empty() {
                println!("no migrations applied");
            }
            for row in applied {
                println!(
                    "{}  {}  {}  {}",
                    row.version,
                    row.name,
                    row.applied_at.to_rfc3339(),
                    &row.checksum[..row.checksum.len().min(12)]
                );
            }
        }
        Command::Pending => {
            let database = Database::connect(&config.database).await?;
            let pending = MigrationRunner::from_config(&config.database)
                .pending(&database.connection())
                .await;
            database.close().await?;

            let pending = pending?;
            if pending.is_empty() {
                println!("database is up to date");
            }
            for script in pending {
                println!("pending  {}  {}", script.version(), script.name());
            }
        }
    }

    Ok(())
}
