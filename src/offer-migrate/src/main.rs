//! offer-migrate: move offer documents from the legacy layout to the
//! schedule and smart-rule layout, or roll that layout back.

use clap::{Parser, ValueEnum};
use offerwall_core::config::AppConfig;
use offerwall_migration::Migrator;
use offerwall_store::MongoStore;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "offer-migrate")]
#[command(about = "Migrate offer documents to the schedule / smart-rule layout")]
#[command(version)]
struct Cli {
    /// Run the migration forward (default) or roll it back
    #[arg(value_enum)]
    direction: Option<Direction>,

    /// MongoDB connection string (overrides config)
    #[arg(long, env = "MONGODB_URI")]
    uri: Option<String>,

    /// Database name (overrides config)
    #[arg(long)]
    database: Option<String>,

    /// Collection holding the offers (overrides config)
    #[arg(long)]
    collection: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Direction {
    Migrate,
    Rollback,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offer_migrate=info,offerwall_migration=info,offerwall_store=info".into()),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "offer-migrate failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load_or_default();
    if let Some(uri) = cli.uri {
        config.store.uri = uri;
    }
    if let Some(database) = cli.database {
        config.store.database = database;
    }
    if let Some(collection) = cli.collection {
        config.store.collection = collection;
    }

    let store = Arc::new(MongoStore::connect(&config.store).await?);
    let migrator = Migrator::new(store);

    match cli.direction.unwrap_or(Direction::Migrate) {
        Direction::Migrate => {
            info!(collection = %config.store.collection, "Starting offer migration");
            let report = migrator.migrate().await?;
            println!("{report}");
        }
        Direction::Rollback => {
            info!(collection = %config.store.collection, "Starting offer rollback");
            let report = migrator.rollback().await?;
            println!("{report}");
        }
    }
    Ok(())
}
