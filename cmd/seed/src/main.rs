//! Loads a JSON fixture of users and listings into the Postgres document
//! store. Existing documents with the same ids are replaced.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;
use tracing_subscriber::EnvFilter;

use configs::Settings;
use storage_adapters::{Fixture, PgDocumentStore};

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Import a listings fixture into Postgres")]
struct Cli {
    /// Fixture file: `{ "users": [...], "listings": [...] }`.
    fixture: PathBuf,

    /// Overrides `storage.database_url`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log.level)),
        )
        .init();

    let database_url: SecretString = match cli.database_url {
        Some(url) => SecretString::from(url),
        None => settings
            .storage
            .database_url
            .context("no database url: pass --database-url or set storage.database_url")?,
    };

    let fixture = Fixture::load(&cli.fixture)
        .await
        .with_context(|| format!("failed to read {}", cli.fixture.display()))?;

    let store = PgDocumentStore::connect(
        database_url.expose_secret(),
        settings.storage.max_connections,
    )
    .await
    .context("failed to connect to PostgreSQL")?;
    store.migrate().await.context("failed to run migrations")?;
    store.import(&fixture).await.context("import failed")?;

    info!(fixture = %cli.fixture.display(), "seed complete");
    Ok(())
}
