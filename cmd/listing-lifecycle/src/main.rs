//! # listing-lifecycle
//!
//! Assembles the lifecycle engine from configuration. Runs the HTTP server by
//! default, or a single sweep with `--sweep` for cron-style scheduling.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api_adapters::{build_router, AppState, Metrics};
use configs::{
    LogSettings, RateLimitBackend, RateLimitSettings, RuleSettings, Settings, StorageBackend,
    StorageSettings,
};
use domains::{
    Clock, ListingRepository, MessageCounterStore, RateLimitRule, RateLimitStore, SystemClock,
    UserRepository,
};
use services::{ListingLifecycleService, MessageIdAllocator, RateLimiter};
use storage_adapters::{Fixture, InMemoryDocumentStore, InMemoryRateLimitStore};

#[derive(Debug, Parser)]
#[command(name = "listing-lifecycle", about = "Tiered listing expiration and archival")]
struct Cli {
    /// Evaluate active listings once and exit.
    #[arg(long)]
    sweep: bool,

    /// Page size for `--sweep`; defaults to `lifecycle.sweep_batch_limit`.
    #[arg(long, requires = "sweep")]
    limit: Option<usize>,
}

struct DocumentStores {
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
    counters: Arc<dyn MessageCounterStore>,
}

impl DocumentStores {
    fn shared<S>(store: Arc<S>) -> Self
    where
        S: ListingRepository + UserRepository + MessageCounterStore + 'static,
    {
        Self {
            listings: store.clone(),
            users: store.clone(),
            counters: store,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().context("failed to load configuration")?;
    init_tracing(&settings.log);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 1. Documents: listings, users and message counters
    let stores = build_document_stores(&settings.storage).await?;

    // 2. Lifecycle service
    let lifecycle = Arc::new(
        ListingLifecycleService::new(stores.listings, stores.users, clock.clone())
            .with_malformed_created_at(settings.lifecycle.malformed_created_at),
    );

    if cli.sweep {
        let limit = cli.limit.unwrap_or(settings.lifecycle.sweep_batch_limit);
        let summary = lifecycle.sweep(limit).await.context("sweep failed")?;
        info!(
            evaluated = summary.evaluated,
            active = summary.active,
            archived = summary.archived,
            skipped = summary.skipped,
            warnings = summary.warnings,
            errors = summary.errors,
            "one-shot sweep finished"
        );
        return Ok(());
    }

    // 3. Rate limiting and message ids
    let rate_limiter =
        build_rate_limiter(&settings.rate_limit, &settings.storage, clock.clone())?.map(Arc::new);
    let message_ids = Arc::new(MessageIdAllocator::new(stores.counters, clock));

    let app = build_router(AppState {
        lifecycle,
        rate_limiter,
        message_ids,
        metrics: Arc::new(Metrics::new()),
        sweep_batch_limit: settings.lifecycle.sweep_batch_limit,
    });

    let addr = settings.server.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, storage = ?settings.storage.backend, "listing lifecycle service started");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn build_document_stores(storage: &StorageSettings) -> Result<DocumentStores> {
    match storage.backend {
        StorageBackend::Memory => {
            let store = match &storage.fixture_path {
                Some(path) => {
                    let fixture = Fixture::load(path)
                        .await
                        .with_context(|| format!("failed to load fixture {}", path.display()))?;
                    InMemoryDocumentStore::from_fixture(fixture)
                }
                None => InMemoryDocumentStore::new(),
            };
            info!("document backend: memory");
            Ok(DocumentStores::shared(Arc::new(store)))
        }
        #[cfg(feature = "db-postgres")]
        StorageBackend::Postgres => {
            use secrecy::ExposeSecret;

            let url = storage
                .database_url
                .as_ref()
                .context("storage.database_url is not set")?;
            let store = storage_adapters::PgDocumentStore::connect(
                url.expose_secret(),
                storage.max_connections,
            )
            .await
            .context("failed to connect to PostgreSQL")?;
            store.migrate().await.context("failed to run migrations")?;
            info!("document backend: postgres");
            Ok(DocumentStores::shared(Arc::new(store)))
        }
        #[cfg(not(feature = "db-postgres"))]
        StorageBackend::Postgres => anyhow::bail!("built without the db-postgres feature"),
    }
}

fn rule(settings: &RuleSettings) -> Result<RateLimitRule> {
    let secs = i64::try_from(settings.window_secs).context("rate-limit window out of range")?;
    Ok(RateLimitRule::new(settings.limit, Duration::seconds(secs)))
}

fn build_rate_limiter(
    limits: &RateLimitSettings,
    storage: &StorageSettings,
    clock: Arc<dyn Clock>,
) -> Result<Option<RateLimiter>> {
    if !limits.enabled {
        info!("rate limiting disabled");
        return Ok(None);
    }

    let store: Arc<dyn RateLimitStore> = match storage.rate_limit_backend {
        RateLimitBackend::Memory => Arc::new(InMemoryRateLimitStore::new()),
        #[cfg(feature = "redis")]
        RateLimitBackend::Redis => {
            use secrecy::ExposeSecret;

            let url = storage
                .redis_url
                .as_ref()
                .context("storage.redis_url is not set")?;
            Arc::new(
                storage_adapters::RedisRateLimitStore::connect(
                    url.expose_secret(),
                    storage.redis_prefix.clone(),
                )
                .context("failed to create Redis pool")?,
            )
        }
        #[cfg(not(feature = "redis"))]
        RateLimitBackend::Redis => anyhow::bail!("built without the redis feature"),
    };

    let mut limiter = RateLimiter::new(store, clock, rule(&limits.default)?)
        .with_cleanup_probability(limits.cleanup_probability);
    for (endpoint, settings) in &limits.endpoints {
        limiter = limiter.with_endpoint(endpoint.clone(), rule(settings)?);
    }
    Ok(Some(limiter))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
