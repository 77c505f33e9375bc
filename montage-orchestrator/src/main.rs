use montage_client::{HttpComputeInvoker, HttpGenerationProvider, HttpMediaFetcher};
use montage_orchestrator::app::{App, Backends};
use montage_orchestrator::config::{Config, ProviderEndpoint};
use montage_orchestrator::db;
use montage_orchestrator::executor::{ExecutorSettings, Providers};
use montage_orchestrator::repository::PgRepository;
use montage_orchestrator::scheduler::{ChannelScheduler, PollWorker};
use montage_orchestrator::storage::LocalStorage;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn generation(endpoint: &ProviderEndpoint) -> Arc<HttpGenerationProvider> {
    Arc::new(HttpGenerationProvider::new(
        endpoint.url.clone(),
        endpoint.api_key.clone(),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "montage_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Montage Orchestrator...");

    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("Database ready");

    let (scheduler, checks) = ChannelScheduler::channel();
    let backends = Backends {
        repo: Arc::new(PgRepository::new(pool)),
        storage: Arc::new(LocalStorage::new(
            &config.storage_root,
            config.storage_public_url.clone(),
        )),
        fetcher: Arc::new(HttpMediaFetcher::new()),
        scheduler: Arc::new(scheduler),
        providers: Providers {
            talking_head: generation(&config.talking_head),
            voiceover: generation(&config.voiceover),
            animation: generation(&config.animation),
            compute: Arc::new(HttpComputeInvoker::new(
                config.compute.url.clone(),
                config.compute.api_key.clone(),
            )),
        },
    };
    let app = App::new(ExecutorSettings::from(&config), backends);

    let worker = PollWorker::new(checks, app.dispatcher.clone(), config.max_parallel_checks);
    tokio::spawn(worker.run());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app.router()).await?;

    Ok(())
}
