//! mozaika-api - HTTP API server for the Mozaika event search service.
//!
//! Boots the storage layer, the model backends, and (when a queue URL is
//! configured) the ingestion consumer, then serves the search API.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use mozaika_core::{
    EmbeddingBackend, EventRepository, MessageQueue, Settings, VectorIndex,
};
use mozaika_db::{create_pool, ensure_schema, PgEventRepository};
use mozaika_inference::{create_embedding_backend, create_generation_backend, ExtractionClient};
use mozaika_ingest::{Consumer, ConsumerConfig, SqsConfig, SqsQueue};
use mozaika_search::{HybridSearchEngine, PgVectorIndex};

use handlers::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mozaika=info,mozaika_api=info,tower_http=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let settings = Settings::from_env()?;

    let pool = create_pool(&settings.database_url).await?;
    ensure_schema(&pool).await?;

    let repository: Arc<dyn EventRepository> = Arc::new(PgEventRepository::new(pool.clone()));
    let generation = create_generation_backend(&settings)?;
    let embeddings = create_embedding_backend(&settings)?;
    let index: Arc<dyn VectorIndex> =
        Arc::new(PgVectorIndex::new(pool.clone(), embeddings.dimension()));

    let category_slugs: Vec<String> = repository
        .get_categories()
        .await?
        .into_iter()
        .map(|c| c.slug)
        .collect();
    let extraction = Arc::new(
        ExtractionClient::new(Arc::clone(&generation), category_slugs)
            .with_max_retries(settings.max_extraction_retries),
    );

    let search = Arc::new(HybridSearchEngine::new(
        Arc::clone(&extraction),
        Arc::clone(&embeddings),
        Arc::clone(&generation),
        Arc::clone(&index),
    ));

    let mut consumer_handle = None;
    let mut consumer_metrics = None;
    match SqsConfig::from_settings(&settings) {
        Some(sqs_config) => {
            let queue: Arc<dyn MessageQueue> = Arc::new(SqsQueue::new(sqs_config));
            let consumer = Arc::new(Consumer::new(
                queue,
                Arc::clone(&repository),
                Arc::clone(&extraction),
                Arc::clone(&embeddings),
                Arc::clone(&index),
                ConsumerConfig {
                    batch_size: settings.queue_batch_size,
                    ..Default::default()
                },
            ));
            consumer_metrics = Some(consumer.metrics());
            consumer_handle = Some(consumer.start());
        }
        None => {
            info!(
                subsystem = "api",
                "SQS_QUEUE_URL not set, running in API-only mode"
            );
        }
    }

    let state = AppState {
        repository,
        search,
        consumer_metrics,
    };
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.api_host, settings.api_port).parse()?;
    info!(subsystem = "api", %addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = consumer_handle {
        info!(subsystem = "api", "Draining consumer");
        handle.shutdown().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!(subsystem = "api", "Shutdown signal received");
}
