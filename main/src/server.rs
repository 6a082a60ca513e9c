use std::sync::Arc;

use api_router::{api_routes, api_state::ApiState};
use axum::Router;
use common::{storage::store::StorageManager, utils::config::get_config};
use retrieval_pipeline::openai_client_from_config;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Missing credentials or invalid settings stop the process here.
    let config = get_config()?;

    let storage = StorageManager::new(&config).await?;
    info!(
        backend = ?storage.backend_kind(),
        base_dir = ?storage.local_base_path(),
        content_dir = %config.content_dir,
        "Storage initialized"
    );

    let openai_client = Arc::new(openai_client_from_config(&config));
    let api_state = ApiState::new(&config, storage, openai_client).await?;
    let stats = api_state.index.stats().await;
    info!(
        embedding_backend = ?config.embedding_backend,
        answer_backend = ?config.answer_backend,
        origin = ?stats.origin,
        documents = stats.document_count,
        chunks = stats.chunk_count,
        "Index initialized"
    );

    let app: Router = Router::new()
        .merge(api_routes(&api_state))
        .with_state(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
