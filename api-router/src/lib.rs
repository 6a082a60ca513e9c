use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use error::not_found;
use routes::{
    index::index_page,
    ingest::ingest_files,
    probes::{live, ready},
    query::query_documents,
};
use tower_http::trace::TraceLayer;

pub mod api_state;
pub mod error;
mod routes;

/// Every route the service exposes, traced per request.
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/", get(index_page))
        .route(
            "/ingest",
            post(ingest_files).layer(DefaultBodyLimit::max(
                app_state.config.ingest_max_body_bytes,
            )),
        )
        .route("/query", get(query_documents))
        .route("/ready", get(ready))
        .route("/live", get(live))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
}
