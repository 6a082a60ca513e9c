use axum::{extract::State, response::Html};
use common::{error::AppError, utils::template_engine::{context, ProvidesTemplateEngine}};

use crate::{api_state::ApiState, error::ApiError};

pub async fn index_page(State(state): State<ApiState>) -> Result<Html<String>, ApiError> {
    let page = state
        .template_engine()
        .render(
            "index.html",
            &context! {
                accepted_extensions => state.ingestion.filter().accepted_extensions(),
                max_files => state.config.ingest_max_files,
            },
        )
        .map_err(AppError::from)?;

    Ok(Html(page))
}
