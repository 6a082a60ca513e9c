use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart, TypedMultipartError};
use ingestion_pipeline::{IngestOutcome, UploadedFile};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, TryFromMultipart)]
pub struct IngestParams {
    // Bounded by the route's DefaultBodyLimit instead of a per-field cap.
    #[form_data(limit = "unlimited")]
    #[form_data(default)]
    pub files: Vec<FieldData<NamedTempFile>>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(flatten)]
    pub outcome: IngestOutcome,
}

pub async fn ingest_files(
    State(state): State<ApiState>,
    input: Result<TypedMultipart<IngestParams>, TypedMultipartError>,
) -> Result<impl IntoResponse, ApiError> {
    let TypedMultipart(input) = input?;
    info!(file_count = input.files.len(), "Received ingest request");

    let uploads = input
        .files
        .into_iter()
        .map(|field| UploadedFile {
            file_name: field.metadata.file_name.unwrap_or_default(),
            contents: field.contents,
        })
        .collect();

    let outcome = state.ingestion.ingest(uploads).await?;

    Ok((
        StatusCode::OK,
        Json(IngestResponse {
            status: "success",
            message: outcome.message(),
            outcome,
        }),
    ))
}
