//! Stored media serving.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::infra::media::MediaError;

use super::{ApiError, AppState};

pub async fn serve(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let data = state.media.read(&path).await.map_err(|err| match err {
        MediaError::InvalidPath => ApiError::bad_request("invalid media path"),
        MediaError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            ApiError::not_found("Media not found")
        }
        other => ApiError::internal(&other),
    })?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.as_ref())], data).into_response())
}
