//! HTTP surface: router, state, and handlers.

pub mod auth;
pub mod error;
mod media;
mod photos;
mod stream;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use tracing::warn;

pub use error::ApiError;

use crate::application::photos::PhotoService;
use crate::application::repos::{MediaCleanup, UserStore};
use crate::infra::media::MediaStorage;
use crate::notify::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub photos: Arc<PhotoService>,
    pub users: Arc<dyn UserStore>,
    pub notifier: Arc<Notifier>,
    pub media: Arc<MediaStorage>,
    pub cleanup: Arc<dyn MediaCleanup>,
    pub upload_limit_bytes: usize,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/photos", get(photos::list).post(photos::upload))
        .route("/api/photos/search", get(photos::search))
        .route(
            "/api/photos/{id}",
            get(photos::detail).delete(photos::delete),
        )
        .route("/api/photos/{id}/title", patch(photos::edit_title))
        .route("/api/photos/{id}/tags", patch(photos::edit_tags))
        .route("/api/photos/{id}/upvote", patch(photos::vote_up))
        .route("/api/photos/{id}/downvote", patch(photos::vote_down))
        .route("/api/owners/{id}/photos", get(photos::by_owner))
        .route("/api/tags", get(photos::tags))
        .route("/api/messages", get(stream::messages))
        .route("/media/{*path}", get(media::serve))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> Response {
    match state.photos.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            warn!(error = %err, "store health check failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
