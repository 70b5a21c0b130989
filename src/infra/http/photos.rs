//! Photo endpoints: cached listings, detail, and the mutation surface.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::application::pagination::Page;
use crate::application::photos::{UploadCommand, VoteDirection};
use crate::application::repos::PhotoOrder;
use crate::infra::media::MediaError;

use super::auth::{CurrentUser, MaybeUser};
use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "orderBy")]
    pub order_by: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TitlePayload {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct TagsPayload {
    pub tags: Vec<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let payload = state
        .photos
        .list(
            Page::from_index(query.page),
            PhotoOrder::from_param(query.order_by.as_deref()),
        )
        .await?;

    Ok(json_payload(payload))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    let payload = state
        .photos
        .search(Page::from_index(query.page), query.q.unwrap_or_default())
        .await?;

    Ok(json_payload(payload))
}

pub async fn by_owner(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let payload = state
        .photos
        .by_owner(Page::from_index(query.page), owner_id)
        .await?;

    Ok(json_payload(payload))
}

pub async fn tags(State(state): State<AppState>) -> Result<Response, ApiError> {
    let payload = state.photos.tags().await?;
    Ok(json_payload(payload))
}

pub async fn detail(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let detail = state.photos.detail(viewer.as_ref(), id).await?;
    Ok(Json(detail).into_response())
}

pub async fn upload(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut title = String::new();
    let mut taglist = String::new();
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid multipart payload: {err}")))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("title") => title = field.text().await.map_err(multipart_error)?,
            Some("taglist") => taglist = field.text().await.map_err(multipart_error)?,
            Some("photo") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((name, data));
            }
            _ => {}
        }
    }

    let Some((original_name, data)) = file else {
        return Err(ApiError::bad_request("Invalid photo"));
    };

    let filename = state
        .media
        .store(&original_name, data)
        .await
        .map_err(|err| match err {
            MediaError::NotAnImage | MediaError::EmptyPayload => {
                ApiError::bad_request(err.to_string())
            }
            other => ApiError::internal(&other),
        })?;

    let command = UploadCommand {
        title,
        tags: taglist.split_whitespace().map(str::to_string).collect(),
        filename: filename.clone(),
    };

    match state.photos.upload(&user, command).await {
        Ok(photo) => Ok((StatusCode::CREATED, Json(photo)).into_response()),
        Err(err) => {
            // The record never landed, so the stored file is an orphan.
            state.cleanup.schedule_removal(&filename);
            Err(err.into())
        }
    }
}

pub async fn edit_title(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<TitlePayload>,
) -> Result<Response, ApiError> {
    let photo = state.photos.edit_title(&user, id, payload.title).await?;
    Ok(Json(photo).into_response())
}

pub async fn edit_tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<TagsPayload>,
) -> Result<Response, ApiError> {
    let photo = state.photos.edit_tags(&user, id, payload.tags).await?;
    Ok(Json(photo).into_response())
}

pub async fn vote_up(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let photo = state.photos.vote(&user, id, VoteDirection::Up).await?;
    Ok(Json(photo).into_response())
}

pub async fn vote_down(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let photo = state.photos.vote(&user, id, VoteDirection::Down).await?;
    Ok(Json(photo).into_response())
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.photos.delete(&user, id).await?;
    Ok(Json(json!({ "message": "Photo deleted" })).into_response())
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("invalid multipart payload: {err}"))
}

fn json_payload(payload: Bytes) -> Response {
    (
        [(header::CONTENT_TYPE, "application/json")],
        payload,
    )
        .into_response()
}
