//! Session extraction: a bearer token or cookie resolved through the
//! user store.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::domain::entities::UserRecord;

use super::{ApiError, AppState};

pub const SESSION_COOKIE: &str = "scatto_session";

/// The signed-in user; rejects with 401 when the session is missing or unknown.
pub struct CurrentUser(pub UserRecord);

/// The signed-in user if any; anonymous requests pass through.
pub struct MaybeUser(pub Option<UserRecord>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(parts) else {
            return Ok(Self(None));
        };

        let user = state
            .users
            .find_by_session(token)
            .await
            .map_err(ApiError::from)?;

        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(user)) => Ok(Self(user)),
            MaybeUser(None) => Err(ApiError::unauthorized()),
        }
    }
}

fn session_token(parts: &Parts) -> Option<Uuid> {
    if let Some(value) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        && let Some(token) = value.strip_prefix("Bearer ")
        && let Ok(token) = Uuid::parse_str(token.trim())
    {
        return Some(token);
    }

    for value in parts.headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            if let Some((name, token)) = pair.trim().split_once('=')
                && name == SESSION_COOKIE
                && let Ok(token) = Uuid::parse_str(token.trim())
            {
                return Some(token);
            }
        }
    }

    None
}
