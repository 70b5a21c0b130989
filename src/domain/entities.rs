//! Persistent record types shared across the application.

use serde::Serialize;
use time::OffsetDateTime;

/// A stored photo. Vote counters are denormalized onto the record; the
/// per-user vote history lives in its own table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoRecord {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub filename: String,
    pub up_votes: i32,
    pub down_votes: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub tags: Vec<String>,
}

impl PhotoRecord {
    pub fn score(&self) -> i64 {
        i64::from(self.up_votes) - i64::from(self.down_votes)
    }
}

/// A photo joined with its owner and the viewer's permissions, served by
/// the uncached detail endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoDetail {
    #[serde(flatten)]
    pub photo: PhotoRecord,
    pub owner_name: String,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Permissions {
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_vote: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A tag together with how many photos carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}
