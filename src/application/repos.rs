//! Store seams consumed by the coordination layer.
//!
//! The persistence adapter lives behind these traits so the mutation
//! pipeline can be exercised against instrumented in-memory doubles.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::Page;
use crate::domain::entities::{PhotoRecord, TagCount, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("storage failure: {0}")]
    Persistence(String),
    #[error("unique constraint `{constraint}` already satisfied")]
    Duplicate { constraint: String },
    #[error("record not found")]
    NotFound,
    #[error("store rejected input: {message}")]
    InvalidInput { message: String },
    #[error("integrity violation: {message}")]
    Integrity { message: String },
    #[error("store timed out")]
    Timeout,
}

impl RepoError {
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Sort order for the public photo listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PhotoOrder {
    #[default]
    Newest,
    TopVoted,
}

impl PhotoOrder {
    /// Parse the `orderBy` query parameter; anything unrecognized means newest-first.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("votes") => Self::TopVoted,
            _ => Self::Newest,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Newest => "created",
            Self::TopVoted => "votes",
        }
    }
}

/// A photo joined with its owner's display name.
#[derive(Debug, Clone)]
pub struct PhotoWithOwner {
    pub photo: PhotoRecord,
    pub owner_name: String,
}

/// Transactional photo persistence. Reads are non-transactional; every
/// mutation happens inside exactly one [`PhotoTx`].
#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn PhotoTx>, RepoError>;

    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<(), RepoError>;

    async fn find_photo(&self, id: i64) -> Result<Option<PhotoRecord>, RepoError>;

    async fn photo_with_owner(&self, id: i64) -> Result<Option<PhotoWithOwner>, RepoError>;

    async fn search_photos(&self, page: &Page, query: &str)
    -> Result<Vec<PhotoRecord>, RepoError>;

    async fn list_photos(
        &self,
        page: &Page,
        order: PhotoOrder,
    ) -> Result<Vec<PhotoRecord>, RepoError>;

    async fn photos_by_owner(
        &self,
        page: &Page,
        owner_id: i64,
    ) -> Result<Vec<PhotoRecord>, RepoError>;

    async fn tag_counts(&self) -> Result<Vec<TagCount>, RepoError>;
}

/// One atomic unit of work. A transaction is terminated exactly once, by
/// `commit` or `rollback`, and never reused.
#[async_trait]
pub trait PhotoTx: Send {
    /// Insert the photo and fill in its generated id and creation time.
    async fn insert_photo(&mut self, photo: &mut PhotoRecord) -> Result<(), RepoError>;

    async fn update_photo(&mut self, photo: &PhotoRecord) -> Result<(), RepoError>;

    async fn delete_photo(&mut self, id: i64) -> Result<(), RepoError>;

    /// Replace the photo's tag set in the derived tag index.
    async fn replace_tags(&mut self, photo_id: i64, tags: &[String]) -> Result<(), RepoError>;

    /// Record a vote in the per-user history. Fails with
    /// [`RepoError::Duplicate`] when this user already voted on this photo.
    async fn record_vote(
        &mut self,
        photo_id: i64,
        user_id: i64,
        weight: i16,
    ) -> Result<(), RepoError>;

    async fn commit(self: Box<Self>) -> Result<(), RepoError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepoError>;
}

/// Session lookup, the narrow authentication collaborator.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_session(&self, token: Uuid) -> Result<Option<UserRecord>, RepoError>;
}

/// Deferred removal of stored media. Submission must not block and must
/// not fail the caller; the worker behind it logs its own failures.
pub trait MediaCleanup: Send + Sync {
    fn schedule_removal(&self, filename: &str);
}
