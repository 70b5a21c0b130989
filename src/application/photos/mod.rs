//! Photo coordination layer.
//!
//! One service orchestrates every photo mutation end-to-end: authorize,
//! validate, run the transaction, and only after a successful commit
//! clear the response cache and publish a change notification. Read
//! paths go through the cache with a compute-once recipe per query.

mod commands;
mod queries;

use std::sync::Arc;

use thiserror::Error;

pub use commands::{UploadCommand, VoteDirection};
pub use queries::{TAGS_KEY, list_key, owner_key, search_key};

use crate::application::repos::{MediaCleanup, PhotoStore, RepoError};
use crate::cache::ResponseCache;
use crate::domain::photos::ValidationErrors;
use crate::notify::Notifier;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("photo not found")]
    NotFound,
    #[error("you're not allowed to {action} this photo")]
    Forbidden { action: &'static str },
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("a vote for this photo is already recorded")]
    AlreadyVoted,
    #[error("failed to encode response payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct PhotoService {
    store: Arc<dyn PhotoStore>,
    cache: Arc<ResponseCache>,
    notifier: Arc<Notifier>,
    cleanup: Arc<dyn MediaCleanup>,
}

impl PhotoService {
    pub fn new(
        store: Arc<dyn PhotoStore>,
        cache: Arc<ResponseCache>,
        notifier: Arc<Notifier>,
        cleanup: Arc<dyn MediaCleanup>,
    ) -> Self {
        Self {
            store,
            cache,
            notifier,
            cleanup,
        }
    }

    /// Probe the backing store's connectivity.
    pub async fn ping(&self) -> Result<(), RepoError> {
        self.store.ping().await
    }
}
