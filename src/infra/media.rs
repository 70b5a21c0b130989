//! Filesystem media storage and deferred cleanup.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt, sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::MediaCleanup;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("uploaded payload is not a recognized image")]
    NotAnImage,
    #[error("uploaded payload is empty")]
    EmptyPayload,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Filesystem-backed media storage rooted at a configured directory.
#[derive(Debug)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store an uploaded image and return its stored filename. The payload
    /// must sniff as an actual image, whatever its declared content type.
    pub async fn store(&self, original_name: &str, data: Bytes) -> Result<String, MediaError> {
        if data.is_empty() {
            return Err(MediaError::EmptyPayload);
        }
        if imagesize::blob_size(&data).is_err() {
            return Err(MediaError::NotAnImage);
        }

        let stored = build_stored_name(original_name);
        let absolute = self.resolve(&stored)?;

        let mut file = fs::File::create(&absolute).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        Ok(stored)
    }

    pub async fn read(&self, stored: &str) -> Result<Bytes, MediaError> {
        let absolute = self.resolve(stored)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn remove(&self, stored: &str) -> Result<(), MediaError> {
        let absolute = self.resolve(stored)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(MediaError::Io(err)),
        }
    }

    fn resolve(&self, stored: &str) -> Result<PathBuf, MediaError> {
        let relative = Path::new(stored);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(MediaError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

fn build_stored_name(original: &str) -> String {
    let extension = Path::new(original)
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()));

    let identifier = Uuid::new_v4();
    match extension {
        Some(ext) => format!("{identifier}.{ext}"),
        None => identifier.to_string(),
    }
}

/// Bounded queue feeding a background worker that removes stored media
/// after deletions. Submission never blocks the request path; removal
/// failures are counted and logged, never surfaced.
pub struct CleanupQueue {
    sender: mpsc::Sender<String>,
}

impl CleanupQueue {
    pub fn start(storage: Arc<MediaStorage>, depth: usize) -> (Arc<Self>, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<String>(depth.max(1));

        let worker = tokio::spawn(async move {
            while let Some(filename) = receiver.recv().await {
                match storage.remove(&filename).await {
                    Ok(()) => info!(filename = %filename, "removed stored media"),
                    Err(err) => {
                        counter!("scatto_media_cleanup_failure_total").increment(1);
                        warn!(error = %err, filename = %filename, "failed to remove stored media");
                    }
                }
            }
        });

        (Arc::new(Self { sender }), worker)
    }
}

impl MediaCleanup for CleanupQueue {
    fn schedule_removal(&self, filename: &str) {
        if self.sender.try_send(filename.to_string()).is_err() {
            counter!("scatto_media_cleanup_failure_total").increment(1);
            warn!(filename = %filename, "cleanup queue unavailable; removal skipped");
        }
    }
}
