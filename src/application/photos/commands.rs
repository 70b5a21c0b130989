use time::OffsetDateTime;
use tracing::warn;

use crate::application::repos::{PhotoTx, RepoError};
use crate::domain::entities::{PhotoRecord, UserRecord};
use crate::domain::photos::{normalize_tags, validate_photo};
use crate::notify::{EventKind, NotificationEvent};

use super::{PhotoError, PhotoService};

#[derive(Debug, Clone)]
pub struct UploadCommand {
    pub title: String,
    pub tags: Vec<String>,
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDirection {
    Up,
    Down,
}

impl PhotoService {
    /// Create a photo record for an already-stored media file.
    pub async fn upload(
        &self,
        user: &UserRecord,
        command: UploadCommand,
    ) -> Result<PhotoRecord, PhotoError> {
        let mut photo = PhotoRecord {
            id: 0,
            owner_id: user.id,
            title: command.title.trim().to_string(),
            filename: command.filename,
            up_votes: 0,
            down_votes: 0,
            created_at: OffsetDateTime::now_utc(),
            tags: normalize_tags(&command.tags),
        };
        validate_photo(&photo)?;

        let mut tx = self.store.begin().await?;
        if let Err(err) = tx.insert_photo(&mut photo).await {
            rollback_after(tx, "insert_photo").await;
            return Err(err.into());
        }
        if let Err(err) = tx.replace_tags(photo.id, &photo.tags).await {
            rollback_after(tx, "replace_tags").await;
            return Err(err.into());
        }
        tx.commit().await?;

        self.finish_mutation(NotificationEvent::new(
            &user.name,
            photo.id,
            EventKind::PhotoUploaded,
        ))
        .await;

        Ok(photo)
    }

    /// Change a photo's title.
    pub async fn edit_title(
        &self,
        user: &UserRecord,
        id: i64,
        title: String,
    ) -> Result<PhotoRecord, PhotoError> {
        let mut photo = self.photo_to_edit(user, id).await?;
        photo.title = title.trim().to_string();
        validate_photo(&photo)?;

        let mut tx = self.store.begin().await?;
        if let Err(err) = tx.update_photo(&photo).await {
            rollback_after(tx, "update_photo").await;
            return Err(err.into());
        }
        tx.commit().await?;

        self.finish_mutation(NotificationEvent::new(
            &user.name,
            photo.id,
            EventKind::PhotoUpdated,
        ))
        .await;

        Ok(photo)
    }

    /// Replace a photo's tag set. The record update and the derived tag
    /// index move together or not at all.
    pub async fn edit_tags(
        &self,
        user: &UserRecord,
        id: i64,
        tags: Vec<String>,
    ) -> Result<PhotoRecord, PhotoError> {
        let mut photo = self.photo_to_edit(user, id).await?;
        photo.tags = normalize_tags(&tags);
        validate_photo(&photo)?;

        let mut tx = self.store.begin().await?;
        if let Err(err) = tx.update_photo(&photo).await {
            rollback_after(tx, "update_photo").await;
            return Err(err.into());
        }
        if let Err(err) = tx.replace_tags(photo.id, &photo.tags).await {
            rollback_after(tx, "replace_tags").await;
            return Err(err.into());
        }
        tx.commit().await?;

        self.finish_mutation(NotificationEvent::new(
            &user.name,
            photo.id,
            EventKind::PhotoUpdated,
        ))
        .await;

        Ok(photo)
    }

    /// Delete a photo. The stored media file is cleaned up after the
    /// commit, off the request path; the durable record is the source of
    /// truth, not the file's presence.
    pub async fn delete(&self, user: &UserRecord, id: i64) -> Result<(), PhotoError> {
        let photo = self
            .store
            .find_photo(id)
            .await?
            .ok_or(PhotoError::NotFound)?;
        if !photo.can_delete(user) {
            return Err(PhotoError::Forbidden { action: "delete" });
        }

        let mut tx = self.store.begin().await?;
        if let Err(err) = tx.delete_photo(photo.id).await {
            rollback_after(tx, "delete_photo").await;
            return Err(err.into());
        }
        tx.commit().await?;

        self.cleanup.schedule_removal(&photo.filename);

        self.finish_mutation(NotificationEvent::new(
            &user.name,
            photo.id,
            EventKind::PhotoDeleted,
        ))
        .await;

        Ok(())
    }

    /// Register a vote. The vote history entry and the counter update
    /// share one transaction, so a concurrent double-vote by the same
    /// user cannot both commit.
    pub async fn vote(
        &self,
        user: &UserRecord,
        id: i64,
        direction: VoteDirection,
    ) -> Result<PhotoRecord, PhotoError> {
        let mut photo = self
            .store
            .find_photo(id)
            .await?
            .ok_or(PhotoError::NotFound)?;
        if !photo.can_vote(user) {
            return Err(PhotoError::Forbidden { action: "vote on" });
        }

        let weight = match direction {
            VoteDirection::Up => {
                photo.up_votes += 1;
                1
            }
            VoteDirection::Down => {
                photo.down_votes += 1;
                -1
            }
        };

        let mut tx = self.store.begin().await?;
        if let Err(err) = tx.record_vote(photo.id, user.id, weight).await {
            rollback_after(tx, "record_vote").await;
            return Err(match err {
                RepoError::Duplicate { .. } => PhotoError::AlreadyVoted,
                other => other.into(),
            });
        }
        if let Err(err) = tx.update_photo(&photo).await {
            rollback_after(tx, "update_photo").await;
            return Err(err.into());
        }
        tx.commit().await?;

        self.finish_mutation(NotificationEvent::new(
            &user.name,
            photo.id,
            EventKind::PhotoUpdated,
        ))
        .await;

        Ok(photo)
    }

    async fn photo_to_edit(&self, user: &UserRecord, id: i64) -> Result<PhotoRecord, PhotoError> {
        let photo = self
            .store
            .find_photo(id)
            .await?
            .ok_or(PhotoError::NotFound)?;
        if !photo.can_edit(user) {
            return Err(PhotoError::Forbidden { action: "edit" });
        }
        Ok(photo)
    }

    /// Post-commit consistency pass. The cache clear must land before the
    /// mutation counts as finished; the publish is fire-and-forget and
    /// never fails the request.
    async fn finish_mutation(&self, event: NotificationEvent) {
        self.cache.invalidate_all().await;
        self.notifier.publish(event);
    }
}

/// Roll the transaction back, keeping the operation's original error as
/// the reported cause. A rollback failure is logged only.
async fn rollback_after(tx: Box<dyn PhotoTx>, op: &'static str) {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, op, "rollback failed after mutation error");
    }
}
