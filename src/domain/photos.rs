//! Capability predicates and validation rules for photos.

use serde::Serialize;
use thiserror::Error;

use super::entities::{Permissions, PhotoRecord, UserRecord};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_TAGS: usize = 16;
pub const MAX_TAG_LEN: usize = 40;

impl PhotoRecord {
    /// Owners and admins may edit a photo.
    pub fn can_edit(&self, user: &UserRecord) -> bool {
        user.is_admin || self.owner_id == user.id
    }

    /// Owners and admins may delete a photo.
    pub fn can_delete(&self, user: &UserRecord) -> bool {
        user.is_admin || self.owner_id == user.id
    }

    /// Anyone signed in may vote, except on their own photos.
    pub fn can_vote(&self, user: &UserRecord) -> bool {
        self.owner_id != user.id
    }

    pub fn permissions_for(&self, user: Option<&UserRecord>) -> Permissions {
        match user {
            Some(user) => Permissions {
                can_edit: self.can_edit(user),
                can_delete: self.can_delete(user),
                can_vote: self.can_vote(user),
            },
            None => Permissions::default(),
        }
    }
}

/// A single rejected field with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", summary(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|err| format!("{}: {}", err.field, err.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check a proposed photo state against the content rules. Tags are
/// normalized (trimmed, lowercased, deduplicated) before checking.
pub fn validate_photo(photo: &PhotoRecord) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    let title = photo.title.trim();
    if title.is_empty() {
        errors.push(FieldError {
            field: "title",
            message: "must not be empty".to_string(),
        });
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.push(FieldError {
            field: "title",
            message: format!("must be at most {MAX_TITLE_LEN} characters"),
        });
    }

    if photo.tags.len() > MAX_TAGS {
        errors.push(FieldError {
            field: "tags",
            message: format!("at most {MAX_TAGS} tags are allowed"),
        });
    }
    for tag in &photo.tags {
        if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN {
            errors.push(FieldError {
                field: "tags",
                message: format!("tag `{tag}` must be 1–{MAX_TAG_LEN} characters"),
            });
            break;
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

/// Split a whitespace-separated tag list into normalized tags.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = Vec::new();
    for tag in raw {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn photo(owner_id: i64) -> PhotoRecord {
        PhotoRecord {
            id: 1,
            owner_id,
            title: "sunset".to_string(),
            filename: "sunset.jpg".to_string(),
            up_votes: 0,
            down_votes: 0,
            created_at: OffsetDateTime::UNIX_EPOCH,
            tags: vec!["sky".to_string()],
        }
    }

    fn user(id: i64, is_admin: bool) -> UserRecord {
        UserRecord {
            id,
            name: format!("user-{id}"),
            email: None,
            is_admin,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn owner_can_edit_and_delete_but_not_vote() {
        let photo = photo(7);
        let owner = user(7, false);

        assert!(photo.can_edit(&owner));
        assert!(photo.can_delete(&owner));
        assert!(!photo.can_vote(&owner));
    }

    #[test]
    fn admin_can_moderate_other_peoples_photos() {
        let photo = photo(7);
        let admin = user(1, true);

        assert!(photo.can_edit(&admin));
        assert!(photo.can_delete(&admin));
        assert!(photo.can_vote(&admin));
    }

    #[test]
    fn stranger_can_only_vote() {
        let photo = photo(7);
        let stranger = user(9, false);

        assert!(!photo.can_edit(&stranger));
        assert!(!photo.can_delete(&stranger));
        assert!(photo.can_vote(&stranger));
    }

    #[test]
    fn empty_title_is_rejected() {
        let mut p = photo(1);
        p.title = "   ".to_string();

        let err = validate_photo(&p).unwrap_err();
        assert_eq!(err.0[0].field, "title");
    }

    #[test]
    fn oversized_title_is_rejected() {
        let mut p = photo(1);
        p.title = "x".repeat(MAX_TITLE_LEN + 1);

        assert!(validate_photo(&p).is_err());
    }

    #[test]
    fn too_many_tags_are_rejected() {
        let mut p = photo(1);
        p.tags = (0..=MAX_TAGS).map(|n| format!("tag{n}")).collect();

        let err = validate_photo(&p).unwrap_err();
        assert_eq!(err.0[0].field, "tags");
    }

    #[test]
    fn tags_normalize_to_lowercase_without_duplicates() {
        let tags = normalize_tags(["Sky", "  sky ", "SUNSET", ""]);
        assert_eq!(tags, vec!["sky".to_string(), "sunset".to_string()]);
    }
}
