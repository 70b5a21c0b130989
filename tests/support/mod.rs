//! Instrumented in-memory doubles for the store seams.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use scatto::application::pagination::Page;
use scatto::application::photos::PhotoService;
use scatto::application::repos::{
    MediaCleanup, PhotoOrder, PhotoStore, PhotoTx, PhotoWithOwner, RepoError, UserStore,
};
use scatto::cache::ResponseCache;
use scatto::domain::entities::{PhotoRecord, TagCount, UserRecord};
use scatto::notify::Notifier;

#[derive(Default)]
pub struct GalleryState {
    pub photos: HashMap<i64, PhotoRecord>,
    pub votes: HashSet<(i64, i64)>,
    pub pending_votes: HashSet<(i64, i64)>,
    pub next_id: i64,
}

/// Shared mutable state plus instrumentation counters and failure taps.
#[derive(Default)]
pub struct FakeShared {
    pub state: Mutex<GalleryState>,
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub fail_commit: AtomicBool,
    pub fail_tag_update: AtomicBool,
}

impl FakeShared {
    fn lock(&self) -> std::sync::MutexGuard<'_, GalleryState> {
        self.state.lock().expect("gallery state lock")
    }
}

pub struct FakeStore {
    pub shared: Arc<FakeShared>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(FakeShared::default()),
        })
    }

    /// Insert a committed photo directly, bypassing the service.
    pub fn seed_photo(&self, owner_id: i64, title: &str, tags: &[&str]) -> PhotoRecord {
        let mut state = self.shared.lock();
        state.next_id += 1;
        let photo = PhotoRecord {
            id: state.next_id,
            owner_id,
            title: title.to_string(),
            filename: format!("{}.jpg", Uuid::new_v4()),
            up_votes: 0,
            down_votes: 0,
            created_at: OffsetDateTime::UNIX_EPOCH,
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
        };
        state.photos.insert(photo.id, photo.clone());
        photo
    }

    pub fn committed_photo(&self, id: i64) -> Option<PhotoRecord> {
        self.shared.lock().photos.get(&id).cloned()
    }

    pub fn vote_count(&self, photo_id: i64) -> usize {
        self.shared
            .lock()
            .votes
            .iter()
            .filter(|(pid, _)| *pid == photo_id)
            .count()
    }
}

enum Staged {
    Insert(PhotoRecord),
    Update(PhotoRecord),
    Delete(i64),
    ReplaceTags { photo_id: i64, tags: Vec<String> },
    Vote { photo_id: i64, user_id: i64 },
}

pub struct FakeTx {
    shared: Arc<FakeShared>,
    staged: Vec<Staged>,
    claimed_votes: Vec<(i64, i64)>,
}

impl FakeTx {
    fn release_claims(&self) {
        let mut state = self.shared.lock();
        for key in &self.claimed_votes {
            state.pending_votes.remove(key);
        }
    }
}

#[async_trait]
impl PhotoStore for FakeStore {
    async fn begin(&self) -> Result<Box<dyn PhotoTx>, RepoError> {
        self.shared.begins.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTx {
            shared: self.shared.clone(),
            staged: Vec::new(),
            claimed_votes: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }

    async fn find_photo(&self, id: i64) -> Result<Option<PhotoRecord>, RepoError> {
        Ok(self.shared.lock().photos.get(&id).cloned())
    }

    async fn photo_with_owner(&self, id: i64) -> Result<Option<PhotoWithOwner>, RepoError> {
        Ok(self.shared.lock().photos.get(&id).cloned().map(|photo| {
            let owner_name = format!("user-{}", photo.owner_id);
            PhotoWithOwner { photo, owner_name }
        }))
    }

    async fn search_photos(
        &self,
        page: &Page,
        query: &str,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        let needle = query.to_lowercase();
        let mut matches: Vec<_> = self
            .shared
            .lock()
            .photos
            .values()
            .filter(|photo| {
                photo.title.to_lowercase().contains(&needle)
                    || photo.tags.iter().any(|tag| tag.contains(&needle))
            })
            .cloned()
            .collect();
        matches.sort_by_key(|photo| std::cmp::Reverse(photo.id));
        Ok(paginate(matches, page))
    }

    async fn list_photos(
        &self,
        page: &Page,
        order: PhotoOrder,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        self.shared.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut photos: Vec<_> = self.shared.lock().photos.values().cloned().collect();
        match order {
            PhotoOrder::Newest => photos.sort_by_key(|photo| std::cmp::Reverse(photo.id)),
            PhotoOrder::TopVoted => {
                photos.sort_by_key(|photo| (std::cmp::Reverse(photo.score()), photo.id))
            }
        }
        Ok(paginate(photos, page))
    }

    async fn photos_by_owner(
        &self,
        page: &Page,
        owner_id: i64,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        let mut photos: Vec<_> = self
            .shared
            .lock()
            .photos
            .values()
            .filter(|photo| photo.owner_id == owner_id)
            .cloned()
            .collect();
        photos.sort_by_key(|photo| std::cmp::Reverse(photo.id));
        Ok(paginate(photos, page))
    }

    async fn tag_counts(&self) -> Result<Vec<TagCount>, RepoError> {
        let mut counts: HashMap<String, i64> = HashMap::new();
        for photo in self.shared.lock().photos.values() {
            for tag in &photo.tags {
                *counts.entry(tag.clone()).or_default() += 1;
            }
        }
        let mut counts: Vec<_> = counts
            .into_iter()
            .map(|(name, count)| TagCount { name, count })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then(a.name.cmp(&b.name)));
        Ok(counts)
    }
}

fn paginate(photos: Vec<PhotoRecord>, page: &Page) -> Vec<PhotoRecord> {
    photos
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

#[async_trait]
impl PhotoTx for FakeTx {
    async fn insert_photo(&mut self, photo: &mut PhotoRecord) -> Result<(), RepoError> {
        let mut state = self.shared.lock();
        state.next_id += 1;
        photo.id = state.next_id;
        photo.created_at = OffsetDateTime::UNIX_EPOCH;
        drop(state);

        self.staged.push(Staged::Insert(photo.clone()));
        Ok(())
    }

    async fn update_photo(&mut self, photo: &PhotoRecord) -> Result<(), RepoError> {
        if !self.shared.lock().photos.contains_key(&photo.id) {
            return Err(RepoError::NotFound);
        }
        self.staged.push(Staged::Update(photo.clone()));
        Ok(())
    }

    async fn delete_photo(&mut self, id: i64) -> Result<(), RepoError> {
        if !self.shared.lock().photos.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        self.staged.push(Staged::Delete(id));
        Ok(())
    }

    async fn replace_tags(&mut self, photo_id: i64, tags: &[String]) -> Result<(), RepoError> {
        if self.shared.fail_tag_update.load(Ordering::SeqCst) {
            return Err(RepoError::Integrity {
                message: "tag index update failed".to_string(),
            });
        }
        self.staged.push(Staged::ReplaceTags {
            photo_id,
            tags: tags.to_vec(),
        });
        Ok(())
    }

    async fn record_vote(
        &mut self,
        photo_id: i64,
        user_id: i64,
        _weight: i16,
    ) -> Result<(), RepoError> {
        let key = (photo_id, user_id);
        let mut state = self.shared.lock();
        if state.votes.contains(&key) || state.pending_votes.contains(&key) {
            return Err(RepoError::Duplicate {
                constraint: "photo_votes_pkey".to_string(),
            });
        }
        state.pending_votes.insert(key);
        drop(state);

        self.claimed_votes.push(key);
        self.staged.push(Staged::Vote { photo_id, user_id });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        if self.shared.fail_commit.load(Ordering::SeqCst) {
            self.release_claims();
            return Err(RepoError::Persistence("commit failed".to_string()));
        }

        let shared = self.shared.clone();
        let mut state = shared.lock();
        for staged in self.staged {
            match staged {
                Staged::Insert(photo) => {
                    state.photos.insert(photo.id, photo);
                }
                Staged::Update(photo) => {
                    state.photos.insert(photo.id, photo);
                }
                Staged::Delete(id) => {
                    state.photos.remove(&id);
                    state.votes.retain(|(photo_id, _)| *photo_id != id);
                }
                Staged::ReplaceTags { photo_id, tags } => {
                    if let Some(photo) = state.photos.get_mut(&photo_id) {
                        photo.tags = tags;
                    }
                }
                Staged::Vote { photo_id, user_id } => {
                    state.pending_votes.remove(&(photo_id, user_id));
                    state.votes.insert((photo_id, user_id));
                }
            }
        }
        drop(state);

        shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        self.release_claims();
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records removals instead of touching a filesystem.
#[derive(Default)]
pub struct RecordingCleaner {
    pub removals: Mutex<Vec<String>>,
}

impl RecordingCleaner {
    pub fn removals(&self) -> Vec<String> {
        self.removals.lock().expect("removals lock").clone()
    }
}

impl MediaCleanup for RecordingCleaner {
    fn schedule_removal(&self, filename: &str) {
        self.removals
            .lock()
            .expect("removals lock")
            .push(filename.to_string());
    }
}

/// Session-token lookup backed by a fixed map.
#[derive(Default)]
pub struct FakeUserStore {
    pub sessions: HashMap<Uuid, UserRecord>,
}

impl FakeUserStore {
    pub fn with_session(mut self, token: Uuid, user: UserRecord) -> Self {
        self.sessions.insert(token, user);
        self
    }
}

#[async_trait]
impl UserStore for FakeUserStore {
    async fn find_by_session(&self, token: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.sessions.get(&token).cloned())
    }
}

pub fn user(id: i64, name: &str) -> UserRecord {
    UserRecord {
        id,
        name: name.to_string(),
        email: None,
        is_admin: false,
        created_at: OffsetDateTime::UNIX_EPOCH,
    }
}

pub fn admin(id: i64, name: &str) -> UserRecord {
    UserRecord {
        is_admin: true,
        ..user(id, name)
    }
}

/// A fully wired coordination layer over the fakes.
pub struct Harness {
    pub store: Arc<FakeStore>,
    pub cache: Arc<ResponseCache>,
    pub notifier: Arc<Notifier>,
    pub cleaner: Arc<RecordingCleaner>,
    pub service: Arc<PhotoService>,
}

pub fn harness() -> Harness {
    let store = FakeStore::new();
    let cache = Arc::new(ResponseCache::new());
    let notifier = Arc::new(Notifier::new(16));
    let cleaner = Arc::new(RecordingCleaner::default());
    let service = Arc::new(PhotoService::new(
        store.clone(),
        cache.clone(),
        notifier.clone(),
        cleaner.clone(),
    ));

    Harness {
        store,
        cache,
        notifier,
        cleaner,
        service,
    }
}
