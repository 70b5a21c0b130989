//! Cache-aside read paths.
//!
//! Each listing query serializes its result once and serves the cached
//! payload until the next mutation invalidates it. Cache keys carry every
//! parameter that shapes the query, so distinct queries never collide.

use bytes::Bytes;
use serde::Serialize;

use crate::application::pagination::Page;
use crate::application::repos::PhotoOrder;
use crate::domain::entities::{PhotoDetail, UserRecord};

use super::{PhotoError, PhotoService};

pub const TAGS_KEY: &str = "tags";

pub fn search_key(query: &str, page: &Page) -> String {
    format!("photos:search:{query}:page:{}", page.index)
}

pub fn owner_key(owner_id: i64, page: &Page) -> String {
    format!("photos:ownerID:{owner_id}:page:{}", page.index)
}

pub fn list_key(order: PhotoOrder, page: &Page) -> String {
    format!("photos:{}:page:{}", order.as_param(), page.index)
}

impl PhotoService {
    /// Photos whose title or tags match `query`.
    pub async fn search(&self, page: Page, query: String) -> Result<Bytes, PhotoError> {
        let key = search_key(&query, &page);
        let store = self.store.clone();
        self.cache
            .get_or_compute(&key, move || async move {
                let photos = store.search_photos(&page, &query).await?;
                encode_payload(&photos)
            })
            .await
    }

    /// The public listing, newest-first or by net votes.
    pub async fn list(&self, page: Page, order: PhotoOrder) -> Result<Bytes, PhotoError> {
        let key = list_key(order, &page);
        let store = self.store.clone();
        self.cache
            .get_or_compute(&key, move || async move {
                let photos = store.list_photos(&page, order).await?;
                encode_payload(&photos)
            })
            .await
    }

    /// One owner's photos, newest-first.
    pub async fn by_owner(&self, page: Page, owner_id: i64) -> Result<Bytes, PhotoError> {
        let key = owner_key(owner_id, &page);
        let store = self.store.clone();
        self.cache
            .get_or_compute(&key, move || async move {
                let photos = store.photos_by_owner(&page, owner_id).await?;
                encode_payload(&photos)
            })
            .await
    }

    /// Every tag with its usage count.
    pub async fn tags(&self) -> Result<Bytes, PhotoError> {
        let store = self.store.clone();
        self.cache
            .get_or_compute(TAGS_KEY, move || async move {
                let tags = store.tag_counts().await?;
                encode_payload(&tags)
            })
            .await
    }

    /// Uncached detail view with the viewer's permissions resolved.
    pub async fn detail(
        &self,
        viewer: Option<&UserRecord>,
        id: i64,
    ) -> Result<PhotoDetail, PhotoError> {
        let found = self
            .store
            .photo_with_owner(id)
            .await?
            .ok_or(PhotoError::NotFound)?;

        let permissions = found.photo.permissions_for(viewer);
        Ok(PhotoDetail {
            photo: found.photo,
            owner_name: found.owner_name,
            permissions,
        })
    }
}

fn encode_payload<T: Serialize>(value: &T) -> Result<Bytes, PhotoError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_capture_every_query_parameter() {
        let page = Page::new(2, 32);

        assert_eq!(search_key("sunset", &page), "photos:search:sunset:page:2");
        assert_eq!(owner_key(17, &page), "photos:ownerID:17:page:2");
        assert_eq!(
            list_key(PhotoOrder::TopVoted, &page),
            "photos:votes:page:2"
        );
        assert_eq!(
            list_key(PhotoOrder::Newest, &page),
            "photos:created:page:2"
        );
    }

    #[test]
    fn different_orders_never_collide() {
        let page = Page::first();
        assert_ne!(
            list_key(PhotoOrder::Newest, &page),
            list_key(PhotoOrder::TopVoted, &page)
        );
    }
}
