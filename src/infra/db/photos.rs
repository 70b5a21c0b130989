use async_trait::async_trait;
use sqlx::{FromRow, Postgres, Transaction};
use time::OffsetDateTime;

use crate::application::pagination::Page;
use crate::application::repos::{
    PhotoOrder, PhotoStore, PhotoTx, PhotoWithOwner, RepoError,
};
use crate::domain::entities::{PhotoRecord, TagCount};

use super::{PostgresStore, map_sqlx_error};

const PHOTO_COLUMNS: &str = "p.id, p.owner_id, p.title, p.filename, p.up_votes, p.down_votes, \
     p.created_at, \
     COALESCE(array_agg(t.name ORDER BY t.name) FILTER (WHERE t.name IS NOT NULL), '{}') AS tags";

const PHOTO_JOINS: &str = "LEFT JOIN photo_tags pt ON pt.photo_id = p.id \
     LEFT JOIN tags t ON t.id = pt.tag_id";

#[derive(FromRow)]
struct PhotoRow {
    id: i64,
    owner_id: i64,
    title: String,
    filename: String,
    up_votes: i32,
    down_votes: i32,
    created_at: OffsetDateTime,
    tags: Vec<String>,
}

impl From<PhotoRow> for PhotoRecord {
    fn from(row: PhotoRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            filename: row.filename,
            up_votes: row.up_votes,
            down_votes: row.down_votes,
            created_at: row.created_at,
            tags: row.tags,
        }
    }
}

#[derive(FromRow)]
struct PhotoOwnerRow {
    #[sqlx(flatten)]
    photo: PhotoRow,
    owner_name: String,
}

#[derive(FromRow)]
struct TagCountRow {
    name: String,
    count: i64,
}

#[async_trait]
impl PhotoStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn PhotoTx>, RepoError> {
        let tx = self.pool().begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PostgresTx { tx }))
    }

    async fn ping(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    async fn find_photo(&self, id: i64) -> Result<Option<PhotoRecord>, RepoError> {
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos p {PHOTO_JOINS} WHERE p.id = $1 GROUP BY p.id"
        );
        let row = sqlx::query_as::<_, PhotoRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PhotoRecord::from))
    }

    async fn photo_with_owner(&self, id: i64) -> Result<Option<PhotoWithOwner>, RepoError> {
        let sql = format!(
            "SELECT {PHOTO_COLUMNS}, u.name AS owner_name \
             FROM photos p \
             INNER JOIN users u ON u.id = p.owner_id \
             {PHOTO_JOINS} \
             WHERE p.id = $1 \
             GROUP BY p.id, u.name"
        );
        let row = sqlx::query_as::<_, PhotoOwnerRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|row| PhotoWithOwner {
            photo: PhotoRecord::from(row.photo),
            owner_name: row.owner_name,
        }))
    }

    async fn search_photos(
        &self,
        page: &Page,
        query: &str,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} \
             FROM photos p {PHOTO_JOINS} \
             WHERE p.title ILIKE $1 \
                OR EXISTS (SELECT 1 FROM photo_tags spt \
                           INNER JOIN tags st ON st.id = spt.tag_id \
                           WHERE spt.photo_id = p.id AND st.name ILIKE $1) \
             GROUP BY p.id \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, PhotoRow>(&sql)
            .bind(format!("%{query}%"))
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PhotoRecord::from).collect())
    }

    async fn list_photos(
        &self,
        page: &Page,
        order: PhotoOrder,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        let order_clause = match order {
            PhotoOrder::Newest => "p.created_at DESC, p.id DESC",
            PhotoOrder::TopVoted => "(p.up_votes - p.down_votes) DESC, p.id DESC",
        };
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos p {PHOTO_JOINS} \
             GROUP BY p.id ORDER BY {order_clause} LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, PhotoRow>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PhotoRecord::from).collect())
    }

    async fn photos_by_owner(
        &self,
        page: &Page,
        owner_id: i64,
    ) -> Result<Vec<PhotoRecord>, RepoError> {
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos p {PHOTO_JOINS} \
             WHERE p.owner_id = $1 \
             GROUP BY p.id ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, PhotoRow>(&sql)
            .bind(owner_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PhotoRecord::from).collect())
    }

    async fn tag_counts(&self) -> Result<Vec<TagCount>, RepoError> {
        let rows = sqlx::query_as::<_, TagCountRow>(
            "SELECT t.name, COUNT(pt.photo_id) AS count \
             FROM tags t \
             INNER JOIN photo_tags pt ON pt.tag_id = t.id \
             GROUP BY t.name \
             ORDER BY count DESC, t.name ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| TagCount {
                name: row.name,
                count: row.count,
            })
            .collect())
    }
}

struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PhotoTx for PostgresTx {
    async fn insert_photo(&mut self, photo: &mut PhotoRecord) -> Result<(), RepoError> {
        let (id, created_at) = sqlx::query_as::<_, (i64, OffsetDateTime)>(
            "INSERT INTO photos (owner_id, title, filename) \
             VALUES ($1, $2, $3) \
             RETURNING id, created_at",
        )
        .bind(photo.owner_id)
        .bind(&photo.title)
        .bind(&photo.filename)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        photo.id = id;
        photo.created_at = created_at;
        Ok(())
    }

    async fn update_photo(&mut self, photo: &PhotoRecord) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE photos SET title = $2, up_votes = $3, down_votes = $4 WHERE id = $1",
        )
        .bind(photo.id)
        .bind(&photo.title)
        .bind(photo.up_votes)
        .bind(photo.down_votes)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_photo(&mut self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn replace_tags(&mut self, photo_id: i64, tags: &[String]) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM photo_tags WHERE photo_id = $1")
            .bind(photo_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        if tags.is_empty() {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO tags (name) \
             SELECT name FROM UNNEST($1::text[]) AS name \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(tags)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            "INSERT INTO photo_tags (photo_id, tag_id) \
             SELECT $1, id FROM tags WHERE name = ANY($2)",
        )
        .bind(photo_id)
        .bind(tags)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn record_vote(
        &mut self,
        photo_id: i64,
        user_id: i64,
        weight: i16,
    ) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO photo_votes (photo_id, user_id, weight) VALUES ($1, $2, $3)")
            .bind(photo_id)
            .bind(user_id)
            .bind(weight)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}
