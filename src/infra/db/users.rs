use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{RepoError, UserStore};
use crate::domain::entities::UserRecord;

use super::{PostgresStore, map_sqlx_error};

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: Option<String>,
    is_admin: bool,
    created_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            is_admin: row.is_admin,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn find_by_session(&self, token: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT u.id, u.name, u.email, u.is_admin, u.created_at \
             FROM users u \
             INNER JOIN sessions s ON s.user_id = u.id \
             WHERE s.token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(UserRecord::from))
    }
}
