//! Postgres-backed store implementations.

mod photos;
mod users;

use std::sync::Arc;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::application::repos::RepoError;

#[derive(Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }
}

/// Translate sqlx failures into the store error taxonomy by SQLSTATE.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // unique_violation
            Some("23505") => RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            },
            // foreign_key_violation, invalid_text_representation
            Some("23503") | Some("22P02") => RepoError::InvalidInput {
                message: db.message().to_string(),
            },
            // remaining integrity_constraint_violation class
            Some(code) if code.starts_with("23") => RepoError::Integrity {
                message: db.message().to_string(),
            },
            // query_canceled
            Some("57014") => RepoError::Timeout,
            _ => RepoError::Persistence(db.message().to_string()),
        },
        other => RepoError::persistence(other),
    }
}
