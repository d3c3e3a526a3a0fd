//! Post persistence.
//!
//! Handlers only see [`PostStore`]. Production wires in
//! [`PgPostStore`](postgres::PgPostStore); tests and local runs can use
//! [`MemoryPostStore`](memory::MemoryPostStore). Both honour the same
//! contract:
//!
//! - ids come from the caller (handlers generate them), timestamps from the
//!   store;
//! - `updated_at` is refreshed on every update;
//! - a lookup or update that matches no row is [`StoreError::NotFound`];
//! - delete reports the affected row count instead of failing on a miss.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryPostStore;
pub use postgres::PgPostStore;

/// A stored post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatePost {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

/// Update parameters. `description: None` clears the column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdatePost {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no rows in result set")]
    NotFound,

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Database(other),
        }
    }
}

/// The capability set handlers need from persistence.
///
/// Implementations are shared across every in-flight request and must be
/// safe for concurrent use without extra locking in the handler layer.
#[async_trait]
pub trait PostStore: Send + Sync + 'static {
    async fn create_post(&self, params: CreatePost) -> Result<Post, StoreError>;
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError>;
    async fn get_post(&self, id: Uuid) -> Result<Post, StoreError>;
    async fn update_post(&self, params: UpdatePost) -> Result<Post, StoreError>;
    /// Number of rows removed: `0` when nothing matched.
    async fn delete_post(&self, id: Uuid) -> Result<u64, StoreError>;
}
