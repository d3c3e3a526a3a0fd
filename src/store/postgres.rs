//! PostgreSQL-backed [`PostStore`] on a `sqlx` pool.
//!
//! The queries are free functions generic over [`PgExecutor`], so they run
//! equally against the pool, a single checked-out connection, or an open
//! transaction. [`PgPostStore`] simply hands them its pool.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgExecutor;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use uuid::Uuid;

use super::{CreatePost, Post, PostStore, StoreError, UpdatePost};

const SCHEMA: &str = include_str!("../../migrations/0001_create_posts.sql");

const POST_COLUMNS: &str = "id, title, description, created_at, updated_at";

/// Pool sizing and idle policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolOptions {
    pub min_connections: u32,
    pub max_connections: u32,
    pub idle_timeout: Duration,
}

/// Opens the pool, proves it is alive with one round-trip, and makes sure
/// the `posts` table exists.
///
/// Any failure is returned as-is: startup does not retry.
pub async fn connect(url: &str, options: &PoolOptions) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .min_connections(options.min_connections)
        .max_connections(options.max_connections)
        .idle_timeout(Some(options.idle_timeout))
        .connect(url)
        .await?;

    if let Err(err) = ping(&pool).await {
        pool.close().await;
        return Err(err.into());
    }
    sqlx::raw_sql(SCHEMA).execute(&pool).await?;

    info!(
        min_connections = options.min_connections,
        max_connections = options.max_connections,
        idle_timeout = ?options.idle_timeout,
        "database pool ready"
    );
    Ok(pool)
}

pub async fn ping<'e, E: PgExecutor<'e>>(executor: E) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(executor).await.map(|_| ())
}

// ── Queries ───────────────────────────────────────────────────────────────────

pub async fn create_post<'e, E: PgExecutor<'e>>(executor: E, params: &CreatePost) -> Result<Post, sqlx::Error> {
    let sql = format!(
        "INSERT INTO posts (id, title, description) VALUES ($1, $2, $3) RETURNING {POST_COLUMNS}"
    );
    sqlx::query_as::<_, Post>(&sql)
        .bind(params.id)
        .bind(&params.title)
        .bind(&params.description)
        .fetch_one(executor)
        .await
}

pub async fn list_posts<'e, E: PgExecutor<'e>>(executor: E) -> Result<Vec<Post>, sqlx::Error> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at, id");
    sqlx::query_as::<_, Post>(&sql).fetch_all(executor).await
}

pub async fn get_post<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Post, sqlx::Error> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
    sqlx::query_as::<_, Post>(&sql).bind(id).fetch_one(executor).await
}

pub async fn update_post<'e, E: PgExecutor<'e>>(executor: E, params: &UpdatePost) -> Result<Post, sqlx::Error> {
    let sql = format!(
        "UPDATE posts SET title = $2, description = $3, updated_at = now() WHERE id = $1 RETURNING {POST_COLUMNS}"
    );
    sqlx::query_as::<_, Post>(&sql)
        .bind(params.id)
        .bind(&params.title)
        .bind(&params.description)
        .fetch_one(executor)
        .await
}

pub async fn delete_post<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
    let done = sqlx::query("DELETE FROM posts WHERE id = $1").bind(id).execute(executor).await?;
    Ok(done.rows_affected())
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// [`PostStore`] over a shared [`PgPool`]. Cloning shares the pool.
#[derive(Clone, Debug)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn create_post(&self, params: CreatePost) -> Result<Post, StoreError> {
        Ok(create_post(&self.pool, &params).await?)
    }

    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        Ok(list_posts(&self.pool).await?)
    }

    async fn get_post(&self, id: Uuid) -> Result<Post, StoreError> {
        Ok(get_post(&self.pool, id).await?)
    }

    async fn update_post(&self, params: UpdatePost) -> Result<Post, StoreError> {
        Ok(update_post(&self.pool, &params).await?)
    }

    async fn delete_post(&self, id: Uuid) -> Result<u64, StoreError> {
        Ok(delete_post(&self.pool, id).await?)
    }
}
