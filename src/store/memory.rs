//! In-process [`PostStore`], for tests and database-less local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CreatePost, Post, PostStore, StoreError, UpdatePost};

/// Posts in a `HashMap` behind a tokio `RwLock`. Listing is ordered by
/// creation time, then id.
#[derive(Debug, Default)]
pub struct MemoryPostStore {
    posts: RwLock<HashMap<Uuid, Post>>,
}

impl MemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostStore for MemoryPostStore {
    async fn create_post(&self, params: CreatePost) -> Result<Post, StoreError> {
        let now = Utc::now();
        let post = Post {
            id: params.id,
            title: params.title,
            description: params.description,
            created_at: now,
            updated_at: now,
        };
        let mut posts = self.posts.write().await;
        if posts.contains_key(&post.id) {
            return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                "duplicate key value violates unique constraint: id {}",
                post.id
            ))));
        }
        posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        let mut posts: Vec<Post> = self.posts.read().await.values().cloned().collect();
        posts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(posts)
    }

    async fn get_post(&self, id: Uuid) -> Result<Post, StoreError> {
        self.posts.read().await.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update_post(&self, params: UpdatePost) -> Result<Post, StoreError> {
        let mut posts = self.posts.write().await;
        let post = posts.get_mut(&params.id).ok_or(StoreError::NotFound)?;
        post.title = params.title;
        post.description = params.description;
        post.updated_at = Utc::now();
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<u64, StoreError> {
        Ok(u64::from(self.posts.write().await.remove(&id).is_some()))
    }
}
