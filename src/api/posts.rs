//! CRUD handlers for `/api/v1/posts`.

use std::sync::Arc;

use http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use crate::store::{CreatePost, PostStore, StoreError, UpdatePost};
use crate::{Request, Responder};

/// Body of `POST /api/v1/posts`. Absent fields decode as empty strings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePostParams {
    pub title: String,
    pub description: String,
}

/// Body of `PUT /api/v1/posts/{id}`. A missing or `null` description
/// clears the stored one.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePostParams {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct PostHandler {
    store: Arc<dyn PostStore>,
}

impl PostHandler {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, req: Request, params: CreatePostParams) -> Responder {
        let created = self
            .store
            .create_post(CreatePost {
                id: Uuid::new_v4(),
                title: params.title,
                description: Some(params.description),
            })
            .await;

        let responder = match created {
            Ok(post) => Responder::json(&post),
            Err(err) => Responder::internal_server_error(err),
        };
        responder.with_logger(req.span().clone())
    }

    pub async fn list(&self, req: Request) -> Responder {
        let responder = match self.store.list_posts().await {
            Ok(posts) => Responder::json(&posts),
            Err(err) => Responder::internal_server_error(err),
        };
        responder.with_logger(req.span().clone())
    }

    pub async fn get(&self, req: Request) -> Responder {
        let logger = req.span().clone();
        let id = match post_id(&req) {
            Ok(id) => id,
            Err(rejection) => return rejection.with_logger(logger),
        };

        let responder = match self.store.get_post(id).await {
            Ok(post) => Responder::json(&post),
            Err(err @ StoreError::NotFound) => not_found().caused_by(err),
            Err(err) => Responder::internal_server_error(err),
        };
        responder.with_logger(logger)
    }

    /// A missing row is a store failure here, not a 404.
    pub async fn update(&self, req: Request, params: UpdatePostParams) -> Responder {
        let logger = req.span().clone();
        let id = match post_id(&req) {
            Ok(id) => id,
            Err(rejection) => return rejection.with_logger(logger),
        };

        let updated = self
            .store
            .update_post(UpdatePost { id, title: params.title, description: params.description })
            .await;

        let responder = match updated {
            Ok(post) => Responder::json(&post),
            Err(err) => Responder::internal_server_error(err),
        };
        responder.with_logger(logger)
    }

    pub async fn delete(&self, req: Request) -> Responder {
        let logger = req.span().clone();
        let id = match post_id(&req) {
            Ok(id) => id,
            Err(rejection) => return rejection.with_logger(logger),
        };

        let responder = match self.store.delete_post(id).await {
            Ok(0) => not_found(),
            Ok(_) => Responder::empty(),
            Err(err) => Responder::internal_server_error(err),
        };
        responder.with_logger(logger)
    }
}

fn post_id(req: &Request) -> Result<Uuid, Responder> {
    let raw = req.param("id").unwrap_or_default();
    Uuid::parse_str(raw).map_err(|err| Responder::json_error(StatusCode::BAD_REQUEST, "Invalid ID format").caused_by(err))
}

fn not_found() -> Responder {
    Responder::json_error(StatusCode::NOT_FOUND, "Post not found")
}
