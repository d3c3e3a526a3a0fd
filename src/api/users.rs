//! `GET /api/v1/users`: the user directory upstream, reshaped to the fields
//! clients rely on.

use serde::{Deserialize, Serialize};

use super::upstream::Upstream;
use crate::{Request, Responder};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub address: Address,
    pub phone: String,
    pub website: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub suite: String,
    pub city: String,
    pub zipcode: String,
}

pub async fn list(upstream: &Upstream, req: Request) -> Responder {
    upstream.fetch::<Vec<User>>(&req).await
}
