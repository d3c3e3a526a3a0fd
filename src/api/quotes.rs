//! `GET /api/v1/quotes`: one random quote from the quote upstream.

use serde::{Deserialize, Serialize};

use super::upstream::Upstream;
use crate::{Request, Responder};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,
    pub quote: String,
    pub author: String,
}

pub async fn get(upstream: &Upstream, req: Request) -> Responder {
    upstream.fetch::<Quote>(&req).await
}
