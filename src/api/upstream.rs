//! Read-only proxying of third-party JSON APIs.

use std::time::Duration;

use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::responder::Cause;
use crate::{Error, Request, Responder};

/// Builds the outbound client shared by every upstream. `timeout` bounds a
/// whole exchange, body included.
pub fn client(timeout: Duration) -> Result<reqwest::Client, Error> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// One upstream endpoint behind a shared [`reqwest::Client`].
///
/// Failures never leak upstream content to the caller:
///
/// | Failure | Status | Message |
/// |---|---|---|
/// | endpoint is not a valid URL | 500 | `failed to create request` |
/// | connect / transport / timeout | 500 | `failed to make request` |
/// | upstream answered non-200 | upstream's | `failed to fetch data from external API` |
/// | body unreadable or not the expected JSON | 500 | `failed to decode response` |
#[derive(Clone, Debug)]
pub struct Upstream {
    client: reqwest::Client,
    endpoint: String,
}

impl Upstream {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }

    /// GETs the endpoint, decodes the body as `T` and answers with it
    /// re-encoded. Dropping the returned future aborts the outbound call.
    pub async fn fetch<T>(&self, req: &Request) -> Responder
    where
        T: DeserializeOwned + Serialize,
    {
        let logger = req.span().clone();

        let outbound = match self.client.get(&self.endpoint).build() {
            Ok(outbound) => outbound,
            Err(err) => {
                return Responder::json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to create request")
                    .caused_by(err)
                    .with_logger(logger);
            }
        };

        let res = match self.client.execute(outbound).await {
            Ok(res) => res,
            Err(err) => {
                return Responder::json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to make request")
                    .caused_by(err)
                    .with_logger(logger);
            }
        };

        let status = res.status();
        if status != StatusCode::OK {
            debug!(parent: &logger, endpoint = %self.endpoint, %status, "upstream refused");
            return Responder::json_error(status, "failed to fetch data from external API").with_logger(logger);
        }

        let decoded: Result<T, Cause> = match res.bytes().await {
            Ok(body) => serde_json::from_slice(&body).map_err(Cause::from),
            Err(err) => Err(err.into()),
        };
        match decoded {
            Ok(payload) => Responder::json(&payload).with_logger(logger),
            Err(err) => Responder::json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to decode response")
                .caused_by(err)
                .with_logger(logger),
        }
    }
}
