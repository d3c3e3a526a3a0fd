//! Liveness probe.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/ping` | Is the process alive and serving HTTP? |
//!
//! It deliberately touches neither the store nor the upstreams: a slow
//! database should not get the process restarted.

use crate::{Request, Responder};

/// Always `200 OK` with body `pong`.
pub async fn ping(_req: Request) -> Responder {
    Responder::text("pong")
}
