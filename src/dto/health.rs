use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: &'static str,
    /// Whether quiz operations are currently refused for lack of storage.
    pub degraded: bool,
}

impl HealthResponse {
    /// Storage is reachable.
    pub fn ok() -> Self {
        Self {
            status: "ok",
            degraded: false,
        }
    }

    /// Storage is down; quiz operations fail until it comes back.
    pub fn degraded() -> Self {
        Self {
            status: "degraded",
            degraded: true,
        }
    }
}
