use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Buzzer sockets currently identified.
    pub connected_buzzers: usize,
    /// Open SSE subscriptions across the public and admin streams.
    pub sse_subscribers: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(connected_buzzers: usize, sse_subscribers: usize) -> Self {
        Self {
            status: "ok".to_string(),
            connected_buzzers,
            sse_subscribers,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(connected_buzzers: usize, sse_subscribers: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            connected_buzzers,
            sse_subscribers,
        }
    }
}
