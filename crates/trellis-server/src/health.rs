//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` when the database answers, `"degraded"` otherwise.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Whether a pooled connection answered a trivial query.
    pub database: bool,
}

/// Build a health response.
pub fn health_check(start_time: Instant, database: bool) -> HealthResponse {
    HealthResponse {
        status: if database { "ok" } else { "degraded" }.into(),
        uptime_secs: start_time.elapsed().as_secs(),
        database,
    }
}
