/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "pool": { "active_connections": 1, "idle_connections": 4, "total_connections": 5 }
/// }
/// ```
///
/// Always answers 200; a lost database shows up as `"degraded"`.

use crate::{app::AppState, error::ApiResult, extract::Json};
use axum::extract::State;
use serde::Serialize;
use softdesk_shared::db::pool::{get_pool_stats, health_check as ping_database, PoolStats};
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: &'static str,

    pub version: &'static str,

    /// "connected" or "disconnected"
    pub database: &'static str,

    pub pool: PoolStats,
}

impl HealthResponse {
    fn new(database_up: bool, pool: PoolStats) -> Self {
        let (status, database) = if database_up {
            ("healthy", "connected")
        } else {
            ("degraded", "disconnected")
        };

        Self {
            status,
            version: env!("CARGO_PKG_VERSION"),
            database,
            pool,
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database_up = match ping_database(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Health check could not reach the database");
            false
        }
    };

    Ok(Json(HealthResponse::new(database_up, get_pool_stats(&state.db))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> PoolStats {
        PoolStats {
            active_connections: 0,
            idle_connections: 0,
            total_connections: 0,
        }
    }

    #[test]
    fn test_degraded_when_database_down() {
        let response = HealthResponse::new(false, stats());
        assert_eq!(response.status, "degraded");
        assert_eq!(response.database, "disconnected");
    }

    #[test]
    fn test_serializes_pool_stats() {
        let value = serde_json::to_value(HealthResponse::new(true, stats())).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["pool"]["total_connections"], 0);
    }
}
