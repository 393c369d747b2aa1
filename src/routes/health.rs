//! Health check endpoints
//!
//! - /health, /healthz - liveness probe (is the service running?)
//! - /ready, /readyz - readiness probe (can we reach MongoDB?)
//! - /version - build info for deployment verification

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::json_response;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub mode: String,
    pub node_id: String,
    pub timestamp: String,
    pub mongo: MongoHealth,
}

#[derive(Serialize)]
pub struct MongoHealth {
    pub connected: bool,
}

fn build_health_response(state: &AppState, mongo_connected: bool) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: state.args.node_id.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mongo: MongoHealth {
            connected: mongo_connected,
        },
    }
}

/// Handle liveness probe (/health, /healthz)
///
/// Always 200 while the process is serving; Mongo status is informational.
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    // Liveness does not touch the database
    json_response(StatusCode::OK, &build_health_response(&state, true))
}

/// Handle readiness probe (/ready, /readyz)
///
/// 200 only when MongoDB answers a ping; use for load balancer checks.
pub async fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let connected = state
        .mongo
        .inner()
        .database(state.mongo.db_name())
        .run_command(doc! { "ping": 1 })
        .await
        .is_ok();

    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(status, &build_health_response(&state, connected))
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "bookworm",
    };

    json_response(StatusCode::OK, &response)
}
