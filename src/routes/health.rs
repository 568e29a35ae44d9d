use axum::{extract::State, response::Json};
use serde::Serialize;

use super::ApiResponse;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub database: bool,
}

#[derive(Serialize)]
pub struct SetupStatus {
    pub initialized: bool,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: state.get_db().await.is_some(),
    }))
}

/// Returns {"initialized": bool} without the ApiResponse wrapper.
pub async fn setup_status(State(state): State<AppState>) -> Json<SetupStatus> {
    Json(SetupStatus {
        initialized: state.is_initialized(),
    })
}
