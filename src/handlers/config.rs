//! Configuration handlers
//!
//! Returns public configuration settings to the frontend

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::state::AppState;

/// Public configuration response
#[derive(Debug, Serialize)]
pub struct PublicConfig {
    /// Maximum size of a single attachment in bytes
    #[serde(rename = "maxUploadSize")]
    pub max_upload_size: usize,
    #[serde(rename = "siteName")]
    pub site_name: String,
}

/// GET /api/config
pub async fn get_config(State(state): State<AppState>) -> Json<PublicConfig> {
    Json(PublicConfig {
        max_upload_size: state.config.max_upload_size,
        site_name: state.config.site.name.clone(),
    })
}
