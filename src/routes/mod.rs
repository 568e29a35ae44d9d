use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::handlers;
use crate::middleware::auth_layer;
use crate::state::AppState;

pub mod health;

/// Multipart framing allowance on top of the per-file limit
const UPLOAD_OVERHEAD: usize = 1024 * 1024;
/// Files accepted in one upload request
const MAX_FILES_PER_UPLOAD: usize = 10;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: true,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(_code: i32, message: impl Into<String>) -> Self {
        Self {
            code: false,
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            code: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // Session store (in-memory for now)
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false) // Set to true in production with HTTPS
        .with_http_only(true);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = state
        .config
        .max_upload_size
        .saturating_mul(MAX_FILES_PER_UPLOAD)
        .saturating_add(UPLOAD_OVERHEAD);

    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        // Setup
        .route("/setup/status", get(health::setup_status))
        .route("/setup/test-db", post(handlers::setup::test_db_connection))
        .route("/setup/init/db", post(handlers::setup::init_db))
        .route("/setup/init/user", post(handlers::setup::init_user))
        .route("/setup/admin", post(handlers::setup::promote_admin))
        // Auth
        .route("/signup", post(handlers::auth::signup))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/user/current", get(handlers::auth::current_user))
        .route("/user/change-password", post(handlers::auth::change_password))
        // Profiles
        .route("/profile", get(handlers::profile::get_profile))
        .route("/profile/update", post(handlers::profile::update_profile))
        .route("/members", get(handlers::profile::list_members))
        .route("/config", get(handlers::config::get_config))
        .route("/home", get(handlers::home::home))
        // Board
        .route("/board/categories", get(handlers::board::list_categories))
        .route("/board/:category", get(handlers::board::list_posts))
        .route("/board/:category/:id", get(handlers::board::get_post))
        .route("/board/:category/write", post(handlers::board::write_post))
        .route("/board/post/update", post(handlers::board::update_post))
        .route("/board/post/delete", post(handlers::board::delete_post))
        .route("/board/post/:id/comments", get(handlers::comment::list_comments))
        .route(
            "/board/post/:id/files",
            post(handlers::attachment::upload_files).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/attachment/:id", get(handlers::attachment::download))
        // Comments
        .route("/comment/add", post(handlers::comment::add_comment))
        .route("/comment/delete", post(handlers::comment::delete_comment))
        // Calendar
        .route("/events", get(handlers::event::list_events))
        .route("/events/add", post(handlers::event::add_event))
        .route("/events/delete", post(handlers::event::delete_event))
        // Organization chart
        .route("/organization/chart", get(handlers::organization::chart))
        .route("/organization/manage", get(handlers::organization::manage))
        .route("/organization/add", post(handlers::organization::add_position))
        .route("/organization/delete", post(handlers::organization::delete_position))
        // Audit log
        .route("/oplog/query", get(handlers::audit::query_oplog))
        .route("/oplog/delete", post(handlers::audit::delete_oplog))
        .fallback(fallback);

    // Uploaded objects, served as plain static files
    let storage_dir = ServeDir::new(state.storage.root_dir());

    // Frontend build, falling back to index.html for client-side routing
    let static_dir = "webapp/dist";
    let index_file = format!("{}/index.html", static_dir);
    let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

    Router::new()
        .nest("/api", api_routes)
        .nest_service(state.storage.public_prefix(), storage_dir)
        .fallback_service(serve_dir)
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error(404, "Not Found")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::new(None, Config::default()))
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_needs_no_database() {
        let (status, body) = get_json("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn config_reports_upload_limit_and_site_name() {
        let (status, body) = get_json("/api/config").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["maxUploadSize"], 50 * 1024 * 1024);
        assert_eq!(body["siteName"], "생성형 AI 학습동아리");
    }

    #[tokio::test]
    async fn data_routes_wait_for_setup() {
        let (status, body) = get_json("/api/organization/chart").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "system_not_initialized");
    }

    #[tokio::test]
    async fn setup_status_before_init() {
        let (status, body) = get_json("/api/setup/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["initialized"], false);
    }

    fn initialized_app() -> (Router, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("studyclub-inited-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut config = Config::default();
        config.inited_path = dir.join("sys_inited");
        config.config_dir = dir.clone();
        std::fs::write(&config.inited_path, "").unwrap();
        (create_router(AppState::new(None, config)), dir)
    }

    #[tokio::test]
    async fn setup_is_refused_once_initialized() {
        let (app, dir) = initialized_app();
        let requests = [
            (
                "/api/setup/init/db",
                r#"{"type":"postgres","host":"10.0.0.9","port":"5432","database":"x","username":"x","password":"x"}"#,
            ),
            (
                "/api/setup/test-db",
                r#"{"type":"postgres","host":"10.0.0.9","port":"5432","database":"x","username":"x","password":"x"}"#,
            ),
            (
                "/api/setup/init/user",
                r#"{"email":"evil@club.test","password":"secret1","name":"evil"}"#,
            ),
        ];

        for (uri, body) in requests {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(uri)
                        .header("content-type", "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CONFLICT, "{}", uri);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["code"], 1);
        }

        assert!(!dir.join("db.toml").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
