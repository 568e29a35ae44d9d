//! Authentication middleware
//!
//! Provides session-based authentication for API routes

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::json;
use std::ops::Deref;
use tower_sessions::Session;

use crate::entity::profile::{self, Role};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Session key for storing the profile id
pub const SESSION_USER_KEY: &str = "profile_id";
pub const SESSION_TIMESTAMP_KEY: &str = "timestamp";

/// Database connection wrapper for use in handlers via Extension
#[derive(Clone)]
pub struct DbConn(pub DatabaseConnection);

impl Deref for DbConn {
    type Target = DatabaseConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extension to store current user in request
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub role: Role,
}

impl From<profile::Model> for CurrentUser {
    fn from(m: profile::Model) -> Self {
        let role = m.role();
        Self {
            id: m.id,
            email: m.email,
            name: m.name,
            department: m.department,
            position: m.position,
            role,
        }
    }
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Authors and admins may change a resource
    pub fn can_modify(&self, owner_id: i64) -> bool {
        self.id == owner_id || self.is_admin()
    }
}

/// Paths that work without a database connection
fn is_setup_path(path: &str) -> bool {
    path.starts_with("/api/setup/status")
        || path == "/api/setup/test-db"
        || path == "/api/setup/init/db"
        || path == "/api/setup/init/user"
        || path == "/api/health"
        || path == "/api/config"
}

/// Paths that don't require authentication
fn is_public_path(method: &Method, path: &str) -> bool {
    // Everything outside /api is static content or stored objects
    if !path.starts_with("/api") {
        return true;
    }

    if is_setup_path(path) {
        return true;
    }

    if path == "/api/login" || path == "/api/logout" || path == "/api/signup" {
        return true;
    }

    // Visitors can read the board, calendar, chart and member directory
    if method == Method::GET {
        return path == "/api/home"
            || path == "/api/members"
            || path == "/api/events"
            || path == "/api/organization/chart"
            || path.starts_with("/api/board/")
            || path.starts_with("/api/attachment/");
    }

    false
}

/// Authentication middleware
pub async fn auth_layer(
    State(state): State<AppState>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let public = is_public_path(request.method(), &path);

    request.extensions_mut().insert(state.audit.clone());

    let db = state.get_db().await;
    if let Some(db) = &db {
        request.extensions_mut().insert(DbConn(db.clone()));
    }

    if path.starts_with("/api") && !is_setup_path(&path) && db.is_none() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "system_not_initialized"})),
        )
            .into_response();
    }

    let profile_id: Option<i64> = session.get(SESSION_USER_KEY).await.unwrap_or(None);

    let (Some(profile_id), Some(db)) = (profile_id, db) else {
        if public {
            return next.run(request).await;
        }
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized"})),
        )
            .into_response();
    };

    match profile::Entity::find_by_id(profile_id).one(&db).await {
        Ok(Some(model)) => {
            request.extensions_mut().insert(CurrentUser::from(model));
            next.run(request).await
        }
        Ok(None) => {
            tracing::warn!("Profile in session no longer exists: {}", profile_id);
            if public {
                return next.run(request).await;
            }
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid_session"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Database error during auth: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal error"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: 5,
            email: "kim@club.test".to_string(),
            name: "김동아".to_string(),
            department: None,
            position: None,
            role,
        }
    }

    #[test]
    fn reads_are_public_writes_are_not() {
        assert!(is_public_path(&Method::GET, "/api/board/free"));
        assert!(is_public_path(&Method::GET, "/api/organization/chart"));
        assert!(is_public_path(&Method::GET, "/storage/photos/1/2.png"));
        assert!(is_public_path(&Method::POST, "/api/signup"));
        assert!(!is_public_path(&Method::POST, "/api/board/free/write"));
        assert!(!is_public_path(&Method::GET, "/api/organization/manage"));
        assert!(!is_public_path(&Method::GET, "/api/profile"));
    }

    #[test]
    fn setup_paths_skip_database_check() {
        assert!(is_setup_path("/api/setup/init/db"));
        assert!(is_setup_path("/api/health"));
        assert!(!is_setup_path("/api/setup/admin"));
    }

    #[test]
    fn admin_and_author_can_modify() {
        assert!(user(Role::Member).can_modify(5));
        assert!(!user(Role::Member).can_modify(6));
        assert!(user(Role::Admin).can_modify(6));
        assert!(user(Role::Member).require_admin().is_err());
        assert!(user(Role::Admin).require_admin().is_ok());
    }
}
