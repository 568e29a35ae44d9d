//! Authentication handlers
//!
//! Implements signup, login, logout, current user and password change endpoints

use axum::{http::StatusCode, response::IntoResponse, Extension, Json};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::entity::op_log::OpType;
use crate::entity::profile::{self, ProfileResponse, Role};
use crate::error::{AppError, AppResult};
use crate::handlers::audit::service::AuditLog;
use crate::middleware::auth::{CurrentUser, SESSION_TIMESTAMP_KEY, SESSION_USER_KEY};
use crate::middleware::DbConn;
use crate::routes::ApiResponse;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Signup request body
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
    pub name: String,
    pub department: Option<String>,
    pub position: Option<String>,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(rename = "newPassword")]
    pub new_password: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: String,
}

/// Current user response
#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub role: Role,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

/// Shared rules for a new password and its confirmation
pub fn check_new_password(password: &str, confirm: &str) -> AppResult<()> {
    if password != confirm {
        return Err(AppError::Validation("비밀번호가 일치하지 않습니다.".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "비밀번호는 최소 {}자 이상이어야 합니다.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Empty optional text is stored as NULL
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn hash_password(password: &str) -> AppResult<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("password hash failed: {}", e)))
}

/// POST /api/signup
pub async fn signup(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Json<ApiResponse<ProfileResponse>>> {
    let email = req.email.trim().to_lowercase();
    let name = req.name.trim().to_string();
    if email.is_empty() || name.is_empty() {
        return Err(AppError::Validation("모든 필드를 입력해주세요.".to_string()));
    }
    check_new_password(&req.password, &req.confirm_password)?;

    let db = &*db;
    let existing = profile::Entity::find()
        .filter(profile::Column::Email.eq(&email))
        .one(db)
        .await?;
    if existing.is_some() {
        tracing::warn!("Signup rejected: duplicate email - {}", email);
        audit.failure(&email, OpType::Signup, "이미 가입된 이메일");
        return Err(AppError::Conflict("이미 가입된 이메일입니다.".to_string()));
    }

    let now = chrono::Utc::now().timestamp();
    let model = profile::ActiveModel {
        email: Set(email.clone()),
        password: Set(hash_password(&req.password)?),
        name: Set(name),
        department: Set(non_empty(req.department)),
        position: Set(non_empty(req.position)),
        role: Set(Role::Member.as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Member signed up: {}", email);
    audit.success(&email, OpType::Signup, "");

    Ok(Json(ApiResponse::success(ProfileResponse::from(model))))
}

/// POST /api/login
pub async fn login(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "bad request"})),
        );
    }

    let db = &*db;
    let found = profile::Entity::find()
        .filter(profile::Column::Email.eq(&email))
        .one(db)
        .await;

    let member = match found {
        Ok(Some(member)) => member,
        Ok(None) => {
            tracing::warn!("Login failed: unknown email - {}", email);
            audit.failure(&email, OpType::Login, "존재하지 않는 계정");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "이메일 또는 비밀번호가 올바르지 않습니다."})),
            );
        }
        Err(e) => {
            tracing::error!("Database error during login: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "internal error"})),
            );
        }
    };

    if !bcrypt::verify(&req.password, &member.password).unwrap_or(false) {
        tracing::warn!("Login failed: wrong password - {}", email);
        audit.failure(&email, OpType::Login, "비밀번호 오류");
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "이메일 또는 비밀번호가 올바르지 않습니다."})),
        );
    }

    // Drop any previous identity before binding the new one
    if let Err(e) = session.cycle_id().await {
        tracing::warn!("Failed to cycle session id: {}", e);
    }
    if let Err(e) = session.insert(SESSION_USER_KEY, member.id).await {
        tracing::error!("Failed to save session: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "internal error"})),
        );
    }
    if let Err(e) = session
        .insert(SESSION_TIMESTAMP_KEY, chrono::Utc::now().timestamp())
        .await
    {
        tracing::error!("Failed to save session timestamp: {}", e);
    }

    tracing::info!("Member logged in: {}", email);
    audit.success(&email, OpType::Login, "");

    (
        StatusCode::OK,
        Json(serde_json::json!({"message": "login success"})),
    )
}

/// POST /api/logout
pub async fn logout(
    session: Session,
    Extension(audit): Extension<AuditLog>,
    current_user: Option<Extension<CurrentUser>>,
) -> impl IntoResponse {
    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error(500, "internal error")),
        );
    }

    if let Some(Extension(user)) = current_user {
        audit.success(&user.email, OpType::Logout, "");
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success_msg("logout success")),
    )
}

/// GET /api/user/current
/// Returns the user object directly, without the ApiResponse wrapper
pub async fn current_user(Extension(user): Extension<CurrentUser>) -> Json<CurrentUserResponse> {
    let is_admin = user.is_admin();
    Json(CurrentUserResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        department: user.department,
        position: user.position,
        role: user.role,
        is_admin,
    })
}

/// POST /api/user/change-password
pub async fn change_password(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    if let Err(e) = check_new_password(&req.new_password, &req.confirm_password) {
        audit.failure(&current_user.email, OpType::ChangePassword, e.to_string());
        return Err(e);
    }

    let db = &*db;
    let member = profile::Entity::find_by_id(current_user.id)
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let mut active: profile::ActiveModel = member.into();
    active.password = Set(hash_password(&req.new_password)?);
    active.updated_at = Set(chrono::Utc::now().timestamp());
    active.update(db).await?;

    audit.success(&current_user.email, OpType::ChangePassword, "");

    Ok(Json(ApiResponse::success_msg("비밀번호가 변경되었습니다.")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn password_rules() {
        assert_ok!(check_new_password("secret1", "secret1"));

        let mismatch = assert_err!(check_new_password("secret1", "secret2"));
        assert_eq!(
            mismatch.to_string(),
            "Validation error: 비밀번호가 일치하지 않습니다."
        );

        let short = assert_err!(check_new_password("abc", "abc"));
        assert_eq!(
            short.to_string(),
            "Validation error: 비밀번호는 최소 6자 이상이어야 합니다."
        );
    }

    #[test]
    fn mismatch_is_reported_before_length() {
        let err = assert_err!(check_new_password("ab", "cd"));
        assert!(err.to_string().contains("일치하지"));
    }

    #[test]
    fn blank_optional_fields_become_none() {
        assert_eq!(non_empty(Some("   ".to_string())), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(" 송전처 ".to_string())), Some("송전처".to_string()));
    }
}
