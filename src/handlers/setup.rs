//! Setup handlers
//!
//! Implements database connection test, initialization and first-admin endpoints

use axum::{extract::State, http::StatusCode, Extension, Json};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use serde::{Deserialize, Serialize};

use crate::config::DatabaseConfig;
use crate::db;
use crate::entity::op_log::OpType;
use crate::entity::profile::{self, Role};
use crate::error::{AppError, AppResult};
use crate::handlers::auth::{check_new_password, non_empty};
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Database connection test request
#[derive(Debug, Deserialize)]
pub struct TestDbRequest {
    #[serde(rename = "type")]
    pub db_type: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl From<TestDbRequest> for DatabaseConfig {
    fn from(req: TestDbRequest) -> Self {
        Self {
            db_type: req.db_type,
            host: req.host,
            port: req.port.parse().unwrap_or(5432),
            name: req.database,
            user: req.username,
            password: req.password,
        }
    }
}

/// Setup response
#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub code: i32,
    pub message: String,
}

fn ok(message: impl Into<String>) -> (StatusCode, Json<SetupResponse>) {
    (
        StatusCode::OK,
        Json(SetupResponse {
            code: 0,
            message: message.into(),
        }),
    )
}

fn fail(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<SetupResponse>) {
    (
        status,
        Json(SetupResponse {
            code: 1,
            message: message.into(),
        }),
    )
}

/// Refuse setup calls once the system is initialized
fn already_initialized(state: &AppState) -> Option<(StatusCode, Json<SetupResponse>)> {
    if !state.is_initialized() {
        return None;
    }
    tracing::warn!("Rejected setup request: system is already initialized");
    Some(fail(StatusCode::CONFLICT, "이미 초기화된 시스템입니다."))
}

/// POST /api/setup/test-db
pub async fn test_db_connection(
    State(state): State<AppState>,
    Json(req): Json<TestDbRequest>,
) -> (StatusCode, Json<SetupResponse>) {
    if let Some(resp) = already_initialized(&state) {
        return resp;
    }

    let config = DatabaseConfig::from(req);
    tracing::info!("Testing database connection: {}:{}/{}", config.host, config.port, config.name);

    match db::test_connection(&config).await {
        Ok(_) => ok("연결에 성공했습니다."),
        Err(e) => {
            tracing::error!("Database connection test failed: {}", e);
            fail(StatusCode::BAD_REQUEST, format!("데이터베이스 연결 실패: {}", e))
        }
    }
}

/// POST /api/setup/init/db
/// Migrate the database, save db.toml and install the connection
pub async fn init_db(
    State(state): State<AppState>,
    Json(req): Json<TestDbRequest>,
) -> (StatusCode, Json<SetupResponse>) {
    if let Some(resp) = already_initialized(&state) {
        return resp;
    }

    let config = DatabaseConfig::from(req);
    tracing::info!("Initializing database: {}:{}/{}", config.host, config.port, config.name);

    if let Err(e) = db::test_connection(&config).await {
        tracing::error!("Database connection failed: {}", e);
        return fail(StatusCode::BAD_REQUEST, format!("데이터베이스 연결 실패: {}", e));
    }

    let conn = match db::init_database(&config).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("Database initialization failed: {}", e);
            return fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("데이터베이스 초기화 실패: {}", e),
            );
        }
    };

    let content = match toml::to_string_pretty(&config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to serialize database config: {}", e);
            return fail(StatusCode::INTERNAL_SERVER_ERROR, format!("설정 저장 실패: {}", e));
        }
    };

    if let Err(e) = std::fs::create_dir_all(&state.config.config_dir)
        .and_then(|_| std::fs::write(state.config.db_toml_path(), content))
    {
        tracing::error!("Failed to save database config: {}", e);
        return fail(StatusCode::INTERNAL_SERVER_ERROR, format!("설정 저장 실패: {}", e));
    }

    state.set_db(conn).await;
    ok("데이터베이스 초기화에 성공했습니다.")
}

/// Admin account initialization request
#[derive(Debug, Deserialize)]
pub struct InitUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub department: Option<String>,
}

/// Connection from state, or reconnect with the saved db.toml
async fn setup_connection(state: &AppState) -> Result<DatabaseConnection, (StatusCode, Json<SetupResponse>)> {
    if let Some(db) = state.get_db().await {
        return Ok(db);
    }

    let db_toml_path = state.config.db_toml_path();
    if !db_toml_path.exists() {
        return Err(fail(StatusCode::BAD_REQUEST, "먼저 데이터베이스를 초기화해주세요."));
    }

    let db_config: DatabaseConfig = std::fs::read_to_string(&db_toml_path)
        .map_err(|e| e.to_string())
        .and_then(|content| toml::from_str(&content).map_err(|e| e.to_string()))
        .map_err(|e| {
            tracing::error!("Failed to load db.toml: {}", e);
            fail(StatusCode::INTERNAL_SERVER_ERROR, "데이터베이스 설정을 읽지 못했습니다.")
        })?;

    let conn = db::init_database(&db_config).await.map_err(|e| {
        tracing::error!("Failed to connect to database: {}", e);
        fail(StatusCode::INTERNAL_SERVER_ERROR, format!("데이터베이스 연결 실패: {}", e))
    })?;

    state.set_db(conn.clone()).await;
    Ok(conn)
}

/// POST /api/setup/init/user
/// Create the first admin account and mark the system as initialized
pub async fn init_user(
    State(state): State<AppState>,
    Json(req): Json<InitUserRequest>,
) -> (StatusCode, Json<SetupResponse>) {
    if let Some(resp) = already_initialized(&state) {
        return resp;
    }

    let db = match setup_connection(&state).await {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let email = req.email.trim().to_lowercase();
    let name = req.name.trim().to_string();
    if email.is_empty() || name.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "모든 필드를 입력해주세요.");
    }
    if let Err(e) = check_new_password(&req.password, &req.password) {
        return fail(StatusCode::BAD_REQUEST, e.to_string());
    }

    let existing = profile::Entity::find()
        .filter(profile::Column::Email.eq(&email))
        .one(&db)
        .await;

    match existing {
        Ok(Some(_)) => {
            tracing::info!("Admin account already exists: {}", email);
        }
        Ok(None) => {
            let hashed = match bcrypt::hash(&req.password, bcrypt::DEFAULT_COST) {
                Ok(h) => h,
                Err(e) => {
                    tracing::error!("Failed to hash password: {}", e);
                    return fail(StatusCode::INTERNAL_SERVER_ERROR, "비밀번호 암호화 실패");
                }
            };

            let now = chrono::Utc::now().timestamp();
            let admin = profile::ActiveModel {
                email: Set(email.clone()),
                password: Set(hashed),
                name: Set(name),
                department: Set(non_empty(req.department)),
                position: Set(None),
                role: Set(Role::Admin.as_str().to_string()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };

            if let Err(e) = admin.insert(&db).await {
                tracing::error!("Failed to create admin account: {}", e);
                return fail(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("관리자 생성 실패: {}", e),
                );
            }
            tracing::info!("Admin account created: {}", email);
        }
        Err(e) => {
            tracing::error!("Database error: {}", e);
            return fail(StatusCode::INTERNAL_SERVER_ERROR, format!("데이터베이스 오류: {}", e));
        }
    }

    if let Err(e) = std::fs::File::create(&state.config.inited_path) {
        tracing::error!("Failed to create sys_inited file: {}", e);
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "초기화 실패");
    }

    tracing::info!("System initialization completed");
    ok("초기화에 성공했습니다.")
}

/// POST /api/setup/admin
/// Promote the caller to admin while the club has no admin yet
pub async fn promote_admin(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<()>>> {
    if current_user.is_admin() {
        return Ok(Json(ApiResponse::success_msg("이미 관리자입니다.")));
    }

    let db = &*db;
    let admins = profile::Entity::find()
        .filter(profile::Column::Role.eq(Role::Admin.as_str()))
        .count(db)
        .await?;
    if admins > 0 {
        tracing::warn!("Admin promotion rejected for {}: admin exists", current_user.email);
        state
            .audit
            .failure(&current_user.email, OpType::PromoteAdmin, "관리자가 이미 존재함");
        return Err(AppError::Forbidden);
    }

    let member = profile::Entity::find_by_id(current_user.id)
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let mut active: profile::ActiveModel = member.into();
    active.role = Set(Role::Admin.as_str().to_string());
    active.updated_at = Set(chrono::Utc::now().timestamp());
    active.update(db).await?;

    tracing::info!("Promoted {} to admin", current_user.email);
    state.audit.success(&current_user.email, OpType::PromoteAdmin, "");

    Ok(Json(ApiResponse::success_msg("관리자 권한이 부여되었습니다.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_port_falls_back_to_default() {
        let req = TestDbRequest {
            db_type: "postgres".to_string(),
            host: "db".to_string(),
            port: "not-a-port".to_string(),
            database: "club".to_string(),
            username: "club".to_string(),
            password: "pw".to_string(),
        };
        let config = DatabaseConfig::from(req);
        assert_eq!(config.port, 5432);
        assert_eq!(config.name, "club");
    }

    #[test]
    fn failures_carry_code_one() {
        let (status, Json(body)) = fail(StatusCode::BAD_REQUEST, "x");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, 1);
        let (_, Json(body)) = ok("y");
        assert_eq!(body.code, 0);
    }
}
