//! Profile handlers
//!
//! Own profile, profile update and the member directory

use axum::{Extension, Json};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use crate::entity::op_log::OpType;
use crate::entity::profile::{self, ProfileResponse};
use crate::error::{AppError, AppResult};
use crate::handlers::audit::service::AuditLog;
use crate::handlers::auth::non_empty;
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::routes::ApiResponse;

/// Shown in place of an author whose profile no longer exists
pub const UNKNOWN_AUTHOR: &str = "익명";

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub department: Option<String>,
    pub position: Option<String>,
}

/// Profile names keyed by id, for the given ids only
pub async fn names_by_id<C, I>(db: &C, ids: I) -> Result<HashMap<i64, String>, DbErr>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = i64>,
{
    let ids: Vec<i64> = ids.into_iter().collect::<HashSet<_>>().into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    Ok(profile::Entity::find()
        .filter(profile::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect())
}

/// Look up a name, falling back to [`UNKNOWN_AUTHOR`]
pub fn name_of(names: &HashMap<i64, String>, id: i64) -> String {
    names
        .get(&id)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string())
}

/// GET /api/profile
pub async fn get_profile(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ProfileResponse>> {
    let model = profile::Entity::find_by_id(current_user.id)
        .one(&*db)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(ProfileResponse::from(model)))
}

/// POST /api/profile/update
pub async fn update_profile(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<ProfileResponse>>> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("이름을 입력해주세요.".to_string()));
    }

    let db = &*db;
    let model = profile::Entity::find_by_id(current_user.id)
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let mut active: profile::ActiveModel = model.into();
    active.name = Set(name);
    active.department = Set(non_empty(req.department));
    active.position = Set(non_empty(req.position));
    active.updated_at = Set(chrono::Utc::now().timestamp());
    let updated = active.update(db).await?;

    audit.success(&current_user.email, OpType::UpdateProfile, "");

    Ok(Json(ApiResponse::success(ProfileResponse::from(updated))))
}

/// GET /api/members
pub async fn list_members(
    Extension(db): Extension<DbConn>,
) -> AppResult<Json<Vec<ProfileResponse>>> {
    let members = profile::Entity::find()
        .order_by_asc(profile::Column::Name)
        .all(&*db)
        .await?
        .into_iter()
        .map(ProfileResponse::from)
        .collect();
    Ok(Json(members))
}
