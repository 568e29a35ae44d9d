//! Organization chart handlers
//!
//! Thin HTTP layer over [`crate::organization::service`]. Each request builds
//! its repository from the request's connection.

use axum::{extract::Query, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::entity::op_log::OpType;
use crate::error::AppResult;
use crate::handlers::audit::service::AuditLog;
use crate::handlers::IdQuery;
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::organization::service::{self, AddPosition, ChartView, ManageView};
use crate::organization::{OrganizationEntry, SeaOrmOrganizationRepository};
use crate::routes::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct AddPositionRequest {
    pub position: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(default)]
    pub order: i32,
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
}

impl From<AddPositionRequest> for AddPosition {
    fn from(req: AddPositionRequest) -> Self {
        Self {
            position: req.position,
            user_id: req.user_id,
            order: req.order,
            parent_id: req.parent_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChartResponse {
    #[serde(flatten)]
    pub view: ChartView,
    #[serde(rename = "canManage")]
    pub can_manage: bool,
}

fn repository(db: &DbConn) -> SeaOrmOrganizationRepository {
    SeaOrmOrganizationRepository::new(db.0.clone())
}

/// GET /api/organization/chart
pub async fn chart(
    Extension(db): Extension<DbConn>,
    current_user: Option<Extension<CurrentUser>>,
) -> AppResult<Json<ChartResponse>> {
    let view = service::load_chart(&repository(&db)).await.map_err(|e| {
        tracing::error!("Failed to load organization chart: {}", e);
        e
    })?;

    Ok(Json(ChartResponse {
        view,
        can_manage: current_user.is_some_and(|Extension(u)| u.is_admin()),
    }))
}

/// GET /api/organization/manage
pub async fn manage(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ManageView>> {
    current_user.require_admin()?;

    let view = service::load_manage(&repository(&db)).await?;
    Ok(Json(view))
}

/// POST /api/organization/add
pub async fn add_position(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<AddPositionRequest>,
) -> AppResult<Json<ApiResponse<OrganizationEntry>>> {
    current_user.require_admin()?;

    let position = req.position.trim().to_string();
    match service::add_position(&repository(&db), req.into()).await {
        Ok(entry) => {
            audit.success(
                &current_user.email,
                OpType::AddPosition,
                format!("{} - {}", entry.position, entry.member.name),
            );
            Ok(Json(ApiResponse::success(entry)))
        }
        Err(e) => {
            tracing::warn!("Adding position '{}' failed: {}", position, e);
            audit.failure(&current_user.email, OpType::AddPosition, position);
            Err(e)
        }
    }
}

/// POST /api/organization/delete?id=
pub async fn delete_position(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require_admin()?;

    match service::remove_position(&repository(&db), query.id).await {
        Ok(entry) => {
            audit.success(&current_user.email, OpType::DeletePosition, entry.position);
            Ok(Json(ApiResponse::success_msg("직책이 삭제되었습니다.")))
        }
        Err(e) => {
            tracing::error!("Deleting position {} failed: {}", query.id, e);
            audit.failure(
                &current_user.email,
                OpType::DeletePosition,
                format!("id {}", query.id),
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_request_reads_camel_case_fields() {
        let req: AddPositionRequest = serde_json::from_str(
            r#"{"position":"총무","userId":20,"order":1,"parentId":1}"#,
        )
        .unwrap();
        let add = AddPosition::from(req);
        assert_eq!(add.user_id, 20);
        assert_eq!(add.parent_id, Some(1));

        let root: AddPositionRequest =
            serde_json::from_str(r#"{"position":"회장","userId":10}"#).unwrap();
        assert_eq!(root.order, 0);
        assert_eq!(root.parent_id, None);
    }
}
