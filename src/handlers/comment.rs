//! Comment handlers

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::entity::op_log::OpType;
use crate::entity::{comment, post};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditLog;
use crate::handlers::profile::{name_of, names_by_id};
use crate::handlers::IdQuery;
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::routes::ApiResponse;

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    #[serde(rename = "postId")]
    pub post_id: i64,
    pub content: String,
    #[serde(rename = "authorId")]
    pub author_id: i64,
    #[serde(rename = "authorName")]
    pub author_name: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    #[serde(rename = "postId")]
    pub post_id: i64,
    pub content: String,
}

/// GET /api/board/post/:id/comments
pub async fn list_comments(
    Extension(db): Extension<DbConn>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<Vec<CommentResponse>>> {
    let db = &*db;
    let comments = comment::Entity::find()
        .filter(comment::Column::PostId.eq(post_id))
        .order_by_asc(comment::Column::CreatedAt)
        .order_by_asc(comment::Column::Id)
        .all(db)
        .await?;
    let names = names_by_id(db, comments.iter().map(|c| c.author_id)).await?;

    Ok(Json(
        comments
            .into_iter()
            .map(|c| CommentResponse {
                author_name: name_of(&names, c.author_id),
                id: c.id,
                post_id: c.post_id,
                content: c.content,
                author_id: c.author_id,
                created_at: c.created_at,
            })
            .collect(),
    ))
}

/// POST /api/comment/add
pub async fn add_comment(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<AddCommentRequest>,
) -> AppResult<Json<ApiResponse<CommentResponse>>> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::Validation("댓글 내용을 입력해주세요.".to_string()));
    }

    let db = &*db;
    post::Entity::find_by_id(req.post_id)
        .one(db)
        .await?
        .ok_or_not_found("게시글을 찾을 수 없습니다.")?;

    let model = comment::ActiveModel {
        post_id: Set(req.post_id),
        content: Set(content),
        author_id: Set(current_user.id),
        created_at: Set(chrono::Utc::now().timestamp()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    audit.success(
        &current_user.email,
        OpType::CreateComment,
        format!("게시글 {}", req.post_id),
    );

    Ok(Json(ApiResponse::success(CommentResponse {
        id: model.id,
        post_id: model.post_id,
        content: model.content,
        author_id: model.author_id,
        author_name: current_user.name,
        created_at: model.created_at,
    })))
}

/// POST /api/comment/delete?id=
pub async fn delete_comment(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    let db = &*db;
    let existing = comment::Entity::find_by_id(query.id)
        .one(db)
        .await?
        .ok_or_not_found("댓글을 찾을 수 없습니다.")?;
    if !current_user.can_modify(existing.author_id) {
        return Err(AppError::Forbidden);
    }

    comment::Entity::delete_by_id(existing.id).exec(db).await?;
    audit.success(
        &current_user.email,
        OpType::DeleteComment,
        format!("게시글 {}", existing.post_id),
    );

    Ok(Json(ApiResponse::success_msg("댓글이 삭제되었습니다.")))
}
