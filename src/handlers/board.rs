//! Board handlers
//!
//! Category listing, post detail and post write/update/delete

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entity::op_log::OpType;
use crate::entity::post::{self, Category};
use crate::entity::profile::{self, ProfileResponse};
use crate::entity::{attachment, comment};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::attachment::{attachments_by_post, AttachmentResponse};
use crate::handlers::audit::service::AuditLog;
use crate::handlers::profile::{name_of, names_by_id};
use crate::handlers::IdQuery;
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CategoryInfo {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl From<Category> for CategoryInfo {
    fn from(c: Category) -> Self {
        Self {
            key: c.as_str(),
            name: c.display_name(),
            description: c.description(),
        }
    }
}

/// Post as listed on a board page
#[derive(Debug, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(rename = "authorId")]
    pub author_id: i64,
    #[serde(rename = "authorName")]
    pub author_name: String,
    #[serde(rename = "commentCount")]
    pub comment_count: usize,
    pub attachments: Vec<AttachmentResponse>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

#[derive(Debug, Serialize)]
pub struct BoardPage {
    pub category: CategoryInfo,
    pub posts: Vec<PostSummary>,
    #[serde(rename = "canCreate")]
    pub can_create: bool,
}

#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: CategoryInfo,
    pub author: Option<ProfileResponse>,
    pub attachments: Vec<AttachmentResponse>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
    #[serde(rename = "canEdit")]
    pub can_edit: bool,
    #[serde(rename = "canDelete")]
    pub can_delete: bool,
}

#[derive(Debug, Deserialize)]
pub struct WritePostRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub id: i64,
    pub title: String,
    pub content: String,
}

fn parse_category(value: &str) -> AppResult<Category> {
    Category::parse(value).ok_or_not_found(format!("존재하지 않는 게시판입니다: {}", value))
}

/// Whether the user may write into the category
pub fn can_write(user: Option<&CurrentUser>, category: Category) -> bool {
    match user {
        Some(user) => !category.admin_only() || user.is_admin(),
        None => false,
    }
}

fn validate_post(title: &str, content: &str) -> AppResult<(String, String)> {
    let title = title.trim();
    let content = content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(AppError::Validation("제목과 내용을 입력해주세요.".to_string()));
    }
    Ok((title.to_string(), content.to_string()))
}

/// GET /api/board/categories
pub async fn list_categories() -> Json<Vec<CategoryInfo>> {
    Json(Category::ALL.iter().copied().map(CategoryInfo::from).collect())
}

/// GET /api/board/:category
pub async fn list_posts(
    Extension(db): Extension<DbConn>,
    current_user: Option<Extension<CurrentUser>>,
    Path(category): Path<String>,
) -> AppResult<Json<BoardPage>> {
    let category = parse_category(&category)?;
    let db = &*db;

    let posts = post::Entity::find()
        .filter(post::Column::Category.eq(category.as_str()))
        .order_by_desc(post::Column::CreatedAt)
        .order_by_desc(post::Column::Id)
        .all(db)
        .await?;

    let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    let names = names_by_id(db, posts.iter().map(|p| p.author_id)).await?;
    let mut attachments = attachments_by_post(db, post_ids.clone()).await?;

    let mut comment_counts: HashMap<i64, usize> = HashMap::new();
    if !post_ids.is_empty() {
        let commented: Vec<i64> = comment::Entity::find()
            .select_only()
            .column(comment::Column::PostId)
            .filter(comment::Column::PostId.is_in(post_ids))
            .into_tuple::<i64>()
            .all(db)
            .await?;
        for post_id in commented {
            *comment_counts.entry(post_id).or_default() += 1;
        }
    }

    let posts = posts
        .into_iter()
        .map(|p| PostSummary {
            author_name: name_of(&names, p.author_id),
            comment_count: comment_counts.get(&p.id).copied().unwrap_or(0),
            attachments: attachments.remove(&p.id).unwrap_or_default(),
            id: p.id,
            title: p.title,
            content: p.content,
            category: p.category,
            author_id: p.author_id,
            created_at: p.created_at,
            updated_at: p.updated_at,
        })
        .collect();

    Ok(Json(BoardPage {
        category: category.into(),
        posts,
        can_create: can_write(current_user.as_ref().map(|Extension(u)| u), category),
    }))
}

/// GET /api/board/:category/:id
pub async fn get_post(
    Extension(db): Extension<DbConn>,
    current_user: Option<Extension<CurrentUser>>,
    Path((category, id)): Path<(String, i64)>,
) -> AppResult<Json<PostDetail>> {
    let category = parse_category(&category)?;
    let db = &*db;

    let post = post::Entity::find_by_id(id)
        .filter(post::Column::Category.eq(category.as_str()))
        .one(db)
        .await?
        .ok_or_not_found("게시글을 찾을 수 없습니다.")?;

    let author = profile::Entity::find_by_id(post.author_id)
        .one(db)
        .await?
        .map(ProfileResponse::from);
    let attachments = attachments_by_post(db, vec![post.id])
        .await?
        .remove(&post.id)
        .unwrap_or_default();

    let can_modify = current_user
        .as_ref()
        .is_some_and(|Extension(u)| u.can_modify(post.author_id));

    Ok(Json(PostDetail {
        id: post.id,
        title: post.title,
        content: post.content,
        category: category.into(),
        author,
        attachments,
        created_at: post.created_at,
        updated_at: post.updated_at,
        can_edit: can_modify,
        can_delete: can_modify,
    }))
}

/// POST /api/board/:category/write
pub async fn write_post(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Path(category): Path<String>,
    Json(req): Json<WritePostRequest>,
) -> AppResult<Json<ApiResponse<post::Model>>> {
    let category = parse_category(&category)?;
    if !can_write(Some(&current_user), category) {
        tracing::warn!("{} may not write to {}", current_user.email, category.as_str());
        return Err(AppError::Forbidden);
    }
    let (title, content) = validate_post(&req.title, &req.content)?;

    let now = chrono::Utc::now().timestamp();
    let model = post::ActiveModel {
        title: Set(title.clone()),
        content: Set(content),
        category: Set(category.as_str().to_string()),
        author_id: Set(current_user.id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&*db)
    .await?;

    audit.success(
        &current_user.email,
        OpType::CreatePost,
        format!("[{}] {}", category.display_name(), title),
    );

    Ok(Json(ApiResponse::success(model)))
}

/// POST /api/board/post/update
pub async fn update_post(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<Json<ApiResponse<post::Model>>> {
    let (title, content) = validate_post(&req.title, &req.content)?;
    let db = &*db;

    let existing = post::Entity::find_by_id(req.id)
        .one(db)
        .await?
        .ok_or_not_found("게시글을 찾을 수 없습니다.")?;
    if !current_user.can_modify(existing.author_id) {
        return Err(AppError::Forbidden);
    }

    let mut active: post::ActiveModel = existing.into();
    active.title = Set(title.clone());
    active.content = Set(content);
    active.updated_at = Set(chrono::Utc::now().timestamp());
    let updated = active.update(db).await?;

    audit.success(&current_user.email, OpType::UpdatePost, title);

    Ok(Json(ApiResponse::success(updated)))
}

/// POST /api/board/post/delete?id=
/// Removes the post with its comments, attachment rows and stored objects
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    let db = &*db;
    let existing = post::Entity::find_by_id(query.id)
        .one(db)
        .await?
        .ok_or_not_found("게시글을 찾을 수 없습니다.")?;
    if !current_user.can_modify(existing.author_id) {
        return Err(AppError::Forbidden);
    }

    let objects = attachment::Entity::find()
        .filter(attachment::Column::PostId.eq(existing.id))
        .all(db)
        .await?;

    let txn = db.begin().await?;
    comment::Entity::delete_many()
        .filter(comment::Column::PostId.eq(existing.id))
        .exec(&txn)
        .await?;
    attachment::Entity::delete_many()
        .filter(attachment::Column::PostId.eq(existing.id))
        .exec(&txn)
        .await?;
    post::Entity::delete_by_id(existing.id).exec(&txn).await?;
    txn.commit().await?;

    for object in &objects {
        if let Err(e) = state.storage.remove(&object.bucket, &object.object_key).await {
            tracing::error!("Failed to remove {}/{}: {}", object.bucket, object.object_key, e);
        }
    }

    audit.success(&current_user.email, OpType::DeletePost, existing.title);

    Ok(Json(ApiResponse::success_msg("게시글이 삭제되었습니다.")))
}
