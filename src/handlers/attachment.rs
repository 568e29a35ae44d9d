//! Attachment handlers
//!
//! Streams multipart uploads into object storage and serves downloads

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::{multipart::Field, Multipart, Path, State},
    http::{header, StatusCode},
    response::{Json, Response},
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use tokio_util::io::ReaderStream;

use crate::entity::op_log::OpType;
use crate::entity::{attachment, post};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditLog;
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::storage::{
    format_file_size, is_safe_filename, mime_type, object_key, too_large, ChunkSource,
    ObjectStorage, StagedObject,
};

/// Attachment as shown under a post
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentResponse {
    pub id: i64,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileUrl")]
    pub file_url: String,
    #[serde(rename = "fileType")]
    pub file_type: String,
    pub size: i64,
    #[serde(rename = "sizeLabel")]
    pub size_label: String,
    #[serde(rename = "isImage")]
    pub is_image: bool,
}

impl From<attachment::Model> for AttachmentResponse {
    fn from(m: attachment::Model) -> Self {
        Self {
            id: m.id,
            is_image: m.file_type.starts_with("image/"),
            size_label: format_file_size(m.size),
            file_name: m.file_name,
            file_url: m.file_url,
            file_type: m.file_type,
            size: m.size,
        }
    }
}

/// Attachments of the given posts, grouped by post id in upload order
pub async fn attachments_by_post<C: ConnectionTrait>(
    db: &C,
    post_ids: Vec<i64>,
) -> Result<HashMap<i64, Vec<AttachmentResponse>>, DbErr> {
    let mut grouped: HashMap<i64, Vec<AttachmentResponse>> = HashMap::new();
    if post_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = attachment::Entity::find()
        .filter(attachment::Column::PostId.is_in(post_ids))
        .order_by_asc(attachment::Column::Id)
        .all(db)
        .await?;
    for row in rows {
        if let Some(post_id) = row.post_id {
            grouped.entry(post_id).or_default().push(row.into());
        }
    }
    Ok(grouped)
}

/// `Content-Disposition` with an ASCII fallback and the UTF-8 name
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

/// Multipart `file` field read as upload chunks
struct FieldChunks<'a> {
    field: Field<'a>,
    max_size: usize,
}

#[async_trait]
impl ChunkSource for FieldChunks<'_> {
    async fn next_chunk(&mut self) -> AppResult<Option<Bytes>> {
        self.field.chunk().await.map_err(|e| {
            tracing::error!("Failed to read upload chunk: {}", e);
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                too_large(self.max_size)
            } else {
                AppError::BadRequest(e.body_text())
            }
        })
    }
}

/// File received into staging, waiting for its row
struct PendingUpload {
    file_name: String,
    staged: StagedObject,
}

/// Stage every `file` field of the request
async fn receive_files(
    storage: &ObjectStorage,
    bucket: &str,
    post_id: i64,
    max_size: usize,
    multipart: &mut Multipart,
    pending: &mut Vec<PendingUpload>,
) -> AppResult<()> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::warn!("Malformed multipart upload for post {}: {}", post_id, e);
                return Err(AppError::BadRequest(e.body_text()));
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("").to_string();
        if !is_safe_filename(&file_name) {
            return Err(AppError::BadRequest(format!("허용되지 않는 파일명입니다: {}", file_name)));
        }

        let mut chunks = FieldChunks { field, max_size };
        let staged = storage.stage(bucket, post_id, &mut chunks, max_size).await?;
        pending.push(PendingUpload { file_name, staged });
    }
}

/// Move staged files to their final keys and record them in one transaction.
/// `keys` tracks where each object currently lives.
async fn commit_uploads(
    storage: &ObjectStorage,
    db: &DatabaseConnection,
    bucket: &str,
    post_id: i64,
    uploader: i64,
    pending: &[PendingUpload],
    keys: &mut [String],
) -> AppResult<Vec<attachment::Model>> {
    let millis = chrono::Utc::now().timestamp_millis();
    for (n, upload) in pending.iter().enumerate() {
        let key = object_key(post_id, millis, n, &upload.file_name);
        storage.rename(bucket, &keys[n], &key).await?;
        keys[n] = key;
    }

    let txn = db.begin().await?;
    let mut rows = Vec::with_capacity(pending.len());
    for (upload, key) in pending.iter().zip(keys.iter()) {
        let row = attachment::ActiveModel {
            post_id: Set(Some(post_id)),
            file_name: Set(upload.file_name.clone()),
            bucket: Set(bucket.to_string()),
            object_key: Set(key.clone()),
            file_url: Set(storage.public_url(bucket, key)),
            file_type: Set(mime_type(&upload.file_name).to_string()),
            size: Set(upload.staged.size as i64),
            uploaded_by: Set(uploader),
            created_at: Set(chrono::Utc::now().timestamp()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        rows.push(row);
    }
    txn.commit().await?;
    Ok(rows)
}

/// POST /api/board/post/:id/files
///
/// All files of the request are stored or none are.
pub async fn upload_files(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Path(post_id): Path<i64>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<Vec<AttachmentResponse>>>> {
    let post = post::Entity::find_by_id(post_id)
        .one(&*db)
        .await?
        .ok_or_not_found("게시글을 찾을 수 없습니다.")?;
    if !current_user.can_modify(post.author_id) {
        return Err(AppError::Forbidden);
    }

    let bucket = post::Category::parse(&post.category)
        .map(|c| c.bucket())
        .unwrap_or("files");
    let storage = &state.storage;
    let max_size = state.config.max_upload_size;

    let mut pending = Vec::new();
    let received = receive_files(storage, bucket, post_id, max_size, &mut multipart, &mut pending).await;
    let mut keys: Vec<String> = pending.iter().map(|p| p.staged.key.clone()).collect();
    if let Err(e) = received {
        storage.discard(bucket, &keys).await;
        return Err(e);
    }
    if pending.is_empty() {
        return Err(AppError::BadRequest("업로드할 파일이 없습니다.".to_string()));
    }

    let rows = match commit_uploads(storage, &db, bucket, post_id, current_user.id, &pending, &mut keys).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("Storing uploads for post {} failed: {}", post_id, e);
            storage.discard(bucket, &keys).await;
            return Err(e);
        }
    };

    let uploaded = rows
        .into_iter()
        .map(|row| {
            tracing::debug!("Stored {}/{} ({} bytes)", bucket, row.object_key, row.size);
            audit.success(
                &current_user.email,
                OpType::UploadFile,
                format!("게시글 {}: {}", post_id, row.file_name),
            );
            AttachmentResponse::from(row)
        })
        .collect();

    Ok(Json(ApiResponse::success(uploaded)))
}

/// GET /api/attachment/:id
pub async fn download(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let row = attachment::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_not_found("첨부파일을 찾을 수 없습니다.")?;

    let file = state.storage.open(&row.bucket, &row.object_key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, row.file_type.as_str())
        .header(header::CONTENT_LENGTH, row.size)
        .header(header::CONTENT_DISPOSITION, content_disposition(&row.file_name))
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_encodes_korean_names() {
        let value = content_disposition("회의록.pdf");
        assert!(value.starts_with("attachment; filename=\"___.pdf\""));
        assert!(value.ends_with("filename*=UTF-8''%ED%9A%8C%EC%9D%98%EB%A1%9D.pdf"));
    }

    #[test]
    fn response_labels_size_and_images() {
        let resp = AttachmentResponse::from(attachment::Model {
            id: 1,
            post_id: Some(2),
            file_name: "a.png".to_string(),
            bucket: "photos".to_string(),
            object_key: "2/1-0.png".to_string(),
            file_url: "/storage/photos/2/1-0.png".to_string(),
            file_type: "image/png".to_string(),
            size: 1536,
            uploaded_by: 3,
            created_at: 0,
        });
        assert!(resp.is_image);
        assert_eq!(resp.size_label, "1.5 KB");
    }

    #[test]
    fn disposition_escapes_quotes_and_spaces() {
        let value = content_disposition("a \"b\".txt");
        assert!(value.starts_with("attachment; filename=\"a__b_.txt\""));
        assert!(value.ends_with("filename*=UTF-8''a%20%22b%22.txt"));
    }
}
