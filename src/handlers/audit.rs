//! Audit log handlers
//!
//! Implements operation log query and management

use axum::{
    extract::Query,
    response::Json,
    Extension,
};
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entity::op_log;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::routes::ApiResponse;

/// Query parameters for log pagination
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(rename = "pageSize", default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

/// Log response
#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub id: i64,
    #[serde(rename = "opTime")]
    pub op_time: i64,
    pub username: String,
    #[serde(rename = "opType")]
    pub op_type: String,
    #[serde(rename = "opDesc")]
    pub op_desc: String,
    pub result: String,
}

impl From<op_log::Model> for LogResponse {
    fn from(m: op_log::Model) -> Self {
        Self {
            id: m.id,
            op_time: m.op_time,
            username: m.username,
            op_type: m.op_type,
            op_desc: m.op_desc,
            result: m.result,
        }
    }
}

/// Query response with pagination
#[derive(Debug, Serialize)]
pub struct LogQueryResponse {
    pub logs: Vec<LogResponse>,
    pub total: u64,
}

/// Clamp page and page size into an (offset, limit) pair
fn page_window(page: i64, page_size: i64) -> (u64, u64) {
    let page = page.max(1) as u64;
    let page_size = page_size.clamp(1, 100) as u64;
    ((page - 1).saturating_mul(page_size), page_size)
}

/// GET /api/oplog/query
pub async fn query_oplog(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<LogQueryResponse>> {
    current_user.require_admin()?;

    let db = &*db;
    let (offset, limit) = page_window(query.page, query.page_size);

    let logs = op_log::Entity::find()
        .order_by_desc(op_log::Column::Id)
        .offset(offset)
        .limit(limit)
        .all(db)
        .await?
        .into_iter()
        .map(LogResponse::from)
        .collect();

    let total = op_log::Entity::find().count(db).await?;

    Ok(Json(LogQueryResponse { logs, total }))
}

/// POST /api/oplog/delete
pub async fn delete_oplog(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Json(ids): Json<Vec<i64>>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require_admin()?;

    if ids.is_empty() {
        return Err(AppError::BadRequest("삭제할 로그를 선택해주세요.".to_string()));
    }

    let res = op_log::Entity::delete_many()
        .filter(op_log::Column::Id.is_in(ids))
        .exec(&*db)
        .await?;

    Ok(Json(ApiResponse::success_msg(format!(
        "{}건의 로그를 삭제했습니다.",
        res.rows_affected
    ))))
}

/// Background writer for operation logs
pub mod service {
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    use crate::entity::op_log::{self, OpResult, OpType};

    /// Log entry to be added
    #[derive(Debug, Clone)]
    pub struct LogEntry {
        pub username: String,
        pub op_type: OpType,
        pub op_desc: String,
        pub result: OpResult,
    }

    /// Handle to the audit log writer.
    ///
    /// Entries recorded before [`AuditLog::attach`] wait in the channel until
    /// a database is available.
    #[derive(Clone)]
    pub struct AuditLog {
        tx: mpsc::Sender<LogEntry>,
        rx: Arc<Mutex<Option<mpsc::Receiver<LogEntry>>>>,
    }

    impl AuditLog {
        pub fn new(capacity: usize) -> Self {
            let (tx, rx) = mpsc::channel(capacity);
            Self {
                tx,
                rx: Arc::new(Mutex::new(Some(rx))),
            }
        }

        /// Start the writer task. Only the first call has an effect.
        pub fn attach(&self, db: DatabaseConnection) {
            let rx = match self.rx.lock() {
                Ok(mut guard) => guard.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            let Some(mut rx) = rx else {
                tracing::debug!("Audit log writer already running, skipping");
                return;
            };

            tokio::spawn(async move {
                while let Some(entry) = rx.recv().await {
                    let log = op_log::ActiveModel {
                        op_time: Set(chrono::Utc::now().timestamp()),
                        username: Set(entry.username),
                        op_type: Set(entry.op_type.label().to_string()),
                        op_desc: Set(entry.op_desc),
                        result: Set(entry.result.label().to_string()),
                        ..Default::default()
                    };

                    if let Err(e) = log.insert(&db).await {
                        tracing::error!("Failed to log operation: {}", e);
                    }
                }
            });
        }

        /// Queue an entry; drops it with a warning when the channel is full
        pub fn add(&self, entry: LogEntry) {
            if let Err(e) = self.tx.try_send(entry) {
                tracing::warn!("Operation log dropped: {}", e);
            }
        }

        pub fn record(&self, username: &str, op_type: OpType, op_desc: impl Into<String>, result: OpResult) {
            self.add(LogEntry {
                username: username.to_string(),
                op_type,
                op_desc: op_desc.into(),
                result,
            });
        }

        pub fn success(&self, username: &str, op_type: OpType, op_desc: impl Into<String>) {
            self.record(username, op_type, op_desc, OpResult::Success);
        }

        pub fn failure(&self, username: &str, op_type: OpType, op_desc: impl Into<String>) {
            self.record(username, op_type, op_desc, OpResult::Failed);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn entries_wait_until_attached() {
            let audit = AuditLog::new(4);
            audit.success("admin@club.test", OpType::AddPosition, "직책명: 회장");

            let mut rx = audit.rx.lock().unwrap().take().unwrap();
            let entry = rx.recv().await.unwrap();
            assert_eq!(entry.op_type, OpType::AddPosition);
            assert_eq!(entry.result, OpResult::Success);
            assert_eq!(entry.op_desc, "직책명: 회장");
        }

        #[test]
        fn full_channel_drops_instead_of_blocking() {
            let audit = AuditLog::new(1);
            audit.success("a", OpType::Login, "");
            audit.failure("a", OpType::Login, "비밀번호 오류");

            let mut rx = audit.rx.lock().unwrap().take().unwrap();
            assert_eq!(rx.try_recv().unwrap().result, OpResult::Success);
            assert!(rx.try_recv().is_err());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_clamps_input() {
        assert_eq!(page_window(1, 10), (0, 10));
        assert_eq!(page_window(3, 20), (40, 20));
        assert_eq!(page_window(0, 0), (0, 1));
        assert_eq!(page_window(2, 500), (100, 100));
        assert_eq!(page_window(i64::MAX, 100), (u64::MAX, 100));
    }
}
