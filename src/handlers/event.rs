//! Event calendar handlers

use axum::{extract::Query, Extension, Json};
use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::entity::event;
use crate::entity::op_log::OpType;
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::AuditLog;
use crate::handlers::auth::non_empty;
use crate::handlers::profile::{name_of, names_by_id};
use crate::handlers::IdQuery;
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::routes::ApiResponse;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub date: String,
    #[serde(rename = "createdBy")]
    pub created_by: i64,
    #[serde(rename = "creatorName")]
    pub creator_name: String,
}

impl EventResponse {
    pub fn new(m: event::Model, creator_name: String) -> Self {
        Self {
            id: m.id,
            title: m.title,
            description: m.description,
            date: m.date.format(DATE_FORMAT).to_string(),
            created_by: m.created_by,
            creator_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub date: String,
}

pub fn parse_date(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| AppError::Validation(format!("날짜 형식이 올바르지 않습니다: {}", value)))
}

/// GET /api/events?date=YYYY-MM-DD
pub async fn list_events(
    Extension(db): Extension<DbConn>,
    Query(query): Query<EventQuery>,
) -> AppResult<Json<Vec<EventResponse>>> {
    let db = &*db;
    let mut select = event::Entity::find();
    if let Some(date) = query.date.as_deref().filter(|d| !d.is_empty()) {
        select = select.filter(event::Column::Date.eq(parse_date(date)?));
    }

    let events = select
        .order_by_asc(event::Column::Date)
        .order_by_asc(event::Column::Id)
        .all(db)
        .await?;
    let names = names_by_id(db, events.iter().map(|e| e.created_by)).await?;

    Ok(Json(
        events
            .into_iter()
            .map(|e| {
                let creator = name_of(&names, e.created_by);
                EventResponse::new(e, creator)
            })
            .collect(),
    ))
}

/// POST /api/events/add
pub async fn add_event(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<AddEventRequest>,
) -> AppResult<Json<ApiResponse<EventResponse>>> {
    current_user.require_admin()?;

    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("일정 제목을 입력해주세요.".to_string()));
    }
    let date = parse_date(&req.date)?;

    let model = event::ActiveModel {
        title: Set(title.clone()),
        description: Set(non_empty(req.description)),
        date: Set(date),
        created_by: Set(current_user.id),
        created_at: Set(chrono::Utc::now().timestamp()),
        ..Default::default()
    }
    .insert(&*db)
    .await?;

    audit.success(
        &current_user.email,
        OpType::CreateEvent,
        format!("{} {}", req.date.trim(), title),
    );

    Ok(Json(ApiResponse::success(EventResponse::new(
        model,
        current_user.name,
    ))))
}

/// POST /api/events/delete?id=
pub async fn delete_event(
    Extension(db): Extension<DbConn>,
    Extension(audit): Extension<AuditLog>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require_admin()?;

    let db = &*db;
    let existing = event::Entity::find_by_id(query.id)
        .one(db)
        .await?
        .ok_or_not_found("일정을 찾을 수 없습니다.")?;
    event::Entity::delete_by_id(existing.id).exec(db).await?;

    audit.success(&current_user.email, OpType::DeleteEvent, existing.title);

    Ok(Json(ApiResponse::success_msg("일정이 삭제되었습니다.")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn parses_iso_dates_only() {
        let date = assert_ok!(parse_date("2024-03-15"));
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_ok!(parse_date(" 2024-12-01 "));
        assert_err!(parse_date("2024/03/15"));
        assert_err!(parse_date("2024-02-30"));
    }

    #[test]
    fn response_formats_date() {
        let resp = EventResponse::new(
            event::Model {
                id: 1,
                title: "정기 모임".to_string(),
                description: None,
                date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
                created_by: 7,
                created_at: 0,
            },
            "김회장".to_string(),
        );
        assert_eq!(resp.date, "2024-05-02");
        assert_eq!(resp.creator_name, "김회장");
    }
}
