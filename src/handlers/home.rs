//! Landing page handler
//!
//! Fans out the three independent reads and joins them.

use axum::{extract::State, Extension, Json};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;

use crate::entity::post::{self, Category};
use crate::entity::{event, profile};
use crate::error::AppResult;
use crate::handlers::event::EventResponse;
use crate::handlers::profile::{name_of, names_by_id};
use crate::middleware::DbConn;
use crate::state::AppState;

const RECENT_POSTS: u64 = 3;
const NEWEST_MEMBERS: u64 = 3;

#[derive(Debug, Serialize)]
pub struct RecentPost {
    pub id: i64,
    pub title: String,
    pub category: String,
    #[serde(rename = "categoryName")]
    pub category_name: &'static str,
    #[serde(rename = "authorName")]
    pub author_name: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
pub struct NewMember {
    pub id: i64,
    pub name: String,
    pub department: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
pub struct HomePage {
    #[serde(rename = "siteName")]
    pub site_name: String,
    pub tagline: String,
    #[serde(rename = "recentPosts")]
    pub recent_posts: Vec<RecentPost>,
    #[serde(rename = "nextEvent")]
    pub next_event: Option<EventResponse>,
    #[serde(rename = "newMembers")]
    pub new_members: Vec<NewMember>,
    /// Nothing to show yet
    pub empty: bool,
}

async fn recent_posts(db: &DatabaseConnection) -> Result<Vec<RecentPost>, DbErr> {
    let posts = post::Entity::find()
        .order_by_desc(post::Column::CreatedAt)
        .order_by_desc(post::Column::Id)
        .limit(RECENT_POSTS)
        .all(db)
        .await?;
    let names = names_by_id(db, posts.iter().map(|p| p.author_id)).await?;

    Ok(posts
        .into_iter()
        .map(|p| RecentPost {
            category_name: Category::parse(&p.category)
                .map(|c| c.display_name())
                .unwrap_or(""),
            author_name: name_of(&names, p.author_id),
            id: p.id,
            title: p.title,
            category: p.category,
            created_at: p.created_at,
        })
        .collect())
}

async fn next_event(db: &DatabaseConnection) -> Result<Option<EventResponse>, DbErr> {
    let today = chrono::Local::now().date_naive();
    let Some(next) = event::Entity::find()
        .filter(event::Column::Date.gte(today))
        .order_by_asc(event::Column::Date)
        .order_by_asc(event::Column::Id)
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let names = names_by_id(db, [next.created_by]).await?;
    let creator = name_of(&names, next.created_by);
    Ok(Some(EventResponse::new(next, creator)))
}

async fn new_members(db: &DatabaseConnection) -> Result<Vec<NewMember>, DbErr> {
    Ok(profile::Entity::find()
        .order_by_desc(profile::Column::CreatedAt)
        .order_by_desc(profile::Column::Id)
        .limit(NEWEST_MEMBERS)
        .all(db)
        .await?
        .into_iter()
        .map(|m| NewMember {
            id: m.id,
            name: m.name,
            department: m.department,
            created_at: m.created_at,
        })
        .collect())
}

/// GET /api/home
pub async fn home(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
) -> AppResult<Json<HomePage>> {
    let (recent_posts, next_event, new_members) =
        tokio::try_join!(recent_posts(&db), next_event(&db), new_members(&db))?;

    let empty = recent_posts.is_empty() && next_event.is_none() && new_members.is_empty();

    Ok(Json(HomePage {
        site_name: state.config.site.name.clone(),
        tagline: state.config.site.tagline.clone(),
        recent_posts,
        next_event,
        new_members,
        empty,
    }))
}
