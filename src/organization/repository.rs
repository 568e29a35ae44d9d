//! Organization persistence boundary
//!
//! The service layer only sees [`OrganizationRepository`]; handlers build the
//! sea-orm implementation from the request's connection.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use serde::Serialize;
use std::collections::HashMap;

use super::hierarchy::{MemberSummary, OrganizationEntry};
use crate::entity::{organization, profile};
use crate::entity::profile::Role;

/// Name shown when the occupant's profile no longer exists
const UNKNOWN_MEMBER: &str = "(탈퇴한 회원)";

/// Club member as listed next to the chart
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub role: Role,
}

impl From<profile::Model> for Member {
    fn from(m: profile::Model) -> Self {
        let role = m.role();
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            department: m.department,
            position: m.position,
            role,
        }
    }
}

/// Fields of a position to be created
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPosition {
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub position: String,
    pub order: i32,
}

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// All positions joined with their occupant, ordered by `order`
    async fn list_entries(&self) -> Result<Vec<OrganizationEntry>, DbErr>;

    async fn find_entry(&self, id: i64) -> Result<Option<OrganizationEntry>, DbErr>;

    /// Returns the new entry id, or `None` when the member already holds a
    /// position
    async fn insert_entry(&self, new: NewPosition) -> Result<Option<i64>, DbErr>;

    /// Returns whether a row was removed
    async fn delete_entry(&self, id: i64) -> Result<bool, DbErr>;

    /// All members ordered by name
    async fn list_members(&self) -> Result<Vec<Member>, DbErr>;

    async fn find_member(&self, id: i64) -> Result<Option<Member>, DbErr>;
}

pub struct SeaOrmOrganizationRepository {
    db: DatabaseConnection,
}

impl SeaOrmOrganizationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_entry(row: organization::Model, occupant: Option<&profile::Model>) -> OrganizationEntry {
    let member = match occupant {
        Some(p) => MemberSummary {
            name: p.name.clone(),
            department: p.department.clone(),
            title: p.position.clone(),
        },
        None => MemberSummary {
            name: UNKNOWN_MEMBER.to_string(),
            department: None,
            title: None,
        },
    };
    OrganizationEntry {
        id: row.id,
        user_id: row.user_id,
        parent_id: row.parent_id,
        position: row.position,
        order: row.order,
        member,
    }
}

#[async_trait]
impl OrganizationRepository for SeaOrmOrganizationRepository {
    async fn list_entries(&self) -> Result<Vec<OrganizationEntry>, DbErr> {
        let rows = organization::Entity::find()
            .order_by_asc(organization::Column::Order)
            .order_by_asc(organization::Column::Id)
            .all(&self.db)
            .await?;

        let user_ids: Vec<i64> = rows.iter().map(|r| r.user_id).collect();
        let profiles: HashMap<i64, profile::Model> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            profile::Entity::find()
                .filter(profile::Column::Id.is_in(user_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|row| {
                let occupant = profiles.get(&row.user_id);
                to_entry(row, occupant)
            })
            .collect())
    }

    async fn find_entry(&self, id: i64) -> Result<Option<OrganizationEntry>, DbErr> {
        let Some(row) = organization::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        let occupant = profile::Entity::find_by_id(row.user_id).one(&self.db).await?;
        Ok(Some(to_entry(row, occupant.as_ref())))
    }

    async fn insert_entry(&self, new: NewPosition) -> Result<Option<i64>, DbErr> {
        let row = organization::ActiveModel {
            user_id: Set(new.user_id),
            parent_id: Set(new.parent_id),
            position: Set(new.position),
            order: Set(new.order),
            created_at: Set(chrono::Utc::now().timestamp()),
            ..Default::default()
        };
        match row.insert(&self.db).await {
            Ok(inserted) => Ok(Some(inserted.id)),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_entry(&self, id: i64) -> Result<bool, DbErr> {
        let res = organization::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(res.rows_affected > 0)
    }

    async fn list_members(&self) -> Result<Vec<Member>, DbErr> {
        let members = profile::Entity::find()
            .order_by_asc(profile::Column::Name)
            .all(&self.db)
            .await?;
        Ok(members.into_iter().map(Member::from).collect())
    }

    async fn find_member(&self, id: i64) -> Result<Option<Member>, DbErr> {
        Ok(profile::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Member::from))
    }
}
