//! Organization entity - 조직도 직책 테이블
//!
//! 테이블: club_organization

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "club_organization")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 담당자 프로필 ID (회원당 직책 하나)
    #[sea_orm(unique)]
    pub user_id: i64,

    /// 상위 직책 ID (NULL 이면 최상위)
    #[sea_orm(nullable)]
    pub parent_id: Option<i64>,

    /// 직책명 (회장, 부회장, 총무 등)
    #[sea_orm(column_type = "String(Some(64))")]
    pub position: String,

    /// 형제 간 표시 순서 (낮을수록 위)
    #[sea_orm(column_name = "sort_order")]
    pub order: i32,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
