//! Comment entity - 댓글 테이블
//!
//! 테이블: club_comment

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "club_comment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 게시글 ID
    pub post_id: i64,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// 작성자 프로필 ID
    pub author_id: i64,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
