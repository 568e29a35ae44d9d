//! Attachment entity - 첨부파일 테이블
//!
//! 테이블: club_attachment

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "club_attachment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 게시글 ID (게시글 없이 올린 파일은 NULL)
    #[sea_orm(nullable)]
    pub post_id: Option<i64>,

    /// 원본 파일명
    #[sea_orm(column_type = "String(Some(255))")]
    pub file_name: String,

    /// 저장 버킷 (photos | files)
    #[sea_orm(column_type = "String(Some(32))")]
    pub bucket: String,

    /// 버킷 내 객체 키
    #[sea_orm(column_type = "String(Some(255))")]
    pub object_key: String,

    /// 공개 URL
    #[sea_orm(column_type = "String(Some(512))")]
    pub file_url: String,

    /// MIME 타입
    #[sea_orm(column_type = "String(Some(128))")]
    pub file_type: String,

    /// 파일 크기 (bytes)
    pub size: i64,

    /// 업로드한 프로필 ID
    pub uploaded_by: i64,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
