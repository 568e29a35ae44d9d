//! Post entity - 게시글 테이블
//!
//! 테이블: club_post

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 게시판 분류
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// 공지사항 (관리자만 작성)
    Notice,
    /// 학습자료
    Study,
    /// 자유게시판
    Free,
    /// 사진 게시판
    Photo,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Notice,
        Category::Study,
        Category::Free,
        Category::Photo,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "notice" => Some(Category::Notice),
            "study" => Some(Category::Study),
            "free" => Some(Category::Free),
            "photo" => Some(Category::Photo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Notice => "notice",
            Category::Study => "study",
            Category::Free => "free",
            Category::Photo => "photo",
        }
    }

    /// 화면 표시 이름
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Notice => "공지사항",
            Category::Study => "학습자료",
            Category::Free => "자유게시판",
            Category::Photo => "사진 게시판",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Category::Notice => "동아리의 중요한 공지사항을 확인하세요",
            Category::Study => "AI 학습 자료와 발표 PPT를 공유합니다",
            Category::Free => "자유롭게 의견을 나누고 소통하세요",
            Category::Photo => "동아리 활동 사진을 공유합니다",
        }
    }

    pub fn admin_only(&self) -> bool {
        matches!(self, Category::Notice)
    }

    /// 첨부파일 저장 버킷
    pub fn bucket(&self) -> &'static str {
        match self {
            Category::Photo => "photos",
            _ => "files",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "club_post")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 제목
    #[sea_orm(column_type = "String(Some(200))")]
    pub title: String,

    /// 본문
    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// 분류: notice | study | free | photo
    #[sea_orm(column_type = "String(Some(16))")]
    pub category: String,

    /// 작성자 프로필 ID
    pub author_id: i64,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_round_trips_known_names() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("qna"), None);
    }

    #[test]
    fn only_notice_is_admin_only() {
        assert!(Category::Notice.admin_only());
        assert!(!Category::Free.admin_only());
    }

    #[test]
    fn photo_posts_use_photo_bucket() {
        assert_eq!(Category::Photo.bucket(), "photos");
        assert_eq!(Category::Study.bucket(), "files");
    }
}
