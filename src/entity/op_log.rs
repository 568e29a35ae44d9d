//! OpLog entity - 작업 로그 테이블
//!
//! 테이블: club_op_log

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 작업 종류
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    Signup,
    Login,
    Logout,
    ChangePassword,
    UpdateProfile,
    PromoteAdmin,
    CreatePost,
    UpdatePost,
    DeletePost,
    CreateComment,
    DeleteComment,
    UploadFile,
    CreateEvent,
    DeleteEvent,
    AddPosition,
    DeletePosition,
}

impl OpType {
    /// 화면 표시 이름
    pub fn label(&self) -> &'static str {
        match self {
            OpType::Signup => "회원가입",
            OpType::Login => "로그인",
            OpType::Logout => "로그아웃",
            OpType::ChangePassword => "비밀번호 변경",
            OpType::UpdateProfile => "프로필 수정",
            OpType::PromoteAdmin => "관리자 지정",
            OpType::CreatePost => "게시글 작성",
            OpType::UpdatePost => "게시글 수정",
            OpType::DeletePost => "게시글 삭제",
            OpType::CreateComment => "댓글 작성",
            OpType::DeleteComment => "댓글 삭제",
            OpType::UploadFile => "파일 업로드",
            OpType::CreateEvent => "일정 추가",
            OpType::DeleteEvent => "일정 삭제",
            OpType::AddPosition => "직책 추가",
            OpType::DeletePosition => "직책 삭제",
        }
    }
}

/// 작업 결과
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpResult {
    Success,
    Failed,
}

impl OpResult {
    pub fn label(&self) -> &'static str {
        match self {
            OpResult::Success => "성공",
            OpResult::Failed => "실패",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "club_op_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 작업 시각 (Unix 타임스탬프)
    pub op_time: i64,

    /// 작업자 (이메일)
    #[sea_orm(column_type = "String(Some(128))")]
    pub username: String,

    #[sea_orm(column_type = "String(Some(32))")]
    pub op_type: String,

    #[sea_orm(column_type = "Text")]
    pub op_desc: String,

    #[sea_orm(column_type = "String(Some(16))")]
    pub result: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
