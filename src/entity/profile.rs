//! Profile entity - 회원 프로필 테이블
//!
//! 테이블: club_profile

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 회원 역할
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 관리자
    Admin,
    /// 일반 회원
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            _ => Role::Member,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "club_profile")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 로그인 이메일 (유일)
    #[sea_orm(column_type = "String(Some(128))", unique)]
    pub email: String,

    /// 비밀번호 (bcrypt 해시)
    #[sea_orm(column_type = "String(Some(128))")]
    #[serde(skip_serializing)]
    pub password: String,

    /// 이름
    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    /// 소속 부서
    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub department: Option<String>,

    /// 직위
    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub position: Option<String>,

    /// 역할: admin | member
    #[sea_orm(column_type = "String(Some(16))")]
    pub role: String,

    /// 가입 시각 (Unix 타임스탬프)
    pub created_at: i64,

    /// 수정 시각 (Unix 타임스탬프)
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn role(&self) -> Role {
        Role::from(self.role.as_str())
    }
}

/// 회원 응답 (비밀번호 제외)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub role: Role,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl From<Model> for ProfileResponse {
    fn from(model: Model) -> Self {
        let role = model.role();
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            department: model.department,
            position: model.position,
            role,
            created_at: model.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_falls_back_to_member() {
        assert_eq!(Role::from("admin"), Role::Admin);
        assert_eq!(Role::from("member"), Role::Member);
        assert_eq!(Role::from("superuser"), Role::Member);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
