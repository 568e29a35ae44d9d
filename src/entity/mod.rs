//! Entity module - SeaORM 엔티티 정의
//!
//! 모든 테이블에 대응하는 모델

pub mod attachment;
pub mod comment;
pub mod event;
pub mod op_log;
pub mod organization;
pub mod post;
pub mod profile;
