//! Request handlers module

use serde::Deserialize;

pub mod attachment;
pub mod audit;
pub mod auth;
pub mod board;
pub mod comment;
pub mod config;
pub mod event;
pub mod home;
pub mod organization;
pub mod profile;
pub mod setup;

/// `?id=` query used by the delete endpoints
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: i64,
}
