//! Studyclub - community site for an in-company study club
//!
//! Board, comments, attachments, event calendar, member directory and the
//! club's organization chart, served as a JSON API.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod organization;
pub mod routes;
pub mod state;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
