//! Organization chart: hierarchy building, rendering and persistence

pub mod hierarchy;
pub mod render;
pub mod repository;
pub mod service;

pub use hierarchy::{build_forest, diagnose, ForestNode, HierarchyError, OrganizationEntry};
pub use repository::{OrganizationRepository, SeaOrmOrganizationRepository};
