use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::handlers::audit::service::AuditLog;
use crate::storage::ObjectStorage;

/// Capacity of the pending operation log queue
const AUDIT_QUEUE_CAPACITY: usize = 200;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (None until setup has run, can be set at runtime)
    pub db: Arc<RwLock<Option<DatabaseConnection>>>,
    /// Application configuration
    pub config: Arc<Config>,
    /// Attachment storage
    pub storage: ObjectStorage,
    /// Operation log writer
    pub audit: AuditLog,
}

impl AppState {
    /// Create new application state
    pub fn new(db: Option<DatabaseConnection>, config: Config) -> Self {
        let audit = AuditLog::new(AUDIT_QUEUE_CAPACITY);
        if let Some(db) = &db {
            audit.attach(db.clone());
        }

        Self {
            db: Arc::new(RwLock::new(db)),
            storage: ObjectStorage::new(&config.storage),
            config: Arc::new(config),
            audit,
        }
    }

    /// Whether setup has finished. The marker file is checked on every call
    /// since setup creates it at runtime.
    pub fn is_initialized(&self) -> bool {
        self.config.inited_path.exists()
    }

    /// Get database connection, returns None if not initialized
    pub async fn get_db(&self) -> Option<DatabaseConnection> {
        self.db.read().await.clone()
    }

    /// Set database connection (used during setup)
    pub async fn set_db(&self, db: DatabaseConnection) {
        self.audit.attach(db.clone());
        *self.db.write().await = Some(db);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_state_has_no_database() {
        let state = AppState::new(None, Config::default());
        assert!(state.get_db().await.is_none());
        assert!(!state.is_initialized());
        assert_eq!(state.storage.public_url("files", "1/a.txt"), "/storage/files/1/a.txt");
    }
}
