//! Manager-action audit trail for successful mutations.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::{fmt, sync::Arc};
use tracing::warn;
use uuid::Uuid;

/// Actions recorded in the manager log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerAction {
    DirectoryCreate,
    DirectoryRemove,
    FileRemove,
    FileRename,
    FileUpload,
}

impl ManagerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ManagerAction::DirectoryCreate => "directory_create",
            ManagerAction::DirectoryRemove => "directory_remove",
            ManagerAction::FileRemove => "file_remove",
            ManagerAction::FileRename => "file_rename",
            ManagerAction::FileUpload => "file_upload",
        }
    }
}

impl fmt::Display for ManagerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives one call per successful mutating operation. Sinks swallow their
/// own failures; auditing never fails the operation being audited.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log_manager_action(&self, action: ManagerAction, object_id: &str, path: &str);
}

/// Persists manager actions into the `manager_log` table.
#[derive(Clone)]
pub struct SqliteAuditLog {
    db: Arc<SqlitePool>,
}

impl SqliteAuditLog {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for SqliteAuditLog {
    async fn log_manager_action(&self, action: ManagerAction, object_id: &str, path: &str) {
        let result = sqlx::query(
            "INSERT INTO manager_log (id, action, object_id, path, occurred_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(action.as_str())
        .bind(object_id)
        .bind(path)
        .bind(Utc::now())
        .execute(&*self.db)
        .await;

        if let Err(err) = result {
            warn!(%action, path, "failed to record manager action: {}", err);
        }
    }
}
