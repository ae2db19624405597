//! Folder and file mutations expressed as short store-call sequences.
//!
//! The store has no rename primitive, so rename and move are a copy followed
//! by a delete. Neither sequence is transactional:
//! - rename: a failed cleanup delete still reports success, with the stale
//!   source surfaced in [`RenameOutcome::stale_source`];
//! - move: a failed delete reports [`SourceError::DeleteFailed`] with
//!   `duplicate_at` naming the copy that now also exists.

use crate::{
    config::SourceConfig,
    errors::{SourceError, SourceResult},
    services::{
        audit::{AuditSink, ManagerAction},
        object_store::{Acl, ObjectStoreClient, PutBody},
        path_model,
    },
};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a successful rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    pub new_path: String,
    /// Set when the old key could not be deleted after the copy.
    pub stale_source: Option<String>,
}

#[derive(Clone)]
pub struct MutationEngine {
    store: Arc<dyn ObjectStoreClient>,
    audit: Arc<dyn AuditSink>,
    config: Arc<SourceConfig>,
}

impl MutationEngine {
    pub fn new(
        store: Arc<dyn ObjectStoreClient>,
        audit: Arc<dyn AuditSink>,
        config: Arc<SourceConfig>,
    ) -> Self {
        Self {
            store,
            audit,
            config,
        }
    }

    /// Create a zero-length directory marker `parent_dir/name/`.
    pub async fn create_folder(&self, name: &str, parent_dir: &str) -> SourceResult<String> {
        if name.trim_matches(path_model::DELIMITER).trim().is_empty() {
            return Err(SourceError::validation("name", "folder name is required"));
        }
        let new_path = path_model::child_path(parent_dir, name, true);
        if self.store.object_exists(&new_path).await? {
            return Err(SourceError::AlreadyExists { key: new_path });
        }

        self.store
            .put_object(&new_path, PutBody::empty(), Acl::PublicRead)
            .await
            .map_err(|source| SourceError::CreateFailed {
                key: new_path.clone(),
                source,
            })?;

        info!(path = %new_path, "created folder");
        self.audit(ManagerAction::DirectoryCreate, &new_path).await;
        Ok(new_path)
    }

    /// Delete a directory marker. Objects beneath it are left in place.
    pub async fn remove_folder(&self, path: &str) -> SourceResult<()> {
        self.remove(path, ManagerAction::DirectoryRemove).await
    }

    pub async fn remove_file(&self, path: &str) -> SourceResult<()> {
        if path_model::is_directory_key(path) {
            return Err(SourceError::invalid(path, "not a file"));
        }
        self.remove(path, ManagerAction::FileRemove).await
    }

    async fn remove(&self, path: &str, action: ManagerAction) -> SourceResult<()> {
        self.ensure_exists(path).await?;
        self.store
            .delete_object(path)
            .await
            .map_err(|source| SourceError::DeleteFailed {
                key: path.to_string(),
                duplicate_at: None,
                source,
            })?;

        info!(path, %action, "removed object");
        self.audit(action, path).await;
        Ok(())
    }

    /// Rename a file within its directory via copy + best-effort delete.
    pub async fn rename_file(&self, old_path: &str, new_name: &str) -> SourceResult<RenameOutcome> {
        if path_model::is_directory_key(old_path) {
            return Err(SourceError::invalid(old_path, "folders cannot be renamed"));
        }
        self.ensure_exists(old_path).await?;
        if !path_model::is_valid_segment(new_name) {
            return Err(SourceError::validation(
                "name",
                format!("invalid file name `{}`", new_name),
            ));
        }
        let new_path = path_model::sibling_path(old_path, new_name.trim());
        if new_path == old_path {
            return Ok(RenameOutcome {
                new_path,
                stale_source: None,
            });
        }

        self.store
            .copy_object(old_path, &new_path, Acl::PublicRead)
            .await
            .map_err(|source| SourceError::RenameFailed {
                from: old_path.to_string(),
                to: new_path.clone(),
                source,
            })?;

        let stale_source = match self.store.delete_object(old_path).await {
            Ok(()) => None,
            Err(err) => {
                warn!(
                    old_path,
                    %new_path,
                    "renamed copy written but old object could not be deleted: {}",
                    err
                );
                Some(old_path.to_string())
            }
        };

        info!(old_path, %new_path, "renamed file");
        self.audit(ManagerAction::FileRename, old_path).await;
        Ok(RenameOutcome {
            new_path,
            stale_source,
        })
    }

    /// Move a file into directory `to` (or the root) via copy + delete.
    ///
    /// Both steps must be confirmed by the store; directories are never
    /// movable.
    pub async fn move_object(&self, from: &str, to: &str) -> SourceResult<String> {
        if path_model::is_directory_key(from) {
            return Err(SourceError::invalid(from, "folders cannot be moved"));
        }
        self.ensure_exists(from).await?;

        let name = path_model::basename(from);
        let destination = if path_model::is_root(to) {
            name.to_string()
        } else {
            let target_dir = path_model::normalize_dir(to);
            self.ensure_exists(&target_dir).await?;
            path_model::child_path(&target_dir, name, false)
        };
        if destination == from {
            return Ok(destination);
        }

        self.store
            .copy_object(from, &destination, Acl::PublicRead)
            .await
            .map_err(|source| SourceError::RenameFailed {
                from: from.to_string(),
                to: destination.clone(),
                source,
            })?;

        if let Err(source) = self.store.delete_object(from).await {
            warn!(from, %destination, "moved copy written but source could not be deleted: {}", source);
            return Err(SourceError::DeleteFailed {
                key: from.to_string(),
                duplicate_at: Some(destination),
                source,
            });
        }

        info!(from, %destination, "moved file");
        Ok(destination)
    }

    async fn ensure_exists(&self, key: &str) -> SourceResult<()> {
        if self.store.object_exists(key).await? {
            Ok(())
        } else {
            Err(SourceError::NotFound {
                key: key.to_string(),
            })
        }
    }

    async fn audit(&self, action: ManagerAction, path: &str) {
        let object_id = self.config.source_id.to_string();
        self.audit
            .log_manager_action(action, &object_id, path)
            .await;
    }
}
