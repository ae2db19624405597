//! Batch uploads into a directory of the store.
//!
//! A batch never fails as a whole: each rejected or failed file adds one
//! `path` error to the report and the loop moves on.

use crate::{
    config::SourceConfig,
    errors::FieldError,
    models::upload::{UploadReport, UploadedFile},
    services::{
        audit::{AuditSink, ManagerAction},
        object_store::{Acl, ObjectStoreClient},
        path_model,
    },
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct UploadEngine {
    store: Arc<dyn ObjectStoreClient>,
    audit: Arc<dyn AuditSink>,
    config: Arc<SourceConfig>,
    allowed: Vec<String>,
}

impl UploadEngine {
    pub fn new(
        store: Arc<dyn ObjectStoreClient>,
        audit: Arc<dyn AuditSink>,
        config: Arc<SourceConfig>,
    ) -> Self {
        let allowed = merged_allow_list(&config);
        Self {
            store,
            audit,
            config,
            allowed,
        }
    }

    pub async fn upload(&self, target_dir: &str, files: Vec<UploadedFile>) -> UploadReport {
        let directory = path_model::normalize_dir(target_dir);
        let mut report = UploadReport {
            directory: directory.clone(),
            ..UploadReport::default()
        };
        let max_size = self.config.upload.max_size_bytes;

        for file in files {
            if file.error.is_some() || file.name.trim().is_empty() {
                continue;
            }
            let name = path_model::basename(&file.name).to_string();
            let ext = path_model::extension(&name, false);
            if ext.is_empty() || !self.allowed.contains(&ext) {
                report.errors.push(FieldError::new(
                    "path",
                    format!("file extension `{}` is not allowed: {}", ext, name),
                ));
                continue;
            }
            if file.size_bytes > max_size {
                report.errors.push(FieldError::new(
                    "path",
                    format!(
                        "file {} is too large ({} bytes, {} allowed)",
                        name, file.size_bytes, max_size
                    ),
                ));
                continue;
            }

            let key = path_model::child_path(&directory, &name, false);
            match self
                .store
                .put_object(&key, file.into_body(), Acl::PublicRead)
                .await
            {
                Ok(()) => report.uploaded.push(key),
                Err(err) => {
                    warn!(%key, "upload failed: {}", err);
                    report
                        .errors
                        .push(FieldError::new("path", format!("upload failed: {}", name)));
                }
            }
        }

        info!(
            directory = %report.directory,
            uploaded = report.uploaded.len(),
            rejected = report.errors.len(),
            "upload batch finished"
        );
        self.audit
            .log_manager_action(
                ManagerAction::FileUpload,
                &self.config.source_id.to_string(),
                &report.directory,
            )
            .await;
        report
    }
}

/// Union of the general, image, media and flash lists, lowercased and
/// deduplicated in first-seen order.
fn merged_allow_list(config: &SourceConfig) -> Vec<String> {
    let policy = &config.upload;
    let mut allowed: Vec<String> = Vec::new();
    for ext in policy
        .images
        .iter()
        .chain(&policy.media)
        .chain(&policy.flash)
        .chain(&policy.files)
    {
        let ext = ext.trim().to_ascii_lowercase();
        if !ext.is_empty() && !allowed.contains(&ext) {
            allowed.push(ext);
        }
    }
    allowed
}
