//! One-level directory listings over a prefix-keyed store.
//!
//! The store is asked for the directory prefix grouped at the delimiter; its
//! common prefixes and direct objects are merged into one candidate set,
//! which is then filtered down to immediate children only. Nothing is cached.

use crate::{
    config::SourceConfig,
    errors::{SourceError, SourceResult},
    models::{
        entry::{DirectoryEntry, Entry, FileEntry, Listing},
        menu::{self, Permissions},
    },
    services::{
        object_store::{ObjectStoreClient, ObjectSummary},
        path_model::{self, DELIMITER},
        thumbnail::ThumbnailResolver,
    },
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

/// Who is asking: permissions decide menus, the token is forwarded to the
/// thumbnail renderer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub permissions: Permissions,
    pub auth_token: String,
}

impl RequestContext {
    pub fn new(permissions: Permissions, auth_token: impl Into<String>) -> Self {
        Self {
            permissions,
            auth_token: auth_token.into(),
        }
    }
}

/// An immediate child of the listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    key: String,
    size_bytes: Option<u64>,
}

#[derive(Clone)]
pub struct ListingEngine {
    store: Arc<dyn ObjectStoreClient>,
    config: Arc<SourceConfig>,
    thumbnails: ThumbnailResolver,
}

impl ListingEngine {
    pub fn new(
        store: Arc<dyn ObjectStoreClient>,
        config: Arc<SourceConfig>,
        thumbnails: ThumbnailResolver,
    ) -> Self {
        Self {
            store,
            config,
            thumbnails,
        }
    }

    /// Tree view: directories (by key) followed by files (by key).
    pub async fn list(&self, directory: &str, ctx: &RequestContext) -> SourceResult<Listing> {
        let candidates = self.candidates(directory).await?;

        let mut directories = BTreeMap::new();
        let mut files = BTreeMap::new();
        for candidate in candidates {
            let key = candidate.key;
            let extension = self.extension(&key);
            let display_name = path_model::basename(&key).to_string();
            let cls = format!("icon-{}", extension);
            if path_model::is_directory_key(&key) {
                let entry = DirectoryEntry {
                    id: key.clone(),
                    display_name,
                    cls,
                    leaf: false,
                    path: key.clone(),
                    menu: menu::directory_menu(&ctx.permissions),
                };
                directories.insert(key, Entry::Directory(entry));
            } else {
                let entry = FileEntry {
                    id: key.clone(),
                    display_name,
                    cls,
                    leaf: true,
                    path: key.clone(),
                    public_url: self.thumbnails.public_url(&key),
                    extension,
                    size_bytes: candidate.size_bytes.unwrap_or(0),
                    thumbnail_url: None,
                    preview_url: None,
                    thumb_width: None,
                    thumb_height: None,
                    menu: menu::file_menu(&ctx.permissions),
                };
                files.insert(key, Entry::File(entry));
            }
        }

        Ok(directories.into_values().chain(files.into_values()).collect())
    }

    /// Grid view: files only, each with thumbnail and preview URLs.
    ///
    /// Honors `allowed_file_types` when configured.
    pub async fn files_in_directory(
        &self,
        directory: &str,
        ctx: &RequestContext,
    ) -> SourceResult<Vec<FileEntry>> {
        let candidates = self.candidates(directory).await?;

        let mut files = Vec::new();
        for candidate in candidates
            .into_iter()
            .filter(|c| !path_model::is_directory_key(&c.key))
        {
            let key = candidate.key;
            let extension = self.extension(&key);
            if !self.config.allowed_file_types.is_empty()
                && !self
                    .config
                    .allowed_file_types
                    .iter()
                    .any(|allowed| allowed.to_lowercase() == extension)
            {
                continue;
            }

            let thumb = self
                .thumbnails
                .resolve(&key, &extension, &ctx.auth_token)
                .await;
            let is_image = thumb.preview_url.is_some();
            files.push(FileEntry {
                id: key.clone(),
                display_name: path_model::basename(&key).to_string(),
                cls: format!("icon-{}", extension),
                leaf: true,
                path: key.clone(),
                public_url: self.thumbnails.public_url(&key),
                extension,
                size_bytes: candidate.size_bytes.unwrap_or(0),
                thumbnail_url: Some(thumb.thumbnail_url),
                preview_url: thumb.preview_url,
                thumb_width: (!is_image).then_some(thumb.thumb_size.width),
                thumb_height: (!is_image).then_some(thumb.thumb_size.height),
                menu: menu::grid_file_menu(&ctx.permissions),
            });
        }
        files.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(files)
    }

    /// Immediate children of `directory`, with skip-listed names removed.
    async fn candidates(&self, directory: &str) -> SourceResult<Vec<Candidate>> {
        let prefix = path_model::normalize_dir(directory);
        let delimiter = DELIMITER.to_string();
        let listing = self
            .store
            .list_objects(&prefix, Some(&delimiter))
            .await
            .map_err(|source| SourceError::ListingFailed {
                directory: directory.to_string(),
                source,
            })?;

        let merged = listing
            .common_prefixes
            .into_iter()
            .map(ObjectSummary::new)
            .chain(listing.objects);

        let mut candidates = Vec::new();
        for summary in merged {
            let key = summary.key;
            if key.is_empty() || key == prefix || key == "/" {
                continue;
            }
            let Some(depth) = path_model::relative_depth(&prefix, &key) else {
                debug!(%key, %prefix, "store returned key outside listed prefix");
                continue;
            };
            let is_dir = path_model::is_directory_key(&key);
            if (is_dir && depth > 1) || (!is_dir && depth > 0) {
                debug!(%key, depth, "dropping nested key from listing");
                continue;
            }
            if self.is_skipped(path_model::basename(&key)) {
                continue;
            }
            candidates.push(Candidate {
                key,
                size_bytes: summary.size_bytes,
            });
        }
        Ok(candidates)
    }

    fn is_skipped(&self, name: &str) -> bool {
        name == "." || name == ".." || self.config.skip_files.iter().any(|skip| skip == name)
    }

    fn extension(&self, key: &str) -> String {
        path_model::extension(key, self.config.use_multibyte)
    }
}
