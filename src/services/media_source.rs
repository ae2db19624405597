//! The backend-neutral media source contract and its object-store variant.

use crate::{
    config::SourceConfig,
    errors::SourceResult,
    models::{
        entry::{FileEntry, Listing},
        upload::{UploadReport, UploadedFile},
    },
    services::{
        audit::AuditSink,
        listing::{ListingEngine, RequestContext},
        mutation::{MutationEngine, RenameOutcome},
        object_store::ObjectStoreClient,
        thumbnail::{ImageProbe, ThumbnailResolver},
        upload::UploadEngine,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// What the manager UI can do with any media source, whatever stores it.
#[async_trait]
pub trait MediaSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn type_description(&self) -> &'static str;

    /// Tree view of one directory.
    async fn list_directory(&self, dir: &str, ctx: &RequestContext) -> SourceResult<Listing>;

    /// Grid view of the files in one directory.
    async fn files_in_directory(
        &self,
        dir: &str,
        ctx: &RequestContext,
    ) -> SourceResult<Vec<FileEntry>>;

    /// Returns the key of the new folder.
    async fn create_folder(&self, name: &str, parent: &str) -> SourceResult<String>;

    async fn remove_folder(&self, path: &str) -> SourceResult<()>;

    async fn remove_file(&self, path: &str) -> SourceResult<()>;

    async fn rename_file(&self, old_path: &str, new_name: &str) -> SourceResult<RenameOutcome>;

    /// Returns the destination key.
    async fn move_object(&self, from: &str, to: &str) -> SourceResult<String>;

    async fn upload_to_folder(&self, dir: &str, files: Vec<UploadedFile>) -> UploadReport;

    /// Absolute URL usable as a thumbnail renderer source.
    fn prepare_src_for_thumb(&self, src: &str) -> String;
}

/// A media source backed by a prefix-keyed object store bucket.
#[derive(Clone)]
pub struct ObjectStoreSource {
    listing: ListingEngine,
    mutations: MutationEngine,
    uploads: UploadEngine,
    thumbnails: ThumbnailResolver,
}

impl ObjectStoreSource {
    pub fn new(
        store: Arc<dyn ObjectStoreClient>,
        audit: Arc<dyn AuditSink>,
        probe: Arc<dyn ImageProbe>,
        config: SourceConfig,
    ) -> Self {
        let config = Arc::new(config);
        let thumbnails = ThumbnailResolver::new(config.clone(), probe);
        Self {
            listing: ListingEngine::new(store.clone(), config.clone(), thumbnails.clone()),
            mutations: MutationEngine::new(store.clone(), audit.clone(), config.clone()),
            uploads: UploadEngine::new(store, audit, config),
            thumbnails,
        }
    }
}

#[async_trait]
impl MediaSource for ObjectStoreSource {
    fn type_name(&self) -> &'static str {
        "Object Store"
    }

    fn type_description(&self) -> &'static str {
        "Browse, upload and manage files kept in an object storage bucket."
    }

    async fn list_directory(&self, dir: &str, ctx: &RequestContext) -> SourceResult<Listing> {
        self.listing.list(dir, ctx).await
    }

    async fn files_in_directory(
        &self,
        dir: &str,
        ctx: &RequestContext,
    ) -> SourceResult<Vec<FileEntry>> {
        self.listing.files_in_directory(dir, ctx).await
    }

    async fn create_folder(&self, name: &str, parent: &str) -> SourceResult<String> {
        self.mutations.create_folder(name, parent).await
    }

    async fn remove_folder(&self, path: &str) -> SourceResult<()> {
        self.mutations.remove_folder(path).await
    }

    async fn remove_file(&self, path: &str) -> SourceResult<()> {
        self.mutations.remove_file(path).await
    }

    async fn rename_file(&self, old_path: &str, new_name: &str) -> SourceResult<RenameOutcome> {
        self.mutations.rename_file(old_path, new_name).await
    }

    async fn move_object(&self, from: &str, to: &str) -> SourceResult<String> {
        self.mutations.move_object(from, to).await
    }

    async fn upload_to_folder(&self, dir: &str, files: Vec<UploadedFile>) -> UploadReport {
        self.uploads.upload(dir, files).await
    }

    fn prepare_src_for_thumb(&self, src: &str) -> String {
        self.thumbnails.prepare_src_for_thumb(src)
    }
}
