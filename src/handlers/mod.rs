//! HTTP handlers and the state they share.

use crate::{
    config::SourceConfig,
    services::{media_source::MediaSource, sqlite_store::SqliteObjectStore},
};
use std::sync::Arc;

pub mod browser_handlers;
pub mod health_handlers;
pub mod object_handlers;

/// Shared router state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// The media source the browser endpoints operate on.
    pub source: Arc<dyn MediaSource>,
    /// Direct store handle for public downloads and readiness checks.
    pub objects: SqliteObjectStore,
    pub config: Arc<SourceConfig>,
}
