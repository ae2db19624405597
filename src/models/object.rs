//! Represents an object stored in a bucket of the local store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata row for a single object (blob or directory marker).
///
/// The payload bytes live on disk; this record only describes them.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredObject {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Bucket the object belongs to.
    pub bucket: String,

    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Size in bytes. Directory markers are always 0.
    pub size_bytes: i64,

    /// Hex MD5 of the payload.
    pub etag: String,

    /// Canned ACL (`private` or `public-read`).
    pub acl: String,

    /// Timestamp when object was last written.
    pub last_modified: DateTime<Utc>,
}
