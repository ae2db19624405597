//! The capability surface this crate needs from an object store.
//!
//! A client is bound to one bucket for the lifetime of a source session, so
//! none of the calls take a bucket argument. `Ok` is the store's confirmation
//! that a request succeeded; anything else is a [`StoreError`].

use async_trait::async_trait;
use bytes::Bytes;
use std::{fmt, io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error("store rejected `{op}` on `{key}`")]
    Rejected { op: &'static str, key: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Canned access policy applied to written objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acl {
    Private,
    PublicRead,
}

impl Acl {
    pub fn as_str(self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
        }
    }

    pub fn parse(value: &str) -> Self {
        if value == Acl::PublicRead.as_str() {
            Acl::PublicRead
        } else {
            Acl::Private
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload handed to [`ObjectStoreClient::put_object`].
#[derive(Debug, Clone)]
pub enum PutBody {
    Bytes(Bytes),
    File(PathBuf),
}

impl PutBody {
    pub fn empty() -> Self {
        PutBody::Bytes(Bytes::new())
    }
}

/// One object returned by a listing. Size is only present when the store
/// reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size_bytes: Option<u64>,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size_bytes: None,
        }
    }
}

/// Result of a delimiter-grouped listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    /// Sub-prefixes up to and including the next delimiter.
    pub common_prefixes: Vec<String>,
    /// Objects directly under the prefix.
    pub objects: Vec<ObjectSummary>,
}

#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// List keys starting with `prefix`. With a delimiter, keys containing it
    /// after the prefix are folded into `common_prefixes`.
    async fn list_objects(&self, prefix: &str, delimiter: Option<&str>)
    -> StoreResult<ObjectListing>;

    async fn object_exists(&self, key: &str) -> StoreResult<bool>;

    async fn put_object(&self, key: &str, body: PutBody, acl: Acl) -> StoreResult<()>;

    async fn delete_object(&self, key: &str) -> StoreResult<()>;

    async fn copy_object(&self, src_key: &str, dst_key: &str, acl: Acl) -> StoreResult<()>;
}
