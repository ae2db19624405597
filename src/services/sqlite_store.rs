//! src/services/sqlite_store.rs
//!
//! SqliteObjectStore: a bucket-scoped object store backed by SQLite for
//! metadata and local disk for payloads. Payloads are sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{md5(bucket/key)}` so that directory
//! markers (keys ending in `/`) and nested keys map to plain files.

use crate::{
    config::Credentials,
    models::object::StoredObject,
    services::object_store::{
        Acl, ObjectListing, ObjectStoreClient, ObjectSummary, PutBody, StoreError, StoreResult,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    collections::BTreeSet,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

/// Schema applied by `--migrate` (and by tests).
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Connection settings handed to [`SqliteObjectStore::connect`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub bucket: String,
    pub base_path: PathBuf,
    pub credentials: Credentials,
}

/// Object store session bound to one bucket.
///
/// Cheap to clone; every clone shares the pool.
#[derive(Clone)]
pub struct SqliteObjectStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    bucket: String,
}

/// Apply [`SCHEMA`] statement by statement.
pub async fn apply_schema(db: &SqlitePool) -> sqlx::Result<()> {
    let statements = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}

impl SqliteObjectStore {
    /// Open a session on `config.bucket`, validating the bucket name and
    /// creating its payload directory.
    pub async fn connect(db: Arc<SqlitePool>, config: StoreConfig) -> StoreResult<Self> {
        ensure_bucket_name_safe(&config.bucket)?;
        let store = Self {
            db,
            base_path: config.base_path,
            bucket: config.bucket,
        };
        fs::create_dir_all(store.bucket_root()).await?;
        debug!(
            bucket = %store.bucket,
            authenticated = !config.credentials.key.is_empty()
                && !config.credentials.secret_key.is_empty(),
            "object store session opened"
        );
        Ok(store)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    fn ensure_key_safe(key: &str) -> StoreResult<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.starts_with('/')
            || key.split('/').any(|segment| segment == "..")
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
        if invalid {
            return Err(StoreError::InvalidObjectKey(key.to_string()));
        }
        Ok(())
    }

    fn bucket_root(&self) -> PathBuf {
        self.base_path.join(&self.bucket)
    }

    /// Construct a fully-qualified object payload path.
    ///
    /// Combines base_path/bucket/{shard}/{shard}/{digest}, where the shards
    /// are the first two bytes of MD5(bucket/key). Parent directories may not
    /// exist yet.
    fn object_path(&self, key: &str) -> PathBuf {
        let digest = md5::compute(format!("{}/{}", self.bucket, key));
        let mut path = self.bucket_root();
        path.push(format!("{:02x}", digest[0]));
        path.push(format!("{:02x}", digest[1]));
        path.push(format!("{:x}", digest));
        path
    }

    async fn fetch_object(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        let object = sqlx::query_as::<_, StoredObject>(
            "SELECT id, bucket, key, size_bytes, etag, acl, last_modified
             FROM objects WHERE bucket = ? AND key = ?",
        )
        .bind(&self.bucket)
        .bind(key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(object)
    }

    /// Stream bytes into a temp file next to the final payload path, fsync,
    /// and rename into place. Returns size and hex MD5.
    async fn write_payload<S>(&self, key: &str, stream: S) -> StoreResult<(i64, String)>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StoreError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }

        Ok((size_bytes, format!("{:x}", digest.compute())))
    }

    /// Upsert the metadata row (S3-like overwrite semantics).
    async fn upsert_row(&self, key: &str, size_bytes: i64, etag: &str, acl: Acl) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO objects (id, bucket, key, size_bytes, etag, acl, last_modified)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket, key) DO UPDATE SET
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                acl = excluded.acl,
                last_modified = excluded.last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&self.bucket)
        .bind(key)
        .bind(size_bytes)
        .bind(etag)
        .bind(acl.as_str())
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    /// Open a `public-read` object for streaming out.
    ///
    /// Private and missing objects both report ObjectNotFound.
    pub async fn open_public_object(&self, key: &str) -> StoreResult<(StoredObject, File)> {
        Self::ensure_key_safe(key)?;
        let object = self
            .fetch_object(key)
            .await?
            .filter(|obj| Acl::parse(&obj.acl) == Acl::PublicRead)
            .ok_or_else(|| StoreError::ObjectNotFound(key.to_string()))?;

        let file = File::open(self.object_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::ObjectNotFound(key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        Ok((object, file))
    }

    /// Recursively remove empty directories up to bucket root.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStoreClient for SqliteObjectStore {
    /// List objects following S3 ListObjectsV2 grouping rules, in key order.
    async fn list_objects(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StoreResult<ObjectListing> {
        // LIKE folds ASCII case in SQLite; compare the prefix bytes instead.
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT key, size_bytes FROM objects
             WHERE bucket = ? AND substr(key, 1, length(?)) = ?
             ORDER BY key ASC",
        )
        .bind(&self.bucket)
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&*self.db)
        .await?;

        let mut objects = Vec::new();
        let mut common_prefixes = BTreeSet::new();
        for (key, size_bytes) in rows {
            if let Some(delim) = delimiter {
                if let Some(group) = compute_common_prefix(&key, prefix, delim) {
                    common_prefixes.insert(group);
                    continue;
                }
            }
            objects.push(ObjectSummary {
                key,
                size_bytes: u64::try_from(size_bytes).ok(),
            });
        }

        Ok(ObjectListing {
            common_prefixes: common_prefixes.into_iter().collect(),
            objects,
        })
    }

    async fn object_exists(&self, key: &str) -> StoreResult<bool> {
        Self::ensure_key_safe(key)?;
        Ok(self.fetch_object(key).await?.is_some())
    }

    async fn put_object(&self, key: &str, body: PutBody, acl: Acl) -> StoreResult<()> {
        Self::ensure_key_safe(key)?;
        let (size_bytes, etag) = match body {
            PutBody::Bytes(data) => {
                self.write_payload(key, stream::once(async move { Ok::<_, io::Error>(data) }))
                    .await?
            }
            PutBody::File(path) => {
                let file = File::open(&path).await?;
                self.write_payload(key, ReaderStream::new(file)).await?
            }
        };

        if let Err(err) = self.upsert_row(key, size_bytes, &etag, acl).await {
            let _ = fs::remove_file(self.object_path(key)).await;
            return Err(err);
        }
        debug!(key, size_bytes, "stored object");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        Self::ensure_key_safe(key)?;
        let result = sqlx::query("DELETE FROM objects WHERE bucket = ? AND key = ?")
            .bind(&self.bucket)
            .bind(key)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ObjectNotFound(key.to_string()));
        }

        // The row is gone, so the object is deleted whatever happens to the
        // payload file.
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => {
                warn!(key, "orphaned payload {} left on disk: {}", file_path.display(), err);
            }
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.bucket_root()).await;
        }
        Ok(())
    }

    async fn copy_object(&self, src_key: &str, dst_key: &str, acl: Acl) -> StoreResult<()> {
        Self::ensure_key_safe(src_key)?;
        Self::ensure_key_safe(dst_key)?;
        let source = self
            .fetch_object(src_key)
            .await?
            .ok_or_else(|| StoreError::ObjectNotFound(src_key.to_string()))?;

        let file = File::open(self.object_path(src_key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::ObjectNotFound(src_key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        let (size_bytes, etag) = self.write_payload(dst_key, ReaderStream::new(file)).await?;
        if etag != source.etag {
            debug!(src_key, dst_key, "copied payload digest differs from source row");
        }

        if let Err(err) = self.upsert_row(dst_key, size_bytes, &etag, acl).await {
            let _ = fs::remove_file(self.object_path(dst_key)).await;
            return Err(err);
        }
        Ok(())
    }
}

/// Validate bucket name format.
///
/// Enforces S3-like naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
fn ensure_bucket_name_safe(name: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.into(),
    };

    let len = name.len();
    if len < BUCKET_NAME_MIN_LEN || len > BUCKET_NAME_MAX_LEN {
        return Err(invalid("must be between 3 and 63 characters"));
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }
    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }
    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }
    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}

/// Compute a synthetic "common prefix" for S3 list semantics.
///
/// Returns Some(prefix) if the key belongs to a grouped prefix, otherwise None.
fn compute_common_prefix(key: &str, prefix: &str, delimiter: &str) -> Option<String> {
    let after_prefix = key.strip_prefix(prefix)?;
    let pos = after_prefix.find(delimiter)?;
    let mut combined = String::from(prefix);
    combined.push_str(&after_prefix[..pos + delimiter.len()]);
    Some(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    async fn store() -> (SqliteObjectStore, TempDir) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apply_schema(&pool).await.unwrap();
        let dir = TempDir::new().unwrap();
        let store = SqliteObjectStore::connect(
            Arc::new(pool),
            StoreConfig {
                bucket: "media-test".into(),
                base_path: dir.path().to_path_buf(),
                credentials: Credentials::default(),
            },
        )
        .await
        .unwrap();
        (store, dir)
    }

    fn body(text: &str) -> PutBody {
        PutBody::Bytes(Bytes::from(text.to_string()))
    }

    #[tokio::test]
    async fn put_then_exists_and_delete() {
        let (store, _dir) = store().await;
        store
            .put_object("photos/a.jpg", body("jpeg"), Acl::PublicRead)
            .await
            .unwrap();
        assert!(store.object_exists("photos/a.jpg").await.unwrap());
        assert!(!store.object_exists("photos/b.jpg").await.unwrap());

        store.delete_object("photos/a.jpg").await.unwrap();
        assert!(!store.object_exists("photos/a.jpg").await.unwrap());
        assert!(matches!(
            store.delete_object("photos/a.jpg").await,
            Err(StoreError::ObjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_groups_at_delimiter() {
        let (store, _dir) = store().await;
        for key in ["photos/", "photos/a.jpg", "photos/sub/", "photos/sub/b.jpg", "top.txt"] {
            store.put_object(key, body(""), Acl::PublicRead).await.unwrap();
        }

        let listing = store.list_objects("photos/", Some("/")).await.unwrap();
        assert_eq!(listing.common_prefixes, vec!["photos/sub/"]);
        let keys: Vec<_> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["photos/", "photos/a.jpg"]);

        let root = store.list_objects("", Some("/")).await.unwrap();
        assert_eq!(root.common_prefixes, vec!["photos/"]);
        assert_eq!(root.objects, vec![ObjectSummary {
            key: "top.txt".into(),
            size_bytes: Some(0)
        }]);
    }

    #[tokio::test]
    async fn listing_prefix_is_matched_literally() {
        let (store, _dir) = store().await;
        store.put_object("a_b/x.txt", body("x"), Acl::Private).await.unwrap();
        store.put_object("aXb/y.txt", body("y"), Acl::Private).await.unwrap();

        let listing = store.list_objects("a_b/", None).await.unwrap();
        assert_eq!(listing.objects.len(), 1);
        assert_eq!(listing.objects[0].key, "a_b/x.txt");
    }

    #[tokio::test]
    async fn listing_prefix_is_case_sensitive() {
        let (store, _dir) = store().await;
        store.put_object("photos/a.jpg", body("a"), Acl::PublicRead).await.unwrap();
        store.put_object("PHOTOS/deep/b.jpg", body("b"), Acl::PublicRead).await.unwrap();

        let listing = store.list_objects("photos/", Some("/")).await.unwrap();
        let keys: Vec<_> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["photos/a.jpg"]);
        assert!(listing.common_prefixes.is_empty());

        let upper = store.list_objects("PHOTOS/", Some("/")).await.unwrap();
        assert!(upper.objects.is_empty());
        assert_eq!(upper.common_prefixes, vec!["PHOTOS/deep/"]);
    }

    #[tokio::test]
    async fn delete_succeeds_when_payload_cannot_be_removed() {
        let (store, _dir) = store().await;
        store.put_object("a.txt", body("a"), Acl::PublicRead).await.unwrap();
        // a directory in place of the payload makes remove_file fail
        let payload = store.object_path("a.txt");
        std::fs::remove_file(&payload).unwrap();
        std::fs::create_dir(&payload).unwrap();

        store.delete_object("a.txt").await.unwrap();
        assert!(!store.object_exists("a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn copy_duplicates_payload() {
        let (store, _dir) = store().await;
        store.put_object("a.txt", body("hello"), Acl::Private).await.unwrap();
        store.copy_object("a.txt", "docs/b.txt", Acl::PublicRead).await.unwrap();

        assert!(store.object_exists("a.txt").await.unwrap());
        let (meta, _file) = store.open_public_object("docs/b.txt").await.unwrap();
        assert_eq!(meta.size_bytes, 5);
        assert_eq!(meta.etag, format!("{:x}", md5::compute("hello")));
    }

    #[tokio::test]
    async fn private_objects_are_not_served() {
        let (store, _dir) = store().await;
        store.put_object("secret.txt", body("s"), Acl::Private).await.unwrap();
        assert!(matches!(
            store.open_public_object("secret.txt").await,
            Err(StoreError::ObjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn put_streams_from_file() {
        let (store, dir) = store().await;
        let upload = dir.path().join("upload.bin");
        std::fs::write(&upload, b"0123456789").unwrap();
        store
            .put_object("bin/data.bin", PutBody::File(upload), Acl::PublicRead)
            .await
            .unwrap();
        let listing = store.list_objects("bin/", Some("/")).await.unwrap();
        assert_eq!(listing.objects[0].size_bytes, Some(10));
    }

    #[tokio::test]
    async fn unsafe_keys_are_rejected() {
        let (store, _dir) = store().await;
        for key in ["", "/abs", "a/../b", "back\\slash"] {
            assert!(matches!(
                store.put_object(key, body(""), Acl::Private).await,
                Err(StoreError::InvalidObjectKey(_))
            ));
        }
    }

    #[test]
    fn bucket_names_follow_s3_rules() {
        assert!(ensure_bucket_name_safe("media-assets").is_ok());
        assert!(ensure_bucket_name_safe("ab").is_err());
        assert!(ensure_bucket_name_safe("Media").is_err());
        assert!(ensure_bucket_name_safe("-media").is_err());
        assert!(ensure_bucket_name_safe("me..dia").is_err());
        assert!(ensure_bucket_name_safe("192.168.1.1").is_err());
    }

    #[test]
    fn common_prefix_only_for_nested_keys() {
        assert_eq!(
            compute_common_prefix("photos/sub/b.jpg", "photos/", "/"),
            Some("photos/sub/".into())
        );
        assert_eq!(compute_common_prefix("photos/a.jpg", "photos/", "/"), None);
        assert_eq!(compute_common_prefix("videos/a.mp4", "photos/", "/"), None);
    }
}
