//! In-memory [`ObjectStoreClient`] with failure injection, used by the
//! engine tests.

use crate::services::object_store::{
    Acl, ObjectListing, ObjectStoreClient, ObjectSummary, PutBody, StoreError, StoreResult,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::Mutex,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Exists,
    Put,
    Delete,
    Copy,
}

impl StoreOp {
    fn as_str(self) -> &'static str {
        match self {
            StoreOp::List => "list",
            StoreOp::Exists => "exists",
            StoreOp::Put => "put",
            StoreOp::Delete => "delete",
            StoreOp::Copy => "copy",
        }
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, (Bytes, Acl)>>,
    failing: Mutex<HashSet<StoreOp>>,
    /// Extra keys returned verbatim by the next listings, to simulate a store
    /// that ignores the delimiter.
    stray_keys: Mutex<Vec<String>>,
    mutations: Mutex<usize>,
}

impl MemoryObjectStore {
    pub fn with_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Self::default();
        {
            let mut objects = store.objects.lock().unwrap();
            for key in keys {
                objects.insert(key.to_string(), (Bytes::new(), Acl::PublicRead));
            }
        }
        store
    }

    pub fn fail(&self, op: StoreOp) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn add_stray_key(&self, key: &str) {
        self.stray_keys.lock().unwrap().push(key.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn body(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).map(|(b, _)| b.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Number of successful put/delete/copy calls.
    pub fn mutation_count(&self) -> usize {
        *self.mutations.lock().unwrap()
    }

    fn check(&self, op: StoreOp, key: &str) -> StoreResult<()> {
        if self.failing.lock().unwrap().contains(&op) {
            return Err(StoreError::Rejected {
                op: op.as_str(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn mutated(&self) {
        *self.mutations.lock().unwrap() += 1;
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn list_objects(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StoreResult<ObjectListing> {
        self.check(StoreOp::List, prefix)?;
        let objects = self.objects.lock().unwrap();
        let mut common_prefixes = BTreeSet::new();
        let mut listing = ObjectListing::default();
        for (key, (body, _)) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            match delimiter.and_then(|d| rest.find(d).map(|pos| pos + d.len())) {
                Some(end) => {
                    common_prefixes.insert(format!("{}{}", prefix, &rest[..end]));
                }
                None => listing.objects.push(ObjectSummary {
                    key: key.clone(),
                    size_bytes: Some(body.len() as u64),
                }),
            }
        }
        listing.common_prefixes = common_prefixes.into_iter().collect();
        for stray in self.stray_keys.lock().unwrap().iter() {
            listing.objects.push(ObjectSummary::new(stray.clone()));
        }
        Ok(listing)
    }

    async fn object_exists(&self, key: &str) -> StoreResult<bool> {
        self.check(StoreOp::Exists, key)?;
        Ok(self.contains(key))
    }

    async fn put_object(&self, key: &str, body: PutBody, acl: Acl) -> StoreResult<()> {
        self.check(StoreOp::Put, key)?;
        let data = match body {
            PutBody::Bytes(data) => data,
            PutBody::File(path) => Bytes::from(tokio::fs::read(path).await?),
        };
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, acl));
        self.mutated();
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        self.check(StoreOp::Delete, key)?;
        self.objects
            .lock()
            .unwrap()
            .remove(key)
            .ok_or_else(|| StoreError::ObjectNotFound(key.to_string()))?;
        self.mutated();
        Ok(())
    }

    async fn copy_object(&self, src_key: &str, dst_key: &str, acl: Acl) -> StoreResult<()> {
        self.check(StoreOp::Copy, src_key)?;
        let mut objects = self.objects.lock().unwrap();
        let (body, _) = objects
            .get(src_key)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound(src_key.to_string()))?;
        objects.insert(dst_key.to_string(), (body, acl));
        drop(objects);
        self.mutated();
        Ok(())
    }
}
