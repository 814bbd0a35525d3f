use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::{BucketSpec, ObjectInfo, ObjectStore, StoreError, StoreResult, UploadOptions};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    content_type: String,
    updated_at: i64,
}

#[derive(Debug)]
struct MemoryBucket {
    spec: BucketSpec,
    objects: BTreeMap<String, StoredObject>,
}

/// In-memory object store for tests and local development.
///
/// Enforces the same rules a hosted bucket would: no-overwrite uploads, the
/// bucket's MIME allow-list and its per-object size limit.
#[derive(Clone)]
pub struct MemoryObjectStore {
    buckets: Arc<RwLock<HashMap<String, MemoryBucket>>>,
    base_url: String,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_base_url("memory://storage")
    }

    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Seed a bucket without going through `create_bucket`
    pub fn with_bucket(self, spec: BucketSpec) -> Self {
        self.buckets.write().insert(
            spec.name.clone(),
            MemoryBucket {
                spec,
                objects: BTreeMap::new(),
            },
        );
        self
    }

    pub fn bucket_spec(&self, bucket: &str) -> Option<BucketSpec> {
        self.buckets.read().get(bucket).map(|b| b.spec.clone())
    }

    /// Stored paths of a bucket in lexical order
    pub fn object_paths(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<(Bytes, String)> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|b| b.objects.get(path))
            .map(|o| (o.body.clone(), o.content_type.clone()))
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.buckets.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_bucket(&self, spec: &BucketSpec) -> StoreResult<()> {
        let mut buckets = self.buckets.write();
        if buckets.contains_key(&spec.name) {
            return Err(StoreError::already_exists(&spec.name));
        }
        buckets.insert(
            spec.name.clone(),
            MemoryBucket {
                spec: spec.clone(),
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        options: &UploadOptions,
    ) -> StoreResult<()> {
        let mut buckets = self.buckets.write();
        let entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound {
                bucket: bucket.to_string(),
            })?;

        if !entry.spec.allows(&options.content_type) {
            return Err(StoreError::invalid(format!(
                "mime type {} is not supported",
                options.content_type
            )));
        }
        if body.len() as u64 > entry.spec.file_size_limit {
            return Err(StoreError::invalid(format!(
                "object of {} bytes exceeds the maximum allowed size {}",
                body.len(),
                entry.spec.file_size_limit
            )));
        }
        if !options.upsert && entry.objects.contains_key(path) {
            return Err(StoreError::already_exists(path));
        }

        entry.objects.insert(
            path.to_string(),
            StoredObject {
                body,
                content_type: options.content_type.clone(),
                updated_at: chrono::Utc::now().timestamp(),
            },
        );
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let buckets = self.buckets.read();
        let entry = buckets.get(bucket).ok_or_else(|| StoreError::BucketNotFound {
            bucket: bucket.to_string(),
        })?;

        let folder = prefix.trim_end_matches('/');
        let listed = entry
            .objects
            .iter()
            .filter_map(|(path, object)| {
                let name = if folder.is_empty() {
                    path.as_str()
                } else {
                    path.strip_prefix(folder)?.strip_prefix('/')?
                };
                Some(
                    ObjectInfo::new(name)
                        .with_size(object.body.len() as u64)
                        .with_content_type(object.content_type.clone())
                        .with_updated_at(object.updated_at),
                )
            })
            .collect();
        Ok(listed)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StoreResult<()> {
        let mut buckets = self.buckets.write();
        let entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound {
                bucket: bucket.to_string(),
            })?;
        // Missing paths are ignored, matching hosted batch deletes
        for path in paths {
            entry.objects.remove(path);
        }
        Ok(())
    }

    async fn public_url(&self, bucket: &str, path: &str) -> StoreResult<String> {
        Ok(format!("{}/{}/{}", self.base_url, bucket, path))
    }

    async fn download(&self, bucket: &str, path: &str) -> StoreResult<Bytes> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|b| b.objects.get(path))
            .map(|o| o.body.clone())
            .ok_or_else(|| StoreError::not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> BucketSpec {
        BucketSpec::new("media").with_file_size_limit(8)
    }

    #[tokio::test]
    async fn test_upload_rejects_collision() {
        let store = MemoryObjectStore::new().with_bucket(spec());
        let opts = UploadOptions::new("video/webm");

        store.upload("media", "s1/a.webm", Bytes::from_static(b"one"), &opts).await.unwrap();
        let err = store
            .upload("media", "s1/a.webm", Bytes::from_static(b"two"), &opts)
            .await
            .unwrap_err();

        assert!(err.is_collision());
        assert_eq!(store.object("media", "s1/a.webm").unwrap().0, Bytes::from_static(b"one"));
    }

    #[tokio::test]
    async fn test_upload_enforces_bucket_rules() {
        let store = MemoryObjectStore::new().with_bucket(spec());

        let too_big = store
            .upload("media", "s1/a.webm", Bytes::from_static(b"123456789"), &UploadOptions::new("video/webm"))
            .await;
        assert!(matches!(too_big, Err(StoreError::Invalid { .. })));

        let wrong_type = store
            .upload("media", "s1/a.png", Bytes::from_static(b"1"), &UploadOptions::new("image/png"))
            .await;
        assert!(matches!(wrong_type, Err(StoreError::Invalid { .. })));
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_folder() {
        let store = MemoryObjectStore::new().with_bucket(spec());
        let opts = UploadOptions::new("video/webm");
        for path in ["s1/a.webm", "s1/nested/b.webm", "s10/c.webm"] {
            store.upload("media", path, Bytes::from_static(b"x"), &opts).await.unwrap();
        }

        let names: Vec<String> = store
            .list("media", "s1")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();

        assert_eq!(names, vec!["a.webm".to_string(), "nested/b.webm".to_string()]);
    }
}
