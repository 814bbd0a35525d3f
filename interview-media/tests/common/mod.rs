#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use interview_media::{
    BucketSpec, CompressError, CompressionSettings, MediaBlob, MemoryObjectStore, ObjectInfo,
    ObjectStore, StoreError, StoreResult, UploadOptions, VideoCompressor,
};

pub const BUCKET: &str = "interview-videos";

/// Upload as observed by the store
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub path: String,
    pub size: u64,
    pub content_type: String,
    pub upsert: bool,
}

/// Memory store with call counters and switchable failures
#[derive(Clone, Default)]
pub struct ScriptedStore {
    pub inner: MemoryObjectStore,
    pub fail_list_buckets: Arc<AtomicBool>,
    pub fail_create_bucket: Arc<AtomicBool>,
    pub fail_upload: Arc<AtomicBool>,
    pub fail_list: Arc<AtomicBool>,
    pub fail_remove: Arc<AtomicBool>,
    pub create_calls: Arc<AtomicUsize>,
    pub remove_calls: Arc<AtomicUsize>,
    pub uploads: Arc<Mutex<Vec<RecordedUpload>>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose recordings bucket already exists
    pub fn with_bucket() -> Self {
        Self {
            inner: MemoryObjectStore::new().with_bucket(BucketSpec::default()),
            ..Self::default()
        }
    }

    pub fn fail(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    pub fn create_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn remove_count(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn recorded_uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().clone()
    }
}

fn injected(operation: &str) -> StoreError {
    StoreError::rejected(503, format!("injected {} failure: connection reset by peer", operation))
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        if self.fail_list_buckets.load(Ordering::SeqCst) {
            return Err(injected("list_buckets"));
        }
        self.inner.list_buckets().await
    }

    async fn create_bucket(&self, spec: &BucketSpec) -> StoreResult<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create_bucket.load(Ordering::SeqCst) {
            return Err(injected("create_bucket"));
        }
        self.inner.create_bucket(spec).await
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        options: &UploadOptions,
    ) -> StoreResult<()> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(injected("upload"));
        }
        self.uploads.lock().push(RecordedUpload {
            path: path.to_string(),
            size: body.len() as u64,
            content_type: options.content_type.clone(),
            upsert: options.upsert,
        });
        self.inner.upload(bucket, path, body, options).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(injected("list"));
        }
        self.inner.list(bucket, prefix).await
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StoreResult<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(injected("remove"));
        }
        self.inner.remove(bucket, paths).await
    }

    async fn public_url(&self, bucket: &str, path: &str) -> StoreResult<String> {
        self.inner.public_url(bucket, path).await
    }

    async fn download(&self, bucket: &str, path: &str) -> StoreResult<Bytes> {
        self.inner.download(bucket, path).await
    }
}

/// Compressor returning a fixed-size payload, or failing
#[derive(Clone)]
pub struct StubCompressor {
    pub output_size: Option<usize>,
    /// Content type of the output; the input's when unset
    pub output_type: Option<String>,
    pub calls: Arc<AtomicUsize>,
}

impl StubCompressor {
    pub fn shrinking_to(output_size: usize) -> Self {
        Self {
            output_size: Some(output_size),
            output_type: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Emits a single JPEG frame, as `CompressionMode::FrameSnapshot` does
    pub fn snapshot(output_size: usize) -> Self {
        Self {
            output_type: Some("image/jpeg".to_string()),
            ..Self::shrinking_to(output_size)
        }
    }

    pub fn failing() -> Self {
        Self {
            output_size: None,
            output_type: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoCompressor for StubCompressor {
    async fn compress(
        &self,
        blob: &MediaBlob,
        _settings: &CompressionSettings,
    ) -> Result<MediaBlob, CompressError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.output_size {
            Some(size) => {
                let content_type = self
                    .output_type
                    .clone()
                    .unwrap_or_else(|| blob.content_type.clone());
                Ok(MediaBlob::new(vec![7u8; size], content_type))
            }
            None => Err(CompressError::Encode("decoder crashed".to_string())),
        }
    }
}

pub fn video(size: usize, content_type: &str) -> MediaBlob {
    MediaBlob::new(vec![1u8; size], content_type)
}

/// Asserts `{session}/{stem}-<integer>.{ext}`
pub fn assert_recording_path(path: &str, session: &str, stem: &str, ext: &str) {
    let rest = path
        .strip_prefix(&format!("{}/{}-", session, stem))
        .unwrap_or_else(|| panic!("unexpected prefix in {path}"));
    let digits = rest
        .strip_suffix(&format!(".{}", ext))
        .unwrap_or_else(|| panic!("unexpected extension in {path}"));
    assert!(
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
        "timestamp is not an integer in {path}"
    );
}
