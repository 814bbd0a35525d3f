use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info, instrument, warn};

use crate::store::{join_path, owner_prefix};
use crate::{
    CompressError, ContainerStatus, DefaultKeyStrategy, FfmpegCompressor, MediaBlob, MediaConfig,
    MediaError, MediaResult, ObjectStore, ProgressFn, RecordingInfo, RecordingKeyStrategy,
    StorageUsage, UploadOptions, UploadResult, VideoCompressor, VideoFormat,
};

/// Uploads interview recordings to an object store.
///
/// Setup steps (bucket provisioning, compression) are best-effort and only
/// logged when they fail; the transfer itself is mandatory and surfaces a
/// fixed [`MediaError`] per operation.
pub struct MediaUploadService {
    store: Arc<dyn ObjectStore>,
    keys: Arc<dyn RecordingKeyStrategy>,
    compressor: Option<Arc<dyn VideoCompressor>>,
    config: MediaConfig,
}

impl MediaUploadService {
    /// Create a service that compresses through `ffmpeg`
    pub fn new<S: ObjectStore + 'static>(store: S, config: MediaConfig) -> Self {
        Self::from_arc(Arc::new(store), config)
    }

    pub fn from_arc(store: Arc<dyn ObjectStore>, config: MediaConfig) -> Self {
        Self {
            store,
            keys: Arc::new(DefaultKeyStrategy),
            compressor: Some(Arc::new(FfmpegCompressor::default())),
            config,
        }
    }

    /// Replace the compressor
    pub fn with_compressor<C: VideoCompressor + 'static>(mut self, compressor: C) -> Self {
        self.compressor = Some(Arc::new(compressor));
        self
    }

    /// Upload oversized videos as they are
    pub fn without_compression(mut self) -> Self {
        self.compressor = None;
        self
    }

    pub fn with_key_strategy<K: RecordingKeyStrategy + 'static>(mut self, keys: K) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    /// Get configuration
    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    fn bucket(&self) -> &str {
        &self.config.bucket.name
    }

    fn upload_options(&self, content_type: &str) -> UploadOptions {
        UploadOptions::new(content_type).with_cache_control(self.config.cache_control.clone())
    }

    /// Make sure the recordings bucket exists, creating it when it is not listed.
    ///
    /// Never fails: a listing or creation error is logged and reported as
    /// [`ContainerStatus::Unverified`] so the upload can still be attempted.
    #[instrument(skip(self), fields(bucket = %self.config.bucket.name))]
    pub async fn ensure_container(&self) -> ContainerStatus {
        let buckets = match self.store.list_buckets().await {
            Ok(buckets) => buckets,
            Err(e) => {
                warn!("Could not list buckets: {}", e);
                return ContainerStatus::Unverified {
                    reason: e.to_string(),
                };
            }
        };

        if buckets.iter().any(|name| name == self.bucket()) {
            return ContainerStatus::Exists;
        }

        match self.store.create_bucket(&self.config.bucket).await {
            Ok(()) => {
                info!("Created bucket {}", self.bucket());
                ContainerStatus::Created
            }
            Err(e) => {
                warn!("Could not create bucket {}: {}", self.bucket(), e);
                ContainerStatus::Unverified {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Run the configured compressor once.
    ///
    /// Fails with [`CompressError::Unavailable`] when compression is disabled.
    pub async fn compress_video(&self, blob: &MediaBlob) -> Result<MediaBlob, CompressError> {
        let compressor = self.compressor.as_ref().ok_or(CompressError::Unavailable)?;
        let compressed = compressor.compress(blob, &self.config.compression).await?;
        info!(
            "Compressed video from {} to {} bytes",
            blob.len(),
            compressed.len()
        );
        Ok(compressed)
    }

    /// Store a video recording under `{session_id}/interview-recording-{ts}.{ext}`
    #[instrument(skip(self, blob, on_progress), fields(size = blob.len()))]
    pub async fn upload_video(
        &self,
        blob: MediaBlob,
        session_id: &str,
        on_progress: Option<ProgressFn>,
    ) -> MediaResult<UploadResult> {
        let report = |percent: u8| {
            if let Some(callback) = &on_progress {
                callback(percent);
            }
        };

        let Some(prefix) = self.keys.session_prefix(session_id) else {
            error!("Refusing to upload a video without a session id: {:?}", session_id);
            return Err(MediaError::UploadVideo);
        };
        if blob.is_empty() {
            error!("Refusing to upload an empty video for session {}", session_id);
            return Err(MediaError::UploadVideo);
        }

        report(0);
        self.ensure_container().await;

        let format = VideoFormat::from_content_type(&blob.content_type);
        let path = self
            .keys
            .video_key(&prefix, format, chrono::Utc::now().timestamp_millis());

        let body: Bytes = if blob.len() >= self.config.compression_threshold_bytes {
            info!(
                "Video of {} bytes is at or over the {} byte threshold, compressing",
                blob.len(),
                self.config.compression_threshold_bytes
            );
            match self.compress_video(&blob).await {
                Ok(compressed) => compressed.bytes,
                Err(CompressError::Unavailable) => {
                    debug!("No compressor configured, keeping original payload");
                    blob.bytes
                }
                Err(e) => {
                    warn!("Video compression failed, uploading original: {}", e);
                    blob.bytes
                }
            }
        } else {
            blob.bytes
        };
        report(25);

        let size = body.len() as u64;
        let options = self.upload_options(format.mime_type());
        if let Err(e) = self.store.upload(self.bucket(), &path, body, &options).await {
            error!("Video upload to {} failed: {}", path, e);
            return Err(MediaError::UploadVideo);
        }
        report(90);

        let url = self.store.public_url(self.bucket(), &path).await.map_err(|e| {
            error!("Could not resolve public URL for {}: {}", path, e);
            MediaError::UploadVideo
        })?;
        report(100);

        info!("Uploaded video {} ({} bytes)", path, size);
        Ok(UploadResult { url, path, size })
    }

    /// Store an audio recording under `{session_id}/audio-{ts}.webm`, returning its URL
    #[instrument(skip(self, blob), fields(size = blob.len()))]
    pub async fn upload_audio(&self, blob: MediaBlob, session_id: &str) -> MediaResult<String> {
        let Some(prefix) = self.keys.session_prefix(session_id) else {
            error!("Refusing to upload audio without a session id: {:?}", session_id);
            return Err(MediaError::UploadAudio);
        };
        self.ensure_container().await;

        let path = self
            .keys
            .audio_key(&prefix, chrono::Utc::now().timestamp_millis());
        let options = self.upload_options("audio/webm");

        if let Err(e) = self.store.upload(self.bucket(), &path, blob.bytes, &options).await {
            error!("Audio upload to {} failed: {}", path, e);
            return Err(MediaError::UploadAudio);
        }

        let url = self.store.public_url(self.bucket(), &path).await.map_err(|e| {
            error!("Could not resolve public URL for {}: {}", path, e);
            MediaError::UploadAudio
        })?;

        info!("Uploaded audio {}", path);
        Ok(url)
    }

    /// Remove every object stored for a session in one batch.
    ///
    /// Not atomic: on failure some objects may already be gone.
    #[instrument(skip(self))]
    pub async fn delete_session_videos(&self, session_id: &str) -> MediaResult<()> {
        let Some(prefix) = self.keys.session_prefix(session_id) else {
            error!("Refusing to delete without a session id: {:?}", session_id);
            return Err(MediaError::DeleteVideos);
        };
        let objects = self.store.list(self.bucket(), &prefix).await.map_err(|e| {
            error!("Listing {} for deletion failed: {}", prefix, e);
            MediaError::DeleteVideos
        })?;

        if objects.is_empty() {
            debug!("Nothing stored for session {}", session_id);
            return Ok(());
        }

        let paths: Vec<String> = objects
            .iter()
            .map(|object| join_path(&prefix, &object.name))
            .collect();

        self.store.remove(self.bucket(), &paths).await.map_err(|e| {
            error!("Removing {} objects under {} failed: {}", paths.len(), prefix, e);
            MediaError::DeleteVideos
        })?;

        info!("Deleted {} objects for session {}", paths.len(), session_id);
        Ok(())
    }

    /// Public URL for an already stored object
    pub async fn get_video_url(&self, session_id: &str, path: &str) -> MediaResult<String> {
        self.store.public_url(self.bucket(), path).await.map_err(|e| {
            error!(
                "Could not resolve URL for {} (session {}): {}",
                path, session_id, e
            );
            MediaError::GetVideoUrl
        })
    }

    /// Bytes and session count held under a user prefix.
    ///
    /// Never fails; an empty user id or any store error yields an all-zero
    /// summary.
    #[instrument(skip(self))]
    pub async fn get_storage_usage(&self, user_id: &str) -> StorageUsage {
        let Some(prefix) = owner_prefix(user_id) else {
            warn!("Storage usage requested without a user id: {:?}", user_id);
            return StorageUsage::default();
        };
        let objects = match self.store.list(self.bucket(), prefix).await {
            Ok(objects) => objects,
            Err(e) => {
                warn!("Storage usage lookup for {} failed: {}", user_id, e);
                return StorageUsage::default();
            }
        };

        let total_size = objects.iter().map(|o| o.size.unwrap_or(0)).sum();
        let sessions: BTreeSet<String> = objects
            .iter()
            .filter_map(|o| o.name.split('/').next())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        StorageUsage {
            total_size,
            file_count: objects.len(),
            sessions: sessions.into_iter().collect(),
        }
    }

    /// Everything stored for a session, with public URLs
    #[instrument(skip(self))]
    pub async fn list_session_recordings(&self, session_id: &str) -> MediaResult<Vec<RecordingInfo>> {
        let Some(prefix) = self.keys.session_prefix(session_id) else {
            error!("Refusing to list recordings without a session id: {:?}", session_id);
            return Err(MediaError::ListRecordings);
        };
        let objects = self.store.list(self.bucket(), &prefix).await.map_err(|e| {
            error!("Listing recordings under {} failed: {}", prefix, e);
            MediaError::ListRecordings
        })?;

        let mut recordings = Vec::with_capacity(objects.len());
        for object in objects {
            let path = join_path(&prefix, &object.name);
            let url = self.store.public_url(self.bucket(), &path).await.map_err(|e| {
                error!("Could not resolve URL for {}: {}", path, e);
                MediaError::ListRecordings
            })?;
            recordings.push(RecordingInfo {
                path,
                url,
                size: object.size,
            });
        }
        Ok(recordings)
    }

    /// Fetch the stored bytes of one recording
    #[instrument(skip(self))]
    pub async fn download_recording(&self, path: &str) -> MediaResult<Bytes> {
        self.store.download(self.bucket(), path).await.map_err(|e| {
            error!("Download of {} failed: {}", path, e);
            MediaError::DownloadRecording
        })
    }
}
