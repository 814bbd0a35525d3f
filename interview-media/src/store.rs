use async_trait::async_trait;
use bytes::Bytes;

use crate::{BucketSpec, ObjectInfo, StoreResult, UploadOptions, VideoFormat};

/// Remote object store operations consumed by the media service
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of every bucket visible to the client
    async fn list_buckets(&self) -> StoreResult<Vec<String>>;

    /// Create a bucket with the given attributes
    async fn create_bucket(&self, spec: &BucketSpec) -> StoreResult<()>;

    /// Store an object. With `upsert == false` an existing path must be
    /// rejected with [`crate::StoreError::AlreadyExists`].
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        options: &UploadOptions,
    ) -> StoreResult<()>;

    /// Every object below the `prefix` folder, recursively; names are
    /// relative to the prefix (`s1` lists `s1/a.webm` as `a.webm`)
    async fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>>;

    /// Remove the given paths in one call
    async fn remove(&self, bucket: &str, paths: &[String]) -> StoreResult<()>;

    /// Public URL of an object
    async fn public_url(&self, bucket: &str, path: &str) -> StoreResult<String>;

    /// Fetch an object's bytes
    async fn download(&self, bucket: &str, path: &str) -> StoreResult<Bytes>;
}

/// Strategy for naming stored recordings.
///
/// Every path must start with `{session_id}/` so a session can be listed and
/// removed by prefix. Keys are only built from a prefix returned by
/// [`RecordingKeyStrategy::session_prefix`].
pub trait RecordingKeyStrategy: Send + Sync {
    fn video_key(&self, session_id: &str, format: VideoFormat, timestamp_ms: i64) -> String;

    fn audio_key(&self, session_id: &str, timestamp_ms: i64) -> String;

    /// Folder holding a session's objects, or `None` when the id names no
    /// folder at all (`""`, `"/"`), since that would be the bucket root
    fn session_prefix(&self, session_id: &str) -> Option<String> {
        owner_prefix(session_id).map(str::to_string)
    }
}

/// A session or user id with surrounding `/` removed; `None` if nothing is left
pub(crate) fn owner_prefix(id: &str) -> Option<&str> {
    let trimmed = id.trim_matches('/');
    (!trimmed.is_empty()).then_some(trimmed)
}

/// `{session}/interview-recording-{ts}.{ext}` and `{session}/audio-{ts}.webm`
#[derive(Debug, Clone, Default)]
pub struct DefaultKeyStrategy;

impl RecordingKeyStrategy for DefaultKeyStrategy {
    fn video_key(&self, session_id: &str, format: VideoFormat, timestamp_ms: i64) -> String {
        format!(
            "{}/interview-recording-{}.{}",
            session_id,
            timestamp_ms,
            format.extension()
        )
    }

    fn audio_key(&self, session_id: &str, timestamp_ms: i64) -> String {
        format!("{}/audio-{}.webm", session_id, timestamp_ms)
    }
}

/// Join a listed prefix and a relative object name
pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_key_layout() {
        let keys = DefaultKeyStrategy;
        assert_eq!(
            keys.video_key("s1", VideoFormat::Mp4, 1_700_000_000_123),
            "s1/interview-recording-1700000000123.mp4"
        );
        assert_eq!(
            keys.video_key("s1", VideoFormat::Webm, 42),
            "s1/interview-recording-42.webm"
        );
    }

    #[test]
    fn test_audio_key_layout() {
        assert_eq!(DefaultKeyStrategy.audio_key("abc", 7), "abc/audio-7.webm");
    }

    #[test]
    fn test_session_prefix_never_names_the_bucket_root() {
        let keys = DefaultKeyStrategy;
        assert_eq!(keys.session_prefix("s1"), Some("s1".to_string()));
        assert_eq!(keys.session_prefix("/s1/"), Some("s1".to_string()));
        assert_eq!(keys.session_prefix("user/s1"), Some("user/s1".to_string()));
        assert_eq!(keys.session_prefix(""), None);
        assert_eq!(keys.session_prefix("/"), None);
        assert_eq!(keys.session_prefix("//"), None);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("s1", "a.webm"), "s1/a.webm");
        assert_eq!(join_path("s1/", "a.webm"), "s1/a.webm");
        assert_eq!(join_path("", "a.webm"), "a.webm");
    }
}
