use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Progress callback; receives a percentage in `0..=100`
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// A captured recording and the media type the recorder declared for it
#[derive(Debug, Clone)]
pub struct MediaBlob {
    pub bytes: Bytes,
    pub content_type: String,
}

impl MediaBlob {
    pub fn new<B: Into<Bytes>, S: Into<String>>(bytes: B, content_type: S) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Container format a video recording is stored as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    Mp4,
    Webm,
}

impl VideoFormat {
    /// Two-way classification on the declared subtype: `mp4` or everything else.
    ///
    /// Parameters such as `;codecs=vp9` are ignored.
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        let subtype = essence.rsplit_once('/').map(|(_, sub)| sub).unwrap_or_default();
        if subtype.eq_ignore_ascii_case("mp4") {
            Self::Mp4
        } else {
            Self::Webm
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Webm => "video/webm",
        }
    }
}

/// Returned after a video is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub url: String,
    pub path: String,
    pub size: u64,
}

/// Aggregate storage held under one user prefix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub total_size: u64,
    pub file_count: usize,
    pub sessions: Vec<String>,
}

/// One stored object of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub path: String,
    pub url: String,
    pub size: Option<u64>,
}

/// Listing entry returned by a store; `name` is relative to the listed prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub updated_at: Option<i64>,
}

impl ObjectInfo {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            size: None,
            content_type: None,
            updated_at: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_updated_at(mut self, updated_at: i64) -> Self {
        self.updated_at = Some(updated_at);
        self
    }
}

/// Per-upload options passed to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub cache_control: String,
    /// When false a colliding path is rejected, never replaced
    pub upsert: bool,
}

impl UploadOptions {
    pub fn new<S: Into<String>>(content_type: S) -> Self {
        Self {
            content_type: content_type.into(),
            cache_control: "3600".to_string(),
            upsert: false,
        }
    }

    pub fn with_cache_control<S: Into<String>>(mut self, cache_control: S) -> Self {
        self.cache_control = cache_control.into();
        self
    }
}

/// Outcome of the best-effort bucket provisioning step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    /// Bucket was already listed
    Exists,
    /// Bucket was absent and has been created
    Created,
    /// Listing or creation failed; the transfer proceeds regardless
    Unverified { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mp4_subtype_maps_to_mp4() {
        assert_eq!(VideoFormat::from_content_type("video/mp4"), VideoFormat::Mp4);
        assert_eq!(
            VideoFormat::from_content_type("video/MP4; codecs=avc1"),
            VideoFormat::Mp4
        );
    }

    #[test]
    fn test_everything_else_defaults_to_webm() {
        for declared in ["video/webm", "video/webm;codecs=vp9,opus", "video/quicktime", "", "mp4"] {
            assert_eq!(VideoFormat::from_content_type(declared), VideoFormat::Webm, "{declared}");
        }
    }

    #[test]
    fn test_usage_serializes_camel_case() {
        let usage = StorageUsage::default();
        let json = serde_json::to_value(&usage).unwrap();
        assert_eq!(json, serde_json::json!({"totalSize": 0, "fileCount": 0, "sessions": []}));
    }
}
