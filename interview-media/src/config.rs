use crate::error::ConfigError;

const MIB: u64 = 1024 * 1024;

/// Default name of the recordings bucket
pub const DEFAULT_BUCKET: &str = "interview-videos";

/// Configuration for the media upload service
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Bucket every recording is written to
    pub bucket: BucketSpec,

    /// Videos of at least this many bytes go through the compressor first
    pub compression_threshold_bytes: u64,

    /// Settings handed to the compressor
    pub compression: CompressionSettings,

    /// Cache-Control max-age (seconds) sent with every upload
    pub cache_control: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            bucket: BucketSpec::default(),
            compression_threshold_bytes: 500 * MIB,
            compression: CompressionSettings::default(),
            cache_control: "3600".to_string(),
        }
    }
}

impl MediaConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `MEDIA_BUCKET` and
    /// `MEDIA_COMPRESSION_THRESHOLD_BYTES` when set (a `.env` file is honoured).
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();

        let mut config = Self::default();
        if let Some(bucket) = optional_var("MEDIA_BUCKET") {
            config.bucket.name = bucket;
        }
        if let Some(raw) = optional_var("MEDIA_COMPRESSION_THRESHOLD_BYTES") {
            config.compression_threshold_bytes =
                raw.parse().map_err(|_| ConfigError::InvalidVar {
                    key: "MEDIA_COMPRESSION_THRESHOLD_BYTES".to_string(),
                    message: format!("expected a byte count, got {raw:?}"),
                })?;
        }
        Ok(config)
    }

    pub fn with_bucket(mut self, bucket: BucketSpec) -> Self {
        self.bucket = bucket;
        self
    }

    /// Set compression threshold
    pub fn with_compression_threshold(mut self, bytes: u64) -> Self {
        self.compression_threshold_bytes = bytes;
        self
    }

    pub fn with_compression(mut self, settings: CompressionSettings) -> Self {
        self.compression = settings;
        self
    }

    pub fn with_cache_control<S: Into<String>>(mut self, cache_control: S) -> Self {
        self.cache_control = cache_control.into();
        self
    }
}

/// Attributes a bucket is provisioned with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSpec {
    pub name: String,
    pub public: bool,
    pub allowed_mime_types: Vec<String>,
    pub file_size_limit: u64,
}

impl Default for BucketSpec {
    fn default() -> Self {
        Self {
            name: DEFAULT_BUCKET.to_string(),
            public: true,
            allowed_mime_types: vec![
                "video/webm".to_string(),
                "video/mp4".to_string(),
                "audio/webm".to_string(),
            ],
            file_size_limit: 1024 * MIB,
        }
    }
}

impl BucketSpec {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn with_allowed_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_file_size_limit(mut self, bytes: u64) -> Self {
        self.file_size_limit = bytes;
        self
    }

    /// An empty allow-list admits every type
    pub fn allows(&self, content_type: &str) -> bool {
        self.allowed_mime_types.is_empty()
            || self.allowed_mime_types.iter().any(|t| t == content_type)
    }
}

/// How the compressor shrinks an oversized recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMode {
    /// Re-encode the whole clip at the scaled resolution
    #[default]
    Reencode,
    /// Keep a single scaled frame encoded as JPEG in place of the clip.
    ///
    /// The JPEG is still stored under the recording's video name
    /// (`interview-recording-{ts}.{ext}`) with content type `video/{ext}`, so
    /// players will not be able to open it.
    FrameSnapshot,
}

/// Target bounds for the downscale step
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionSettings {
    pub max_width: u32,
    pub max_height: u32,
    /// Encoder quality in `0.0..=1.0`
    pub quality: f32,
    pub mode: CompressionMode,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_width: 1280,
            max_height: 720,
            quality: 0.7,
            mode: CompressionMode::default(),
        }
    }
}

impl CompressionSettings {
    pub fn with_bounds(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality.clamp(0.0, 1.0);
        self
    }

    pub fn with_mode(mut self, mode: CompressionMode) -> Self {
        self.mode = mode;
        self
    }
}

pub(crate) fn load_dotenv() {
    // A missing .env is the normal case in production
    let _ = dotenvy::dotenv();
}

pub(crate) fn required_var(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
}

pub(crate) fn optional_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
