use thiserror::Error;

/// Result type for object store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for the caller-facing media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors raised by an object store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {path}")]
    NotFound { path: String },

    #[error("Bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    #[error("Object already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a collision error for a no-overwrite upload
    pub fn already_exists<S: Into<String>>(path: S) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    pub fn rejected<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// True when the store refused an upload because the path is taken
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Errors from the best-effort downscale step. Never surfaced to callers.
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Media could not be probed: {0}")]
    Probe(String),

    #[error("Encoder failed: {0}")]
    Encode(String),

    #[error("Compressed output is empty")]
    EmptyOutput,

    #[error("No compressor configured")]
    Unavailable,

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Caller-visible failures. Each variant is a fixed, operation-scoped message;
/// the underlying cause is logged where it happens and never carried here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Failed to upload video")]
    UploadVideo,

    #[error("Failed to upload audio")]
    UploadAudio,

    #[error("Failed to delete videos")]
    DeleteVideos,

    #[error("Failed to get video URL")]
    GetVideoUrl,

    #[error("Failed to list recordings")]
    ListRecordings,

    #[error("Failed to download recording")]
    DownloadRecording,
}

/// Errors while reading backend settings from the environment
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable required")]
    MissingVar(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidVar { key: String, message: String },
}
