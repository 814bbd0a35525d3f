//! # interview-media: recording storage for mock-interview sessions
//!
//! `interview-media` takes the video and audio a candidate records during a
//! practice interview and puts it in an object store. It provisions the
//! recordings bucket on first use, shrinks oversized videos on a best-effort
//! basis, and reports how much storage a user holds.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use interview_media::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 1. Pick a backend
//! let store = SupabaseStore::from_env()?;
//!
//! // 2. Build the service around it
//! let media = MediaUploadService::new(store, MediaConfig::from_env()?);
//!
//! // 3. Upload a recording for a session
//! let blob = MediaBlob::new(vec![0u8; 1024], "video/webm;codecs=vp9");
//! let uploaded = media.upload_video(blob, "session-42", None).await?;
//! println!("stored at {} ({} bytes)", uploaded.url, uploaded.size);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │  Recording UI      │  ← captures blobs
//! ├────────────────────┤
//! │ MediaUploadService │  ← naming, provisioning, compression, error policy
//! ├────────────────────┤
//! │ ObjectStore        │  ← Supabase, S3-compatible, in-memory
//! └────────────────────┘
//! ```
//!
//! Errors follow two tiers. Provisioning and compression are best-effort:
//! they are logged through `tracing` and never reach the caller. Transfers
//! are mandatory: a failure becomes one fixed [`MediaError`] per operation,
//! with the root cause kept in the logs only.

pub mod backends;
pub mod compress;
mod config;
mod error;
mod service;
pub mod store;
mod types;

// Re-export main types for clean API
pub use backends::{MemoryObjectStore, S3Config, S3ObjectStore, SupabaseConfig, SupabaseStore};
pub use compress::{fit_dimensions, FfmpegCompressor, VideoCompressor};
pub use config::{BucketSpec, CompressionMode, CompressionSettings, MediaConfig, DEFAULT_BUCKET};
pub use error::{CompressError, ConfigError, MediaError, MediaResult, StoreError, StoreResult};
pub use service::MediaUploadService;
pub use store::{DefaultKeyStrategy, ObjectStore, RecordingKeyStrategy};
pub use types::{
    ContainerStatus, MediaBlob, ObjectInfo, ProgressFn, RecordingInfo, StorageUsage,
    UploadOptions, UploadResult, VideoFormat,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BucketSpec, MediaBlob, MediaConfig, MediaError, MediaResult, MediaUploadService,
        MemoryObjectStore, ObjectStore, S3ObjectStore, StorageUsage, SupabaseStore,
        UploadResult,
    };
}
