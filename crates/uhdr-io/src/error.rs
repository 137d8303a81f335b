//! Error type for filesystem operations.

use std::path::PathBuf;

use uhdr_pipeline::PipelineError;

/// Errors raised while reading or writing images, sidecars and
/// thumbnails, or while loading images in the background.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// An image file could not be read or decoded.
    #[error("failed to read image {}: {source}", path.display())]
    ImageRead {
        /// The file that was read.
        path: PathBuf,
        /// The underlying read or decode failure.
        source: PipelineError,
    },

    /// An image could not be encoded or written to disk.
    #[error("failed to write image {}: {source}", path.display())]
    ImageWrite {
        /// The destination file.
        path: PathBuf,
        /// The encode or filesystem failure.
        source: WriteFailure,
    },

    /// The file extension is not one of the supported codecs.
    #[error("unsupported image format: {}", path.display())]
    UnsupportedFormat {
        /// The offending path.
        path: PathBuf,
    },

    /// A metadata sidecar holds malformed JSON or an invalid pipeline.
    #[error("invalid metadata in {}: {source}", path.display())]
    Metadata {
        /// The sidecar file.
        path: PathBuf,
        /// The parse failure.
        source: serde_json::Error,
    },

    /// A directory or sidecar could not be accessed.
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying filesystem failure.
        source: std::io::Error,
    },

    /// A background decode kept failing after every retry.
    #[error("loading {name} failed after {attempts} attempts: {message}")]
    DecodeTaskFailure {
        /// The image file name.
        name: String,
        /// How many attempts were made.
        attempts: u32,
        /// The last failure.
        message: String,
    },

    /// The I/O configuration is unusable.
    #[error("invalid I/O configuration: {0}")]
    InvalidConfig(String),

    /// The background worker pool could not be started.
    #[error("failed to start loader threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A pipeline operation failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Why an image write failed.
#[derive(Debug, thiserror::Error)]
pub enum WriteFailure {
    /// The pixels could not be encoded in the requested format.
    #[error(transparent)]
    Encode(#[from] PipelineError),
    /// The encoded bytes could not be written.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IoError {
    /// Whether retrying the same read could succeed.
    ///
    /// Only read and decode failures are retried; a wrong extension
    /// stays wrong.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ImageRead { .. })
    }
}
