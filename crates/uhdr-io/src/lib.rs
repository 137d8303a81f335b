//! uhdr-io: filesystem side of the uhdr editor.
//!
//! Reads and writes image files by extension, persists each image's
//! edit pipeline in a JSON sidecar, caches thumbnails on disk and loads
//! images in the background. All pixel processing is delegated to
//! `uhdr-pipeline`.

pub mod config;
pub mod error;
pub mod files;
pub mod image_file;
pub mod metadata;
pub mod thumbnail;

pub use config::IoConfig;
pub use error::{IoError, WriteFailure};
pub use files::{ImageFiles, LoadEvent};
pub use image_file::{read_image, write_image};
pub use metadata::MetadataStore;
pub use thumbnail::ThumbnailCache;
