//! On-disk thumbnail cache.
//!
//! Thumbnails live next to the sidecars as
//! `<dir>/<extra>/<prefix><filename>`, in the same format as the source
//! image. A thumbnail older than its source is rebuilt.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use uhdr_pipeline::{ColorImage, DownsampleFilter};

use crate::config::IoConfig;
use crate::error::IoError;
use crate::image_file::{read_image, write_image};

/// Builds thumbnails on demand and keeps them on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailCache {
    cache_dir: PathBuf,
    prefix: String,
    max_size: u32,
    filter: DownsampleFilter,
}

impl ThumbnailCache {
    /// Cache for images in `image_dir`, laid out according to `config`.
    #[must_use]
    pub fn new(image_dir: impl AsRef<Path>, config: &IoConfig) -> Self {
        Self {
            cache_dir: image_dir.as_ref().join(&config.extra_dir),
            prefix: config.thumbnail_prefix.clone(),
            max_size: config.thumbnail_max_size,
            filter: config.thumbnail_filter,
        }
    }

    /// Longest edge of the thumbnails this cache builds.
    #[must_use]
    pub const fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Where the thumbnail of `image_path` is stored.
    #[must_use]
    pub fn thumbnail_path(&self, image_path: &Path) -> PathBuf {
        let mut name = std::ffi::OsString::from(&self.prefix);
        if let Some(file_name) = image_path.file_name() {
            name.push(file_name);
        }
        self.cache_dir.join(name)
    }

    /// Load the cached thumbnail of `image_path`, building and storing
    /// it first if it is missing, stale or unreadable.
    ///
    /// Failing to store a freshly built thumbnail is logged and
    /// otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns the error from reading the source image when a
    /// thumbnail has to be built and the source cannot be read.
    pub fn load_or_build(&self, image_path: &Path) -> Result<ColorImage, IoError> {
        let path = self.thumbnail_path(image_path);
        if is_fresh(&path, image_path) {
            match read_image(&path) {
                Ok(thumbnail) => {
                    debug!("thumbnail cache hit: {}", path.display());
                    return Ok(thumbnail);
                }
                Err(e) => warn!("rebuilding unreadable thumbnail: {e}"),
            }
        }

        let thumbnail = read_image(image_path)?.build_thumbnail_with(self.max_size, self.filter);
        if let Err(e) = self.store(&path, &thumbnail) {
            warn!("could not cache thumbnail for {}: {e}", image_path.display());
        }
        Ok(thumbnail)
    }

    fn store(&self, path: &Path, thumbnail: &ColorImage) -> Result<(), IoError> {
        fs::create_dir_all(&self.cache_dir).map_err(|source| IoError::Filesystem {
            path: self.cache_dir.clone(),
            source,
        })?;
        write_image(thumbnail, path)
    }
}

/// Whether `thumbnail` exists and is at least as new as `source`.
fn is_fresh(thumbnail: &Path, source: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(thumbnail), modified(source)) {
        (Some(thumb), Some(src)) => thumb >= src,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
