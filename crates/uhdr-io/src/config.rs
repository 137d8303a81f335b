//! Filesystem layout and loader settings.

use serde::{Deserialize, Serialize};
use uhdr_pipeline::DownsampleFilter;

use crate::error::IoError;

/// Where sidecars and thumbnails live, and how images are loaded.
///
/// Missing fields take their defaults when deserialized, so a partial
/// JSON object such as `{"worker_threads": 2}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IoConfig {
    /// Hidden directory inside each image directory holding sidecars
    /// and thumbnails.
    pub extra_dir: String,

    /// File name prefix of cached thumbnails.
    pub thumbnail_prefix: String,

    /// Longest edge of a cached thumbnail, in pixels.
    pub thumbnail_max_size: u32,

    /// Resampling filter used to build thumbnails.
    pub thumbnail_filter: DownsampleFilter,

    /// How many times a failed decode is retried before giving up.
    pub max_decode_retries: u32,

    /// Background loader threads. Zero picks one per CPU.
    pub worker_threads: usize,
}

impl IoConfig {
    /// Default hidden directory name.
    pub const DEFAULT_EXTRA_DIR: &'static str = ".uHDR";
    /// Default thumbnail file name prefix.
    pub const DEFAULT_THUMBNAIL_PREFIX: &'static str = "thumbnail_";
    /// Default thumbnail size.
    pub const DEFAULT_THUMBNAIL_MAX_SIZE: u32 = 800;
    /// Default decode retry count.
    pub const DEFAULT_MAX_DECODE_RETRIES: u32 = 2;
    /// Default loader thread count (one per CPU).
    pub const DEFAULT_WORKER_THREADS: usize = 0;

    /// Check the settings describe a usable layout.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidConfig`] when `extra_dir` is empty or
    /// not a single path component, or `thumbnail_max_size` is zero.
    pub fn validate(&self) -> Result<(), IoError> {
        if self.extra_dir.is_empty()
            || self.extra_dir == "."
            || self.extra_dir == ".."
            || self.extra_dir.contains(['/', '\\'])
        {
            return Err(IoError::InvalidConfig(format!(
                "extra_dir must be a single directory name, got {:?}",
                self.extra_dir
            )));
        }
        if self.thumbnail_max_size == 0 {
            return Err(IoError::InvalidConfig(
                "thumbnail_max_size must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            extra_dir: Self::DEFAULT_EXTRA_DIR.to_owned(),
            thumbnail_prefix: Self::DEFAULT_THUMBNAIL_PREFIX.to_owned(),
            thumbnail_max_size: Self::DEFAULT_THUMBNAIL_MAX_SIZE,
            thumbnail_filter: DownsampleFilter::default(),
            max_decode_retries: Self::DEFAULT_MAX_DECODE_RETRIES,
            worker_threads: Self::DEFAULT_WORKER_THREADS,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config: IoConfig = serde_json::from_str(r#"{"worker_threads": 2}"#).unwrap();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.extra_dir, ".uHDR");
        assert_eq!(config.thumbnail_max_size, 800);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<IoConfig>(r#"{"threads": 2}"#).is_err());
    }

    #[test]
    fn json_round_trip() {
        let config = IoConfig {
            thumbnail_filter: DownsampleFilter::Lanczos3,
            ..IoConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"lanczos3\""));
        assert_eq!(serde_json::from_str::<IoConfig>(&json).unwrap(), config);
    }

    #[test]
    fn validate_rejects_nested_extra_dir() {
        let config = IoConfig {
            extra_dir: "a/b".to_owned(),
            ..IoConfig::default()
        };
        assert!(matches!(config.validate(), Err(IoError::InvalidConfig(_))));
        assert!(IoConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_thumbnail_size() {
        let config = IoConfig {
            thumbnail_max_size: 0,
            ..IoConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
