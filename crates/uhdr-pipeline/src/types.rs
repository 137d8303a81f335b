//! Shared types for the uhdr editing pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `Rgb32FImage` so downstream crates can reference raw
/// pixel buffers without depending on `image` directly.
pub use image::Rgb32FImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// The longer of the two edges.
    #[must_use]
    pub const fn long_edge(self) -> u32 {
        if self.width >= self.height {
            self.width
        } else {
            self.height
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Colorimetric tag carried by every [`ColorImage`](crate::ColorImage).
///
/// Pixel data is always linear-domain `f32`; the tag records which
/// primaries/encoding the values refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// sRGB primaries, D65 white.
    #[default]
    Srgb,
    /// scRGB: sRGB primaries with an extended (unbounded) range.
    ScRgb,
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Srgb => f.write_str("sRGB"),
            Self::ScRgb => f.write_str("scRGB"),
        }
    }
}

/// Errors that can occur while building, editing or evaluating a pipeline.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A node index does not exist in the pipe.
    #[error("node index {index} out of range (pipe has {len} nodes)")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of nodes in the pipe.
        len: usize,
    },

    /// A parameter set does not match the node's operator kind, or
    /// holds values outside the operator's domain.
    #[error("invalid parameter schema: {0}")]
    InvalidParameterSchema(String),

    /// The file extension or format is not one of the supported codecs.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Failed to decode image bytes.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Failed to encode an image.
    #[error("failed to encode image: {0}")]
    ImageEncode(String),

    /// Evaluation was requested before a source image was bound.
    #[error("no source image bound to the pipe")]
    NoImage,

    /// Pixel data does not match the declared dimensions.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
}

impl PipelineError {
    /// Shorthand for building an [`InvalidParameterSchema`](Self::InvalidParameterSchema).
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::InvalidParameterSchema(message.into())
    }
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    IndexOutOfRange { index: usize, len: usize },
    InvalidParameterSchema(String),
    UnsupportedFormat(String),
    ImageDecode(String),
    ImageEncode(String),
    NoImage,
    InvalidDimensions { width: u32, height: u32 },
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::IndexOutOfRange { index, len } => PipelineErrorProxy::IndexOutOfRange {
                index: *index,
                len: *len,
            },
            Self::InvalidParameterSchema(s) => PipelineErrorProxy::InvalidParameterSchema(s.clone()),
            Self::UnsupportedFormat(s) => PipelineErrorProxy::UnsupportedFormat(s.clone()),
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::ImageEncode(s) => PipelineErrorProxy::ImageEncode(s.clone()),
            Self::NoImage => PipelineErrorProxy::NoImage,
            Self::InvalidDimensions { width, height } => PipelineErrorProxy::InvalidDimensions {
                width: *width,
                height: *height,
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::IndexOutOfRange { index, len } => {
                Self::IndexOutOfRange { index, len }
            }
            PipelineErrorProxy::InvalidParameterSchema(s) => Self::InvalidParameterSchema(s),
            PipelineErrorProxy::UnsupportedFormat(s) => Self::UnsupportedFormat(s),
            // The typed image error cannot be rebuilt; keep the message.
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::ImageEncode(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::ImageEncode(s) => Self::ImageEncode(s),
            PipelineErrorProxy::NoImage => Self::NoImage,
            PipelineErrorProxy::InvalidDimensions { width, height } => {
                Self::InvalidDimensions { width, height }
            }
        })
    }
}
