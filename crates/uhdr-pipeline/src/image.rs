//! In-memory color image model.
//!
//! A [`ColorImage`] owns a three-channel `f32` pixel buffer in the
//! linear domain together with its colorimetric tags and, optionally,
//! the edit pipeline that produced it. Values are nominally in `[0, 1]`
//! for SDR content and unbounded above for HDR content.
//!
//! Decoding and encoding work on in-memory byte slices; reading and
//! writing files is the job of `uhdr-io`.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::descriptor::PipelineDescriptor;
use crate::downsample::{DownsampleFilter, downsample};
use crate::types::{ColorSpace, Dimensions, PipelineError, Rgb32FImage};

/// Side length of the gray image the legacy application showed for
/// files it could not open.
const PLACEHOLDER_WIDTH: u32 = 800;
const PLACEHOLDER_HEIGHT: u32 = 600;
const PLACEHOLDER_LEVEL: f32 = 0.5;

/// Supported on-disk image codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG, 8-bit SDR.
    Jpeg,
    /// PNG, 8-bit SDR.
    Png,
    /// Radiance RGBE, floating-point HDR.
    Hdr,
    /// OpenEXR, floating-point HDR.
    Exr,
}

impl ImageFormat {
    /// Map a file extension (case-insensitive, without the dot) to a format.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedFormat`] for any extension
    /// other than `jpg`, `jpeg`, `png`, `hdr` or `exr`.
    pub fn from_extension(ext: &str) -> Result<Self, PipelineError> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "hdr" => Ok(Self::Hdr),
            "exr" => Ok(Self::Exr),
            other => Err(PipelineError::UnsupportedFormat(other.to_owned())),
        }
    }

    /// Determine the format from a path's extension.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedFormat`] when the path has no
    /// extension or an unrecognized one.
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| PipelineError::UnsupportedFormat(path.display().to_string()))?;
        Self::from_extension(ext)
    }

    /// Whether this codec stores floating-point (HDR) data.
    #[must_use]
    pub const fn is_hdr(self) -> bool {
        matches!(self, Self::Hdr | Self::Exr)
    }

    const fn to_image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::Hdr => image::ImageFormat::Hdr,
            Self::Exr => image::ImageFormat::OpenExr,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg => f.write_str("JPEG"),
            Self::Png => f.write_str("PNG"),
            Self::Hdr => f.write_str("Radiance HDR"),
            Self::Exr => f.write_str("OpenEXR"),
        }
    }
}

/// Color data + color space + HDR flag + optional edit metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorImage {
    pixels: Rgb32FImage,
    color_space: ColorSpace,
    hdr: bool,
    metadata: Option<PipelineDescriptor>,
}

impl ColorImage {
    /// Wrap an existing pixel buffer.
    #[must_use]
    pub const fn new(pixels: Rgb32FImage, color_space: ColorSpace, hdr: bool) -> Self {
        Self {
            pixels,
            color_space,
            hdr,
            metadata: None,
        }
    }

    /// Build an sRGB image by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn<F>(width: u32, height: u32, hdr: bool, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [f32; 3],
    {
        let pixels = Rgb32FImage::from_fn(width, height, |x, y| image::Rgb(f(x, y)));
        Self::new(pixels, ColorSpace::Srgb, hdr)
    }

    /// Build a uniformly colored sRGB image.
    #[must_use]
    pub fn uniform(width: u32, height: u32, rgb: [f32; 3], hdr: bool) -> Self {
        Self::new(
            Rgb32FImage::from_pixel(width, height, image::Rgb(rgb)),
            ColorSpace::Srgb,
            hdr,
        )
    }

    /// Build an image from interleaved RGB `f32` samples.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if `data.len()` is not
    /// `width * height * 3`.
    pub fn from_raw(
        width: u32,
        height: u32,
        data: Vec<f32>,
        color_space: ColorSpace,
        hdr: bool,
    ) -> Result<Self, PipelineError> {
        let pixels = Rgb32FImage::from_raw(width, height, data)
            .ok_or(PipelineError::InvalidDimensions { width, height })?;
        Ok(Self::new(pixels, color_space, hdr))
    }

    /// The mid-gray 800x600 SDR image shown in place of files that could
    /// not be opened.
    ///
    /// Readers never substitute this on their own; callers that want the
    /// legacy "gray slot" behavior ask for it explicitly.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::uniform(
            PLACEHOLDER_WIDTH,
            PLACEHOLDER_HEIGHT,
            [PLACEHOLDER_LEVEL; 3],
            false,
        )
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Image dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.pixels.width(),
            height: self.pixels.height(),
        }
    }

    /// The underlying pixel buffer.
    #[must_use]
    pub const fn pixels(&self) -> &Rgb32FImage {
        &self.pixels
    }

    /// Consume the image and return the pixel buffer.
    #[must_use]
    pub fn into_pixels(self) -> Rgb32FImage {
        self.pixels
    }

    /// RGB value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        self.pixels.get_pixel(x, y).0
    }

    /// Color space tag.
    #[must_use]
    pub const fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Whether the pixel values are unbounded HDR data.
    #[must_use]
    pub const fn is_hdr(&self) -> bool {
        self.hdr
    }

    /// Pipeline descriptor attached to this image, if any.
    #[must_use]
    pub const fn metadata(&self) -> Option<&PipelineDescriptor> {
        self.metadata.as_ref()
    }

    /// Attach (or clear) the pipeline descriptor.
    pub fn set_metadata(&mut self, metadata: Option<PipelineDescriptor>) {
        self.metadata = metadata;
    }

    /// Replace the pixel buffer, keeping tags and metadata.
    #[must_use]
    pub fn with_pixels(&self, pixels: Rgb32FImage) -> Self {
        Self {
            pixels,
            color_space: self.color_space,
            hdr: self.hdr,
            metadata: self.metadata.clone(),
        }
    }

    /// Clip a channel value to the valid range for this image:
    /// `[0, 1]` for SDR and `[0, +inf)` for HDR. NaN maps to zero.
    #[must_use]
    pub fn clip(&self, value: f32) -> f32 {
        clip_value(value, self.hdr)
    }

    /// Decode an encoded image held in memory.
    ///
    /// 8-bit formats are scaled to `[0, 1]` and tagged SDR; `.hdr` and
    /// `.exr` data keeps its floating-point values and is tagged HDR.
    /// Both are tagged sRGB.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageDecode`] if the data is corrupt or
    /// does not match `format`.
    pub fn decode(bytes: &[u8], format: ImageFormat) -> Result<Self, PipelineError> {
        let decoded = image::load_from_memory_with_format(bytes, format.to_image_format())?;
        Ok(Self::new(
            decoded.into_rgb32f(),
            ColorSpace::Srgb,
            format.is_hdr(),
        ))
    }

    /// Encode the image into `format`.
    ///
    /// SDR formats scale `[0, 1]` linearly onto `[0, 255]` after clipping;
    /// no transfer curve is applied beyond what the buffer already holds.
    /// HDR formats store the raw floating-point values.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ImageEncode`] if the codec rejects the data.
    pub fn encode(&self, format: ImageFormat) -> Result<Vec<u8>, PipelineError> {
        let dynamic = if format.is_hdr() {
            DynamicImage::ImageRgb32F(self.pixels.clone())
        } else {
            DynamicImage::ImageRgb8(self.to_rgb8())
        };
        let mut bytes = Vec::new();
        dynamic
            .write_to(&mut Cursor::new(&mut bytes), format.to_image_format())
            .map_err(|e| PipelineError::ImageEncode(e.to_string()))?;
        Ok(bytes)
    }

    /// Quantize to 8-bit by direct `[0, 1] -> [0, 255]` scaling.
    #[must_use]
    pub fn to_rgb8(&self) -> image::RgbImage {
        image::RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let [r, g, b] = self.pixel(x, y);
            image::Rgb([to_u8(r), to_u8(g), to_u8(b)])
        })
    }

    /// Build a thumbnail whose longer edge is at most `max_size` pixels.
    ///
    /// The result is always an independent copy, full-resolution when
    /// the image already fits. Pipeline metadata is not carried over.
    #[must_use]
    pub fn build_thumbnail(&self, max_size: u32) -> Self {
        self.build_thumbnail_with(max_size, DownsampleFilter::default())
    }

    /// [`build_thumbnail`](Self::build_thumbnail) with an explicit filter.
    #[must_use]
    pub fn build_thumbnail_with(&self, max_size: u32, filter: DownsampleFilter) -> Self {
        let (pixels, _) = downsample(&self.pixels, max_size, filter);
        Self::new(pixels, self.color_space, self.hdr)
    }
}

impl fmt::Display for ColorImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.dimensions(),
            self.color_space,
            if self.hdr { "HDR" } else { "SDR" }
        )
    }
}

/// Clip a channel value for an SDR (`[0, 1]`) or HDR (`[0, +inf)`) image.
pub(crate) fn clip_value(value: f32, hdr: bool) -> f32 {
    if value.is_nan() {
        0.0
    } else if hdr {
        value.max(0.0)
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(value: f32) -> u8 {
    (clip_value(value, false) * 255.0).round() as u8
}
