//! Reading and writing image files.
//!
//! The codec is chosen strictly by extension (`.jpg`/`.jpeg`/`.png`
//! for 8-bit SDR, `.hdr`/`.exr` for floating-point HDR). A missing or
//! corrupt file is an error; callers that want to keep going can
//! substitute [`ColorImage::placeholder`] themselves.

use std::fs;
use std::path::Path;

use log::{debug, info};
use uhdr_pipeline::{ColorImage, ImageFormat, PipelineError};

use crate::error::{IoError, WriteFailure};

/// Whether `path` has one of the supported image extensions.
#[must_use]
pub fn is_supported(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok()
}

fn format_of(path: &Path) -> Result<ImageFormat, IoError> {
    ImageFormat::from_path(path).map_err(|_| IoError::UnsupportedFormat {
        path: path.to_path_buf(),
    })
}

/// Read and decode the image at `path`.
///
/// # Errors
///
/// Returns [`IoError::UnsupportedFormat`] for an unknown extension and
/// [`IoError::ImageRead`] if the file is missing, unreadable or corrupt.
pub fn read_image(path: &Path) -> Result<ColorImage, IoError> {
    let format = format_of(path)?;
    let bytes = fs::read(path).map_err(|e| IoError::ImageRead {
        path: path.to_path_buf(),
        source: PipelineError::ImageDecode(image::ImageError::IoError(e)),
    })?;
    let image = ColorImage::decode(&bytes, format).map_err(|source| IoError::ImageRead {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("read {} as {image}", path.display());
    Ok(image)
}

/// Encode `image` by `path`'s extension and write it.
///
/// HDR pixel values are clipped to `[0, 1]` when written to an 8-bit
/// format.
///
/// # Errors
///
/// Returns [`IoError::UnsupportedFormat`] for an unknown extension and
/// [`IoError::ImageWrite`] if encoding fails or the file cannot be
/// written.
pub fn write_image(image: &ColorImage, path: &Path) -> Result<(), IoError> {
    let format = format_of(path)?;
    let write_error = |source: WriteFailure| IoError::ImageWrite {
        path: path.to_path_buf(),
        source,
    };
    let bytes = image.encode(format).map_err(|e| write_error(e.into()))?;
    fs::write(path, &bytes).map_err(|e| write_error(e.into()))?;
    info!("wrote {} ({format}, {} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn gradient(hdr: bool) -> ColorImage {
        ColorImage::from_fn(8, 4, hdr, |x, y| {
            [x as f32 / 7.0, y as f32 / 3.0, if hdr { 3.5 } else { 0.5 }]
        })
    }

    #[test]
    fn png_round_trip_is_sdr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_image(&gradient(false), &path).unwrap();
        let back = read_image(&path).unwrap();
        assert!(!back.is_hdr());
        assert_eq!(back.dimensions(), gradient(false).dimensions());
        assert!((back.pixel(7, 3)[0] - 1.0).abs() < 1e-6);
        assert!((back.pixel(0, 0)[2] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn exr_keeps_values_above_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.exr");
        write_image(&gradient(true), &path).unwrap();
        let back = read_image(&path).unwrap();
        assert!(back.is_hdr());
        assert!((back.pixel(2, 1)[2] - 3.5).abs() < 1e-3);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_image(&dir.path().join("missing.jpg")).unwrap_err();
        assert!(matches!(err, IoError::ImageRead { .. }));
    }

    #[test]
    fn corrupt_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"not a png").unwrap();
        assert!(matches!(
            read_image(&path).unwrap_err(),
            IoError::ImageRead { .. }
        ));
    }

    #[test]
    fn empty_image_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let err = write_image(&ColorImage::uniform(0, 0, [0.5; 3], false), &path).unwrap_err();
        assert!(
            matches!(
                err,
                IoError::ImageWrite {
                    source: WriteFailure::Encode(_),
                    ..
                }
            ),
            "{err:?}"
        );
        assert!(!path.exists());
    }

    #[test]
    fn missing_directory_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("a.png");
        let err = write_image(&gradient(false), &path).unwrap_err();
        assert!(
            matches!(
                err,
                IoError::ImageWrite {
                    source: WriteFailure::Io(_),
                    ..
                }
            ),
            "{err:?}"
        );
    }

    #[test]
    fn unknown_extension_is_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tiff");
        assert!(matches!(
            write_image(&gradient(false), &path).unwrap_err(),
            IoError::UnsupportedFormat { .. }
        ));
        assert!(!path.exists());
        assert!(!is_supported(&path));
        assert!(is_supported(Path::new("b.JPEG")));
    }
}
