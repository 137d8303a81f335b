//! Per-image JSON sidecars holding the saved edit pipeline.
//!
//! For `<dir>/photo.jpg` the sidecar is `<dir>/<extra>/photo.jpg.json`
//! and looks like:
//!
//! ```json
//! { "processpipe": { "exposure": { "kind": "exposure", "enabled": true,
//!                                  "parameters": { "EV": 0.5 } }, ... } }
//! ```
//!
//! Other top-level keys in an existing sidecar are preserved on save.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uhdr_pipeline::PipelineDescriptor;

use crate::config::IoConfig;
use crate::error::IoError;

/// Sidecar key holding the pipeline descriptor.
pub const PROCESSPIPE_KEY: &str = "processpipe";

/// Reads and writes pipeline sidecars for one image directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataStore {
    metadata_dir: PathBuf,
}

impl MetadataStore {
    /// Sidecars for images in `image_dir`, stored under `extra_dir`.
    #[must_use]
    pub fn new(image_dir: impl AsRef<Path>, extra_dir: impl AsRef<Path>) -> Self {
        Self {
            metadata_dir: image_dir.as_ref().join(extra_dir),
        }
    }

    /// Sidecars laid out according to `config`.
    #[must_use]
    pub fn from_config(image_dir: impl AsRef<Path>, config: &IoConfig) -> Self {
        Self::new(image_dir, &config.extra_dir)
    }

    /// Directory holding the sidecars.
    #[must_use]
    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    /// Sidecar path for `image_path`. Only the file name is used.
    #[must_use]
    pub fn sidecar_path(&self, image_path: &Path) -> PathBuf {
        let mut name = image_path
            .file_name()
            .map_or_else(|| image_path.as_os_str().to_owned(), OsString::from);
        name.push(".json");
        self.metadata_dir.join(name)
    }

    /// Load the stored pipeline for `image_path`.
    ///
    /// Returns `None` when there is no sidecar or it has no
    /// `processpipe` entry.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Filesystem`] if the sidecar exists but cannot
    /// be read, and [`IoError::Metadata`] if it is not valid JSON or the
    /// pipeline inside is invalid.
    pub fn load_pipeline_for(
        &self,
        image_path: &Path,
    ) -> Result<Option<PipelineDescriptor>, IoError> {
        let path = self.sidecar_path(image_path);
        let Some(text) = read_text(&path)? else {
            return Ok(None);
        };
        let sidecar: SidecarIn = serde_json::from_str(&text)
            .map_err(|source| IoError::Metadata { path: path.clone(), source })?;
        if sidecar.processpipe.is_some() {
            debug!("loaded pipeline from {}", path.display());
        } else {
            debug!("{} has no {PROCESSPIPE_KEY} entry", path.display());
        }
        Ok(sidecar.processpipe)
    }

    /// Store `descriptor` as the pipeline for `image_path`.
    ///
    /// The sidecar is written to a temporary file and renamed into
    /// place, so a crash never leaves a truncated sidecar behind. An
    /// existing sidecar that cannot be parsed is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Filesystem`] if the directory or file cannot
    /// be written, and [`IoError::Metadata`] if serialization fails.
    pub fn save_pipeline_for(
        &self,
        image_path: &Path,
        descriptor: &PipelineDescriptor,
    ) -> Result<(), IoError> {
        fs::create_dir_all(&self.metadata_dir).map_err(|source| IoError::Filesystem {
            path: self.metadata_dir.clone(),
            source,
        })?;
        let path = self.sidecar_path(image_path);
        let mut other = match read_other_keys(&path) {
            Ok(other) => other,
            Err(e) => {
                warn!("replacing unreadable sidecar: {e}");
                Map::new()
            }
        };
        other.remove(PROCESSPIPE_KEY);
        let json = serde_json::to_vec_pretty(&SidecarOut {
            other: &other,
            processpipe: descriptor,
        })
        .map_err(|source| IoError::Metadata { path: path.clone(), source })?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        fs::write(&tmp, json).map_err(|source| IoError::Filesystem {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| IoError::Filesystem {
            path: path.clone(),
            source,
        })?;
        info!("saved pipeline to {}", path.display());
        Ok(())
    }
}

/// Sidecar as read. Parsed straight from text so the pipeline keeps
/// its node order.
#[derive(Deserialize)]
struct SidecarIn {
    #[serde(default)]
    processpipe: Option<PipelineDescriptor>,
}

/// Sidecar as written: the pipeline plus whatever else was there.
#[derive(Serialize)]
struct SidecarOut<'a> {
    #[serde(flatten)]
    other: &'a Map<String, Value>,
    processpipe: &'a PipelineDescriptor,
}

/// Contents of `path`, `None` if it does not exist.
fn read_text(path: &Path) -> Result<Option<String>, IoError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(IoError::Filesystem {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Top-level keys of an existing sidecar, empty if there is none.
fn read_other_keys(path: &Path) -> Result<Map<String, Value>, IoError> {
    let Some(text) = read_text(path)? else {
        return Ok(Map::new());
    };
    serde_json::from_str(&text).map_err(|source| IoError::Metadata {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use uhdr_pipeline::OperatorParams;
    use uhdr_pipeline::operators::ExposureParams;

    use super::*;

    fn edited() -> PipelineDescriptor {
        let mut descriptor = PipelineDescriptor::canonical();
        descriptor.nodes[0].parameters = OperatorParams::Exposure(ExposureParams { ev: 0.5 });
        descriptor.nodes[3].enabled = false;
        descriptor
    }

    #[test]
    fn sidecar_path_uses_file_name() {
        let store = MetadataStore::new("/photos", ".uHDR");
        assert_eq!(
            store.sidecar_path(Path::new("/elsewhere/a.jpg")),
            PathBuf::from("/photos/.uHDR/a.jpg.json")
        );
    }

    #[test]
    fn missing_sidecar_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::from_config(dir.path(), &IoConfig::default());
        assert_eq!(store.load_pipeline_for(Path::new("a.jpg")).unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::from_config(dir.path(), &IoConfig::default());
        store.save_pipeline_for(Path::new("a.jpg"), &edited()).unwrap();

        let path = dir.path().join(".uHDR").join("a.jpg.json");
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["processpipe"]["exposure"]["parameters"]["EV"], 0.5);
        assert_eq!(raw["processpipe"]["lightnessmask"]["enabled"], false);
        assert!(!dir.path().join(".uHDR").join("a.jpg.json.tmp").exists());

        let loaded = store.load_pipeline_for(Path::new("a.jpg")).unwrap();
        assert_eq!(loaded, Some(edited()));
    }

    #[test]
    fn save_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::from_config(dir.path(), &IoConfig::default());
        fs::create_dir_all(store.metadata_dir()).unwrap();
        fs::write(
            store.sidecar_path(Path::new("a.jpg")),
            r#"{"exif": {"ISO": 200}}"#,
        )
        .unwrap();
        assert_eq!(store.load_pipeline_for(Path::new("a.jpg")).unwrap(), None);

        store.save_pipeline_for(Path::new("a.jpg"), &edited()).unwrap();
        let text = fs::read_to_string(store.sidecar_path(Path::new("a.jpg"))).unwrap();
        let raw: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["exif"]["ISO"], 200);
        assert!(raw.get("processpipe").is_some());
    }

    #[test]
    fn malformed_sidecar_is_a_metadata_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::from_config(dir.path(), &IoConfig::default());
        fs::create_dir_all(store.metadata_dir()).unwrap();
        fs::write(store.sidecar_path(Path::new("a.jpg")), "{ nope").unwrap();
        assert!(matches!(
            store.load_pipeline_for(Path::new("a.jpg")).unwrap_err(),
            IoError::Metadata { .. }
        ));

        // Saving over it recovers.
        store.save_pipeline_for(Path::new("a.jpg"), &edited()).unwrap();
        assert_eq!(
            store.load_pipeline_for(Path::new("a.jpg")).unwrap(),
            Some(edited())
        );
    }

    #[test]
    fn invalid_parameters_are_a_metadata_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::from_config(dir.path(), &IoConfig::default());
        fs::create_dir_all(store.metadata_dir()).unwrap();
        fs::write(
            store.sidecar_path(Path::new("a.jpg")),
            r#"{"processpipe": {"exposure": {"EV": "bright"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            store.load_pipeline_for(Path::new("a.jpg")).unwrap_err(),
            IoError::Metadata { .. }
        ));
    }
}
