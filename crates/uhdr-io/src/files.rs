//! Background loading of the images in one directory.
//!
//! [`ImageFiles`] decodes images on a rayon thread pool. At most one
//! load per file (and per full/thumbnail variant) is in flight at a
//! time. Finished loads are reported as [`LoadEvent`]s through
//! [`poll`](ImageFiles::poll) or [`wait_event`](ImageFiles::wait_event);
//! the caller owns the cache and reacts on its own thread.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use log::{debug, info, warn};
use uhdr_pipeline::{ColorImage, PipelineDescriptor};

use crate::config::IoConfig;
use crate::error::IoError;
use crate::image_file::read_image;
use crate::metadata::MetadataStore;
use crate::thumbnail::ThumbnailCache;

/// Which variant of an image a load produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LoadKey {
    name: String,
    thumbnail: bool,
}

/// Outcome of a background load.
#[derive(Debug)]
pub enum LoadEvent {
    /// The image is now available from [`ImageFiles::get_image`] or
    /// [`ImageFiles::get_thumbnail`].
    Loaded {
        /// File name within the image directory.
        name: String,
        /// Whether the thumbnail (rather than the full image) loaded.
        thumbnail: bool,
    },
    /// The load gave up.
    Failed {
        /// File name within the image directory.
        name: String,
        /// Whether the thumbnail was requested.
        thumbnail: bool,
        /// Why. Repeated decode failures arrive as
        /// [`IoError::DecodeTaskFailure`].
        error: IoError,
    },
}

impl LoadEvent {
    /// File name the event is about.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Loaded { name, .. } | Self::Failed { name, .. } => name,
        }
    }
}

struct Completion {
    key: LoadKey,
    result: Result<ColorImage, IoError>,
}

/// The images of one directory, their thumbnails and sidecars.
pub struct ImageFiles {
    image_dir: PathBuf,
    config: IoConfig,
    metadata: MetadataStore,
    thumbnails: Arc<ThumbnailCache>,
    pool: rayon::ThreadPool,
    images: HashMap<LoadKey, ColorImage>,
    in_flight: HashSet<LoadKey>,
    ready: VecDeque<LoadEvent>,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
}

impl ImageFiles {
    /// Manage the images in `image_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidConfig`] if `config` does not validate
    /// and [`IoError::ThreadPool`] if the loader threads cannot start.
    pub fn new(image_dir: impl Into<PathBuf>, config: IoConfig) -> Result<Self, IoError> {
        config.validate()?;
        let image_dir = image_dir.into();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("uhdr-load-{i}"))
            .build()?;
        let (sender, receiver) = mpsc::channel();
        info!(
            "managing images in {} with {} loader threads",
            image_dir.display(),
            pool.current_num_threads()
        );
        Ok(Self {
            metadata: MetadataStore::from_config(&image_dir, &config),
            thumbnails: Arc::new(ThumbnailCache::new(&image_dir, &config)),
            image_dir,
            config,
            pool,
            images: HashMap::new(),
            in_flight: HashSet::new(),
            ready: VecDeque::new(),
            sender,
            receiver,
        })
    }

    /// The managed directory.
    #[must_use]
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &IoConfig {
        &self.config
    }

    /// Start loading `name` (its thumbnail if `thumbnail` is set).
    ///
    /// Already loaded images are reported as loaded on the next
    /// [`poll`](Self::poll) without touching the disk. A request for an
    /// image that is already loading is ignored.
    pub fn request_load(&mut self, name: &str, thumbnail: bool) {
        let key = LoadKey {
            name: name.to_owned(),
            thumbnail,
        };
        if self.images.contains_key(&key) {
            debug!("{name} already loaded (thumbnail: {thumbnail})");
            self.ready.push_back(LoadEvent::Loaded {
                name: key.name,
                thumbnail,
            });
            return;
        }
        if !self.in_flight.insert(key.clone()) {
            debug!("{name} already loading (thumbnail: {thumbnail})");
            return;
        }

        let path = self.image_dir.join(name);
        let task = LoadTask {
            path,
            name: name.to_owned(),
            thumbnail,
            max_retries: self.config.max_decode_retries,
            thumbnails: Arc::clone(&self.thumbnails),
            metadata: self.metadata.clone(),
        };
        let sender = self.sender.clone();
        self.pool.spawn(move || {
            let result = task.run();
            // The receiver only disappears with `ImageFiles` itself.
            let _ = sender.send(Completion { key, result });
        });
    }

    /// Whether a load of `name` is in flight.
    #[must_use]
    pub fn is_loading(&self, name: &str, thumbnail: bool) -> bool {
        self.in_flight.contains(&LoadKey {
            name: name.to_owned(),
            thumbnail,
        })
    }

    /// Number of loads in flight.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Collect every event that is ready, without blocking.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        while let Ok(completion) = self.receiver.try_recv() {
            let event = self.complete(completion);
            self.ready.push_back(event);
        }
        self.ready.drain(..).collect()
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// Returns `None` on timeout, or immediately when nothing is ready
    /// and nothing is loading.
    pub fn wait_event(&mut self, timeout: Duration) -> Option<LoadEvent> {
        if let Some(event) = self.ready.pop_front() {
            return Some(event);
        }
        if self.in_flight.is_empty() {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(completion) => Some(self.complete(completion)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    fn complete(&mut self, completion: Completion) -> LoadEvent {
        let Completion { key, result } = completion;
        self.in_flight.remove(&key);
        match result {
            Ok(image) => {
                info!("loaded {} ({image})", key.name);
                let event = LoadEvent::Loaded {
                    name: key.name.clone(),
                    thumbnail: key.thumbnail,
                };
                self.images.insert(key, image);
                event
            }
            Err(error) => {
                warn!("loading {} failed: {error}", key.name);
                LoadEvent::Failed {
                    name: key.name,
                    thumbnail: key.thumbnail,
                    error,
                }
            }
        }
    }

    /// The full-resolution image, if loaded. Its metadata holds the
    /// stored pipeline, if any.
    #[must_use]
    pub fn get_image(&self, name: &str) -> Option<&ColorImage> {
        self.images.get(&LoadKey {
            name: name.to_owned(),
            thumbnail: false,
        })
    }

    /// The thumbnail, if loaded.
    #[must_use]
    pub fn get_thumbnail(&self, name: &str) -> Option<&ColorImage> {
        self.images.get(&LoadKey {
            name: name.to_owned(),
            thumbnail: true,
        })
    }

    /// Drop both variants of `name` from memory.
    pub fn evict(&mut self, name: &str) {
        self.images.retain(|key, _| key.name != name);
    }

    /// The stored pipeline for `name`, read from its sidecar.
    ///
    /// # Errors
    ///
    /// As [`MetadataStore::load_pipeline_for`].
    pub fn get_processpipe(&self, name: &str) -> Result<Option<PipelineDescriptor>, IoError> {
        self.metadata.load_pipeline_for(Path::new(name))
    }

    /// Persist the pipeline for `name` and attach it to the loaded
    /// full-resolution image, if any.
    ///
    /// # Errors
    ///
    /// As [`MetadataStore::save_pipeline_for`].
    pub fn save_processpipe(
        &mut self,
        name: &str,
        descriptor: &PipelineDescriptor,
    ) -> Result<(), IoError> {
        self.metadata.save_pipeline_for(Path::new(name), descriptor)?;
        if let Some(image) = self.images.get_mut(&LoadKey {
            name: name.to_owned(),
            thumbnail: false,
        }) {
            image.set_metadata(Some(descriptor.clone()));
        }
        Ok(())
    }
}

/// One background load with its retry budget.
struct LoadTask {
    path: PathBuf,
    name: String,
    thumbnail: bool,
    max_retries: u32,
    thumbnails: Arc<ThumbnailCache>,
    metadata: MetadataStore,
}

impl LoadTask {
    fn run(&self) -> Result<ColorImage, IoError> {
        let attempts = self.max_retries.saturating_add(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.attempt() {
                Ok(image) => return Ok(image),
                Err(e) if e.is_retryable() => {
                    warn!("loading {} failed (attempt {attempt}/{attempts}): {e}", self.name);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(IoError::DecodeTaskFailure {
            name: self.name.clone(),
            attempts,
            message: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    fn attempt(&self) -> Result<ColorImage, IoError> {
        if self.thumbnail {
            return self.thumbnails.load_or_build(&self.path);
        }
        let mut image = read_image(&self.path)?;
        match self.metadata.load_pipeline_for(&self.path) {
            Ok(descriptor) => image.set_metadata(descriptor),
            Err(e) => warn!("ignoring sidecar of {}: {e}", self.name),
        }
        Ok(image)
    }
}
