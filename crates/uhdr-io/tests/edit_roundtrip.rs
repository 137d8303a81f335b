//! Open an image from disk, edit it, persist the edits and reopen.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::time::Duration;

use uhdr_io::{ImageFiles, IoConfig, LoadEvent, read_image, write_image};
use uhdr_pipeline::operators::{ContrastParams, ExposureParams};
use uhdr_pipeline::{ColorImage, EditSession, OperatorParams};

fn load(files: &mut ImageFiles, name: &str) -> ColorImage {
    files.request_load(name, false);
    let event = files
        .wait_event(Duration::from_secs(30))
        .expect("load should finish");
    assert!(matches!(event, LoadEvent::Loaded { .. }), "{event:?}");
    files.get_image(name).expect("image should be cached").clone()
}

fn write_source(dir: &Path) {
    let image = ColorImage::from_fn(64, 36, false, |x, y| {
        [x as f32 / 63.0, y as f32 / 35.0, 0.5]
    });
    write_image(&image, &dir.join("scene.png")).unwrap();
}

#[test]
fn edits_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    let config = IoConfig {
        worker_threads: 1,
        ..IoConfig::default()
    };

    let (descriptor, edited) = {
        let mut files = ImageFiles::new(dir.path(), config.clone()).unwrap();
        let original = load(&mut files, "scene.png");
        assert!(original.metadata().is_none());

        let stored = files.get_processpipe("scene.png").unwrap();
        let mut session = EditSession::open("scene.png", original, stored).unwrap();
        session
            .edit(0, OperatorParams::Exposure(ExposureParams { ev: -0.5 }))
            .unwrap();
        session
            .edit(1, OperatorParams::Contrast(ContrastParams { contrast: 40.0 }))
            .unwrap();
        files
            .save_processpipe("scene.png", &session.descriptor())
            .unwrap();
        (session.descriptor(), session.current().clone())
    };

    let mut files = ImageFiles::new(dir.path(), config).unwrap();
    let reopened = load(&mut files, "scene.png");
    assert_eq!(reopened.metadata(), Some(&descriptor));

    let stored = reopened.metadata().cloned();
    let session = EditSession::open("scene.png", reopened, stored).unwrap();
    assert_eq!(session.current().pixels(), edited.pixels());
}

#[test]
fn exported_result_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    let original = read_image(&dir.path().join("scene.png")).unwrap();
    let mut session = EditSession::open("scene.png", original, None).unwrap();
    let edited = session
        .edit(0, OperatorParams::Exposure(ExposureParams { ev: 1.0 }))
        .unwrap()
        .clone();

    let out = dir.path().join("scene_edited.png");
    write_image(&edited, &out).unwrap();
    let back = read_image(&out).unwrap();
    assert_eq!(back.dimensions(), edited.dimensions());
    for (a, b) in back.pixels().pixels().zip(edited.pixels().pixels()) {
        for c in 0..3 {
            assert!((a.0[c] - b.0[c]).abs() <= 0.5 / 255.0 + 1e-6);
        }
    }
}

#[test]
fn thumbnails_are_cached_under_the_extra_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_source(dir.path());
    let config = IoConfig {
        thumbnail_max_size: 32,
        ..IoConfig::default()
    };
    let mut files = ImageFiles::new(dir.path(), config).unwrap();
    files.request_load("scene.png", true);
    let event = files.wait_event(Duration::from_secs(30)).unwrap();
    assert!(matches!(event, LoadEvent::Loaded { thumbnail: true, .. }));
    let thumb = files.get_thumbnail("scene.png").unwrap();
    assert_eq!((thumb.width(), thumb.height()), (32, 18));
    assert!(dir.path().join(".uHDR").join("thumbnail_scene.png").is_file());
}
