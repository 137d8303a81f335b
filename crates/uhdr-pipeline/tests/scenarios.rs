//! End-to-end editing scenarios on the default eleven-node pipe.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use uhdr_pipeline::color::rgb_to_hsv;
use uhdr_pipeline::operators::{
    ColorEdit, ColorEditorParams, ColorSelection, ContrastParams, ExposureParams,
    GeometryParams, SaturationMethod, SaturationParams, ToneCurveParams,
};
use uhdr_pipeline::{
    ColorImage, IncrementalExecutor, OperatorParams, PipelineDescriptor, ProcessPipe, evaluate,
};

const COLOR_EDITOR_0: usize = 5;

fn pipe_with(image: ColorImage) -> ProcessPipe {
    let mut pipe = ProcessPipe::default();
    pipe.set_image(image);
    pipe
}

/// A 16:9 image with a spread of hues, lightness and saturation.
fn colorful() -> ColorImage {
    ColorImage::from_fn(64, 36, false, |x, y| {
        let t = x as f32 / 63.0;
        let u = y as f32 / 35.0;
        [t, 0.3f32.mul_add(u, 0.2), 1.0 - t * u]
    })
}

fn assert_all_channels(image: &ColorImage, ok: impl Fn(f32) -> bool) {
    for p in image.pixels().pixels() {
        for v in p.0 {
            assert!(ok(v), "unexpected channel value {v}");
        }
    }
}

#[test]
fn default_pipe_on_mid_gray_is_identity() {
    for (width, height) in [(32, 18), (40, 30), (30, 40), (25, 25)] {
        let source = ColorImage::uniform(width, height, [0.5, 0.5, 0.5], false);
        let out = evaluate(&pipe_with(source.clone())).unwrap();
        assert_eq!(out.dimensions(), source.dimensions(), "{width}x{height}");
        assert_eq!(out.pixels(), source.pixels(), "{width}x{height}");
        assert_eq!(out.color_space(), source.color_space());
        assert!(!out.is_hdr());
    }
}

#[test]
fn max_contrast_polarizes_around_mid_gray() {
    let source = ColorImage::from_fn(32, 18, false, |x, _| [x as f32 / 31.0; 3]);
    let mut pipe = pipe_with(source.clone());
    pipe.set_parameters(1, OperatorParams::Contrast(ContrastParams { contrast: 100.0 }))
        .unwrap();
    let out = evaluate(&pipe).unwrap();

    for x in 0..32 {
        let before = source.pixel(x, 0)[0];
        let after = out.pixel(x, 0)[0];
        if before < 0.25 {
            assert!(after < 1e-6, "x={x}: {after}");
        } else if before > 0.75 {
            assert!(after > 1.0 - 1e-6, "x={x}: {after}");
        }
        // Every value moves away from 0.5 (or stays put at it).
        assert!((after - 0.5).abs() >= (before - 0.5).abs() - 1e-6);
    }
}

#[test]
fn full_selection_color_edit_saturates_every_pixel() {
    let source = ColorImage::from_fn(32, 18, false, |x, y| {
        let t = x as f32 / 31.0;
        let u = y as f32 / 17.0;
        [0.1f32.mul_add(t, 0.4), 0.1f32.mul_add(u, 0.4), 0.45]
    });
    let mut pipe = pipe_with(source.clone());
    pipe.set_parameters(
        COLOR_EDITOR_0,
        OperatorParams::ColorEditor(ColorEditorParams {
            selection: ColorSelection::default(),
            edit: ColorEdit {
                saturation: 1.0,
                ..ColorEdit::default()
            },
            mask: false,
        }),
    )
    .unwrap();
    let out = evaluate(&pipe).unwrap();

    for y in 0..18 {
        for x in 0..32 {
            let [_, s_in, _] = rgb_to_hsv(source.pixel(x, y));
            let [_, s_out, _] = rgb_to_hsv(out.pixel(x, y));
            assert!((s_out - (2.0 * s_in).min(1.0)).abs() < 1e-4, "({x}, {y})");
        }
    }
}

#[test]
fn color_edit_selecting_nothing_is_identity() {
    // Reds and oranges only; the selection asks for cyan.
    let source = ColorImage::from_fn(32, 18, false, |x, _| {
        [0.9, 0.05 + 0.01 * x as f32, 0.05]
    });
    let mut pipe = pipe_with(source.clone());
    pipe.set_parameters(
        COLOR_EDITOR_0,
        OperatorParams::ColorEditor(ColorEditorParams {
            selection: ColorSelection {
                hue: [180.0, 220.0],
                ..ColorSelection::default()
            },
            edit: ColorEdit {
                saturation: 1.0,
                ..ColorEdit::default()
            },
            mask: false,
        }),
    )
    .unwrap();
    let out = evaluate(&pipe).unwrap();
    assert_eq!(out.pixels(), source.pixels());
}

#[test]
fn evaluation_is_deterministic() {
    let mut pipe = pipe_with(colorful());
    pipe.set_parameters(0, OperatorParams::Exposure(ExposureParams { ev: 0.7 }))
        .unwrap();
    pipe.set_parameters(
        2,
        OperatorParams::ToneCurve(ToneCurveParams {
            mediums: [50.0, 58.0],
            ..ToneCurveParams::default()
        }),
    )
    .unwrap();
    pipe.set_parameters(
        10,
        OperatorParams::Geometry(GeometryParams {
            rotation: 3.0,
            ..GeometryParams::default()
        }),
    )
    .unwrap();
    let a = evaluate(&pipe).unwrap();
    let b = evaluate(&pipe).unwrap();
    assert_eq!(a, b);
}

#[test]
fn incremental_and_full_evaluation_agree_over_an_edit_sequence() {
    let mut pipe = pipe_with(colorful());
    let mut exec = IncrementalExecutor::new();
    let edits = [
        (4, OperatorParams::Saturation(SaturationParams {
            saturation: 35.0,
            method: SaturationMethod::Gamma,
        })),
        (0, OperatorParams::Exposure(ExposureParams { ev: -0.5 })),
        (7, OperatorParams::ColorEditor(ColorEditorParams {
            selection: ColorSelection {
                hue: [200.0, 300.0],
                ..ColorSelection::default()
            },
            edit: ColorEdit {
                hue: 20.0,
                exposure: 0.3,
                contrast: 10.0,
                saturation: -0.2,
            },
            mask: false,
        })),
        (1, OperatorParams::Contrast(ContrastParams { contrast: 25.0 })),
    ];
    for (index, params) in edits {
        pipe.set_parameters(index, params).unwrap();
        assert_eq!(exec.evaluate(&pipe).unwrap(), evaluate(&pipe).unwrap());
    }
}

#[test]
fn operators_leave_the_source_untouched() {
    let source = colorful();
    let mut pipe = pipe_with(source.clone());
    pipe.set_parameters(0, OperatorParams::Exposure(ExposureParams { ev: 2.0 }))
        .unwrap();
    pipe.set_parameters(1, OperatorParams::Contrast(ContrastParams { contrast: -50.0 }))
        .unwrap();
    let _ = evaluate(&pipe).unwrap();
    assert_eq!(pipe.image().unwrap(), &source);
}

#[test]
fn huge_exposure_stays_in_range() {
    let params = OperatorParams::Exposure(ExposureParams { ev: 200.0 });

    let mut sdr = pipe_with(colorful());
    sdr.set_parameters(0, params.clone()).unwrap();
    assert_all_channels(&evaluate(&sdr).unwrap(), |v| (0.0..=1.0).contains(&v));

    let hdr_source = ColorImage::from_fn(32, 18, true, |x, _| [x as f32, 0.0, 2.5]);
    let mut hdr = pipe_with(hdr_source);
    hdr.set_parameters(0, params).unwrap();
    let out = evaluate(&hdr).unwrap();
    assert!(out.is_hdr());
    assert_all_channels(&out, |v| v >= 0.0 && !v.is_nan());
}

#[test]
fn descriptor_survives_json_and_rebuild() {
    let mut pipe = ProcessPipe::default();
    pipe.set_parameters(1, OperatorParams::Contrast(ContrastParams { contrast: 12.5 }))
        .unwrap();
    pipe.set_enabled(4, false).unwrap();
    let json = serde_json::to_string(&pipe.to_descriptor()).unwrap();
    let descriptor: PipelineDescriptor = serde_json::from_str(&json).unwrap();
    let rebuilt = ProcessPipe::from_descriptor(descriptor).unwrap();
    assert_eq!(rebuilt, pipe);
}

#[test]
fn thumbnail_of_large_source_is_bounded() {
    let source = ColorImage::uniform(4000, 3000, [0.4, 0.5, 0.6], false);
    let thumb = source.build_thumbnail(800);
    assert!(thumb.width().max(thumb.height()) <= 800);
    let ratio = f64::from(thumb.width()) / f64::from(thumb.height());
    assert!((ratio - 4.0 / 3.0).abs() < 0.01);
}

#[test]
fn node_indices_follow_the_canonical_order() {
    let mut pipe = ProcessPipe::default();
    let contrast = OperatorParams::Contrast(ContrastParams { contrast: 10.0 });
    pipe.set_parameters(1, contrast.clone()).unwrap();
    assert_eq!(pipe.index_of("contrast"), Some(1));
    assert_eq!(pipe.parameters(1).unwrap(), contrast);
    assert_eq!(pipe.index_of("colorEditor0"), Some(COLOR_EDITOR_0));
    assert_eq!(pipe.index_of("geometry"), Some(10));
    // Contrast parameters never fit the exposure slot.
    assert!(pipe.set_parameters(0, contrast).is_err());
}
