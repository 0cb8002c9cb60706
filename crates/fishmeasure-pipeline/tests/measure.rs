//! Integration tests: synthetic masks through the full measurement pass.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use fishmeasure_pipeline::world::Size;
use fishmeasure_pipeline::{
    BoxDistances, EllipseFitKind, GrayImage, MeasureError, MeasurementConfig, OverheadCamera,
    Pipeline, Species, ViewGeometry, measure_mask,
};
use image::Luma;

/// Filled ellipse with semi-axes `a`, `b`, rotated `degrees` about
/// `(cx, cy)` in image coordinates.
fn rotated_ellipse(w: u32, h: u32, cx: f64, cy: f64, a: f64, b: f64, degrees: f64) -> GrayImage {
    let (sin, cos) = degrees.to_radians().sin_cos();
    GrayImage::from_fn(w, h, |x, y| {
        let dx = f64::from(x) - cx;
        let dy = f64::from(y) - cy;
        let u = dx.mul_add(cos, dy * sin) / a;
        let v = (-dx).mul_add(sin, dy * cos) / b;
        if u * u + v * v <= 1.0 {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

fn view(w: f64, h: f64) -> ViewGeometry {
    ViewGeometry::new(Size::new(w, h), Size::new(w, h)).unwrap()
}

#[test]
fn rotated_ellipse_fits_true_axes_and_angle() {
    let mask = rotated_ellipse(200, 200, 100.0, 100.0, 60.0, 40.0, 15.0);
    let extracted = Pipeline::new(mask, MeasurementConfig::default())
        .threshold()
        .unwrap()
        .extract_contours();
    assert_eq!(extracted.contours().len(), 1);

    let fitted = extracted.select().unwrap().fit().unwrap();
    let e = *fitted.ellipse();
    eprintln!("fitted ellipse: {e:?}");
    assert!((e.center.x - 100.0).abs() < 0.5);
    assert!((e.center.y - 100.0).abs() < 0.5);
    assert!((e.size.width - 60.0).abs() < 1.5, "{}", e.size.width);
    assert!((e.size.height - 40.0).abs() < 1.5, "{}", e.size.height);
    assert!((e.rotation_degrees - 15.0).abs() < 1.0, "{}", e.rotation_degrees);

    let tips = fitted.locate_tips();
    assert!((tips.tips().max_span() - 120.0).abs() < 3.0);
}

#[test]
fn minimax_fit_reports_no_rotation() {
    let mask = rotated_ellipse(200, 200, 100.0, 100.0, 60.0, 40.0, 15.0);
    let config = MeasurementConfig {
        ellipse_fit: EllipseFitKind::Minimax,
        ..MeasurementConfig::default()
    };
    let fitted = Pipeline::new(mask, config)
        .threshold()
        .unwrap()
        .extract_contours()
        .select()
        .unwrap()
        .fit()
        .unwrap();
    assert!(fitted.ellipse().rotation_degrees.abs() < f64::EPSILON);
    assert_eq!(fitted.strategy(), EllipseFitKind::Minimax);
}

#[test]
fn empty_mask_reports_no_foreground() {
    let mask = GrayImage::new(64, 64);
    let v = view(64.0, 64.0);
    let camera = OverheadCamera::new(mask.clone(), v, 1.0, 0.02, 64.0);
    let err = measure_mask(
        mask,
        &camera,
        &v,
        Species::CalicoBass,
        MeasurementConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, MeasureError::NoForeground));
}

#[test]
fn unit_valued_mask_measures_like_full_range_mask() {
    let full = rotated_ellipse(200, 200, 100.0, 100.0, 60.0, 20.0, 0.0);
    let unit = GrayImage::from_fn(200, 200, |x, y| {
        Luma([u8::from(full.get_pixel(x, y).0[0] == 255)])
    });
    let v = view(200.0, 200.0);
    let measure = |mask: GrayImage| {
        let camera = OverheadCamera::new(mask.clone(), v, 1.0, 0.04, 200.0);
        measure_mask(
            mask,
            &camera,
            &v,
            Species::CalicoBass,
            MeasurementConfig::default(),
        )
        .unwrap()
    };
    let from_unit = measure(unit);
    let from_full = measure(full);
    assert_eq!(from_unit.contour, from_full.contour);
    assert_eq!(from_unit.measurement, from_full.measurement);
    assert!(from_unit.report.weight_lb > 0.0);
}

#[test]
fn off_centre_distractor_is_ignored() {
    let mut mask = rotated_ellipse(200, 200, 100.0, 100.0, 50.0, 20.0, 0.0);
    for y in 0..10 {
        for x in 0..10 {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    let selected = Pipeline::new(mask, MeasurementConfig::default())
        .threshold()
        .unwrap()
        .extract_contours()
        .select()
        .unwrap();
    assert!(selected.contour().len() > 100);
    let c = selected.contour().centroid().unwrap();
    assert!((c.x - 100.0).abs() < 1.0 && (c.y - 100.0).abs() < 1.0);
}

#[test]
fn anchored_measurement_scales_with_camera_height() {
    let mask = rotated_ellipse(200, 200, 100.0, 100.0, 60.0, 20.0, 0.0);
    let v = view(200.0, 200.0);
    let measure_at = |camera_height: f64| {
        let camera = OverheadCamera::new(mask.clone(), v, camera_height, 0.04, 200.0);
        measure_mask(
            mask.clone(),
            &camera,
            &v,
            Species::Yellowtail,
            MeasurementConfig::default(),
        )
        .unwrap()
    };
    let near = measure_at(1.0);
    let far = measure_at(2.0);
    assert!(near.anchors.is_some());
    assert!((near.measurement.height - 0.04).abs() < 1e-3);
    assert!(far.measurement.length > near.measurement.length);
    assert!(near.report.weight_lb > 0.0);
}

#[test]
fn bounding_box_and_species_feed_weight() {
    let mask = rotated_ellipse(200, 100, 100.0, 50.0, 60.0, 20.0, 0.0);
    let result = Pipeline::new(mask, MeasurementConfig::default())
        .with_species(Species::Halibut)
        .threshold()
        .unwrap()
        .extract_contours()
        .select()
        .unwrap()
        .fit()
        .unwrap()
        .locate_tips()
        .measure_bounding_box(BoxDistances {
            distance_to_phone: 0.5,
            total_distance: 0.55,
            height: 0.03,
        })
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(result.report.species, Species::Halibut);
    let expected = result.report.length_in.powi(3) / 1000.0;
    assert!((result.report.weight_lb - expected).abs() < 1e-9);
    assert!(result.report.length_in > result.report.width_in);
}
