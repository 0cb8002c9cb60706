//! Integration test: measure a synthetic fish mask and export the report
//! and SVG overlay.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use fishmeasure_export::{SvgMetadata, format_report, to_json, to_result_svg};
use fishmeasure_pipeline::world::Size;
use fishmeasure_pipeline::{
    GrayImage, MeasurementConfig, OverheadCamera, Species, ViewGeometry, measure_mask,
};
use image::Luma;

fn fish_mask(w: u32, h: u32) -> GrayImage {
    let (cx, cy) = (f64::from(w) / 2.0, f64::from(h) / 2.0);
    GrayImage::from_fn(w, h, |x, y| {
        let dx = (f64::from(x) - cx) / (f64::from(w) * 0.3);
        let dy = (f64::from(y) - cy) / (f64::from(h) * 0.1);
        if dx * dx + dy * dy <= 1.0 {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[test]
fn synthetic_fish_to_report_and_svg() {
    let mask = fish_mask(240, 180);
    let view = ViewGeometry::new(Size::new(240.0, 180.0), Size::new(240.0, 180.0)).unwrap();
    let camera = OverheadCamera::new(mask.clone(), view, 0.8, 0.05, 240.0);
    let config = MeasurementConfig::default();

    let result = measure_mask(mask, &camera, &view, Species::CalicoBass, config.clone())
        .expect("measurement should succeed");
    eprintln!("{}", format_report(&result.report));

    let text = format_report(&result.report);
    assert!(text.starts_with("Species: Calico Bass"));
    assert!(result.report.length_in > result.report.width_in);

    let json = to_json(&result.report).unwrap();
    assert!(json.contains("\"weight_lb\""));

    let config_json = serde_json::to_string(&config).unwrap();
    let metadata = SvgMetadata {
        title: Some("synthetic"),
        description: None,
        config_json: Some(&config_json),
    };
    let svg = to_result_svg(&result, &metadata);
    assert!(svg.contains(r#"viewBox="0 0 240 180""#));
    assert!(svg.contains("<title>synthetic</title>"));
    assert!(svg.contains(r#"id="silhouette""#));
    assert!(svg.contains(r#"id="length-axis""#));
    assert!(svg.contains(&format!("Weight: {:.2} lb", result.report.weight_lb)));
}
