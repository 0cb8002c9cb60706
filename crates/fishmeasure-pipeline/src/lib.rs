//! fishmeasure-pipeline: geometric fish measurement (sans-IO).
//!
//! Turns a segmentation mask of a fish into real-world dimensions and an
//! estimated weight:
//! threshold -> connected components -> centre selection ->
//! ellipse fit -> tips -> world anchors (or bounding box) -> weight.
//!
//! This crate has **no I/O dependencies**. Segmentation, AR world
//! tracking and species classification are injected through the traits
//! in [`external`] and [`world`]; file and terminal handling live in the
//! `fishmeasure` binary.

pub mod bbox;
pub mod contour;
pub mod diagnostics;
pub mod ellipse;
pub mod external;
pub mod grayscale;
pub mod morphometrics;
pub mod pipeline;
pub mod scene;
pub mod types;
pub mod world;

pub use bbox::BoxDistances;
pub use diagnostics::{Clock, MeasureMode, MeasurementDiagnostics, measure_with_diagnostics};
pub use ellipse::{Ellipse, EllipseFitKind, EllipseFitter, EllipseSize, EllipseTips};
pub use external::{Roi, Segmenter, SpeciesClassifier};
pub use morphometrics::{Classification, Species, WeightModel};
pub use pipeline::{MeasurementResult, Pipeline};
pub use scene::OverheadCamera;
pub use types::{
    Contour, Dimensions, FishReport, GrayImage, MeasureError, Measurement, MeasurementConfig,
    NormalizedPoint, PixelPoint, Point, RgbaImage, ScreenPoint,
};
pub use world::{Anchor, ViewGeometry, WorldTracker};

/// Run the full anchored measurement pass on a grayscale mask.
///
/// # Pipeline steps
///
/// 1. Validate the config and threshold the mask
/// 2. Extract 4-connected foreground components
/// 3. Select the component nearest the image centre
/// 4. Fit an ellipse (configured strategy)
/// 5. Locate the four tips
/// 6. Resolve landmarks through `tracker` and measure in world space
/// 7. Convert to inches and estimate weight for `species`
///
/// # Errors
///
/// Returns [`MeasureError::NoForeground`] if the mask is empty, and
/// propagates every other stage failure. No partial result is returned.
pub fn measure_mask<T: WorldTracker + ?Sized>(
    mask: GrayImage,
    tracker: &T,
    view: &ViewGeometry,
    species: Species,
    config: MeasurementConfig,
) -> Result<MeasurementResult, MeasureError> {
    Pipeline::new(mask, config)
        .with_species(species)
        .threshold()?
        .extract_contours()
        .select()?
        .fit()?
        .locate_tips()
        .measure(tracker, view)?
        .into_result()
}

/// Decode encoded mask bytes (PNG, JPEG, BMP, WebP) and run
/// [`measure_mask`].
///
/// # Errors
///
/// Returns [`MeasureError::EmptyInput`] or [`MeasureError::ImageDecode`]
/// for unreadable bytes, then anything [`measure_mask`] returns.
pub fn measure_encoded<T: WorldTracker + ?Sized>(
    mask_bytes: &[u8],
    tracker: &T,
    view: &ViewGeometry,
    species: Species,
    config: MeasurementConfig,
) -> Result<MeasurementResult, MeasureError> {
    let mask = grayscale::decode_mask(mask_bytes)?;
    measure_mask(mask, tracker, view, species, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::world::Size;

    fn blob(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let dx = (f64::from(x) - f64::from(w) / 2.0) / (f64::from(w) / 4.0);
            let dy = (f64::from(y) - f64::from(h) / 2.0) / (f64::from(h) / 8.0);
            if dx * dx + dy * dy <= 1.0 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn png(mask: &GrayImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            mask.as_raw(),
            mask.width(),
            mask.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn measure_empty_input() {
        let view = ViewGeometry::new(Size::new(1.0, 1.0), Size::new(1.0, 1.0)).unwrap();
        let camera = OverheadCamera::new(GrayImage::new(1, 1), view, 1.0, 0.0, 1.0);
        let result = measure_encoded(
            &[],
            &camera,
            &view,
            Species::Unknown,
            MeasurementConfig::default(),
        );
        assert!(matches!(result, Err(MeasureError::EmptyInput)));
    }

    #[test]
    fn measure_corrupt_input() {
        let view = ViewGeometry::new(Size::new(1.0, 1.0), Size::new(1.0, 1.0)).unwrap();
        let camera = OverheadCamera::new(GrayImage::new(1, 1), view, 1.0, 0.0, 1.0);
        let result = measure_encoded(
            &[0xFF, 0x00],
            &camera,
            &view,
            Species::Unknown,
            MeasurementConfig::default(),
        );
        assert!(matches!(result, Err(MeasureError::ImageDecode(_))));
    }

    #[test]
    fn measure_all_black_mask_reports_no_foreground() {
        let mask = GrayImage::new(40, 40);
        let view = ViewGeometry::new(Size::new(40.0, 40.0), Size::new(40.0, 40.0)).unwrap();
        let camera = OverheadCamera::new(mask.clone(), view, 1.0, 0.02, 40.0);
        let err = measure_mask(
            mask,
            &camera,
            &view,
            Species::Unknown,
            MeasurementConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MeasureError::NoForeground));
        assert!(err.user_message().starts_with("Could not isolate fish"));
    }

    #[test]
    fn measure_encoded_png_round_trip() {
        let mask = blob(160, 120);
        let view = ViewGeometry::new(Size::new(160.0, 120.0), Size::new(160.0, 120.0)).unwrap();
        let camera = OverheadCamera::new(mask.clone(), view, 1.0, 0.03, 160.0);
        let direct = measure_mask(
            mask.clone(),
            &camera,
            &view,
            Species::Halibut,
            MeasurementConfig::default(),
        )
        .unwrap();
        let decoded = measure_encoded(
            &png(&mask),
            &camera,
            &view,
            Species::Halibut,
            MeasurementConfig::default(),
        )
        .unwrap();
        assert_eq!(direct.measurement, decoded.measurement);
        assert!(direct.report.length_in > direct.report.width_in);
    }
}
