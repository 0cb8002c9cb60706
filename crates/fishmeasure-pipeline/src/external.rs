//! Collaborator interfaces: segmentation, species classification, and a
//! closure adapter for world tracking.
//!
//! The core never runs a model or an AR session itself. Callers inject
//! implementations of these traits; tests use closures and mocks.

use serde::{Deserialize, Serialize};

use crate::grayscale;
use crate::morphometrics::{Classification, Species};
use crate::types::{Dimensions, GrayImage, MeasureError, MeasurementConfig, RgbaImage, ScreenPoint};
use crate::world::{Anchor, Vec3, WorldTracker};

/// Pixel-space region of interest handed to a segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Roi {
    /// Clip the region to an image of the given size.
    ///
    /// Returns `None` if nothing of the region remains.
    #[must_use]
    pub fn clamp_to(self, dimensions: Dimensions) -> Option<Self> {
        if self.x >= dimensions.width || self.y >= dimensions.height {
            return None;
        }
        let width = self.width.min(dimensions.width - self.x);
        let height = self.height.min(dimensions.height - self.y);
        (width > 0 && height > 0).then_some(Self {
            x: self.x,
            y: self.y,
            width,
            height,
        })
    }

    /// Whether pixel `(x, y)` lies inside the region.
    #[must_use]
    pub const fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x
            && y >= self.y
            && x - self.x < self.width
            && y - self.y < self.height
    }
}

/// Foreground segmentation.
pub trait Segmenter {
    /// Produce a mask the same size as `image`, bright where the fish is.
    ///
    /// When `roi` is set, the segmenter may ignore everything outside it.
    ///
    /// # Errors
    ///
    /// Implementations report inference failures as
    /// [`MeasureError::InvalidMask`].
    fn segment(&self, image: &RgbaImage, roi: Option<Roi>) -> Result<GrayImage, MeasureError>;
}

impl<F> Segmenter for F
where
    F: Fn(&RgbaImage, Option<Roi>) -> Result<GrayImage, MeasureError>,
{
    fn segment(&self, image: &RgbaImage, roi: Option<Roi>) -> Result<GrayImage, MeasureError> {
        self(image, roi)
    }
}

/// Species classification.
pub trait SpeciesClassifier {
    /// Classify the fish in `image`.
    ///
    /// # Errors
    ///
    /// Implementations report failures as [`MeasureError::Classification`].
    fn classify(&self, image: &RgbaImage) -> Result<Classification, MeasureError>;
}

impl<F> SpeciesClassifier for F
where
    F: Fn(&RgbaImage) -> Result<Classification, MeasureError>,
{
    fn classify(&self, image: &RgbaImage) -> Result<Classification, MeasureError> {
        self(image)
    }
}

/// Segment `image` and check that the mask is usable.
///
/// # Errors
///
/// Propagates segmenter failures, and returns
/// [`MeasureError::InvalidMask`] if the mask size does not match the
/// image.
pub fn segment_checked<S: Segmenter + ?Sized>(
    segmenter: &S,
    image: &RgbaImage,
    roi: Option<Roi>,
) -> Result<GrayImage, MeasureError> {
    let roi = roi.and_then(|r| r.clamp_to(Dimensions::new(image.width(), image.height())));
    let mask = segmenter.segment(image, roi)?;
    if mask.dimensions() != image.dimensions() {
        return Err(MeasureError::InvalidMask {
            reason: format!(
                "segmenter returned {}x{} for a {}x{} image",
                mask.width(),
                mask.height(),
                image.width(),
                image.height()
            ),
        });
    }
    tracing::debug!(
        foreground = grayscale::foreground_count(&mask),
        ?roi,
        "segmentation complete"
    );
    Ok(mask)
}

/// Classify `image` and pick the species whose formula applies.
///
/// # Errors
///
/// Propagates classifier failures.
pub fn identify_species<C: SpeciesClassifier + ?Sized>(
    classifier: &C,
    image: &RgbaImage,
    config: &MeasurementConfig,
) -> Result<Species, MeasureError> {
    let classification = classifier.classify(image)?;
    let species = Species::from_classification(&classification, config.min_species_confidence);
    tracing::info!(
        label = %classification.label,
        confidence = classification.confidence,
        %species,
        "species identified"
    );
    Ok(species)
}

/// A [`WorldTracker`] backed by a hit-test closure and a fixed camera.
pub struct FnTracker<F> {
    resolve: F,
    camera: Vec3,
}

impl<F> FnTracker<F>
where
    F: Fn(ScreenPoint) -> Option<Anchor>,
{
    /// Wrap a hit-test closure.
    pub const fn new(resolve: F, camera: Vec3) -> Self {
        Self { resolve, camera }
    }
}

impl<F> WorldTracker for FnTracker<F>
where
    F: Fn(ScreenPoint) -> Option<Anchor>,
{
    fn resolve(&self, screen: ScreenPoint) -> Option<Anchor> {
        (self.resolve)(screen)
    }

    fn camera_position(&self) -> Vec3 {
        self.camera
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Luma, Rgba};

    use super::*;
    use crate::world::build_anchors;

    fn frame() -> RgbaImage {
        RgbaImage::from_pixel(8, 6, Rgba([10, 20, 30, 255]))
    }

    #[test]
    fn roi_clamps_to_image() {
        let dims = Dimensions::new(10, 10);
        let roi = Roi {
            x: 6,
            y: 2,
            width: 20,
            height: 3,
        };
        assert_eq!(
            roi.clamp_to(dims),
            Some(Roi {
                x: 6,
                y: 2,
                width: 4,
                height: 3
            })
        );
        let outside = Roi {
            x: 10,
            y: 0,
            width: 5,
            height: 5,
        };
        assert_eq!(outside.clamp_to(dims), None);
    }

    #[test]
    fn roi_contains() {
        let roi = Roi {
            x: 2,
            y: 2,
            width: 2,
            height: 2,
        };
        assert!(roi.contains(2, 3));
        assert!(!roi.contains(4, 2));
        assert!(!roi.contains(1, 2));
    }

    #[test]
    fn closure_segmenter_sees_clamped_roi() {
        let segmenter = |image: &RgbaImage, roi: Option<Roi>| -> Result<GrayImage, MeasureError> {
            let roi = roi.unwrap();
            assert_eq!(roi.width, 3);
            Ok(GrayImage::from_fn(image.width(), image.height(), |x, y| {
                if roi.contains(x, y) { Luma([255]) } else { Luma([0]) }
            }))
        };
        let roi = Roi {
            x: 5,
            y: 0,
            width: 100,
            height: 2,
        };
        let mask = segment_checked(&segmenter, &frame(), Some(roi)).unwrap();
        assert_eq!(grayscale::foreground_count(&mask), 6);
    }

    #[test]
    fn segmenter_size_mismatch_is_rejected() {
        let segmenter = |_: &RgbaImage, _: Option<Roi>| -> Result<GrayImage, MeasureError> {
            Ok(GrayImage::new(2, 2))
        };
        assert!(matches!(
            segment_checked(&segmenter, &frame(), None),
            Err(MeasureError::InvalidMask { .. })
        ));
    }

    #[test]
    fn classifier_confidence_floor_applies() {
        let classifier = |_: &RgbaImage| -> Result<Classification, MeasureError> {
            Ok(Classification {
                label: "Yellowtail".to_string(),
                confidence: 0.4,
            })
        };
        let mut config = MeasurementConfig::default();
        assert_eq!(
            identify_species(&classifier, &frame(), &config).unwrap(),
            Species::Unknown
        );
        config.min_species_confidence = 0.3;
        assert_eq!(
            identify_species(&classifier, &frame(), &config).unwrap(),
            Species::Yellowtail
        );
    }

    #[test]
    fn classifier_errors_propagate() {
        let classifier = |_: &RgbaImage| -> Result<Classification, MeasureError> {
            Err(MeasureError::Classification("model unavailable".to_string()))
        };
        assert!(matches!(
            identify_species(&classifier, &frame(), &MeasurementConfig::default()),
            Err(MeasureError::Classification(_))
        ));
    }

    #[test]
    fn fn_tracker_resolves_through_closure() {
        let tracker = FnTracker::new(
            |p: ScreenPoint| (p.x >= 0.0).then(|| Anchor::new(Vec3::new(p.x, 0.0, p.y))),
            Vec3::new(0.0, 1.0, 0.0),
        );
        let ok = build_anchors(&tracker, &[ScreenPoint::new(1.0, 2.0)]).unwrap();
        assert_eq!(ok[0].position(), Vec3::new(1.0, 0.0, 2.0));
        let err = build_anchors(
            &tracker,
            &[ScreenPoint::new(1.0, 2.0), ScreenPoint::new(-1.0, 0.0)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MeasureError::AnchorResolution {
                resolved: 1,
                requested: 2
            }
        ));
        assert_eq!(tracker.camera_position(), Vec3::new(0.0, 1.0, 0.0));
    }
}
