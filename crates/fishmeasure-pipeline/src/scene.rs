//! A deterministic stand-in for AR world tracking.
//!
//! [`OverheadCamera`] is a pinhole camera looking straight down at a flat
//! ground plane (`y = 0`). Wherever the mask is foreground, the ray hits a
//! slab of the given thickness instead, so the fish has a height. Used by
//! the CLI and by tests in place of a live AR session.

use image::GrayImage;

use crate::grayscale::{self, FOREGROUND};
use crate::types::{Dimensions, MeasurementConfig, ScreenPoint};
use crate::world::{self, Anchor, Vec3, ViewGeometry, WorldTracker};

/// Overhead pinhole camera over a flat scene with a raised fish.
#[derive(Debug, Clone)]
pub struct OverheadCamera {
    mask: GrayImage,
    view: ViewGeometry,
    camera_height: f64,
    fish_height: f64,
    focal_length: f64,
}

impl OverheadCamera {
    /// Create a camera `camera_height` metres above the ground, with the
    /// foreground of `mask` raised `fish_height` metres.
    ///
    /// The mask is binarized with the default threshold, so {0, 1} and
    /// {0, 255} masks both work. `focal_length` is in viewport points; the
    /// principal point is the viewport centre.
    #[must_use]
    pub fn new(
        mask: GrayImage,
        view: ViewGeometry,
        camera_height: f64,
        fish_height: f64,
        focal_length: f64,
    ) -> Self {
        Self {
            mask: grayscale::binarize(&mask, MeasurementConfig::DEFAULT_THRESHOLD),
            view,
            camera_height,
            fish_height,
            focal_length,
        }
    }

    /// The view geometry the camera was built with.
    #[must_use]
    pub const fn view(&self) -> &ViewGeometry {
        &self.view
    }

    /// Whether a screen point lands on a foreground mask pixel.
    fn hits_fish(&self, screen: ScreenPoint) -> bool {
        let dims = Dimensions::of(&self.mask);
        let normalized = world::screen_to_normalized(screen, &self.view);
        if !(0.0..1.0).contains(&normalized.x) || !(0.0..1.0).contains(&normalized.y) {
            return false;
        }
        let pixel = world::normalized_to_pixel(normalized, dims);
        // Both coordinates are in [0, dimension) after the range check.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (x, y) = (pixel.x.floor() as u32, pixel.y.floor() as u32);
        x < dims.width && y < dims.height && self.mask.get_pixel(x, y).0[0] == FOREGROUND
    }
}

impl WorldTracker for OverheadCamera {
    fn resolve(&self, screen: ScreenPoint) -> Option<Anchor> {
        let viewport = self.view.viewport();
        if !screen.is_finite()
            || !(0.0..=viewport.width).contains(&screen.x)
            || !(0.0..=viewport.height).contains(&screen.y)
        {
            return None;
        }

        let surface = if self.hits_fish(screen) {
            self.fish_height
        } else {
            0.0
        };
        let depth = self.camera_height - surface;
        if depth <= 0.0 {
            return None;
        }

        let dx = (screen.x - viewport.width / 2.0) / self.focal_length;
        let dz = (screen.y - viewport.height / 2.0) / self.focal_length;
        Some(Anchor::new(Vec3::new(dx * depth, surface, dz * depth)))
    }

    fn camera_position(&self) -> Vec3 {
        Vec3::new(0.0, self.camera_height, 0.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::world::Size;

    fn camera(fish_height: f64) -> OverheadCamera {
        // Fish occupies the left half of a 100x100 mask.
        let mask = GrayImage::from_fn(100, 100, |x, _| {
            if x < 50 { Luma([FOREGROUND]) } else { Luma([0]) }
        });
        let view = ViewGeometry::new(Size::new(100.0, 100.0), Size::new(100.0, 100.0)).unwrap();
        OverheadCamera::new(mask, view, 1.0, fish_height, 100.0)
    }

    #[test]
    fn ground_hits_scale_with_depth() {
        let cam = camera(0.1);
        let a = cam.resolve(ScreenPoint::new(100.0, 50.0)).unwrap();
        assert!((a.position() - Vec3::new(0.5, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn fish_hits_are_raised_and_closer() {
        let cam = camera(0.1);
        let a = cam.resolve(ScreenPoint::new(0.0, 50.0)).unwrap();
        assert!((a.position() - Vec3::new(-0.45, 0.1, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn off_screen_points_miss() {
        let cam = camera(0.1);
        assert!(cam.resolve(ScreenPoint::new(-1.0, 50.0)).is_none());
        assert!(cam.resolve(ScreenPoint::new(50.0, 101.0)).is_none());
        assert!(cam.resolve(ScreenPoint::new(f64::NAN, 1.0)).is_none());
    }

    #[test]
    fn camera_inside_fish_misses() {
        let cam = camera(1.5);
        assert!(cam.resolve(ScreenPoint::new(10.0, 50.0)).is_none());
        assert!(cam.resolve(ScreenPoint::new(90.0, 50.0)).is_some());
    }

    #[test]
    fn unit_mask_is_raised_like_full_range_mask() {
        let mask = GrayImage::from_fn(100, 100, |x, _| Luma([u8::from(x < 50)]));
        let view = ViewGeometry::new(Size::new(100.0, 100.0), Size::new(100.0, 100.0)).unwrap();
        let cam = OverheadCamera::new(mask, view, 1.0, 0.1, 100.0);
        let a = cam.resolve(ScreenPoint::new(0.0, 50.0)).unwrap();
        assert!((a.position().y - 0.1).abs() < 1e-12);
    }

    #[test]
    fn camera_position_is_overhead() {
        assert_eq!(camera(0.0).camera_position(), Vec3::new(0.0, 1.0, 0.0));
    }
}
