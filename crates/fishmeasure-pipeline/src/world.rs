//! World geometry: coordinate conversions, anchors, and the AR
//! measurement pass.
//!
//! Landmarks found in the mask are mapped pixel -> normalized -> screen
//! and then resolved to real-world anchors by a [`WorldTracker`]. All
//! distances below are in metres. World coordinates use a y-up
//! convention: the "vertical" axis is y and the ground-plane axes are x
//! and z.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::ellipse::{Ellipse, EllipseTips};
use crate::morphometrics::circumference;
use crate::types::{
    Dimensions, MeasureError, Measurement, MeasurementConfig, NormalizedPoint, PixelPoint,
    ScreenPoint,
};

/// A 3D world-space vector in metres.
pub type Vec3 = Vector3<f64>;

/// Cross products shorter than this (relative to the edge lengths) are
/// treated as collinear.
const COLLINEAR_EPSILON: f64 = 1e-9;

/// Camera distances shorter than this are treated as zero.
const MIN_CAMERA_DISTANCE: f64 = 1e-6;

// ───────────────────────── Coordinate conversions ────────────────────

/// Convert a pixel-space point to the normalized unit square.
///
/// Flips y (pixel y points down, normalized y points up) and clamps the
/// result to `[0, 1] x [0, 1]`, so landmarks that fall slightly outside
/// the image stay on its border.
#[must_use]
pub fn pixel_to_normalized(point: PixelPoint, dimensions: Dimensions) -> NormalizedPoint {
    let x = point.x / f64::from(dimensions.width);
    let y = 1.0 - point.y / f64::from(dimensions.height);
    NormalizedPoint::new(x.clamp(0.0, 1.0), y.clamp(0.0, 1.0))
}

/// Convert a normalized point back to pixel space.
#[must_use]
pub fn normalized_to_pixel(point: NormalizedPoint, dimensions: Dimensions) -> PixelPoint {
    PixelPoint::new(
        point.x * f64::from(dimensions.width),
        (1.0 - point.y) * f64::from(dimensions.height),
    )
}

/// A width/height pair in arbitrary continuous units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl Size {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn aspect(self) -> f64 {
        self.width / self.height
    }

    fn is_valid(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

impl From<Dimensions> for Size {
    fn from(d: Dimensions) -> Self {
        Self::new(f64::from(d.width), f64::from(d.height))
    }
}

/// How the captured camera image is laid out in the viewport.
///
/// The image is drawn aspect-fill: it covers the viewport and whichever
/// dimension overhangs is cropped equally on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ViewSizes")]
pub struct ViewGeometry {
    captured: Size,
    viewport: Size,
}

/// Unchecked wire form of [`ViewGeometry`].
#[derive(Deserialize)]
struct ViewSizes {
    captured: Size,
    viewport: Size,
}

impl TryFrom<ViewSizes> for ViewGeometry {
    type Error = MeasureError;

    fn try_from(sizes: ViewSizes) -> Result<Self, Self::Error> {
        Self::new(sizes.captured, sizes.viewport)
    }
}

impl ViewGeometry {
    /// Create a view geometry.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::InvalidConfig`] if either size is not
    /// finite and positive.
    pub fn new(captured: Size, viewport: Size) -> Result<Self, MeasureError> {
        if !captured.is_valid() || !viewport.is_valid() {
            return Err(MeasureError::InvalidConfig(format!(
                "view sizes must be finite and positive, got captured {captured:?}, viewport {viewport:?}"
            )));
        }
        Ok(Self { captured, viewport })
    }

    /// Captured image size.
    #[must_use]
    pub const fn captured(&self) -> Size {
        self.captured
    }

    /// Viewport size.
    #[must_use]
    pub const fn viewport(&self) -> Size {
        self.viewport
    }

    /// Displayed image size and crop offset of the aspect-fill layout.
    fn layout(&self) -> (Size, f64, f64) {
        let image_aspect = self.captured.aspect();
        if image_aspect > self.viewport.aspect() {
            // Image is wider than the viewport: fill height, crop sides.
            let displayed = Size::new(self.viewport.height * image_aspect, self.viewport.height);
            (displayed, (displayed.width - self.viewport.width) / 2.0, 0.0)
        } else {
            // Image is taller: fill width, crop top and bottom.
            let displayed = Size::new(self.viewport.width, self.viewport.width / image_aspect);
            (displayed, 0.0, (displayed.height - self.viewport.height) / 2.0)
        }
    }
}

/// Map a normalized image point to viewport coordinates.
///
/// Corrects for the aspect-ratio mismatch between the captured image and
/// the viewport and flips y into the screen convention.
#[must_use]
pub fn to_screen_position(point: NormalizedPoint, view: &ViewGeometry) -> ScreenPoint {
    let (displayed, offset_x, offset_y) = view.layout();
    ScreenPoint::new(
        point.x.mul_add(displayed.width, -offset_x),
        (1.0 - point.y).mul_add(displayed.height, -offset_y),
    )
}

/// Inverse of [`to_screen_position`].
///
/// The result is not clamped; screen points in the cropped margin map
/// outside the unit square.
#[must_use]
pub fn screen_to_normalized(point: ScreenPoint, view: &ViewGeometry) -> NormalizedPoint {
    let (displayed, offset_x, offset_y) = view.layout();
    NormalizedPoint::new(
        (point.x + offset_x) / displayed.width,
        1.0 - (point.y + offset_y) / displayed.height,
    )
}

// ───────────────────────── Anchors ───────────────────────────────────

/// A resolved real-world position.
///
/// Only the translation of the underlying pose is used; orientation is
/// treated as identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    position: Vec3,
}

impl Anchor {
    /// Create an anchor at a world position.
    #[must_use]
    pub const fn new(position: Vec3) -> Self {
        Self { position }
    }

    /// World position in metres.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }
}

/// AR world tracking: resolves screen points to world anchors.
pub trait WorldTracker {
    /// Hit-test a screen point against the tracked scene.
    ///
    /// Returns `None` when no plane or feature point intersects the ray.
    fn resolve(&self, screen: ScreenPoint) -> Option<Anchor>;

    /// Current camera position in world space.
    fn camera_position(&self) -> Vec3;
}

/// Resolve every screen point to an anchor.
///
/// Anchors correspond 1:1 with the input points. A single miss fails the
/// whole call, since every landmark is needed for correct geometry.
///
/// # Errors
///
/// Returns [`MeasureError::AnchorResolution`] with the number of points
/// that did resolve.
pub fn build_anchors<T: WorldTracker + ?Sized>(
    tracker: &T,
    points: &[ScreenPoint],
) -> Result<Vec<Anchor>, MeasureError> {
    let anchors: Vec<Anchor> = points.iter().filter_map(|&p| tracker.resolve(p)).collect();
    if anchors.len() != points.len() {
        tracing::warn!(
            resolved = anchors.len(),
            requested = points.len(),
            "anchor resolution incomplete"
        );
        return Err(MeasureError::AnchorResolution {
            resolved: anchors.len(),
            requested: points.len(),
        });
    }
    Ok(anchors)
}

/// Euclidean distance between two anchors.
#[must_use]
pub fn distance_3d(a: &Anchor, b: &Anchor) -> f64 {
    (a.position - b.position).norm()
}

/// Distance between two anchors ignoring the vertical (y) axis.
///
/// Fish are measured lying flat, so length and width are ground-plane
/// distances.
#[must_use]
pub fn distance_2d(a: &Anchor, b: &Anchor) -> f64 {
    let d = a.position - b.position;
    d.x.hypot(d.z)
}

/// Unit normal of the plane through the first non-collinear triple of
/// anchors.
///
/// Triples are tried in index order; the normal is
/// `(p1 - p0) x (p2 - p0)`, normalized.
///
/// # Errors
///
/// Returns [`MeasureError::TooFewPoints`] for fewer than three anchors and
/// [`MeasureError::CollinearAnchors`] if every triple is degenerate.
pub fn plane_normal(anchors: &[Anchor]) -> Result<Vec3, MeasureError> {
    if anchors.len() < 3 {
        return Err(MeasureError::TooFewPoints {
            found: anchors.len(),
            required: 3,
        });
    }

    for i in 0..anchors.len() {
        for j in i + 1..anchors.len() {
            for k in j + 1..anchors.len() {
                let e1 = anchors[j].position - anchors[i].position;
                let e2 = anchors[k].position - anchors[i].position;
                let scale = e1.norm() * e2.norm();
                if scale <= 0.0 || !scale.is_finite() {
                    continue;
                }
                let cross = e1.cross(&e2);
                if let Some(normal) = cross.try_normalize(COLLINEAR_EPSILON * scale) {
                    return Ok(normal);
                }
            }
        }
    }

    Err(MeasureError::CollinearAnchors)
}

/// Signed distance from `point` to the plane through `plane_anchor` with
/// unit `normal`.
#[must_use]
pub fn distance_to_plane(point: &Anchor, plane_anchor: &Anchor, normal: &Vec3) -> f64 {
    (point.position - plane_anchor.position).dot(normal)
}

/// Perspective correction factor for vertex anchors.
///
/// Landmarks on the silhouette edge hit the ground behind the fish, so
/// they sit farther from the camera than the fish itself. The ratio of
/// camera distances, times an empirical `fudge`, shrinks them back.
///
/// # Errors
///
/// Returns [`MeasureError::Degenerate`] if either distance is zero or the
/// ratio is not finite.
pub fn perspective_scale(
    camera: &Vec3,
    above: &Anchor,
    below: &Anchor,
    fudge: f64,
) -> Result<f64, MeasureError> {
    let to_fish = (above.position - camera).norm();
    let to_ground = (below.position - camera).norm();
    if to_fish < MIN_CAMERA_DISTANCE || to_ground < MIN_CAMERA_DISTANCE {
        return Err(MeasureError::Degenerate("anchor coincides with camera"));
    }
    let scale = to_fish / to_ground * fudge;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(MeasureError::Degenerate("non-finite perspective scale"));
    }
    Ok(scale)
}

/// Scale a quadrilateral of anchors about its own centre.
///
/// The centre is the midpoint of diagonal corners 0 and 2. Each offset
/// from the centre has its vertical (y) component multiplied by
/// `v_scale` and its horizontal (x, z) components by `h_scale`.
///
/// # Errors
///
/// Returns [`MeasureError::TooFewPoints`] for fewer than three anchors.
pub fn stretch_vertices(
    anchors: &[Anchor],
    v_scale: f64,
    h_scale: f64,
) -> Result<Vec<Anchor>, MeasureError> {
    if anchors.len() < 3 {
        return Err(MeasureError::TooFewPoints {
            found: anchors.len(),
            required: 3,
        });
    }
    let center = (anchors[0].position + anchors[2].position) / 2.0;
    let factors = Vec3::new(h_scale, v_scale, h_scale);
    Ok(anchors
        .iter()
        .map(|a| Anchor::new(center + (a.position - center).component_mul(&factors)))
        .collect())
}

// ───────────────────────── Measurement pass ──────────────────────────

/// Anchors resolved during one measurement pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSet {
    /// Tip anchors `[top, right, bottom, left]` after perspective scaling.
    pub vertices: Vec<Anchor>,
    /// Anchor on the fish surface at the ellipse centre.
    pub body: Anchor,
    /// Ground samples just outside each tip.
    pub ground: Vec<Anchor>,
    /// Perspective factor applied to the vertices.
    pub perspective_scale: f64,
}

/// Push a tip outward from the ellipse centre by `margin`.
fn ground_sample(center: PixelPoint, tip: PixelPoint, margin: f64) -> PixelPoint {
    PixelPoint::new(
        (tip.x - center.x).mul_add(1.0 + margin, center.x),
        (tip.y - center.y).mul_add(1.0 + margin, center.y),
    )
}

/// Measure a fitted ellipse in world space.
///
/// 1. Tips, the ellipse centre, and ground samples just outside each tip
///    are resolved to anchors. Any miss aborts the pass.
/// 2. The ground normal comes from the ground anchors; height is the body
///    anchor's distance to that plane.
/// 3. Tip anchors are pulled in by [`perspective_scale`] using the camera
///    distance to the body versus its projection onto the ground.
/// 4. Length is left-to-right and width top-to-bottom, both measured on
///    the ground plane; girth comes from width and height.
///
/// # Errors
///
/// Propagates anchor resolution, plane, and perspective failures.
pub fn measure_anchored<T: WorldTracker + ?Sized>(
    ellipse: &Ellipse,
    tips: &EllipseTips,
    dimensions: Dimensions,
    view: &ViewGeometry,
    tracker: &T,
    config: &MeasurementConfig,
) -> Result<(Measurement, AnchorSet), MeasureError> {
    let to_screen = |p: PixelPoint| to_screen_position(pixel_to_normalized(p, dimensions), view);

    // Batch layout: [tips x4, body, ground x4].
    let tip_points = tips.to_array();
    let screens: Vec<ScreenPoint> = tip_points
        .iter()
        .map(|&p| to_screen(p))
        .chain(std::iter::once(to_screen(ellipse.center)))
        .chain(
            tip_points
                .iter()
                .map(|&p| to_screen(ground_sample(ellipse.center, p, config.ground_margin))),
        )
        .collect();

    let mut vertices = build_anchors(tracker, &screens)?;
    let ground = vertices.split_off(tip_points.len() + 1);
    let body = vertices.remove(tip_points.len());

    let normal = plane_normal(&ground)?;
    let signed_height = distance_to_plane(&body, &ground[0], &normal);
    let height = signed_height.abs();
    let below = Anchor::new(body.position - normal * signed_height);

    let scale = perspective_scale(
        &tracker.camera_position(),
        &body,
        &below,
        config.perspective_fudge,
    )?;
    let vertices = stretch_vertices(&vertices, 1.0, scale)?;

    let length = distance_2d(&vertices[3], &vertices[1]);
    let width = distance_2d(&vertices[0], &vertices[2]);
    let girth = circumference(width, height)?;

    let measurement = Measurement {
        width,
        length,
        height,
        circumference: girth,
    };
    if ![width, length, height, girth].iter().all(|v| v.is_finite()) {
        return Err(MeasureError::Degenerate("non-finite measurement"));
    }

    tracing::info!(
        length,
        width,
        height,
        girth,
        perspective_scale = scale,
        "anchored measurement"
    );

    Ok((
        measurement,
        AnchorSet {
            vertices,
            body,
            ground,
            perspective_scale: scale,
        },
    ))
}
