//! Ellipse fitting and tip extraction.
//!
//! Two fitters exist and are deliberately not interchangeable:
//!
//! - [`fit_covariance`] recovers the true orientation and semi-axis
//!   lengths from second moments. Fish are rarely aligned to the image
//!   axes, so this is the default.
//! - [`fit_minimax`] is the axis-aligned bounding box of the points,
//!   with rotation forced to zero. Cheap and rotation-blind.
//!
//! [`tips`] turns a fitted ellipse into the four landmark points the
//! world-geometry stage measures between.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, MeasureError, PixelPoint};

/// Minimum number of points either fitter accepts.
pub const MIN_FIT_POINTS: usize = 5;

/// Semi-axis lengths of a fitted ellipse.
///
/// `width` runs along the ellipse's local x axis (after rotation),
/// `height` along its local y axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseSize {
    /// Semi-axis along the local x axis.
    pub width: f64,
    /// Semi-axis along the local y axis.
    pub height: f64,
}

/// An ellipse in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    /// Centre of the ellipse.
    pub center: PixelPoint,
    /// Semi-axis lengths.
    pub size: EllipseSize,
    /// Rotation of the local x axis from the image x axis, in degrees.
    /// Positive angles turn toward +y (clockwise on screen, since pixel y
    /// points down).
    pub rotation_degrees: f64,
}

impl Ellipse {
    /// Whether every component is finite.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.center.is_finite()
            && self.size.width.is_finite()
            && self.size.height.is_finite()
            && self.rotation_degrees.is_finite()
    }

    /// Semi-axes rescaled by `2 / dimension`, i.e. relative to half the
    /// image extent on each axis.
    ///
    /// Kept separate from the fitters so that fitted sizes are always in
    /// pixels.
    #[must_use]
    pub fn normalized_size(&self, dimensions: Dimensions) -> EllipseSize {
        EllipseSize {
            width: self.size.width * 2.0 / f64::from(dimensions.width),
            height: self.size.height * 2.0 / f64::from(dimensions.height),
        }
    }
}

/// The four extremal landmark points of an ellipse, in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseTips {
    /// End of the local negative-y semi-axis.
    pub top: PixelPoint,
    /// End of the local positive-x semi-axis.
    pub right: PixelPoint,
    /// End of the local positive-y semi-axis.
    pub bottom: PixelPoint,
    /// End of the local negative-x semi-axis.
    pub left: PixelPoint,
}

impl EllipseTips {
    /// Tips as `[top, right, bottom, left]`.
    #[must_use]
    pub const fn to_array(self) -> [PixelPoint; 4] {
        [self.top, self.right, self.bottom, self.left]
    }

    /// Largest distance between any two tips.
    #[must_use]
    pub fn max_span(&self) -> f64 {
        let pts = self.to_array();
        let mut max = 0.0_f64;
        for (i, a) in pts.iter().enumerate() {
            for b in &pts[i + 1..] {
                max = max.max(a.distance(*b));
            }
        }
        max
    }
}

/// Selects which ellipse fitting algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EllipseFitKind {
    /// Second-moment (PCA) fit: true orientation and axis lengths.
    #[default]
    Covariance,
    /// Axis-aligned bounding-box fit with zero rotation.
    Minimax,
}

/// Trait for ellipse fitting strategies.
pub trait EllipseFitter {
    /// Fit an ellipse to the given pixel-space points.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::TooFewPoints`] for fewer than
    /// [`MIN_FIT_POINTS`] points and [`MeasureError::Degenerate`] when the
    /// fit would not be finite.
    fn fit(&self, points: &[PixelPoint]) -> Result<Ellipse, MeasureError>;
}

impl EllipseFitter for EllipseFitKind {
    fn fit(&self, points: &[PixelPoint]) -> Result<Ellipse, MeasureError> {
        match *self {
            Self::Covariance => fit_covariance(points),
            Self::Minimax => fit_minimax(points),
        }
    }
}

fn require_points(points: &[PixelPoint]) -> Result<(), MeasureError> {
    if points.len() < MIN_FIT_POINTS {
        return Err(MeasureError::TooFewPoints {
            found: points.len(),
            required: MIN_FIT_POINTS,
        });
    }
    if points.iter().any(|p| !p.is_finite()) {
        return Err(MeasureError::Degenerate("non-finite input point"));
    }
    Ok(())
}

/// Fit an ellipse from the population covariance of the points.
///
/// With `Sxx`, `Syy`, `Sxy` the covariance terms (divided by the point
/// count), the orientation is `0.5 * atan2(2 Sxy, Sxx - Syy)` and the
/// semi-axes are `sqrt(2 (T1 ± T2))` where `T1 = Sxx + Syy` and
/// `T2 = sqrt((Sxx - Syy)^2 + 4 Sxy^2)`.
///
/// For a uniformly filled ellipse (what the flood fill produces) the
/// semi-axes come out as the true semi-axis lengths. `size.width` is
/// always the larger one and lies along the rotation angle.
///
/// # Errors
///
/// Returns [`MeasureError::TooFewPoints`] for fewer than five points and
/// [`MeasureError::Degenerate`] if all points coincide or the result is
/// not finite.
#[allow(clippy::cast_precision_loss)]
pub fn fit_covariance(points: &[PixelPoint]) -> Result<Ellipse, MeasureError> {
    require_points(points)?;

    let n = points.len() as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let mean = PixelPoint::new(sum_x / n, sum_y / n);

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in points {
        let dx = p.x - mean.x;
        let dy = p.y - mean.y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    sxx /= n;
    syy /= n;
    sxy /= n;

    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let t1 = sxx + syy;
    let t2 = (sxx - syy).hypot(2.0 * sxy);

    let major_sq = 2.0 * (t1 + t2);
    // Collinear input gives t1 == t2 up to rounding; clamp that noise
    // but reject anything genuinely negative.
    let minor_sq = 2.0 * (t1 - t2);
    if major_sq <= 0.0 {
        return Err(MeasureError::Degenerate("all points coincide"));
    }
    if minor_sq < -1e-9 * major_sq {
        return Err(MeasureError::Degenerate("negative minor-axis variance"));
    }

    let ellipse = Ellipse {
        center: mean,
        size: EllipseSize {
            width: major_sq.sqrt(),
            height: minor_sq.max(0.0).sqrt(),
        },
        rotation_degrees: theta.to_degrees(),
    };
    if !ellipse.is_finite() {
        return Err(MeasureError::Degenerate("non-finite covariance fit"));
    }

    tracing::debug!(?ellipse, "covariance ellipse fit");
    Ok(ellipse)
}

/// Fit the axis-aligned bounding box of the points as an ellipse.
///
/// Centre is the box midpoint, semi-axes are the box half-extents,
/// rotation is always zero. No image-size normalization happens here;
/// see [`Ellipse::normalized_size`].
///
/// # Errors
///
/// Returns [`MeasureError::TooFewPoints`] for fewer than five points.
pub fn fit_minimax(points: &[PixelPoint]) -> Result<Ellipse, MeasureError> {
    require_points(points)?;

    let (min_x, min_y, max_x, max_y) = points.iter().fold(
        (
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        ),
        |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
    );

    let ellipse = Ellipse {
        center: PixelPoint::new(f64::midpoint(min_x, max_x), f64::midpoint(min_y, max_y)),
        size: EllipseSize {
            width: (max_x - min_x) / 2.0,
            height: (max_y - min_y) / 2.0,
        },
        rotation_degrees: 0.0,
    };

    tracing::debug!(?ellipse, "minimax ellipse fit");
    Ok(ellipse)
}

/// Compute the four rotated extremal points of an ellipse.
///
/// The local frame follows the long-standing field naming: the
/// "semi-major" value is `min(width, height)` and sits on the local y
/// axis (top/bottom), while the "semi-minor" value is `max(width,
/// height)` and sits on the local x axis (left/right). The names are
/// inverted relative to the usual convention; the geometry is kept as
/// is. For a covariance fit, whose larger semi-axis is always `width`
/// along the rotation angle, left/right therefore span the fish length
/// and top/bottom its width. A minimax fit has zero rotation, so the long
/// extent always lands on left/right along the image x axis. For a
/// vertically elongated silhouette (`height > width`) the tips therefore
/// fall off the fitted ellipse: size `(10, 30)` puts left/right 30 px
/// either side of the centre horizontally and top/bottom only 10 px
/// above and below it.
///
/// Each local tip is rotated by `rotation_degrees` and translated by the
/// centre.
#[must_use]
pub fn tips(ellipse: &Ellipse) -> EllipseTips {
    let semi_major = ellipse.size.width.min(ellipse.size.height);
    let semi_minor = ellipse.size.width.max(ellipse.size.height);

    let (sin, cos) = ellipse.rotation_degrees.to_radians().sin_cos();
    let place = |lx: f64, ly: f64| {
        PixelPoint::new(
            lx.mul_add(cos, -ly * sin) + ellipse.center.x,
            lx.mul_add(sin, ly * cos) + ellipse.center.y,
        )
    };

    EllipseTips {
        top: place(0.0, -semi_major),
        right: place(semi_minor, 0.0),
        bottom: place(0.0, semi_major),
        left: place(-semi_minor, 0.0),
    }
}
