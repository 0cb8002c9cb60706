//! Shared types for the fish measurement pipeline.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::ellipse::EllipseFitKind;
use crate::morphometrics::{Species, WeightModel};

/// Re-export `GrayImage` so downstream crates can reference masks
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can pass source frames
/// to collaborators without depending on `image` directly.
pub use image::RgbaImage;

// ───────────────────────── Coordinate spaces ─────────────────────────

/// Marker trait for the coordinate space a [`Point`] lives in.
pub trait CoordinateSpace: Copy + Default + std::fmt::Debug + PartialEq {}

/// Image pixel space: origin at the top-left, y grows downward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pixel;

/// Unit-square space: origin at the bottom-left, y grows upward.
///
/// This is the convention vision frameworks report results in. Values
/// produced by [`pixel_to_normalized`](crate::world::pixel_to_normalized)
/// are always clamped to `[0, 1] x [0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalized;

/// Viewport space in display points: origin at the top-left, y down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Screen;

impl CoordinateSpace for Pixel {}
impl CoordinateSpace for Normalized {}
impl CoordinateSpace for Screen {}

/// A continuous 2D point tagged with its coordinate space.
///
/// Points in different spaces are different types, so mixing them up is
/// a compile error. Conversions live in [`crate::world`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Point<S: CoordinateSpace = Pixel> {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

/// A point in image pixel space.
pub type PixelPoint = Point<Pixel>;
/// A point in the normalized unit square.
pub type NormalizedPoint = Point<Normalized>;
/// A point in viewport (screen) space.
pub type ScreenPoint = Point<Screen>;

impl<S: CoordinateSpace> Point<S> {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }

    /// Squared Euclidean distance to another point in the same space.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point in the same space.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Whether both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

// ───────────────────────── Raster geometry ───────────────────────────

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions from a width and height.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of a grayscale image.
    #[must_use]
    pub fn of(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// The geometric centre `(width / 2, height / 2)` in pixel space.
    #[must_use]
    pub fn center(self) -> PixelPoint {
        PixelPoint::new(f64::from(self.width) / 2.0, f64::from(self.height) / 2.0)
    }

    /// Whether either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One 4-connected component of foreground pixels.
///
/// Pixels are stored in flood-fill discovery order, but callers must not
/// rely on any particular order beyond the first pixel being the one
/// found first in row-major scan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour(Vec<(u32, u32)>);

impl Contour {
    /// Create a contour from integer grid coordinates.
    #[must_use]
    pub const fn new(pixels: Vec<(u32, u32)>) -> Self {
        Self(pixels)
    }

    /// Returns the number of pixels in the component.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the component has no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a slice of all member pixels.
    #[must_use]
    pub fn pixels(&self) -> &[(u32, u32)] {
        &self.0
    }

    /// Arithmetic mean of all member coordinates.
    ///
    /// Every pixel counts once, regardless of where it sits in the shape.
    /// Returns `None` for an empty contour.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self) -> Option<PixelPoint> {
        if self.0.is_empty() {
            return None;
        }
        let (sum_x, sum_y) = self.0.iter().fold((0.0, 0.0), |(sx, sy), &(x, y)| {
            (sx + f64::from(x), sy + f64::from(y))
        });
        let n = self.0.len() as f64;
        Some(PixelPoint::new(sum_x / n, sum_y / n))
    }

    /// Member pixels as continuous pixel-space points.
    #[must_use]
    pub fn to_points(&self) -> Vec<PixelPoint> {
        self.0
            .iter()
            .map(|&(x, y)| PixelPoint::new(f64::from(x), f64::from(y)))
            .collect()
    }

    /// Consumes the contour and returns the underlying pixel list.
    #[must_use]
    pub fn into_pixels(self) -> Vec<(u32, u32)> {
        self.0
    }
}

// ───────────────────────── Configuration ─────────────────────────────

/// Configuration for a measurement pass.
///
/// Replaces the hidden developer-mode tunables with explicit values
/// passed in at call time. Every field has a documented default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Brightness cutoff: grayscale values strictly above this become
    /// foreground (255), everything else background (0).
    pub threshold: u8,

    /// Which ellipse fitting algorithm the staged pipeline uses.
    pub ellipse_fit: EllipseFitKind,

    /// Camera focal length in pixels, used by the bounding-box path to
    /// turn pixel extents into metres (`pixels * distance / scale_factor`).
    pub scale_factor: f64,

    /// Percent the bounding box is shrunk along its length (x) axis.
    pub length_nudge: f64,

    /// Percent the bounding box is shrunk along its width (y) axis.
    pub width_nudge: f64,

    /// Empirical multiplier layered on top of the camera-distance ratio
    /// when correcting for perspective foreshortening.
    pub perspective_fudge: f64,

    /// How far past each ellipse tip the ground is sampled, as a fraction
    /// of the centre-to-tip vector.
    pub ground_margin: f64,

    /// Which weight formula family to use.
    pub weight_model: WeightModel,

    /// Fork length as a fraction of total length (allometric model only).
    pub fork_length_ratio: f64,

    /// Classifications below this confidence fall back to the generic
    /// weight formula.
    pub min_species_confidence: f64,
}

impl MeasurementConfig {
    /// Default binary threshold (80% of full intensity).
    pub const DEFAULT_THRESHOLD: u8 = 204;
    /// Default focal length in pixels.
    pub const DEFAULT_SCALE_FACTOR: f64 = 500.0;
    /// Default length-axis nudge in percent.
    pub const DEFAULT_LENGTH_NUDGE: f64 = 1.2;
    /// Default width-axis nudge in percent.
    pub const DEFAULT_WIDTH_NUDGE: f64 = 1.2;
    /// Default perspective multiplier.
    pub const DEFAULT_PERSPECTIVE_FUDGE: f64 = 1.1;
    /// Default ground sampling margin.
    pub const DEFAULT_GROUND_MARGIN: f64 = 0.15;
    /// Default fork-to-total length ratio.
    pub const DEFAULT_FORK_LENGTH_RATIO: f64 = 0.93;
    /// Default minimum classifier confidence.
    pub const DEFAULT_MIN_SPECIES_CONFIDENCE: f64 = 0.5;

    /// Check every field for finite, in-range values.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), MeasureError> {
        let positive = [
            ("scale_factor", self.scale_factor),
            ("perspective_fudge", self.perspective_fudge),
            ("fork_length_ratio", self.fork_length_ratio),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(MeasureError::InvalidConfig(format!(
                    "{name} must be finite and > 0, got {value}"
                )));
            }
        }

        let percents = [
            ("length_nudge", self.length_nudge),
            ("width_nudge", self.width_nudge),
        ];
        for (name, value) in percents {
            if !(0.0..100.0).contains(&value) {
                return Err(MeasureError::InvalidConfig(format!(
                    "{name} must be in [0, 100), got {value}"
                )));
            }
        }

        if !self.ground_margin.is_finite() || self.ground_margin < 0.0 {
            return Err(MeasureError::InvalidConfig(format!(
                "ground_margin must be finite and >= 0, got {}",
                self.ground_margin
            )));
        }

        if !(0.0..=1.0).contains(&self.min_species_confidence) {
            return Err(MeasureError::InvalidConfig(format!(
                "min_species_confidence must be in [0, 1], got {}",
                self.min_species_confidence
            )));
        }

        Ok(())
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            ellipse_fit: EllipseFitKind::default(),
            scale_factor: Self::DEFAULT_SCALE_FACTOR,
            length_nudge: Self::DEFAULT_LENGTH_NUDGE,
            width_nudge: Self::DEFAULT_WIDTH_NUDGE,
            perspective_fudge: Self::DEFAULT_PERSPECTIVE_FUDGE,
            ground_margin: Self::DEFAULT_GROUND_MARGIN,
            weight_model: WeightModel::default(),
            fork_length_ratio: Self::DEFAULT_FORK_LENGTH_RATIO,
            min_species_confidence: Self::DEFAULT_MIN_SPECIES_CONFIDENCE,
        }
    }
}

// ───────────────────────── Results ───────────────────────────────────

/// Real-world fish dimensions in metres, derived from anchor positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Dorsal-ventral extent seen from above.
    pub width: f64,
    /// Tip-to-tail extent (total length).
    pub length: f64,
    /// Thickness above the ground plane.
    pub height: f64,
    /// Cross-section girth from `width` and `height`.
    pub circumference: f64,
}

/// Final user-facing output: inches and pounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FishReport {
    /// Species the weight formula was chosen for.
    pub species: Species,
    /// Estimated weight in pounds.
    pub weight_lb: f64,
    /// Width in inches.
    pub width_in: f64,
    /// Length in inches.
    pub length_in: f64,
    /// Height in inches.
    pub height_in: f64,
    /// Girth in inches.
    pub circumference_in: f64,
}

// ───────────────────────── Errors ────────────────────────────────────

/// Errors that can occur during a measurement pass.
///
/// Every failure aborts the pass; no partial measurement is produced.
#[derive(Debug, thiserror::Error)]
pub enum MeasureError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The mask is malformed (zero-sized, wrong buffer length, ...).
    #[error("invalid mask: {reason}")]
    InvalidMask {
        /// What is wrong with the mask.
        reason: String,
    },

    /// The mask contains no foreground pixels.
    #[error("mask contains no foreground")]
    NoForeground,

    /// Not enough points for the requested fit.
    #[error("need at least {required} points, got {found}")]
    TooFewPoints {
        /// Points supplied.
        found: usize,
        /// Points required.
        required: usize,
    },

    /// No three anchors span a plane.
    #[error("anchors are collinear; cannot compute a plane normal")]
    CollinearAnchors,

    /// A numeric step would produce NaN or infinity.
    #[error("degenerate geometry: {0}")]
    Degenerate(&'static str),

    /// Some landmark points could not be resolved to world anchors.
    #[error("resolved {resolved} of {requested} anchors")]
    AnchorResolution {
        /// Anchors that resolved.
        resolved: usize,
        /// Anchors requested.
        requested: usize,
    },

    /// Measurement configuration is invalid.
    #[error("invalid measurement configuration: {0}")]
    InvalidConfig(String),

    /// The species classifier failed.
    #[error("classification failed: {0}")]
    Classification(String),
}

impl MeasureError {
    /// The single message shown to the user when a pass fails.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyInput | Self::ImageDecode(_) | Self::InvalidMask { .. } => {
                "Could not read the photo. Please try again."
            }
            Self::NoForeground | Self::TooFewPoints { .. } | Self::Degenerate(_) => {
                "Could not isolate fish. Try a photo with the whole fish in frame."
            }
            Self::CollinearAnchors | Self::AnchorResolution { .. } => {
                "Could not find the surface under the fish. Move the phone slowly and try again."
            }
            Self::InvalidConfig(_) => "Measurement settings are invalid.",
            Self::Classification(_) => "Could not identify the species.",
        }
    }
}

/// Serde-compatible proxy for `MeasureError`.
///
/// `image::ImageError` does not implement serde, so `ImageDecode` is
/// carried as its `Display` string and comes back as `InvalidMask`.
#[derive(Serialize, Deserialize)]
enum MeasureErrorProxy {
    EmptyInput,
    ImageDecode(String),
    InvalidMask(String),
    NoForeground,
    TooFewPoints { found: usize, required: usize },
    CollinearAnchors,
    Degenerate(String),
    AnchorResolution { resolved: usize, requested: usize },
    InvalidConfig(String),
    Classification(String),
}

impl Serialize for MeasureError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::EmptyInput => MeasureErrorProxy::EmptyInput,
            Self::ImageDecode(e) => MeasureErrorProxy::ImageDecode(e.to_string()),
            Self::InvalidMask { reason } => MeasureErrorProxy::InvalidMask(reason.clone()),
            Self::NoForeground => MeasureErrorProxy::NoForeground,
            Self::TooFewPoints { found, required } => MeasureErrorProxy::TooFewPoints {
                found: *found,
                required: *required,
            },
            Self::CollinearAnchors => MeasureErrorProxy::CollinearAnchors,
            Self::Degenerate(what) => MeasureErrorProxy::Degenerate((*what).to_string()),
            Self::AnchorResolution {
                resolved,
                requested,
            } => MeasureErrorProxy::AnchorResolution {
                resolved: *resolved,
                requested: *requested,
            },
            Self::InvalidConfig(s) => MeasureErrorProxy::InvalidConfig(s.clone()),
            Self::Classification(s) => MeasureErrorProxy::Classification(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MeasureError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = MeasureErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            MeasureErrorProxy::EmptyInput => Self::EmptyInput,
            MeasureErrorProxy::ImageDecode(msg) => Self::InvalidMask {
                reason: format!("image decode error: {msg}"),
            },
            MeasureErrorProxy::InvalidMask(reason) => Self::InvalidMask { reason },
            MeasureErrorProxy::NoForeground => Self::NoForeground,
            MeasureErrorProxy::TooFewPoints { found, required } => {
                Self::TooFewPoints { found, required }
            }
            MeasureErrorProxy::CollinearAnchors => Self::CollinearAnchors,
            // The static description cannot be rebuilt from a string.
            MeasureErrorProxy::Degenerate(_) => Self::Degenerate("deserialized geometry error"),
            MeasureErrorProxy::AnchorResolution {
                resolved,
                requested,
            } => Self::AnchorResolution {
                resolved,
                requested,
            },
            MeasureErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            MeasureErrorProxy::Classification(s) => Self::Classification(s),
        })
    }
}
