//! Bounding-box measurement path.
//!
//! A simpler alternative to the anchored pass: take the silhouette's
//! axis-aligned box, trim the segmentation overshoot, undo perspective
//! with the same camera-distance ratio the anchored pass uses, and turn
//! pixels into metres with a pinhole model.

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

use crate::morphometrics::circumference;
use crate::types::{Contour, Dimensions, MeasureError, Measurement, MeasurementConfig};

/// Camera distances needed by the bounding-box path, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxDistances {
    /// Camera to the top of the fish.
    pub distance_to_phone: f64,
    /// Camera to the ground beneath the fish.
    pub total_distance: f64,
    /// Fish thickness if known from elsewhere; `0.0` otherwise.
    pub height: f64,
}

/// Pixel-cover bounding box of a contour.
///
/// Each pixel `(x, y)` covers `[x, x + 1) x [y, y + 1)`. Returns `None`
/// for an empty contour.
#[must_use]
pub fn bounding_box(contour: &Contour) -> Option<Rect<f64>> {
    let mut pixels = contour.pixels().iter();
    let &(x0, y0) = pixels.next()?;
    let (min_x, min_y, max_x, max_y) =
        pixels.fold((x0, y0, x0, y0), |(ax, ay, bx, by), &(x, y)| {
            (ax.min(x), ay.min(y), bx.max(x), by.max(y))
        });
    Some(Rect::new(
        Coord {
            x: f64::from(min_x),
            y: f64::from(min_y),
        },
        Coord {
            x: f64::from(max_x) + 1.0,
            y: f64::from(max_y) + 1.0,
        },
    ))
}

/// Rect of the given size centred on `center`.
fn centered(center: Coord<f64>, width: f64, height: f64) -> Rect<f64> {
    let half = Coord {
        x: width / 2.0,
        y: height / 2.0,
    };
    Rect::new(center - half, center + half)
}

/// Shrink a box by `percent` on both axes, keeping its centre.
#[must_use]
pub fn nudge_bounding_box(rect: Rect<f64>, percent: f64) -> Rect<f64> {
    nudge_bounding_box_axes(rect, percent, percent)
}

/// Shrink a box by separate percentages along x and y, keeping its centre.
#[must_use]
pub fn nudge_bounding_box_axes(rect: Rect<f64>, x_percent: f64, y_percent: f64) -> Rect<f64> {
    centered(
        rect.center(),
        rect.width() * (1.0 - x_percent / 100.0),
        rect.height() * (1.0 - y_percent / 100.0),
    )
}

/// Express a pixel-space box as fractions of the image size.
///
/// Keeps the pixel convention (origin top-left); only the scale changes.
#[must_use]
pub fn normalize_bounding_box(rect: Rect<f64>, dimensions: Dimensions) -> Rect<f64> {
    let w = f64::from(dimensions.width);
    let h = f64::from(dimensions.height);
    Rect::new(
        Coord {
            x: rect.min().x / w,
            y: rect.min().y / h,
        },
        Coord {
            x: rect.max().x / w,
            y: rect.max().y / h,
        },
    )
}

/// Undo perspective foreshortening on a box.
///
/// Scales the box about its centre by
/// `distance_to_phone / total_distance * fudge`, the same ratio
/// [`perspective_scale`](crate::world::perspective_scale) applies to
/// anchors.
///
/// # Errors
///
/// Returns [`MeasureError::Degenerate`] for non-positive or non-finite
/// distances.
pub fn reverse_perspective_effect_on_bounding_box(
    rect: Rect<f64>,
    distance_to_phone: f64,
    total_distance: f64,
    fudge: f64,
) -> Result<Rect<f64>, MeasureError> {
    if !(distance_to_phone.is_finite() && total_distance.is_finite())
        || distance_to_phone <= 0.0
        || total_distance <= 0.0
    {
        return Err(MeasureError::Degenerate("non-positive camera distance"));
    }
    let ratio = distance_to_phone / total_distance * fudge;
    Ok(centered(
        rect.center(),
        rect.width() * ratio,
        rect.height() * ratio,
    ))
}

/// Measure a pixel-space bounding box.
///
/// The box is nudged by the configured length/width percentages,
/// perspective-corrected, then converted with
/// `metres = pixels * total_distance / scale_factor`. The longer side is
/// the length.
///
/// # Errors
///
/// Returns [`MeasureError::Degenerate`] for bad distances or an empty box.
pub fn measure_bounding_box(
    rect: Rect<f64>,
    distances: &BoxDistances,
    config: &MeasurementConfig,
) -> Result<Measurement, MeasureError> {
    if rect.width() <= 0.0 || rect.height() <= 0.0 {
        return Err(MeasureError::Degenerate("empty bounding box"));
    }
    if !distances.height.is_finite() || distances.height < 0.0 {
        return Err(MeasureError::Degenerate("negative fish height"));
    }

    let nudged = nudge_bounding_box_axes(rect, config.length_nudge, config.width_nudge);
    let corrected = reverse_perspective_effect_on_bounding_box(
        nudged,
        distances.distance_to_phone,
        distances.total_distance,
        config.perspective_fudge,
    )?;

    let to_metres = |px: f64| px * distances.total_distance / config.scale_factor;
    let (long, short) = if corrected.width() >= corrected.height() {
        (corrected.width(), corrected.height())
    } else {
        (corrected.height(), corrected.width())
    };
    let length = to_metres(long);
    let width = to_metres(short);

    let measurement = Measurement {
        width,
        length,
        height: distances.height,
        circumference: circumference(width, distances.height)?,
    };
    tracing::info!(?measurement, "bounding-box measurement");
    Ok(measurement)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect<f64> {
        Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 })
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn bounding_box_covers_pixels() {
        let c = Contour::new(vec![(2, 3), (5, 3), (4, 7)]);
        let r = bounding_box(&c).unwrap();
        assert_eq!(r, rect(2.0, 3.0, 6.0, 8.0));
        assert!(bounding_box(&Contour::new(vec![])).is_none());
    }

    #[test]
    fn nudge_shrinks_and_recenters() {
        let r = nudge_bounding_box(rect(0.0, 0.0, 100.0, 50.0), 10.0);
        assert!(approx(r.width(), 90.0));
        assert!(approx(r.height(), 45.0));
        assert!(approx(r.center().x, 50.0));
        assert!(approx(r.center().y, 25.0));
    }

    #[test]
    fn nudge_axes_are_independent() {
        let r = nudge_bounding_box_axes(rect(0.0, 0.0, 100.0, 100.0), 20.0, 0.0);
        assert!(approx(r.width(), 80.0));
        assert!(approx(r.height(), 100.0));
    }

    #[test]
    fn normalize_divides_by_image_size() {
        let r = normalize_bounding_box(
            rect(10.0, 20.0, 50.0, 60.0),
            Dimensions {
                width: 100,
                height: 200,
            },
        );
        assert_eq!(r, rect(0.1, 0.1, 0.5, 0.3));
    }

    #[test]
    fn reverse_perspective_uses_distance_ratio() {
        let r = reverse_perspective_effect_on_bounding_box(rect(0.0, 0.0, 100.0, 40.0), 0.9, 1.0, 1.1)
            .unwrap();
        assert!(approx(r.width(), 99.0));
        assert!(approx(r.height(), 39.6));
        assert!(approx(r.center().x, 50.0));
    }

    #[test]
    fn reverse_perspective_rejects_zero_distance() {
        let r = rect(0.0, 0.0, 1.0, 1.0);
        assert!(reverse_perspective_effect_on_bounding_box(r, 0.0, 1.0, 1.1).is_err());
        assert!(reverse_perspective_effect_on_bounding_box(r, 1.0, f64::NAN, 1.1).is_err());
    }

    #[test]
    fn measure_bounding_box_uses_pinhole_scale() {
        let config = MeasurementConfig {
            length_nudge: 0.0,
            width_nudge: 0.0,
            perspective_fudge: 1.0,
            scale_factor: 500.0,
            ..MeasurementConfig::default()
        };
        let distances = BoxDistances {
            distance_to_phone: 1.0,
            total_distance: 1.0,
            height: 0.0,
        };
        // Taller than wide: the long side is still the length.
        let m = measure_bounding_box(rect(0.0, 0.0, 50.0, 150.0), &distances, &config).unwrap();
        assert!(approx(m.length, 0.3));
        assert!(approx(m.width, 0.1));
        assert!(approx(m.height, 0.0));
    }

    #[test]
    fn measure_bounding_box_rejects_empty_box() {
        let distances = BoxDistances {
            distance_to_phone: 1.0,
            total_distance: 1.0,
            height: 0.0,
        };
        let config = MeasurementConfig::default();
        assert!(measure_bounding_box(rect(5.0, 5.0, 5.0, 9.0), &distances, &config).is_err());
    }
}
