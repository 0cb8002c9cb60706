//! Measurement diagnostics: timing and counts for each pipeline stage.
//!
//! Every call to [`measure_with_diagnostics`] collects diagnostics
//! alongside the measurement. Timestamps come from an injected
//! [`Clock`], so the core stays free of platform time sources.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bbox::BoxDistances;
use crate::morphometrics::Species;
use crate::pipeline::{Measured, MeasurementResult, Pipeline, TipsLocated};
use crate::types::{GrayImage, MeasureError, MeasurementConfig};
use crate::world::{ViewGeometry, WorldTracker};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single measurement pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementDiagnostics {
    /// Binary thresholding.
    pub threshold: StageDiagnostics,
    /// Connected-component extraction.
    pub extraction: StageDiagnostics,
    /// Centre-proximity selection.
    pub selection: StageDiagnostics,
    /// Ellipse fitting.
    pub fit: StageDiagnostics,
    /// Tip location.
    pub tips: StageDiagnostics,
    /// World or bounding-box measurement.
    pub measure: StageDiagnostics,
    /// Total wall-clock duration of the pass (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: MeasurementSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Thresholding metrics.
    Threshold {
        /// Cutoff applied.
        cutoff: u8,
        /// Foreground pixels after thresholding.
        foreground_pixel_count: u64,
        /// Total pixels in the mask.
        total_pixel_count: u64,
    },
    /// Component extraction metrics.
    Extraction {
        /// Number of components.
        component_count: usize,
        /// Pixels in the largest component.
        largest_component: usize,
        /// Pixels in the smallest component.
        smallest_component: usize,
    },
    /// Selection metrics.
    Selection {
        /// Pixels in the chosen component.
        pixel_count: usize,
        /// Distance from its centroid to the image centre, in pixels.
        distance_to_center: f64,
    },
    /// Ellipse fit metrics.
    Fit {
        /// Which fitter ran.
        strategy: String,
        /// Larger semi-axis in pixels.
        semi_axis_long: f64,
        /// Smaller semi-axis in pixels.
        semi_axis_short: f64,
        /// Rotation in degrees.
        rotation_degrees: f64,
    },
    /// Tip location metrics.
    Tips {
        /// Largest distance between two tips, in pixels.
        max_span: f64,
    },
    /// Measurement metrics.
    Measure {
        /// `"anchored"` or `"bounding-box"`.
        method: String,
        /// Length in metres.
        length: f64,
        /// Width in metres.
        width: f64,
        /// Height in metres.
        height: f64,
        /// Perspective factor, when one was applied.
        perspective_scale: Option<f64>,
    },
}

/// High-level summary for the whole pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementSummary {
    /// Mask width in pixels.
    pub image_width: u32,
    /// Mask height in pixels.
    pub image_height: u32,
    /// Components found.
    pub component_count: usize,
    /// Final length in metres.
    pub length: f64,
    /// Final width in metres.
    pub width: f64,
}

impl MeasurementDiagnostics {
    /// Per-stage entries in execution order.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 6] {
        [
            ("Threshold", &self.threshold),
            ("Extraction", &self.extraction),
            ("Selection", &self.selection),
            ("Fit", &self.fit),
            ("Tips", &self.tips),
            ("Measure", &self.measure),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Measurement Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Mask: {}x{}",
            self.summary.image_width, self.summary.image_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Components: {}  |  Length: {:.4}m  |  Width: {:.4}m",
            self.summary.component_count, self.summary.length, self.summary.width,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Threshold {
            cutoff,
            foreground_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *foreground_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("cutoff={cutoff} fg={foreground_pixel_count} ({density:.1}%)")
        }
        StageMetrics::Extraction {
            component_count,
            largest_component,
            smallest_component,
        } => format!(
            "{component_count} components (min={smallest_component} max={largest_component} px)"
        ),
        StageMetrics::Selection {
            pixel_count,
            distance_to_center,
        } => format!("{pixel_count} px, {distance_to_center:.1}px from centre"),
        StageMetrics::Fit {
            strategy,
            semi_axis_long,
            semi_axis_short,
            rotation_degrees,
        } => format!(
            "{strategy} a={semi_axis_long:.1} b={semi_axis_short:.1} rot={rotation_degrees:.1}deg"
        ),
        StageMetrics::Tips { max_span } => format!("span={max_span:.1}px"),
        StageMetrics::Measure {
            method,
            length,
            width,
            height,
            perspective_scale,
        } => {
            let scale = perspective_scale.map_or_else(String::new, |s| format!(" scale={s:.3}"));
            format!("{method} L={length:.4}m W={width:.4}m H={height:.4}m{scale}")
        }
    }
}

/// How the final stage turns the fitted ellipse into a measurement.
pub enum MeasureMode<'a, T: WorldTracker + ?Sized> {
    /// Resolve landmarks through world tracking.
    Anchored {
        /// Hit-test provider.
        tracker: &'a T,
        /// How the mask maps onto the viewport.
        view: &'a ViewGeometry,
    },
    /// Measure the silhouette's bounding box.
    BoundingBox(BoxDistances),
}

/// Time one stage.
fn timed<C: Clock, R>(clock: &C, f: impl FnOnce() -> R) -> (R, Duration) {
    let start = clock.now();
    let out = f();
    (out, clock.elapsed(&start))
}

/// Run the staged pipeline and collect per-stage diagnostics.
///
/// # Errors
///
/// Propagates the first failing stage's error. No diagnostics are
/// returned for a failed pass.
pub fn measure_with_diagnostics<T: WorldTracker + ?Sized, C: Clock>(
    mask: GrayImage,
    mode: MeasureMode<'_, T>,
    species: Species,
    config: MeasurementConfig,
    clock: &C,
) -> Result<(MeasurementResult, MeasurementDiagnostics), MeasureError> {
    let total_start = clock.now();
    let cutoff = config.threshold;

    let (thresholded, d_threshold) = timed(clock, || {
        Pipeline::new(mask, config).with_species(species).threshold()
    });
    let thresholded = thresholded?;
    let dims = thresholded.dimensions();
    let threshold = StageDiagnostics {
        duration: d_threshold,
        metrics: StageMetrics::Threshold {
            cutoff,
            foreground_pixel_count: crate::grayscale::foreground_count(thresholded.binary()),
            total_pixel_count: u64::from(dims.width) * u64::from(dims.height),
        },
    };

    let (extracted, d_extract) = timed(clock, || thresholded.extract_contours());
    let sizes = extracted.contours().iter().map(crate::types::Contour::len);
    let component_count = extracted.contours().len();
    let extraction = StageDiagnostics {
        duration: d_extract,
        metrics: StageMetrics::Extraction {
            component_count,
            largest_component: sizes.clone().max().unwrap_or(0),
            smallest_component: sizes.min().unwrap_or(0),
        },
    };

    let (selected, d_select) = timed(clock, || extracted.select());
    let selected = selected?;
    let selection = StageDiagnostics {
        duration: d_select,
        metrics: StageMetrics::Selection {
            pixel_count: selected.contour().len(),
            distance_to_center: selected
                .contour()
                .centroid()
                .map_or(0.0, |c| c.distance(dims.center())),
        },
    };

    let (fitted, d_fit) = timed(clock, || selected.fit());
    let fitted = fitted?;
    let e = fitted.ellipse();
    let fit = StageDiagnostics {
        duration: d_fit,
        metrics: StageMetrics::Fit {
            strategy: format!("{:?}", fitted.strategy()),
            semi_axis_long: e.size.width.max(e.size.height),
            semi_axis_short: e.size.width.min(e.size.height),
            rotation_degrees: e.rotation_degrees,
        },
    };

    let (located, d_tips): (TipsLocated, _) = timed(clock, || fitted.locate_tips());
    let tips = StageDiagnostics {
        duration: d_tips,
        metrics: StageMetrics::Tips {
            max_span: located.tips().max_span(),
        },
    };

    let (measured, d_measure) = timed(clock, || -> Result<Measured, MeasureError> {
        match mode {
            MeasureMode::Anchored { tracker, view } => located.measure(tracker, view),
            MeasureMode::BoundingBox(distances) => located.measure_bounding_box(distances),
        }
    });
    let measured = measured?;
    let m = *measured.measurement();
    let measure = StageDiagnostics {
        duration: d_measure,
        metrics: StageMetrics::Measure {
            method: if measured.anchors().is_some() {
                "anchored".to_string()
            } else {
                "bounding-box".to_string()
            },
            length: m.length,
            width: m.width,
            height: m.height,
            perspective_scale: measured.anchors().map(|a| a.perspective_scale),
        },
    };

    let result = measured.into_result()?;
    let total_duration = clock.elapsed(&total_start);

    let diagnostics = MeasurementDiagnostics {
        threshold,
        extraction,
        selection,
        fit,
        tips,
        measure,
        total_duration,
        summary: MeasurementSummary {
            image_width: dims.width,
            image_height: dims.height,
            component_count,
            length: m.length,
            width: m.width,
        },
    };
    Ok((result, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use image::Luma;

    use super::*;
    use crate::scene::OverheadCamera;
    use crate::world::Size;

    /// Clock that advances one millisecond per reading.
    struct StepClock(Cell<u64>);

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn blob_mask() -> GrayImage {
        GrayImage::from_fn(80, 60, |x, y| {
            let dx = (f64::from(x) - 40.0) / 25.0;
            let dy = (f64::from(y) - 30.0) / 10.0;
            if dx * dx + dy * dy <= 1.0 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let mask = blob_mask();
        let view = ViewGeometry::new(Size::new(80.0, 60.0), Size::new(80.0, 60.0)).unwrap();
        let camera = OverheadCamera::new(mask.clone(), view, 1.0, 0.05, 80.0);
        let (result, diag) = measure_with_diagnostics(
            mask,
            MeasureMode::Anchored {
                tracker: &camera,
                view: &view,
            },
            Species::Yellowtail,
            MeasurementConfig::default(),
            &StepClock(Cell::new(0)),
        )
        .unwrap();

        assert_eq!(diag.summary.component_count, 1);
        assert!((diag.summary.length - result.measurement.length).abs() < 1e-12);
        for (name, stage) in diag.stages() {
            assert_eq!(stage.duration, Duration::from_millis(1), "{name}");
        }
        assert!(diag.total_duration >= Duration::from_millis(6));
        assert!(matches!(
            diag.measure.metrics,
            StageMetrics::Measure {
                perspective_scale: Some(_),
                ..
            }
        ));

        let report = diag.report();
        assert!(report.contains("Measurement Diagnostics Report"));
        assert!(report.contains("Covariance"));
        assert!(report.contains("anchored"));
    }

    #[test]
    fn bounding_box_mode_has_no_perspective_scale() {
        let distances = BoxDistances {
            distance_to_phone: 0.95,
            total_distance: 1.0,
            height: 0.0,
        };
        let (_, diag) = measure_with_diagnostics::<OverheadCamera, _>(
            blob_mask(),
            MeasureMode::BoundingBox(distances),
            Species::Unknown,
            MeasurementConfig::default(),
            &StepClock(Cell::new(0)),
        )
        .unwrap();
        assert!(matches!(
            diag.measure.metrics,
            StageMetrics::Measure {
                perspective_scale: None,
                ..
            }
        ));
        assert!(diag.report().contains("bounding-box"));
    }

    #[test]
    fn failed_pass_returns_error() {
        let result = measure_with_diagnostics::<OverheadCamera, _>(
            GrayImage::new(10, 10),
            MeasureMode::BoundingBox(BoxDistances {
                distance_to_phone: 1.0,
                total_distance: 1.0,
                height: 0.0,
            }),
            Species::Unknown,
            MeasurementConfig::default(),
            &StepClock(Cell::new(0)),
        );
        assert!(matches!(result, Err(MeasureError::NoForeground)));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let stage = StageDiagnostics {
            duration: Duration::from_millis(1500),
            metrics: StageMetrics::Tips { max_span: 3.0 },
        };
        let json = serde_json::to_value(&stage).unwrap();
        assert!((json["duration"].as_f64().unwrap() - 1.5).abs() < 1e-12);
        let back: StageDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration, Duration::from_millis(1500));
    }
}
