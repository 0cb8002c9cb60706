//! Incremental measurement pipeline: advance stage-by-stage, inspecting
//! each intermediate result before continuing.
//!
//! ```rust
//! # use fishmeasure_pipeline::{GrayImage, MeasureError, MeasurementConfig, Pipeline};
//! # use fishmeasure_pipeline::world::{ViewGeometry, WorldTracker};
//! # fn run<T: WorldTracker>(mask: GrayImage, tracker: &T, view: &ViewGeometry) -> Result<(), MeasureError> {
//! let result = Pipeline::new(mask, MeasurementConfig::default())
//!     .threshold()?
//!     .extract_contours()
//!     .select()?
//!     .fit()?
//!     .locate_tips()
//!     .measure(tracker, view)?
//!     .into_result()?;
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying forward what later stages
//! need. Components other than the selected one are dropped at
//! [`ContoursExtracted::select`].

use geo::Rect;

use crate::bbox::{self, BoxDistances};
use crate::ellipse::{Ellipse, EllipseFitKind, EllipseFitter, EllipseTips};
use crate::morphometrics::Species;
use crate::types::{
    Contour, Dimensions, FishReport, GrayImage, MeasureError, Measurement, MeasurementConfig,
};
use crate::world::{self, AnchorSet, ViewGeometry, WorldTracker};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`threshold`](Self::threshold) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .threshold() to continue"]
pub struct Pending {
    config: MeasurementConfig,
    species: Species,
    source: GrayImage,
}

impl Pending {
    /// The grayscale source mask.
    #[must_use]
    pub const fn source(&self) -> &GrayImage {
        &self.source
    }

    /// Species whose weight formula the final report uses.
    ///
    /// Defaults to [`Species::Unknown`].
    pub const fn with_species(mut self, species: Species) -> Self {
        self.species = species;
        self
    }

    /// Validate the configuration and binarize the mask.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::InvalidConfig`] for a bad configuration and
    /// [`MeasureError::InvalidMask`] for a zero-sized mask.
    pub fn threshold(self) -> Result<Thresholded, MeasureError> {
        self.config.validate()?;
        let dimensions = Dimensions::of(&self.source);
        if dimensions.is_empty() {
            return Err(MeasureError::InvalidMask {
                reason: format!(
                    "mask has zero size ({}x{})",
                    dimensions.width, dimensions.height
                ),
            });
        }
        let binary = crate::grayscale::binarize(&self.source, self.config.threshold);
        Ok(Thresholded {
            config: self.config,
            species: self.species,
            binary,
            dimensions,
        })
    }
}

// ───────────────────────── Stage 1: Thresholded ──────────────────────

/// Pipeline state after thresholding.
#[must_use = "pipeline stages are consumed by advancing; call .extract_contours() to continue"]
pub struct Thresholded {
    config: MeasurementConfig,
    species: Species,
    binary: GrayImage,
    dimensions: Dimensions,
}

impl Thresholded {
    /// The binary mask (every pixel 0 or 255).
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// Mask dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Split the foreground into 4-connected components.
    pub fn extract_contours(self) -> ContoursExtracted {
        let contours = crate::contour::extract_contours(&self.binary);
        ContoursExtracted {
            config: self.config,
            species: self.species,
            dimensions: self.dimensions,
            contours,
        }
    }
}

// ───────────────────────── Stage 2: ContoursExtracted ────────────────

/// Pipeline state after component extraction.
#[must_use = "pipeline stages are consumed by advancing; call .select() to continue"]
pub struct ContoursExtracted {
    config: MeasurementConfig,
    species: Species,
    dimensions: Dimensions,
    contours: Vec<Contour>,
}

impl ContoursExtracted {
    /// Every component, in scan order.
    #[must_use]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// Keep only the component nearest the image centre.
    ///
    /// # Errors
    ///
    /// Returns [`MeasureError::NoForeground`] if there are no components.
    pub fn select(self) -> Result<Selected, MeasureError> {
        let contour = crate::contour::select_closest(self.contours, self.dimensions)
            .ok_or(MeasureError::NoForeground)?;
        Ok(Selected {
            config: self.config,
            species: self.species,
            dimensions: self.dimensions,
            contour,
        })
    }
}

// ───────────────────────── Stage 3: Selected ─────────────────────────

/// Pipeline state after choosing the fish component.
#[must_use = "pipeline stages are consumed by advancing; call .fit() to continue"]
pub struct Selected {
    config: MeasurementConfig,
    species: Species,
    dimensions: Dimensions,
    contour: Contour,
}

impl Selected {
    /// The selected component.
    #[must_use]
    pub const fn contour(&self) -> &Contour {
        &self.contour
    }

    /// Fit an ellipse to the component with the configured fitter.
    ///
    /// # Errors
    ///
    /// Propagates [`EllipseFitter::fit`] failures.
    pub fn fit(self) -> Result<Fitted, MeasureError> {
        let ellipse = self.config.ellipse_fit.fit(&self.contour.to_points())?;
        Ok(Fitted {
            config: self.config,
            species: self.species,
            dimensions: self.dimensions,
            contour: self.contour,
            ellipse,
        })
    }
}

// ───────────────────────── Stage 4: Fitted ───────────────────────────

/// Pipeline state after ellipse fitting.
#[must_use = "pipeline stages are consumed by advancing; call .locate_tips() to continue"]
pub struct Fitted {
    config: MeasurementConfig,
    species: Species,
    dimensions: Dimensions,
    contour: Contour,
    ellipse: Ellipse,
}

impl Fitted {
    /// The fitted ellipse.
    #[must_use]
    pub const fn ellipse(&self) -> &Ellipse {
        &self.ellipse
    }

    /// Which fitter produced the ellipse.
    #[must_use]
    pub const fn strategy(&self) -> EllipseFitKind {
        self.config.ellipse_fit
    }

    /// Compute the four landmark tips.
    pub fn locate_tips(self) -> TipsLocated {
        let tips = crate::ellipse::tips(&self.ellipse);
        TipsLocated {
            config: self.config,
            species: self.species,
            dimensions: self.dimensions,
            contour: self.contour,
            ellipse: self.ellipse,
            tips,
        }
    }
}

// ───────────────────────── Stage 5: TipsLocated ──────────────────────

/// Pipeline state after locating the tips.
///
/// Two ways forward: [`measure`](Self::measure) through world tracking,
/// or [`measure_bounding_box`](Self::measure_bounding_box) from camera
/// distances alone.
#[must_use = "pipeline stages are consumed by advancing; call .measure() to continue"]
pub struct TipsLocated {
    config: MeasurementConfig,
    species: Species,
    dimensions: Dimensions,
    contour: Contour,
    ellipse: Ellipse,
    tips: EllipseTips,
}

impl TipsLocated {
    /// The four landmark tips.
    #[must_use]
    pub const fn tips(&self) -> &EllipseTips {
        &self.tips
    }

    fn silhouette_box(&self) -> Result<Rect<f64>, MeasureError> {
        bbox::bounding_box(&self.contour).ok_or(MeasureError::NoForeground)
    }

    /// Measure by resolving landmarks to world anchors.
    ///
    /// # Errors
    ///
    /// Propagates [`world::measure_anchored`] failures.
    pub fn measure<T: WorldTracker + ?Sized>(
        self,
        tracker: &T,
        view: &ViewGeometry,
    ) -> Result<Measured, MeasureError> {
        let bounding_box = self.silhouette_box()?;
        let (measurement, anchors) = world::measure_anchored(
            &self.ellipse,
            &self.tips,
            self.dimensions,
            view,
            tracker,
            &self.config,
        )?;
        Ok(self.finish(measurement, Some(anchors), bounding_box))
    }

    /// Measure the silhouette's bounding box.
    ///
    /// # Errors
    ///
    /// Propagates [`bbox::measure_bounding_box`] failures.
    pub fn measure_bounding_box(self, distances: BoxDistances) -> Result<Measured, MeasureError> {
        let bounding_box = self.silhouette_box()?;
        let measurement = bbox::measure_bounding_box(bounding_box, &distances, &self.config)?;
        Ok(self.finish(measurement, None, bounding_box))
    }

    fn finish(
        self,
        measurement: Measurement,
        anchors: Option<AnchorSet>,
        bounding_box: Rect<f64>,
    ) -> Measured {
        Measured {
            config: self.config,
            species: self.species,
            dimensions: self.dimensions,
            contour: self.contour,
            ellipse: self.ellipse,
            tips: self.tips,
            bounding_box,
            anchors,
            measurement,
        }
    }
}

// ───────────────────────── Stage 6: Measured ─────────────────────────

/// Pipeline state after measuring.
#[must_use = "call .into_result() to obtain the report"]
pub struct Measured {
    config: MeasurementConfig,
    species: Species,
    dimensions: Dimensions,
    contour: Contour,
    ellipse: Ellipse,
    tips: EllipseTips,
    bounding_box: Rect<f64>,
    anchors: Option<AnchorSet>,
    measurement: Measurement,
}

impl Measured {
    /// The metric measurement.
    #[must_use]
    pub const fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    /// Resolved anchors, for the anchored path only.
    #[must_use]
    pub const fn anchors(&self) -> Option<&AnchorSet> {
        self.anchors.as_ref()
    }

    /// Convert to inches, estimate weight, and return everything.
    ///
    /// # Errors
    ///
    /// Propagates weight estimation failures.
    pub fn into_result(self) -> Result<MeasurementResult, MeasureError> {
        let report = FishReport::from_measurement(&self.measurement, self.species, &self.config)?;
        tracing::info!(
            species = %report.species,
            length_in = report.length_in,
            weight_lb = report.weight_lb,
            "fish measured"
        );
        Ok(MeasurementResult {
            dimensions: self.dimensions,
            contour: self.contour,
            ellipse: self.ellipse,
            tips: self.tips,
            bounding_box: self.bounding_box,
            anchors: self.anchors,
            measurement: self.measurement,
            report,
        })
    }
}

/// Everything a completed pass produced.
#[derive(Debug, Clone)]
pub struct MeasurementResult {
    /// Mask dimensions.
    pub dimensions: Dimensions,
    /// The selected component.
    pub contour: Contour,
    /// Ellipse fitted to the component.
    pub ellipse: Ellipse,
    /// Landmark tips of the ellipse.
    pub tips: EllipseTips,
    /// Pixel-cover bounding box of the component.
    pub bounding_box: Rect<f64>,
    /// Anchors, when the anchored path was used.
    pub anchors: Option<AnchorSet>,
    /// Metric measurement.
    pub measurement: Measurement,
    /// Final inch/pound report.
    pub report: FishReport,
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental measurement pipeline.
///
/// Created via [`Pipeline::new`], which stores the mask and config
/// without doing any processing. Each stage method consumes the current
/// state and returns the next, so stages cannot be skipped or run out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from a grayscale mask and config.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(mask: GrayImage, config: MeasurementConfig) -> Pending {
        Pending {
            config,
            species: Species::Unknown,
            source: mask,
        }
    }
}
