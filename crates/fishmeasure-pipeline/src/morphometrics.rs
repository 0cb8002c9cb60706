//! Girth and weight estimation.
//!
//! Every empirical constant here is calibrated in inches and pounds, so
//! metric measurements go through [`metres_to_inches`] before any
//! formula is applied.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{FishReport, MeasureError, Measurement, MeasurementConfig};

/// Inches per metre.
pub const INCHES_PER_METRE: f64 = 39.3701;

/// Convert metres to inches.
#[must_use]
pub fn metres_to_inches(metres: f64) -> f64 {
    metres * INCHES_PER_METRE
}

/// Ramanujan's first approximation of an ellipse's circumference.
///
/// `major_axis` and `minor_axis` are full axis lengths (diameters); the
/// formula works on the semi-axes `a = major / 2`, `b = minor / 2`:
/// `pi * (3 (a + b) - sqrt((3a + b)(a + 3b)))`. Exact for a circle.
///
/// # Errors
///
/// Returns [`MeasureError::Degenerate`] for negative or non-finite axes.
pub fn circumference(major_axis: f64, minor_axis: f64) -> Result<f64, MeasureError> {
    if !(major_axis.is_finite() && minor_axis.is_finite()) || major_axis < 0.0 || minor_axis < 0.0
    {
        return Err(MeasureError::Degenerate("negative or non-finite ellipse axis"));
    }
    let a = major_axis / 2.0;
    let b = minor_axis / 2.0;
    Ok(PI * (3.0 * (a + b) - (3.0f64.mul_add(a, b) * 3.0f64.mul_add(b, a)).sqrt()))
}

/// Species with a dedicated weight formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Species {
    /// Kelp bass (*Paralabrax clathratus*).
    CalicoBass,
    /// California halibut (*Paralichthys californicus*).
    Halibut,
    /// Yellowtail amberjack (*Seriola lalandi*).
    Yellowtail,
    /// Anything else; uses the generic formula.
    #[default]
    Unknown,
}

impl Species {
    /// All species with a dedicated formula.
    pub const KNOWN: [Self; 3] = [Self::CalicoBass, Self::Halibut, Self::Yellowtail];

    /// `(a, b)` for the allometric model `W = a * FL^b`, fork length in
    /// inches, weight in pounds.
    #[must_use]
    pub const fn allometric_coefficients(self) -> (f64, f64) {
        match self {
            Self::CalicoBass => (0.000_476, 3.1),
            Self::Halibut => (0.000_226, 3.2),
            Self::Yellowtail => (0.000_625, 2.9),
            Self::Unknown => (0.000_4, 3.0),
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::CalicoBass => "Calico Bass",
            Self::Halibut => "Halibut",
            Self::Yellowtail => "Yellowtail",
            Self::Unknown => "Unknown",
        }
    }

    /// Species for a classifier result, or [`Species::Unknown`] when the
    /// confidence is below `min_confidence` or the label is unrecognised.
    #[must_use]
    pub fn from_classification(classification: &Classification, min_confidence: f64) -> Self {
        if classification.confidence < min_confidence {
            tracing::debug!(
                label = %classification.label,
                confidence = classification.confidence,
                "classification below confidence floor"
            );
            return Self::Unknown;
        }
        classification.label.parse().unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Species {
    type Err = MeasureError;

    /// Case-insensitive; spaces, hyphens and underscores are ignored, so
    /// `"calico bass"`, `"Calico_Bass"` and `"calicobass"` all match.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "calicobass" | "kelpbass" => Ok(Self::CalicoBass),
            "halibut" | "californiahalibut" => Ok(Self::Halibut),
            "yellowtail" => Ok(Self::Yellowtail),
            "unknown" => Ok(Self::Unknown),
            _ => Err(MeasureError::Classification(format!(
                "unrecognised species label {s:?}"
            ))),
        }
    }
}

/// Output of a species classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Raw label.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Which family of weight formulas to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightModel {
    /// Length-girth formulas on total length.
    #[default]
    LengthGirth,
    /// `W = a * FL^b` on fork length.
    Allometric,
}

/// Fish dimensions in inches, the unit every formula expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Inches {
    /// Width.
    pub width: f64,
    /// Total length.
    pub length: f64,
    /// Height.
    pub height: f64,
    /// Girth.
    pub girth: f64,
}

impl From<&Measurement> for Inches {
    fn from(m: &Measurement) -> Self {
        Self {
            width: metres_to_inches(m.width),
            length: metres_to_inches(m.length),
            height: metres_to_inches(m.height),
            girth: metres_to_inches(m.circumference),
        }
    }
}

/// Length-girth weight in pounds (total length and girth in inches).
///
/// - calico bass: `L^2 * G / 1200`
/// - halibut: `L^3 / 1000`
/// - yellowtail: `L * G^2 / 800`
/// - anything else: `L * G^2 / 1200`
#[must_use]
pub fn length_girth_weight(species: Species, length: f64, girth: f64) -> f64 {
    match species {
        Species::CalicoBass => length * length * girth / 1200.0,
        Species::Halibut => length.powi(3) / 1000.0,
        Species::Yellowtail => length * girth * girth / 800.0,
        Species::Unknown => length * girth * girth / 1200.0,
    }
}

/// Allometric weight in pounds from fork length in inches.
#[must_use]
pub fn allometric_weight(species: Species, fork_length: f64) -> f64 {
    let (a, b) = species.allometric_coefficients();
    a * fork_length.powf(b)
}

/// Estimate weight in pounds.
///
/// Width and height are accepted for completeness of the call site but
/// only length and girth drive the formulas.
///
/// # Errors
///
/// Returns [`MeasureError::Degenerate`] for negative or non-finite inputs
/// or result.
pub fn weight(
    dims: &Inches,
    species: Species,
    config: &MeasurementConfig,
) -> Result<f64, MeasureError> {
    let inputs = [dims.width, dims.length, dims.height, dims.girth];
    if inputs.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(MeasureError::Degenerate("negative or non-finite dimension"));
    }

    let lb = match config.weight_model {
        WeightModel::LengthGirth => length_girth_weight(species, dims.length, dims.girth),
        WeightModel::Allometric => {
            allometric_weight(species, dims.length * config.fork_length_ratio)
        }
    };
    if !lb.is_finite() {
        return Err(MeasureError::Degenerate("non-finite weight"));
    }
    Ok(lb)
}

impl FishReport {
    /// Convert a metric measurement into the final inch/pound report.
    ///
    /// # Errors
    ///
    /// Propagates [`weight`] failures.
    pub fn from_measurement(
        measurement: &Measurement,
        species: Species,
        config: &MeasurementConfig,
    ) -> Result<Self, MeasureError> {
        let inches = Inches::from(measurement);
        let weight_lb = weight(&inches, species, config)?;
        Ok(Self {
            species,
            weight_lb,
            width_in: inches.width,
            length_in: inches.length,
            height_in: inches.height,
            circumference_in: inches.girth,
        })
    }
}
