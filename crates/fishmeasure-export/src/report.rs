//! Text and JSON renderings of a [`FishReport`].
//!
//! The text report is the user-facing contract: every value is printed
//! with two decimals and its unit.

use fishmeasure_pipeline::FishReport;

/// Errors that can occur while exporting.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// JSON serialization failed.
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Format a report as display lines.
///
/// ```
/// use fishmeasure_pipeline::{FishReport, Species};
/// use fishmeasure_export::format_report;
///
/// let report = FishReport {
///     species: Species::CalicoBass,
///     weight_lb: 5.0,
///     width_in: 4.0,
///     length_in: 20.0,
///     height_in: 2.5,
///     circumference_in: 15.0,
/// };
/// let text = format_report(&report);
/// assert!(text.contains("Width: 4.00 in"));
/// assert!(text.contains("Weight: 5.00 lb"));
/// ```
#[must_use]
pub fn format_report(report: &FishReport) -> String {
    report_lines(report).join("\n")
}

/// The individual lines of [`format_report`], species first.
#[must_use]
pub fn report_lines(report: &FishReport) -> Vec<String> {
    vec![
        format!("Species: {}", report.species),
        format!("Width: {:.2} in", report.width_in),
        format!("Length: {:.2} in", report.length_in),
        format!("Height: {:.2} in", report.height_in),
        format!("Girth: {:.2} in", report.circumference_in),
        format!("Weight: {:.2} lb", report.weight_lb),
    ]
}

/// Serialize a report as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails (for example a
/// non-finite value).
pub fn to_json(report: &FishReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}
