//! fishmeasure-export: Pure format serializers (sans-IO)
//!
//! Turns a finished measurement into user-facing output: the two-decimal
//! text report, a JSON document, and an annotated SVG overlay.

pub mod report;
pub mod svg;

pub use report::{ExportError, format_report, to_json};
pub use svg::{SvgMetadata, to_annotated_svg, to_result_svg};
