//! Annotated SVG overlay.
//!
//! Draws the fitted ellipse, its four tips, the length and width axes
//! and the text report in the mask's pixel coordinate system, using the
//! [`svg`] crate for document construction and XML escaping. Laid over
//! the source photo it shows exactly what was measured.
//!
//! Tips are drawn where [`fishmeasure_pipeline::ellipse::tips`] puts
//! them. For a minimax fit of a silhouette taller than it is wide, that
//! is off the drawn ellipse, with the length axis horizontal.
//!
//! Optional [`SvgMetadata`] embeds `<title>`, `<desc>` and a
//! `<metadata>` block carrying the measurement configuration as JSON.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use geo::Rect;
use svg::Document;
use svg::node::element::{
    Circle, Description, Element, Ellipse as EllipseElement, Group, Line, Rectangle,
    Text as TextElement, Title,
};
use svg::node::{Node, Text};

use fishmeasure_pipeline::{Dimensions, Ellipse, EllipseTips, FishReport, MeasurementResult, PixelPoint};

use crate::report::report_lines;

/// Namespace for the embedded configuration element.
const CONFIG_NAMESPACE: &str = "urn:fishmeasure:config:1";

const ELLIPSE_STROKE: &str = "#00c853";
const LENGTH_STROKE: &str = "#ff1744";
const WIDTH_STROKE: &str = "#2979ff";
const TIP_FILL: &str = "#ffd600";
const BOX_STROKE: &str = "#9e9e9e";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically
/// by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the mask filename without extension.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized measurement configuration, emitted inside a
    /// `<metadata>` element wrapped in a namespaced
    /// `<fishmeasure:config>` element.
    pub config_json: Option<&'a str>,
}

/// Serialize a measurement overlay into an SVG document string.
///
/// The `viewBox` matches `dimensions`, so the overlay lines up with the
/// mask pixel grid.
///
/// # Examples
///
/// ```
/// use fishmeasure_pipeline::ellipse::{self, Ellipse, EllipseSize};
/// use fishmeasure_pipeline::{Dimensions, FishReport, PixelPoint, Species};
/// use fishmeasure_export::{SvgMetadata, to_annotated_svg};
///
/// let e = Ellipse {
///     center: PixelPoint::new(100.0, 50.0),
///     size: EllipseSize { width: 60.0, height: 20.0 },
///     rotation_degrees: 0.0,
/// };
/// let report = FishReport {
///     species: Species::Unknown,
///     weight_lb: 1.5,
///     width_in: 3.0,
///     length_in: 12.0,
///     height_in: 1.0,
///     circumference_in: 7.0,
/// };
/// let dims = Dimensions { width: 200, height: 100 };
/// let svg = to_annotated_svg(dims, &e, &ellipse::tips(&e), &report, &SvgMetadata::default());
/// assert!(svg.contains(r#"viewBox="0 0 200 100""#));
/// assert!(svg.contains("Weight: 1.50 lb"));
/// ```
#[must_use]
pub fn to_annotated_svg(
    dimensions: Dimensions,
    ellipse: &Ellipse,
    tips: &EllipseTips,
    report: &FishReport,
    metadata: &SvgMetadata<'_>,
) -> String {
    render(dimensions, None, ellipse, tips, report, metadata)
}

/// Like [`to_annotated_svg`], additionally outlining the silhouette's
/// bounding box.
#[must_use]
pub fn to_result_svg(result: &MeasurementResult, metadata: &SvgMetadata<'_>) -> String {
    render(
        result.dimensions,
        Some(result.bounding_box),
        &result.ellipse,
        &result.tips,
        &result.report,
        metadata,
    )
}

fn render(
    dimensions: Dimensions,
    bounding_box: Option<Rect<f64>>,
    ellipse: &Ellipse,
    tips: &EllipseTips,
    report: &FishReport,
    metadata: &SvgMetadata<'_>,
) -> String {
    let w = dimensions.width;
    let h = dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("fishmeasure:config");
        config_el.assign("xmlns:fishmeasure", CONFIG_NAMESPACE);
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    // Marker and text sizes follow the image so small masks stay legible.
    let extent = f64::from(w.min(h));
    let stroke = (extent / 200.0).max(1.0);
    let marker = (extent / 80.0).max(2.0);

    if let Some(rect) = bounding_box {
        doc = doc.add(
            Rectangle::new()
                .set("id", "silhouette")
                .set("x", rect.min().x)
                .set("y", rect.min().y)
                .set("width", rect.width())
                .set("height", rect.height())
                .set("fill", "none")
                .set("stroke", BOX_STROKE)
                .set("stroke-width", stroke)
                .set("stroke-dasharray", "4 2"),
        );
    }

    doc = doc.add(
        EllipseElement::new()
            .set("id", "fit")
            .set("cx", ellipse.center.x)
            .set("cy", ellipse.center.y)
            .set("rx", ellipse.size.width)
            .set("ry", ellipse.size.height)
            .set(
                "transform",
                format!(
                    "rotate({} {} {})",
                    ellipse.rotation_degrees, ellipse.center.x, ellipse.center.y
                ),
            )
            .set("fill", "none")
            .set("stroke", ELLIPSE_STROKE)
            .set("stroke-width", stroke),
    );

    doc = doc
        .add(axis("length-axis", tips.left, tips.right, LENGTH_STROKE, stroke))
        .add(axis("width-axis", tips.top, tips.bottom, WIDTH_STROKE, stroke));

    let mut markers = Group::new().set("id", "tips").set("fill", TIP_FILL);
    for (name, p) in [
        ("top", tips.top),
        ("right", tips.right),
        ("bottom", tips.bottom),
        ("left", tips.left),
    ] {
        markers = markers.add(
            Circle::new()
                .set("id", format!("tip-{name}"))
                .set("cx", p.x)
                .set("cy", p.y)
                .set("r", marker),
        );
    }
    doc = doc.add(markers);

    let font_size = (f64::from(h) / 30.0).max(10.0);
    let mut text = Group::new()
        .set("id", "report")
        .set("font-family", "sans-serif")
        .set("font-size", font_size)
        .set("fill", "white")
        .set("stroke", "black")
        .set("stroke-width", font_size / 12.0)
        .set("paint-order", "stroke");
    for (i, line) in report_lines(report).into_iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let y = font_size * 1.25 * (i as f64 + 1.0);
        text = text.add(TextElement::new(line).set("x", font_size / 2.0).set("y", y));
    }
    doc = doc.add(text);

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

fn axis(id: &str, from: PixelPoint, to: PixelPoint, colour: &str, width: f64) -> Line {
    Line::new()
        .set("id", id)
        .set("x1", from.x)
        .set("y1", from.y)
        .set("x2", to.x)
        .set("y2", to.y)
        .set("stroke", colour)
        .set("stroke-width", width)
}
