// plot/mod.rs

mod manhattan;
mod qq;

pub use manhattan::{chromosome_order_key, draw_manhattan, ManhattanLayout};
pub use qq::{draw_qq, genomic_inflation, qq_points};

use std::fs;
use std::path::PathBuf;

use log::{debug, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use svg2pdf::usvg;

use crate::error::{GwasError, Result};

/// Floor for p-values before taking -log10, so p = 0 stays finite.
pub(crate) const MIN_P_VALUE: f64 = 1e-300;

pub(crate) fn neg_log10(p: f64) -> f64 {
    -p.clamp(MIN_P_VALUE, 1.0).log10()
}

/// One figure bound to an output file. The drawing canvas only lives for
/// the duration of `render`, so it is released whether drawing succeeds or
/// fails, and no later figure can draw onto it. The PDF is written only
/// after drawing succeeded.
pub struct Figure {
    path: PathBuf,
    size: (u32, u32),
}

impl Figure {
    pub fn new(path: impl Into<PathBuf>, size: (u32, u32)) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    /// Draws onto an in-memory SVG canvas and returns the document.
    pub fn to_svg<F>(&self, draw: F) -> Result<String>
    where
        F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<()>,
    {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, self.size).into_drawing_area();
            root.fill(&WHITE)?;
            draw(&root)?;
            root.present()?;
        }
        debug!("Rendered {} bytes of SVG for {}", svg.len(), self.path.display());
        Ok(svg)
    }

    pub fn render<F>(self, draw: F) -> Result<PathBuf>
    where
        F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<()>,
    {
        let svg = self.to_svg(draw)?;
        let pdf = svg_to_pdf(&svg)?;
        fs::write(&self.path, pdf)?;
        Ok(self.path)
    }
}

/// Sans-serif families tried, in order, when the font database's generic
/// sans-serif family ("Arial" unless configured) is not installed.
const SANS_SERIF_FALLBACKS: [&str; 5] = [
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Helvetica",
    "FreeSans",
];

/// Loads the system fonts and points the generic sans-serif family, which
/// every plot label uses, at a face that is actually installed.
pub(crate) fn load_plot_fonts(fontdb: &mut usvg::fontdb::Database) {
    fontdb.load_system_fonts();
    if fontdb.is_empty() {
        warn!("No system fonts found; plot text will be missing from the PDF output.");
        return;
    }
    let sans_serif = usvg::fontdb::Query {
        families: &[usvg::fontdb::Family::SansSerif],
        ..Default::default()
    };
    if fontdb.query(&sans_serif).is_some() {
        return;
    }
    let installed = |name: &str| {
        fontdb
            .faces()
            .any(|face| face.families.iter().any(|(family, _)| family == name))
    };
    let family = SANS_SERIF_FALLBACKS
        .iter()
        .find(|name| installed(name))
        .map(|name| name.to_string())
        .or_else(|| {
            fontdb
                .faces()
                .find_map(|face| face.families.first().map(|(family, _)| family.clone()))
        });
    if let Some(family) = family {
        debug!("Using '{}' for sans-serif plot text", family);
        fontdb.set_sans_serif_family(family);
    }
}

fn svg_to_pdf(svg: &str) -> Result<Vec<u8>> {
    let mut options = usvg::Options::default();
    load_plot_fonts(options.fontdb_mut());
    let tree = usvg::Tree::from_str(svg, &options)
        .map_err(|e| GwasError::pdf(format!("failed to parse rendered SVG: {:?}", e)))?;
    svg2pdf::to_pdf(
        &tree,
        svg2pdf::ConversionOptions::default(),
        svg2pdf::PageOptions::default(),
    )
    .map_err(|e| GwasError::pdf(format!("failed to convert SVG to PDF: {:?}", e)))
}

/// Dashed horizontal rule built from short path segments.
pub(crate) fn dashed_hline(
    x_start: f64,
    x_end: f64,
    y: f64,
    style: ShapeStyle,
) -> Vec<PathElement<(f64, f64)>> {
    let span = (x_end - x_start).max(0.0);
    if span == 0.0 {
        return Vec::new();
    }
    let seg = span / 120.0;
    let mut out = Vec::new();
    let mut x = x_start;
    while x < x_end {
        let x2 = (x + seg).min(x_end);
        out.push(PathElement::new(vec![(x, y), (x2, y)], style));
        x = x2 + seg;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neg_log10_is_finite_for_zero_and_clamped_above_one() {
        assert!((neg_log10(0.01) - 2.0).abs() < 1e-12);
        assert!((neg_log10(0.0) - 300.0).abs() < 1e-9);
        assert_eq!(neg_log10(1.5), 0.0);
    }

    #[test]
    fn figure_writes_a_pdf() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("figure.pdf");
        let written = Figure::new(&path, (200, 100))
            .render(|root| {
                root.draw(&Circle::new((50, 50), 10, BLUE.filled()))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(written, path);
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn failed_drawing_writes_nothing() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("broken.pdf");
        let err = Figure::new(&path, (200, 100))
            .render(|_root| Err(GwasError::plot("boom")))
            .unwrap_err();
        assert!(matches!(err, GwasError::Plot { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn dashed_rule_covers_the_span_with_gaps() {
        let segments = dashed_hline(0.0, 120.0, 1.0, BLACK.stroke_width(1));
        assert_eq!(segments.len(), 60);
        assert!(dashed_hline(5.0, 5.0, 1.0, BLACK.stroke_width(1)).is_empty());
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn sans_serif_resolves_whenever_any_font_is_installed() {
        let mut fontdb = usvg::fontdb::Database::new();
        load_plot_fonts(&mut fontdb);
        if fontdb.is_empty() {
            return;
        }
        let query = usvg::fontdb::Query {
            families: &[usvg::fontdb::Family::SansSerif],
            ..Default::default()
        };
        assert!(fontdb.query(&query).is_some());
    }

    fn draw_label(root: &DrawingArea<SVGBackend<'_>, Shift>) -> Result<()> {
        root.draw(&Text::new("lambda GC", (20, 40), ("sans-serif", 16)))?;
        Ok(())
    }

    #[test]
    fn text_survives_conversion_to_pdf() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("labelled.pdf");
        let svg = Figure::new(&path, (200, 100)).to_svg(draw_label).unwrap();
        assert!(svg.contains("lambda GC"));

        Figure::new(&path, (200, 100)).render(draw_label).unwrap();
        let mut fontdb = usvg::fontdb::Database::new();
        fontdb.load_system_fonts();
        if fontdb.is_empty() {
            return;
        }
        let bytes = std::fs::read(&path).unwrap();
        assert!(contains(&bytes, b"/Font"), "PDF has no font resource");
    }
}
