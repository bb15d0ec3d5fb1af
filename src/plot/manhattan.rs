// plot/manhattan.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::{dashed_hline, neg_log10, Figure};
use crate::config::PlotSettings;
use crate::error::Result;
use crate::results::ResultsTable;

const CHROMOSOME_COLORS: [RGBColor; 2] = [RGBColor(31, 78, 121), RGBColor(120, 170, 210)];

/// Sort key placing autosomes numerically, then X, Y, XY, MT, then any
/// other contig names alphabetically. A leading "chr" is ignored.
pub fn chromosome_order_key(name: &str) -> (u8, u32, String) {
    let trimmed = name
        .strip_prefix("chr")
        .or_else(|| name.strip_prefix("CHR"))
        .or_else(|| name.strip_prefix("Chr"))
        .unwrap_or(name);
    if let Ok(n) = trimmed.parse::<u32>() {
        return (0, n, String::new());
    }
    match trimmed.to_ascii_uppercase().as_str() {
        "X" => (0, 23, String::new()),
        "Y" => (0, 24, String::new()),
        "XY" => (0, 25, String::new()),
        "MT" | "M" => (0, 26, String::new()),
        _ => (1, 0, trimmed.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChromosomeBlock {
    pub name: String,
    pub start: f64,
    pub end: f64,
}

/// Points on a cumulative genome axis: chromosomes laid end to end with a
/// small gap, each starting at its first tested position.
#[derive(Debug, Clone, Default)]
pub struct ManhattanLayout {
    /// (x, -log10 p, block index)
    pub points: Vec<(f64, f64, usize)>,
    pub blocks: Vec<ChromosomeBlock>,
    pub max_y: f64,
}

impl ManhattanLayout {
    pub fn from_results(results: &ResultsTable) -> Self {
        let mut by_chromosome: BTreeMap<(u8, u32, String), (String, Vec<(i32, f64)>)> =
            BTreeMap::new();
        for row in results.rows() {
            by_chromosome
                .entry(chromosome_order_key(&row.chromosome))
                .or_insert_with(|| (row.chromosome.clone(), Vec::new()))
                .1
                .push((row.position, neg_log10(row.p_value)));
        }

        let spans: Vec<f64> = by_chromosome
            .values()
            .map(|(_, pts)| {
                let (lo, hi) = position_range(pts);
                (hi - lo) as f64
            })
            .collect();
        let gap = (spans.iter().sum::<f64>() / 100.0).max(1.0);

        let mut layout = ManhattanLayout::default();
        let mut offset = 0.0;
        for (block_idx, (name, pts)) in by_chromosome.into_values().enumerate() {
            let (lo, hi) = position_range(&pts);
            for (pos, y) in pts {
                layout.points.push((offset + (pos as i64 - lo) as f64, y, block_idx));
                layout.max_y = layout.max_y.max(y);
            }
            let end = offset + (hi - lo) as f64;
            layout.blocks.push(ChromosomeBlock {
                name,
                start: offset,
                end,
            });
            offset = end + gap;
        }
        layout
    }

    pub fn x_extent(&self) -> f64 {
        self.blocks.last().map_or(1.0, |b| b.end.max(1.0))
    }
}

fn position_range(pts: &[(i32, f64)]) -> (i64, i64) {
    let lo = pts.iter().map(|&(p, _)| p as i64).min().unwrap_or(0);
    let hi = pts.iter().map(|&(p, _)| p as i64).max().unwrap_or(0);
    (lo, hi)
}

/// Renders the Manhattan plot to `path`. Without results the axes and
/// threshold lines are drawn with no points.
pub fn draw_manhattan(
    results: Option<&ResultsTable>,
    settings: &PlotSettings,
    path: &Path,
) -> Result<PathBuf> {
    let layout = match results {
        Some(table) => ManhattanLayout::from_results(table),
        None => {
            warn!("No association results held; drawing empty Manhattan axes.");
            ManhattanLayout::default()
        }
    };

    let written = Figure::new(path, (settings.width, settings.height))
        .render(|root| draw_manhattan_chart(root, &layout, settings))?;

    info!(
        "Manhattan plot with {} points across {} chromosome(s) written to {}",
        layout.points.len(),
        layout.blocks.len(),
        written.display()
    );
    Ok(written)
}

fn draw_manhattan_chart(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    layout: &ManhattanLayout,
    settings: &PlotSettings,
) -> Result<()> {
    let suggestive_y = neg_log10(settings.suggestive_p);
    let genome_wide_y = neg_log10(settings.genome_wide_p);
    let y_top = (layout.max_y.max(genome_wide_y) * 1.1).max(1.0);
    let y_bottom = -0.06 * y_top;
    let x_end = layout.x_extent();

    let mut chart = ChartBuilder::on(root)
        .caption("Manhattan plot", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..x_end, y_bottom..y_top)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_label_formatter(&|_| String::new())
        .x_desc("Chromosome")
        .y_desc("-log10(p)")
        .draw()?;

    chart.draw_series(dashed_hline(0.0, x_end, suggestive_y, BLUE.stroke_width(1)))?;
    chart.draw_series(dashed_hline(0.0, x_end, genome_wide_y, RED.stroke_width(1)))?;

    chart.draw_series(layout.points.iter().map(|&(x, y, block)| {
        Circle::new((x, y), 2, CHROMOSOME_COLORS[block % 2].filled())
    }))?;

    let label_y = y_bottom / 2.0;
    chart.draw_series(layout.blocks.iter().map(|b| {
        Text::new(
            b.name.clone(),
            ((b.start + b.end) / 2.0, label_y),
            ("sans-serif", 12)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Center, VPos::Center)),
        )
    }))?;
    Ok(())
}
