// plot/qq.rs

use std::path::{Path, PathBuf};

use log::{info, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use super::{neg_log10, Figure};
use crate::config::PlotSettings;
use crate::error::Result;
use crate::results::ResultsTable;

/// Median of a 1-df chi-squared distribution.
const CHI2_1DF_MEDIAN: f64 = 0.454_936_423_119_572_8;

/// (expected, observed) -log10 p pairs, most significant last.
pub fn qq_points(p_values: &[f64]) -> Vec<(f64, f64)> {
    let mut observed: Vec<f64> = p_values.iter().copied().filter(|p| !p.is_nan()).collect();
    observed.sort_by(|a, b| b.total_cmp(a));
    let n = observed.len() as f64;
    observed
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            // Descending p, so rank from the largest expected quantile down.
            let expected = (n - i as f64 - 0.5) / n;
            (neg_log10(expected), neg_log10(p))
        })
        .collect()
}

/// Genomic inflation factor: median chi-squared statistic implied by the
/// p-values over the null median. `None` for an empty input.
pub fn genomic_inflation(p_values: &[f64]) -> Option<f64> {
    let chi2 = ChiSquared::new(1.0).ok()?;
    let mut stats: Vec<f64> = p_values
        .iter()
        .filter(|p| !p.is_nan())
        .map(|&p| chi2.inverse_cdf(1.0 - p.clamp(0.0, 1.0)))
        .collect();
    if stats.is_empty() {
        return None;
    }
    stats.sort_by(|a, b| a.total_cmp(b));
    let mid = stats.len() / 2;
    let median = if stats.len() % 2 == 0 {
        (stats[mid - 1] + stats[mid]) / 2.0
    } else {
        stats[mid]
    };
    Some(median / CHI2_1DF_MEDIAN)
}

/// Renders the Q-Q plot to `path`. Without results the axes and the
/// reference diagonal are drawn with no points.
pub fn draw_qq(results: Option<&ResultsTable>, settings: &PlotSettings, path: &Path) -> Result<PathBuf> {
    let p_values: Vec<f64> = match results {
        Some(table) => table.p_values().collect(),
        None => {
            warn!("No association results held; drawing empty Q-Q axes.");
            Vec::new()
        }
    };
    let points = qq_points(&p_values);
    let lambda = genomic_inflation(&p_values);

    let caption = match lambda {
        Some(l) => format!("Q-Q plot (lambda GC = {:.3})", l),
        None => "Q-Q plot".to_string(),
    };

    let side = settings.height.min(settings.width);
    let written = Figure::new(path, (side, side))
        .render(|root| draw_qq_chart(root, &points, &caption))?;

    info!(
        "Q-Q plot with {} points written to {}{}",
        points.len(),
        written.display(),
        lambda.map_or(String::new(), |l| format!(" (lambda GC = {:.3})", l))
    );
    Ok(written)
}

fn draw_qq_chart(
    root: &DrawingArea<SVGBackend<'_>, Shift>,
    points: &[(f64, f64)],
    caption: &str,
) -> Result<()> {
    let max_val = points
        .iter()
        .fold(1.0f64, |acc, &(e, o)| acc.max(e).max(o))
        * 1.05;

    let mut chart = ChartBuilder::on(root)
        .caption(caption, ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d(0f64..max_val, 0f64..max_val)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc("Expected -log10(p)")
        .y_desc("Observed -log10(p)")
        .draw()?;

    chart.draw_series(LineSeries::new(
        vec![(0.0, 0.0), (max_val, max_val)],
        RED.stroke_width(1),
    ))?;
    chart.draw_series(
        points
            .iter()
            .map(|&(e, o)| Circle::new((e, o), 2, RGBColor(31, 78, 121).filled())),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn qq_points_pair_sorted_observed_with_uniform_quantiles() {
        let pts = qq_points(&[0.5, 0.001, 0.1, 0.9]);
        assert_eq!(pts.len(), 4);
        // Largest p first, paired with the largest expected quantile.
        assert!((pts[0].0 - neg_log10(0.875)).abs() < 1e-12);
        assert!((pts[0].1 - neg_log10(0.9)).abs() < 1e-12);
        assert!((pts[3].0 - neg_log10(0.125)).abs() < 1e-12);
        assert!((pts[3].1 - 3.0).abs() < 1e-9);
        assert!(pts.windows(2).all(|w| w[0].0 <= w[1].0 && w[0].1 <= w[1].1));
    }

    #[test]
    fn inflation_of_uniform_p_values_is_near_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let p: Vec<f64> = (0..20_000).map(|_| rng.random::<f64>()).collect();
        let lambda = genomic_inflation(&p).unwrap();
        assert!((lambda - 1.0).abs() < 0.05, "lambda = {}", lambda);
    }

    #[test]
    fn inflation_of_median_p_is_one() {
        // p = 0.5 maps to the chi-squared median.
        let lambda = genomic_inflation(&[0.5]).unwrap();
        assert!((lambda - 1.0).abs() < 1e-4);
        assert!(genomic_inflation(&[]).is_none());
    }

    #[test]
    fn draws_pdf_for_results() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("qq.pdf");
        let rows = (0..50)
            .map(|i| crate::results::AssociationResult {
                sid_index: i,
                snp: format!("rs{}", i),
                chromosome: "1".to_string(),
                gen_dist: 0.0,
                position: i as i32,
                p_value: (i as f64 + 0.5) / 50.0,
                weight: 0.0,
                weight_se: 0.0,
                fract_var_explained: 0.0,
                num_observations: 10,
            })
            .collect();
        let table = ResultsTable::new(rows);
        draw_qq(Some(&table), &PlotSettings::default(), &path).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn caption_carries_the_inflation_factor() {
        let p_values: Vec<f64> = (0..50).map(|i| (i as f64 + 0.5) / 50.0).collect();
        let lambda = genomic_inflation(&p_values).unwrap();
        let caption = format!("Q-Q plot (lambda GC = {:.3})", lambda);
        let svg = Figure::new("unused.pdf", (400, 400))
            .to_svg(|root| draw_qq_chart(root, &qq_points(&p_values), &caption))
            .unwrap();
        assert!(svg.contains(&caption), "caption missing from rendered SVG");
        assert!(svg.contains("Expected -log10(p)"));
    }
}
