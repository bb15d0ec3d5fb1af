// regression.rs
//
// Single-SNP least-squares test with fixed-effect covariates. The phenotype
// and each SNP are projected off an orthonormal basis of the fixed effects,
// which leaves a one-parameter regression on the residuals.

use log::warn;
use ndarray::{Array1, ArrayView1};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{GwasError, Result};

const RANK_TOLERANCE: f64 = 1e-10;
const VARIANCE_TOLERANCE: f64 = 1e-12;

/// Orthonormal basis for intercept + covariates.
#[derive(Debug, Clone)]
pub struct FixedEffects {
    basis: Vec<Array1<f64>>,
}

impl FixedEffects {
    /// `covariates` holds one row per sample. An intercept is always added;
    /// covariates that are collinear with earlier columns are dropped.
    pub fn new(num_samples: usize, covariates: &[Vec<f64>]) -> Self {
        let num_covariates = covariates.first().map_or(0, |row| row.len());
        let mut columns = Vec::with_capacity(num_covariates + 1);
        columns.push(Array1::<f64>::ones(num_samples));
        for c in 0..num_covariates {
            columns.push(covariates.iter().map(|row| row[c]).collect::<Array1<f64>>());
        }

        let mut basis: Vec<Array1<f64>> = Vec::with_capacity(columns.len());
        for (col_idx, mut column) in columns.into_iter().enumerate() {
            for q in &basis {
                let proj = q.dot(&column);
                column.scaled_add(-proj, q);
            }
            let norm = column.dot(&column).sqrt();
            if norm <= RANK_TOLERANCE * (num_samples as f64).sqrt().max(1.0) {
                if col_idx > 0 {
                    warn!(
                        "Covariate column {} is collinear with the intercept or earlier covariates; dropping it.",
                        col_idx
                    );
                }
                continue;
            }
            column /= norm;
            basis.push(column);
        }
        Self { basis }
    }

    /// Number of independent fixed-effect columns, intercept included.
    pub fn rank(&self) -> usize {
        self.basis.len()
    }

    /// Removes the component of `values` that lies in the fixed-effect span.
    pub fn residualize(&self, values: ArrayView1<f64>) -> Array1<f64> {
        let mut out = values.to_owned();
        for q in &self.basis {
            let proj = q.dot(&out);
            out.scaled_add(-proj, q);
        }
        out
    }
}

/// Outcome of one SNP test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnpFit {
    pub p_value: f64,
    pub weight: f64,
    pub weight_se: f64,
    pub fract_var_explained: f64,
}

impl SnpFit {
    fn untestable() -> Self {
        Self {
            p_value: 1.0,
            weight: 0.0,
            weight_se: f64::NAN,
            fract_var_explained: 0.0,
        }
    }
}

/// Phenotype residuals and the t distribution shared by every SNP test.
#[derive(Debug, Clone)]
pub struct NullModel {
    fixed: FixedEffects,
    y_residual: Array1<f64>,
    yy: f64,
    degrees_of_freedom: usize,
    t_dist: StudentsT,
}

impl NullModel {
    pub fn fit(phenotype: &[f64], covariates: &[Vec<f64>]) -> Result<Self> {
        let n = phenotype.len();
        let fixed = FixedEffects::new(n, covariates);
        let required = fixed.rank() + 2;
        if n < required {
            return Err(GwasError::InsufficientSamples { found: n, required });
        }
        let degrees_of_freedom = n - fixed.rank() - 1;
        let y = Array1::from_vec(phenotype.to_vec());
        let y_residual = fixed.residualize(y.view());
        let yy = y_residual.dot(&y_residual);
        if yy <= VARIANCE_TOLERANCE {
            warn!("Phenotype has no variance left after removing fixed effects; every SNP will get p = 1.");
        }
        let t_dist = t_distribution(degrees_of_freedom as f64)?;
        Ok(Self {
            fixed,
            y_residual,
            yy,
            degrees_of_freedom,
            t_dist,
        })
    }

    pub fn num_samples(&self) -> usize {
        self.y_residual.len()
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.degrees_of_freedom
    }

    /// Tests one SNP. Missing dosages (NaN) are replaced by the mean of the
    /// observed ones before the fit.
    pub fn test_snp(&self, dosages: ArrayView1<f64>) -> SnpFit {
        let (sum, observed) = dosages
            .iter()
            .filter(|d| !d.is_nan())
            .fold((0.0, 0usize), |(s, c), &d| (s + d, c + 1));
        if observed == 0 || self.yy <= VARIANCE_TOLERANCE {
            return SnpFit::untestable();
        }
        let mean = sum / observed as f64;
        let imputed = dosages.mapv(|d| if d.is_nan() { mean } else { d });

        let g = self.fixed.residualize(imputed.view());
        let gg = g.dot(&g);
        if gg <= VARIANCE_TOLERANCE * self.num_samples() as f64 {
            return SnpFit::untestable();
        }
        let gy = g.dot(&self.y_residual);
        let weight = gy / gg;
        let explained = weight * gy;
        let mut rss = (self.yy - explained).max(0.0);
        if rss <= VARIANCE_TOLERANCE * self.yy {
            rss = 0.0;
        }
        let sigma2 = rss / self.degrees_of_freedom as f64;
        let weight_se = (sigma2 / gg).sqrt();
        let fract_var_explained = (explained / self.yy).clamp(0.0, 1.0).sqrt();

        let p_value = if weight_se > 0.0 {
            let t = weight / weight_se;
            (2.0 * self.t_dist.sf(t.abs())).min(1.0)
        } else {
            0.0
        };

        SnpFit {
            p_value,
            weight,
            weight_se,
            fract_var_explained,
        }
    }
}

/// Standard Student's t distribution used for the per-SNP two-sided test.
fn t_distribution(degrees_of_freedom: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, degrees_of_freedom).map_err(|e| {
        GwasError::model(format!(
            "Cannot build t distribution with {} df: {}",
            degrees_of_freedom, e
        ))
    })
}
