// association.rs

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::error::{GwasError, Result};
use crate::genotype::GenotypeSet;
use crate::phenotype::{Covariates, Phenotype};
use crate::regression::NullModel;
use crate::results::{AssociationResult, ResultsTable};

/// Inputs for one association scan.
#[derive(Debug, Clone)]
pub struct AssociationRequest<'a> {
    pub genotype_path: &'a Path,
    pub phenotype_path: &'a Path,
    pub covariate_path: Option<&'a Path>,
    /// 1-based phenotype column.
    pub phenotype_column: usize,
    pub count_a1: bool,
}

impl<'a> AssociationRequest<'a> {
    pub fn new(genotype_path: &'a Path, phenotype_path: &'a Path) -> Self {
        Self {
            genotype_path,
            phenotype_path,
            covariate_path: None,
            phenotype_column: 1,
            count_a1: false,
        }
    }
}

/// Computes per-SNP association statistics. The runner only sequences
/// calls to this; swap the implementation to change the statistical model.
pub trait AssociationEngine: Send + Sync {
    fn single_snp(&self, request: &AssociationRequest<'_>) -> Result<ResultsTable>;
}

/// Samples with genotype, phenotype and (if given) covariates, in .fam order.
#[derive(Debug, Clone)]
pub(crate) struct AnalysisSamples {
    pub(crate) fam_indices: Vec<isize>,
    pub(crate) phenotype: Vec<f64>,
    pub(crate) covariates: Vec<Vec<f64>>,
}

pub(crate) fn intersect_samples(
    genotypes: &GenotypeSet,
    phenotype: &Phenotype,
    covariates: Option<&Covariates>,
) -> Result<AnalysisSamples> {
    let mut fam_indices = Vec::new();
    let mut phenotype_values = Vec::new();
    let mut covariate_rows = Vec::new();

    for (fam_idx, key) in genotypes.samples().iter().enumerate() {
        let Some(y) = phenotype.get(key) else {
            continue;
        };
        let covar_row = match covariates {
            Some(c) => match c.get(key) {
                Some(row) => row,
                None => continue,
            },
            None => Vec::new(),
        };
        fam_indices.push(fam_idx as isize);
        phenotype_values.push(y);
        covariate_rows.push(covar_row);
    }

    if fam_indices.is_empty() {
        return Err(GwasError::NoOverlappingSamples);
    }
    let skipped = genotypes.samples().len() - fam_indices.len();
    if skipped > 0 {
        warn!(
            "{} of {} genotyped samples lack a phenotype or covariate value and are excluded.",
            skipped,
            genotypes.samples().len()
        );
    }
    Ok(AnalysisSamples {
        fam_indices,
        phenotype: phenotype_values,
        covariates: covariate_rows,
    })
}

/// Least-squares single-SNP scan: y = intercept + covariates + beta * dosage,
/// two-sided t-test on beta. SNPs are tested in parallel, one chunk per task.
#[derive(Debug, Clone)]
pub struct LinearAssociation {
    pub chunk_size: usize,
    pub show_progress: bool,
}

impl Default for LinearAssociation {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            show_progress: true,
        }
    }
}

impl LinearAssociation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, num_chunks: usize) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }
        let style = ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} SNP chunks ({percent}%) ETA: {eta}",
            )?
            .progress_chars("=> ");
        Ok(ProgressBar::new(num_chunks as u64).with_style(style))
    }
}

impl AssociationEngine for LinearAssociation {
    fn single_snp(&self, request: &AssociationRequest<'_>) -> Result<ResultsTable> {
        let genotypes = GenotypeSet::open(request.genotype_path)?;
        let phenotype = Phenotype::read(request.phenotype_path, request.phenotype_column)?;
        let covariates = request
            .covariate_path
            .map(Covariates::read)
            .transpose()?;
        if let Some(c) = &covariates {
            info!("Using {} covariate(s): {:?}", c.num_columns(), c.names());
        }

        let samples = intersect_samples(&genotypes, &phenotype, covariates.as_ref())?;
        let null_model = NullModel::fit(&samples.phenotype, &samples.covariates)?;
        info!(
            "Testing {} SNPs on {} samples for phenotype '{}' ({} residual df, counting allele {}).",
            genotypes.snps().len(),
            null_model.num_samples(),
            phenotype.name,
            null_model.degrees_of_freedom(),
            if request.count_a1 { 1 } else { 2 }
        );

        let snp_indices: Vec<usize> = (0..genotypes.snps().len()).collect();
        let chunk_size = self.chunk_size.max(1);
        let num_chunks = snp_indices.len().div_ceil(chunk_size);
        let pb = self.progress_bar(num_chunks)?;

        let chunk_results: Vec<Result<Vec<AssociationResult>>> = snp_indices
            .par_chunks(chunk_size)
            .map(|chunk| {
                let result = test_chunk(&genotypes, &samples, &null_model, chunk, request.count_a1);
                pb.inc(1);
                result
            })
            .collect();
        pb.finish_and_clear();

        let mut rows = Vec::with_capacity(snp_indices.len());
        for chunk in chunk_results {
            rows.extend(chunk?);
        }
        let table = ResultsTable::new(rows);
        if let Some(top) = table.rows().first() {
            info!(
                "Association scan complete: {} SNPs tested, top hit {} (p = {:.3e}).",
                table.len(),
                top.snp,
                top.p_value
            );
        }
        Ok(table)
    }
}

fn test_chunk(
    genotypes: &GenotypeSet,
    samples: &AnalysisSamples,
    null_model: &NullModel,
    chunk: &[usize],
    count_a1: bool,
) -> Result<Vec<AssociationResult>> {
    let sid_indices: Vec<isize> = chunk.iter().map(|&i| i as isize).collect();
    let dosages = genotypes.read_dosages(&samples.fam_indices, &sid_indices, count_a1)?;
    debug!(
        "Read dosage block {}x{} for SNPs {}..={}",
        dosages.nrows(),
        dosages.ncols(),
        chunk.first().copied().unwrap_or_default(),
        chunk.last().copied().unwrap_or_default()
    );

    let snps = genotypes.snps();
    let rows = chunk
        .iter()
        .enumerate()
        .map(|(col, &sid_index)| {
            let fit = null_model.test_snp(dosages.column(col));
            AssociationResult {
                sid_index,
                snp: snps.ids[sid_index].clone(),
                chromosome: snps.chromosomes[sid_index].clone(),
                gen_dist: snps.cm_positions[sid_index],
                position: snps.bp_positions[sid_index],
                p_value: fit.p_value,
                weight: fit.weight,
                weight_se: fit.weight_se,
                fract_var_explained: fit.fract_var_explained,
                num_observations: null_model.num_samples(),
            }
        })
        .collect();
    Ok(rows)
}
