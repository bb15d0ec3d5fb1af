// genotype.rs

use std::path::{Path, PathBuf};

use bed_reader::{Bed, ReadOptions};
use log::{debug, info};
use ndarray::Array2;

use crate::error::{GwasError, Result};
use crate::phenotype::SampleKey;

/// Accepts either the `.bed` file itself or the shared PLINK prefix.
pub fn resolve_bed_path(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == "bed" => path.to_path_buf(),
        _ => {
            let mut with_ext = path.as_os_str().to_owned();
            with_ext.push(".bed");
            PathBuf::from(with_ext)
        }
    }
}

/// Per-SNP metadata from the .bim file, indexed by original SNP index.
#[derive(Debug, Clone)]
pub struct SnpInfo {
    pub ids: Vec<String>,
    pub chromosomes: Vec<String>,
    pub cm_positions: Vec<f64>,
    pub bp_positions: Vec<i32>,
}

impl SnpInfo {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Metadata for a PLINK fileset plus on-demand dosage reads. The .bed file
/// is reopened for every read so workers never share a handle.
#[derive(Debug, Clone)]
pub struct GenotypeSet {
    bed_path: PathBuf,
    samples: Vec<SampleKey>,
    snps: SnpInfo,
}

impl GenotypeSet {
    pub fn open(path: &Path) -> Result<Self> {
        let bed_path = resolve_bed_path(path);
        info!("Opening PLINK fileset: {}", bed_path.display());
        let mut bed = Bed::new(&bed_path).map_err(|e| {
            GwasError::genotype(format!(
                "Failed to open BED file '{}': {}",
                bed_path.display(),
                e
            ))
        })?;

        let fids = bed.fid()?.to_owned();
        let iids = bed.iid()?.to_owned();
        let samples: Vec<SampleKey> = fids
            .iter()
            .zip(iids.iter())
            .map(|(fid, iid)| SampleKey::new(fid.as_str(), iid.as_str()))
            .collect();

        let snps = SnpInfo {
            ids: bed.sid()?.to_vec(),
            chromosomes: bed.chromosome()?.to_vec(),
            cm_positions: bed.cm_position()?.iter().map(|&cm| cm as f64).collect(),
            bp_positions: bed.bp_position()?.to_vec(),
        };

        debug!(
            "Fileset metadata loaded: {} samples, {} SNPs.",
            samples.len(),
            snps.len()
        );
        Ok(Self {
            bed_path,
            samples,
            snps,
        })
    }

    pub fn samples(&self) -> &[SampleKey] {
        &self.samples
    }

    pub fn snps(&self) -> &SnpInfo {
        &self.snps
    }

    /// Reads allele dosages as samples x SNPs. Missing calls come back as NaN.
    pub fn read_dosages(
        &self,
        sample_indices: &[isize],
        snp_indices: &[isize],
        count_a1: bool,
    ) -> Result<Array2<f64>> {
        let mut bed = Bed::new(&self.bed_path)?;
        let mut options = ReadOptions::<f64>::builder();
        options
            .iid_index(sample_indices)
            .sid_index(snp_indices)
            .num_threads(1);
        if count_a1 {
            options.count_a1();
        } else {
            options.count_a2();
        }
        let dosages = options.read(&mut bed)?;
        Ok(dosages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_and_bed_paths_resolve_to_the_same_file() {
        assert_eq!(
            resolve_bed_path(Path::new("data/mice")),
            PathBuf::from("data/mice.bed")
        );
        assert_eq!(
            resolve_bed_path(Path::new("data/mice.bed")),
            PathBuf::from("data/mice.bed")
        );
        assert_eq!(
            resolve_bed_path(Path::new("data/mice.chr1")),
            PathBuf::from("data/mice.chr1.bed")
        );
    }

    #[test]
    fn opening_a_missing_fileset_is_a_genotype_error() {
        let err = GenotypeSet::open(Path::new("/no/such/fileset")).unwrap_err();
        assert!(matches!(err, GwasError::Genotype { .. }));
    }
}
