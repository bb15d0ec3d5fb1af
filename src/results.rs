// results.rs

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Header of `association_results.txt`, in column order.
pub const RESULT_COLUMNS: [&str; 10] = [
    "sid_index",
    "SNP",
    "Chr",
    "GenDist",
    "ChrPos",
    "PValue",
    "SnpWeight",
    "SnpWeightSE",
    "SnpFractVarExpl",
    "Nobs",
];

/// One tested variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationResult {
    /// Index of the SNP in the .bim file.
    pub sid_index: usize,
    #[serde(rename = "SNP")]
    pub snp: String,
    #[serde(rename = "Chr")]
    pub chromosome: String,
    #[serde(rename = "GenDist")]
    pub gen_dist: f64,
    #[serde(rename = "ChrPos")]
    pub position: i32,
    #[serde(rename = "PValue")]
    pub p_value: f64,
    #[serde(rename = "SnpWeight")]
    pub weight: f64,
    #[serde(rename = "SnpWeightSE")]
    pub weight_se: f64,
    #[serde(rename = "SnpFractVarExpl")]
    pub fract_var_explained: f64,
    #[serde(rename = "Nobs")]
    pub num_observations: usize,
}

/// Association statistics for every tested SNP, most significant first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    rows: Vec<AssociationResult>,
}

impl ResultsTable {
    /// Orders rows by ascending p-value; ties keep their input order.
    pub fn new(mut rows: Vec<AssociationResult>) -> Self {
        rows.sort_by(|a, b| a.p_value.total_cmp(&b.p_value));
        Self { rows }
    }

    pub fn rows(&self) -> &[AssociationResult] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn p_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r.p_value)
    }

    /// Writes the table as TSV with a header row and no index column. The
    /// header is written even when there are no rows.
    pub fn write_tsv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        writer.write_record(RESULT_COLUMNS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        info!("Wrote {} association results to {}", self.rows.len(), path.display());
        Ok(())
    }

    pub fn read_tsv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path)?;
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<AssociationResult>, csv::Error>>()?;
        Ok(Self { rows })
    }
}
