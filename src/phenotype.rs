// phenotype.rs
//
// Readers for the PLINK-style sample tables: `FID IID value [value...]`,
// whitespace separated, optional header row.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::{GwasError, Result};

/// Family and individual id, the key PLINK uses to identify a sample.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleKey {
    pub fid: String,
    pub iid: String,
}

impl SampleKey {
    pub fn new(fid: impl Into<String>, iid: impl Into<String>) -> Self {
        Self {
            fid: fid.into(),
            iid: iid.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TableKind {
    Phenotype,
    Covariate,
}

impl TableKind {
    fn error(self, path: &Path, line: usize, message: impl Into<String>) -> GwasError {
        let path = path.to_path_buf();
        let message = message.into();
        match self {
            TableKind::Phenotype => GwasError::Phenotype { path, line, message },
            TableKind::Covariate => GwasError::Covariate { path, line, message },
        }
    }
}

/// A parsed sample table. Missing values are kept as `None` so callers can
/// decide whether a sample is usable.
#[derive(Debug, Clone)]
pub struct SampleTable {
    pub path: PathBuf,
    pub column_names: Vec<String>,
    rows: HashMap<SampleKey, Vec<Option<f64>>>,
}

fn is_missing_token(token: &str) -> bool {
    matches!(token, "-9" | "NA" | "na" | "NaN" | "nan" | ".")
}

fn parse_value(token: &str) -> std::result::Result<Option<f64>, String> {
    if is_missing_token(token) {
        return Ok(None);
    }
    let value = token
        .parse::<f64>()
        .map_err(|e| format!("cannot parse '{}' as a number: {}", token, e))?;
    if value.is_nan() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

impl SampleTable {
    pub(crate) fn read(path: &Path, kind: TableKind) -> Result<Self> {
        info!("Reading {:?} file: {}", kind, path.display());
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut column_names: Option<Vec<String>> = None;
        let mut expected_fields: Option<usize> = None;
        let mut rows = HashMap::new();

        for (line_idx, line_result) in reader.lines().enumerate() {
            let line_num = line_idx + 1;
            let line = line_result?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() < 3 {
                return Err(kind.error(
                    path,
                    line_num,
                    format!("expected at least 3 fields (FID IID value), found {}", fields.len()),
                ));
            }

            if expected_fields.is_none() {
                let looks_like_header = fields[0].eq_ignore_ascii_case("FID")
                    || fields[2..].iter().any(|f| parse_value(f).is_err());
                expected_fields = Some(fields.len());
                if looks_like_header {
                    debug!("Treating line {} of {} as a header row", line_num, path.display());
                    column_names = Some(fields[2..].iter().map(|s| s.to_string()).collect());
                    continue;
                }
            }

            if Some(fields.len()) != expected_fields {
                return Err(kind.error(
                    path,
                    line_num,
                    format!(
                        "expected {} fields, found {}",
                        expected_fields.unwrap_or_default(),
                        fields.len()
                    ),
                ));
            }

            let values = fields[2..]
                .iter()
                .map(|f| parse_value(f))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|message| kind.error(path, line_num, message))?;

            let key = SampleKey::new(fields[0], fields[1]);
            if rows.insert(key.clone(), values).is_some() {
                return Err(kind.error(
                    path,
                    line_num,
                    format!("duplicate sample {} {}", key.fid, key.iid),
                ));
            }
        }

        let num_values = expected_fields.map_or(0, |n| n - 2);
        if rows.is_empty() {
            return Err(kind.error(path, 0, "no sample rows found"));
        }
        let column_names = column_names
            .unwrap_or_else(|| (1..=num_values).map(|i| format!("value{}", i)).collect());

        info!(
            "Read {} samples x {} value column(s) from {}",
            rows.len(),
            num_values,
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            column_names,
            rows,
        })
    }

    pub fn num_samples(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.column_names.len()
    }

    pub fn get(&self, key: &SampleKey) -> Option<&[Option<f64>]> {
        self.rows.get(key).map(|v| v.as_slice())
    }
}

/// One phenotype column, keyed by sample. Samples with a missing value are
/// not present.
#[derive(Debug, Clone)]
pub struct Phenotype {
    pub name: String,
    values: HashMap<SampleKey, f64>,
}

impl Phenotype {
    /// Reads column `column` (1-based, after FID and IID) of a phenotype file.
    pub fn read(path: &Path, column: usize) -> Result<Self> {
        let table = SampleTable::read(path, TableKind::Phenotype)?;
        if column == 0 || column > table.num_columns() {
            return Err(TableKind::Phenotype.error(
                path,
                0,
                format!(
                    "phenotype column {} requested but the file has {} value column(s)",
                    column,
                    table.num_columns()
                ),
            ));
        }
        let idx = column - 1;
        let values: HashMap<SampleKey, f64> = table
            .rows
            .iter()
            .filter_map(|(key, row)| row[idx].map(|v| (key.clone(), v)))
            .collect();
        let dropped = table.num_samples() - values.len();
        if dropped > 0 {
            warn!(
                "{} sample(s) have a missing value for phenotype '{}' and will be excluded.",
                dropped, table.column_names[idx]
            );
        }
        Ok(Self {
            name: table.column_names[idx].clone(),
            values,
        })
    }

    pub fn get(&self, key: &SampleKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// All columns of a covariate file. A sample is only usable when every
/// covariate is present.
#[derive(Debug, Clone)]
pub struct Covariates {
    table: SampleTable,
}

impl Covariates {
    pub fn read(path: &Path) -> Result<Self> {
        let table = SampleTable::read(path, TableKind::Covariate)?;
        Ok(Self { table })
    }

    pub fn names(&self) -> &[String] {
        &self.table.column_names
    }

    pub fn num_columns(&self) -> usize {
        self.table.num_columns()
    }

    pub fn get(&self, key: &SampleKey) -> Option<Vec<f64>> {
        self.table
            .get(key)
            .and_then(|row| row.iter().copied().collect::<Option<Vec<f64>>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_table(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("failed to create temp file");
        file.write_all(contents.as_bytes()).expect("failed to write temp file");
        file
    }

    #[test]
    fn reads_headerless_phenotype_and_skips_missing() {
        let file = write_table("f1 i1 1.5\nf2 i2 -9\nf3 i3 NA\nf4 i4 2\n");
        let pheno = Phenotype::read(file.path(), 1).unwrap();
        assert_eq!(pheno.len(), 2);
        assert_eq!(pheno.get(&SampleKey::new("f1", "i1")), Some(1.5));
        assert_eq!(pheno.get(&SampleKey::new("f2", "i2")), None);
        assert_eq!(pheno.name, "value1");
    }

    #[test]
    fn header_row_names_columns_and_mpheno_selects_one() {
        let file = write_table("FID IID height weight\na a 170 60\nb b 180 NaN\n");
        let pheno = Phenotype::read(file.path(), 2).unwrap();
        assert_eq!(pheno.name, "weight");
        assert_eq!(pheno.len(), 1);
        assert_eq!(pheno.get(&SampleKey::new("a", "a")), Some(60.0));
    }

    #[test]
    fn non_numeric_value_after_first_row_is_an_error() {
        let file = write_table("a a 1.0\nb b oops\n");
        let err = Phenotype::read(file.path(), 1).unwrap_err();
        match err {
            GwasError::Phenotype { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn out_of_range_column_is_rejected() {
        let file = write_table("a a 1.0\n");
        assert!(matches!(
            Phenotype::read(file.path(), 3),
            Err(GwasError::Phenotype { .. })
        ));
    }

    #[test]
    fn ragged_rows_and_short_rows_are_rejected() {
        let ragged = write_table("a a 1 2\nb b 1\n");
        assert!(Phenotype::read(ragged.path(), 1).is_err());
        let short = write_table("a 1\n");
        assert!(Phenotype::read(short.path(), 1).is_err());
    }

    #[test]
    fn covariate_rows_with_any_missing_value_are_unusable() {
        let file = write_table("a a 1 2\nb b 3 -9\n");
        let covar = Covariates::read(file.path()).unwrap();
        assert_eq!(covar.num_columns(), 2);
        assert_eq!(covar.get(&SampleKey::new("a", "a")), Some(vec![1.0, 2.0]));
        assert_eq!(covar.get(&SampleKey::new("b", "b")), None);
        assert_eq!(covar.get(&SampleKey::new("c", "c")), None);
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let err = Phenotype::read(Path::new("/definitely/not/here.txt"), 1).unwrap_err();
        assert!(matches!(err, GwasError::Io(_)));
    }
}
