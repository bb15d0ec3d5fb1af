// runner.rs

use std::fs;
use std::path::PathBuf;

use log::info;

use crate::association::{AssociationEngine, AssociationRequest, LinearAssociation};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::plot;
use crate::results::ResultsTable;

/// Sequences one GWAS run: association scan, results file, diagnostic
/// plots. The plot steps render whatever results are held at the time and
/// do not require the scan to have run.
pub struct AnalysisRunner<E: AssociationEngine = LinearAssociation> {
    config: AnalysisConfig,
    engine: E,
    results: Option<ResultsTable>,
}

impl AnalysisRunner<LinearAssociation> {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        Self::with_engine(config, LinearAssociation::default())
    }
}

impl<E: AssociationEngine> AnalysisRunner<E> {
    /// Creates the output directory (and any parents) if it does not exist.
    pub fn with_engine(config: AnalysisConfig, engine: E) -> Result<Self> {
        fs::create_dir_all(&config.output_directory)?;
        info!("Output directory: {}", config.output_directory.display());
        Ok(Self {
            config,
            engine,
            results: None,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn results(&self) -> Option<&ResultsTable> {
        self.results.as_ref()
    }

    /// Runs the association engine and writes `association_results.txt`.
    /// An engine failure leaves the held results and the output directory
    /// untouched.
    pub fn run_association(&mut self) -> Result<&ResultsTable> {
        info!("Running association analysis...");
        let request = AssociationRequest {
            genotype_path: &self.config.genotype_path,
            phenotype_path: &self.config.phenotype_path,
            covariate_path: self.config.covariate_path.as_deref(),
            phenotype_column: self.config.phenotype_column,
            count_a1: self.config.count_a1,
        };
        let table = self.engine.single_snp(&request)?;
        let table = self.results.insert(table);
        save_results(table, &self.config)?;
        Ok(table)
    }

    pub fn create_manhattan_plot(&self) -> Result<PathBuf> {
        info!("Creating Manhattan plot...");
        plot::draw_manhattan(
            self.results.as_ref(),
            &self.config.plot,
            &self.config.manhattan_path(),
        )
    }

    pub fn create_qq_plot(&self) -> Result<PathBuf> {
        info!("Creating Q-Q plot...");
        plot::draw_qq(self.results.as_ref(), &self.config.plot, &self.config.qq_path())
    }

    /// Association, then both plots.
    pub fn run_all(&mut self) -> Result<()> {
        self.run_association()?;
        self.create_manhattan_plot()?;
        self.create_qq_plot()?;
        Ok(())
    }
}

fn save_results(table: &ResultsTable, config: &AnalysisConfig) -> Result<()> {
    table.write_tsv(&config.results_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GwasError;
    use crate::results::AssociationResult;

    struct FixedEngine(Vec<AssociationResult>);

    impl AssociationEngine for FixedEngine {
        fn single_snp(&self, _request: &AssociationRequest<'_>) -> Result<ResultsTable> {
            Ok(ResultsTable::new(self.0.clone()))
        }
    }

    struct FailingEngine;

    impl AssociationEngine for FailingEngine {
        fn single_snp(&self, request: &AssociationRequest<'_>) -> Result<ResultsTable> {
            Err(GwasError::Phenotype {
                path: request.phenotype_path.to_path_buf(),
                line: 3,
                message: "bad value".to_string(),
            })
        }
    }

    fn result(sid_index: usize, p_value: f64) -> AssociationResult {
        AssociationResult {
            sid_index,
            snp: format!("snp{}", sid_index),
            chromosome: "1".to_string(),
            gen_dist: 0.0,
            position: 100 + sid_index as i32,
            p_value,
            weight: 0.5,
            weight_se: 0.1,
            fract_var_explained: 0.3,
            num_observations: 20,
        }
    }

    #[test]
    fn construction_creates_nested_output_directory() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let out = dir.path().join("a").join("b").join("c");
        let config = AnalysisConfig::new("g.bed", "p.txt", &out);
        AnalysisRunner::with_engine(config, FailingEngine).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn construction_leaves_existing_files_alone() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let keep = dir.path().join("notes.txt");
        fs::write(&keep, "keep me").unwrap();
        let config = AnalysisConfig::new("g.bed", "p.txt", dir.path());
        AnalysisRunner::with_engine(config, FailingEngine).unwrap();
        assert_eq!(fs::read_to_string(&keep).unwrap(), "keep me");
    }

    #[test]
    fn run_association_holds_and_writes_engine_table() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = AnalysisConfig::new("g.bed", "p.txt", dir.path());
        let mut runner =
            AnalysisRunner::with_engine(config, FixedEngine(vec![result(0, 0.2), result(1, 0.001)]))
                .unwrap();
        assert!(runner.results().is_none());

        let held = runner.run_association().unwrap().clone();
        assert_eq!(held.rows()[0].sid_index, 1);

        let written = ResultsTable::read_tsv(&runner.config().results_path()).unwrap();
        assert_eq!(written, held);
        assert_eq!(runner.results(), Some(&held));
    }

    #[test]
    fn engine_failure_propagates_and_writes_nothing() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = AnalysisConfig::new("g.bed", "p.txt", dir.path());
        let mut runner = AnalysisRunner::with_engine(config, FailingEngine).unwrap();
        let err = runner.run_association().unwrap_err();
        assert!(matches!(err, GwasError::Phenotype { line: 3, .. }));
        assert!(!runner.config().results_path().exists());
        assert!(runner.results().is_none());
    }

    #[test]
    fn plots_do_not_require_results() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = AnalysisConfig::new("g.bed", "p.txt", dir.path());
        let runner = AnalysisRunner::with_engine(config, FailingEngine).unwrap();
        let manhattan = runner.create_manhattan_plot().unwrap();
        let qq = runner.create_qq_plot().unwrap();
        assert_eq!(manhattan, dir.path().join("manhattan.pdf"));
        assert_eq!(qq, dir.path().join("qq_plot.pdf"));
        assert!(manhattan.is_file() && qq.is_file());
    }

    #[test]
    fn run_all_produces_exactly_three_files() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = AnalysisConfig::new("g.bed", "p.txt", dir.path());
        let mut runner =
            AnalysisRunner::with_engine(config, FixedEngine(vec![result(0, 0.04), result(1, 0.6)]))
                .unwrap();
        runner.run_all().unwrap();
        runner.create_qq_plot().unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["association_results.txt", "manhattan.pdf", "qq_plot.pdf"]);
    }
}
