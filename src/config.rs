// config.rs

use std::path::{Path, PathBuf};

/// File names written into the output directory.
pub const RESULTS_FILE_NAME: &str = "association_results.txt";
pub const MANHATTAN_FILE_NAME: &str = "manhattan.pdf";
pub const QQ_FILE_NAME: &str = "qq_plot.pdf";

pub const DEFAULT_SUGGESTIVE_P: f64 = 1e-5;
pub const DEFAULT_GENOME_WIDE_P: f64 = 5e-8;

/// Figure geometry and threshold lines shared by both diagnostic plots.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSettings {
    pub width: u32,
    pub height: u32,
    /// Suggestive significance level, drawn as a dashed line on the Manhattan plot.
    pub suggestive_p: f64,
    /// Genome-wide significance level, drawn as a dashed line on the Manhattan plot.
    pub genome_wide_p: f64,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
            suggestive_p: DEFAULT_SUGGESTIVE_P,
            genome_wide_p: DEFAULT_GENOME_WIDE_P,
        }
    }
}

/// Everything the runner needs to know about one analysis. Built once and
/// not mutated after the runner takes ownership of it.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub genotype_path: PathBuf,
    pub phenotype_path: PathBuf,
    pub output_directory: PathBuf,
    pub covariate_path: Option<PathBuf>,
    /// 1-based index of the phenotype value column (PLINK `--mpheno`).
    pub phenotype_column: usize,
    /// Count allele 1 of the .bim instead of allele 2.
    pub count_a1: bool,
    pub plot: PlotSettings,
}

impl AnalysisConfig {
    pub fn new(
        genotype_path: impl Into<PathBuf>,
        phenotype_path: impl Into<PathBuf>,
        output_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            genotype_path: genotype_path.into(),
            phenotype_path: phenotype_path.into(),
            output_directory: output_directory.into(),
            covariate_path: None,
            phenotype_column: 1,
            count_a1: false,
            plot: PlotSettings::default(),
        }
    }

    pub fn with_covariates(mut self, covariate_path: impl Into<PathBuf>) -> Self {
        self.covariate_path = Some(covariate_path.into());
        self
    }

    pub fn with_phenotype_column(mut self, column: usize) -> Self {
        self.phenotype_column = column;
        self
    }

    pub fn with_count_a1(mut self, count_a1: bool) -> Self {
        self.count_a1 = count_a1;
        self
    }

    pub fn with_plot_settings(mut self, plot: PlotSettings) -> Self {
        self.plot = plot;
        self
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_file(RESULTS_FILE_NAME)
    }

    pub fn manhattan_path(&self) -> PathBuf {
        self.output_file(MANHATTAN_FILE_NAME)
    }

    pub fn qq_path(&self) -> PathBuf {
        self.output_file(QQ_FILE_NAME)
    }

    fn output_file(&self, name: &str) -> PathBuf {
        Path::new(&self.output_directory).join(name)
    }
}
