// main.rs

// --- External Crate Imports ---
use anyhow::{Context, Error, Result};
use clap::Parser;
use env_logger;
use log::info;
use num_cpus;
use std::time::Instant;

use gwas_runner::{AnalysisConfig, AnalysisRunner, PlotSettings};

// --- Main Function ---
fn main() -> Result<(), Error> {
    let total_time_start = Instant::now();
    let cli_args = cli::CliArgs::parse();

    // Initialize logger
    let log_level = cli_args
        .log_level
        .parse::<log::LevelFilter>()
        .unwrap_or_else(|_| {
            eprintln!(
                "Warning: Invalid log level '{}' provided. Defaulting to Info.",
                cli_args.log_level
            );
            log::LevelFilter::Info
        });
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_micros()
        .init();

    info!("Starting gwas_runner with args: {:?}", cli_args);

    // Configure Rayon thread pool
    let num_threads = cli_args.threads.unwrap_or_else(num_cpus::get);
    info!("Using {} threads for parallel operations.", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    let config = cli_args.to_config();
    let mut runner = AnalysisRunner::new(config).with_context(|| {
        format!(
            "Failed to prepare output directory {}",
            cli_args.output_dir.display()
        )
    })?;

    runner
        .run_association()
        .context("Association analysis failed")?;

    if cli_args.skip_plots {
        info!("--skip-plots given; not rendering Manhattan or Q-Q plots.");
    } else {
        runner
            .create_manhattan_plot()
            .context("Failed to create Manhattan plot")?;
        runner
            .create_qq_plot()
            .context("Failed to create Q-Q plot")?;
    }

    info!(
        "gwas_runner finished successfully in {:.2?}.",
        total_time_start.elapsed()
    );
    Ok(())
}

// --- Module Implementations ---

mod cli {
    use super::{AnalysisConfig, PlotSettings};
    use clap::Parser;
    use gwas_runner::config::{DEFAULT_GENOME_WIDE_P, DEFAULT_SUGGESTIVE_P};
    use std::path::PathBuf;

    #[derive(Parser, Debug)]
    #[command(author, version, about = "Single-SNP GWAS on PLINK filesets with Manhattan and Q-Q plots.", long_about = None, propagate_version = true)]
    pub(crate) struct CliArgs {
        /// PLINK .bed file or fileset prefix.
        #[arg(short = 'b', long = "bfile", required = true)]
        pub(crate) bfile: PathBuf,

        /// Phenotype file: FID IID value [value...].
        #[arg(short = 'p', long = "pheno", required = true)]
        pub(crate) pheno: PathBuf,

        #[arg(short = 'o', long = "out", required = true)]
        pub(crate) output_dir: PathBuf,

        /// Covariate file, same layout as the phenotype file.
        #[arg(short = 'c', long = "covar")]
        pub(crate) covar: Option<PathBuf>,

        /// 1-based phenotype column to test.
        #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        pub(crate) mpheno: usize,

        /// Count allele 1 instead of allele 2.
        #[arg(long)]
        pub(crate) count_a1: bool,

        #[arg(long)]
        pub(crate) skip_plots: bool,

        #[arg(long, default_value_t = DEFAULT_SUGGESTIVE_P)]
        pub(crate) suggestive: f64,

        #[arg(long = "genome-wide", default_value_t = DEFAULT_GENOME_WIDE_P)]
        pub(crate) genome_wide: f64,

        #[arg(short = 't', long)]
        pub(crate) threads: Option<usize>,

        #[arg(long, default_value = "Info")]
        pub(crate) log_level: String,
    }

    impl CliArgs {
        pub(crate) fn to_config(&self) -> AnalysisConfig {
            let plot = PlotSettings {
                suggestive_p: self.suggestive,
                genome_wide_p: self.genome_wide,
                ..PlotSettings::default()
            };
            let config = AnalysisConfig::new(&self.bfile, &self.pheno, &self.output_dir)
                .with_phenotype_column(self.mpheno)
                .with_count_a1(self.count_a1)
                .with_plot_settings(plot);
            match &self.covar {
                Some(path) => config.with_covariates(path),
                None => config,
            }
        }
    }

}
