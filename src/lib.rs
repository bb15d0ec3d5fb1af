// lib.rs
//
// Single-SNP association scans on PLINK filesets, with the results table
// written as TSV and Manhattan / Q-Q diagnostics rendered to PDF.

pub mod association;
pub mod config;
pub mod error;
pub mod genotype;
pub mod phenotype;
pub mod plot;
pub mod regression;
pub mod results;
pub mod runner;

pub use association::{AssociationEngine, AssociationRequest, LinearAssociation};
pub use config::{AnalysisConfig, PlotSettings};
pub use error::{GwasError, Result};
pub use results::{AssociationResult, ResultsTable};
pub use runner::AnalysisRunner;
