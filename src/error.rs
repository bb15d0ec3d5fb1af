// error.rs

use std::path::PathBuf;

use bed_reader::BedErrorPlus;
use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

/// Every failure the library can raise. Nothing is swallowed: engine,
/// filesystem and plotting errors reach the caller of the runner step that
/// triggered them.
#[derive(Error, Debug)]
pub enum GwasError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Genotype error: {message}")]
    Genotype { message: String },

    #[error("Phenotype file {path}: line {line}: {message}")]
    Phenotype {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Covariate file {path}: line {line}: {message}")]
    Covariate {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("No samples are shared between the genotype .fam and the phenotype/covariate files")]
    NoOverlappingSamples,

    #[error("Association needs at least {required} samples with complete data, found {found}")]
    InsufficientSamples { found: usize, required: usize },

    #[error("Model error: {message}")]
    Model { message: String },

    #[error("Progress bar template error: {0}")]
    Progress(#[from] indicatif::style::TemplateError),

    #[error("Plot error: {message}")]
    Plot { message: String },

    #[error("PDF conversion error: {message}")]
    Pdf { message: String },
}

pub type Result<T> = std::result::Result<T, GwasError>;

impl GwasError {
    pub fn genotype(message: impl Into<String>) -> Self {
        Self::Genotype {
            message: message.into(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    pub fn plot(message: impl Into<String>) -> Self {
        Self::Plot {
            message: message.into(),
        }
    }

    pub fn pdf(message: impl Into<String>) -> Self {
        Self::Pdf {
            message: message.into(),
        }
    }
}

// bed_reader boxes its error type; keep the message, drop the box.
impl From<Box<BedErrorPlus>> for GwasError {
    fn from(e: Box<BedErrorPlus>) -> Self {
        GwasError::genotype(format!("bed_reader error: {}", e))
    }
}

impl<E> From<DrawingAreaErrorKind<E>> for GwasError
where
    E: std::error::Error + Send + Sync,
{
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        GwasError::plot(e.to_string())
    }
}
