/*!
Error kinds raised inside a single gene's pipeline.
Anything returned here is caught at the per-gene boundary and recorded as a failure for that gene.
*/

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while analyzing one gene
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AlleleomeError {
    /// Malformed or insufficient input sequences for alignment
    #[error("alignment error: {0}")]
    Alignment(String),
    /// An alignment with zero rows was handed to consensus building
    #[error("empty alignment: consensus requires at least one row")]
    EmptyAlignment,
    /// A codon that is not exactly three symbols of the nucleotide alphabet
    #[error("invalid codon: {0}")]
    InvalidCodon(String),
    /// Upstream data was malformed, e.g. missing files or duplicate genome identifiers
    #[error("provider error: {0}")]
    Provider(String),
    /// One of the shared static tables failed to load; this is fatal at startup
    #[error("static table error: {0}")]
    StaticTable(String)
}

/// Convenience alias for results inside the gene pipeline
pub type AlleleomeResult<T> = Result<T, AlleleomeError>;

/// The pipeline stages a failure or log event can be attributed to
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Stage {
    Provider,
    QualityControl,
    Alignment,
    Consensus,
    Variants,
    Mutations,
    Aggregation,
    Report
}

impl Stage {
    /// Short lowercase label, also used as the log target suffix
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Provider => "provider",
            Stage::QualityControl => "quality",
            Stage::Alignment => "alignment",
            Stage::Consensus => "consensus",
            Stage::Variants => "variants",
            Stage::Mutations => "mutations",
            Stage::Aggregation => "aggregation",
            Stage::Report => "report"
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
