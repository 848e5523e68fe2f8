/*!
Contains configuration information for an allele analysis run.
Typical usage is to use the builders to construct the config, e.g.
```
use alleleome::config::{AnalysisConfig, AnalysisConfigBuilder, AnalysisMode, ScoringConfigBuilder};
let config: AnalysisConfig = AnalysisConfigBuilder::default()
    .mode(AnalysisMode::Pan)
    .scoring(ScoringConfigBuilder::default().gap_open(11).build().unwrap())
    .threads(4)
    .build()
    .unwrap();
assert_eq!(config.scoring.gap_open, 11);
```
*/

use std::fmt;
use std::str::FromStr;

use crate::genetic_code::GeneticCodeId;

/// Which genes the provider should yield
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AnalysisMode {
    /// Only genes classified as core in the pangene table
    #[default]
    Core,
    /// Every gene in the pangene table
    Pan
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Core" | "core" => Ok(AnalysisMode::Core),
            "Pan" | "pan" => Ok(AnalysisMode::Pan),
            other => Err(format!("unknown analysis mode {other:?}, expected Core or Pan"))
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Core => write!(f, "Core"),
            AnalysisMode::Pan => write!(f, "Pan")
        }
    }
}

/// Amino-acid substitution matrix choices
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SubstitutionMatrixKind {
    /// BLOSUM62, the usual choice for closely related proteins
    #[default]
    Blosum62,
    /// Uses the nucleotide match/mismatch scores for amino acids as well
    Identity
}

/// Scoring parameters for alignment.
/// Gap penalties are positive numbers that get subtracted; a gap of length `L` costs `gap_open + (L-1) * gap_extend`.
#[derive(derive_builder::Builder, Clone, Debug, PartialEq)]
#[builder(default)]
pub struct ScoringConfig {
    /// Score for two identical nucleotides
    pub match_score: i32,
    /// Score for two different nucleotides
    pub mismatch_score: i32,
    /// Penalty for the first position of a gap
    pub gap_open: i32,
    /// Penalty for each further position of a gap
    pub gap_extend: i32,
    /// Substitution matrix for amino acids
    pub matrix: SubstitutionMatrixKind
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            match_score: 2,
            mismatch_score: -1,
            gap_open: 10,
            gap_extend: 1,
            matrix: SubstitutionMatrixKind::Blosum62
        }
    }
}

/// Pre-alignment ORF checks.
/// The multiple-of-three check is always on since the codon analysis cannot run without it; every other check is opt-in.
#[derive(derive_builder::Builder, Clone, Debug, PartialEq)]
#[builder(default)]
pub struct QualityConfig {
    /// Reject sequences whose first codon is not a start codon
    pub require_start_codon: bool,
    /// Reject sequences whose last codon is not a stop codon
    pub require_stop_codon: bool,
    /// Reject sequences with a stop codon before the last codon
    pub reject_internal_stops: bool,
    /// Reject sequences whose length deviates from the median by more than this fraction; None disables the check
    pub max_length_deviation: Option<f64>
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            require_start_codon: false,
            require_stop_codon: false,
            reject_internal_stops: false,
            max_length_deviation: None
        }
    }
}

/// Top level configuration for an analysis run
#[derive(derive_builder::Builder, Clone, Debug, PartialEq)]
#[builder(default)]
pub struct AnalysisConfig {
    /// Alignment scoring
    pub scoring: ScoringConfig,
    /// Translation table
    pub genetic_code: GeneticCodeId,
    /// Core or Pan gene selection, consumed by providers
    pub mode: AnalysisMode,
    /// Pre-alignment checks
    pub quality: QualityConfig,
    /// Worker threads, 0 lets rayon decide
    pub threads: usize,
    /// Number of finished genes that may wait for the report writer before workers block
    pub channel_capacity: usize
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            scoring: Default::default(),
            genetic_code: GeneticCodeId::Bacterial,
            mode: AnalysisMode::Core,
            quality: Default::default(),
            threads: 0,
            channel_capacity: 64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("Core".parse::<AnalysisMode>().unwrap(), AnalysisMode::Core);
        assert_eq!("Pan".parse::<AnalysisMode>().unwrap(), AnalysisMode::Pan);
        assert!("Accessory".parse::<AnalysisMode>().is_err());
        assert_eq!(AnalysisMode::Pan.to_string(), "Pan");
    }

    #[test]
    fn test_builder_defaults() {
        let config = AnalysisConfigBuilder::default().build().unwrap();
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(config.genetic_code, GeneticCodeId::Bacterial);
        assert_eq!(config.quality, QualityConfig::default());
        assert!(!config.quality.require_start_codon);
        assert_eq!(config.quality.max_length_deviation, None);
        assert_eq!(config.channel_capacity, 64);

        let config = AnalysisConfigBuilder::default()
            .quality(QualityConfigBuilder::default().require_start_codon(true).max_length_deviation(Some(0.2)).build().unwrap())
            .build().unwrap();
        assert!(config.quality.require_start_codon);
        assert!(!config.quality.require_stop_codon);
        assert_eq!(config.quality.max_length_deviation, Some(0.2));
    }
}
