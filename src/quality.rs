/*!
Pre-alignment ORF checks.
Sequences that fail a check are dropped from the gene and reported, they never fail the gene on their own.
*/

use std::sync::Arc;

use serde::Serialize;

use crate::config::QualityConfig;
use crate::errors::AlleleomeResult;
use crate::events::StageEvents;
use crate::genetic_code::{Codon, GeneticCode};
use crate::sequence::{Sequence, SequenceKind, SequenceSet};

/// Why a sequence was removed before alignment
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum QcReason {
    /// Empty or not a multiple of 3 long
    NotCodonAligned,
    /// First codon is not a start codon
    MissingStartCodon,
    /// Last codon is not a stop codon
    MissingStopCodon,
    /// A stop codon before the last codon
    InternalStopCodon,
    /// Length too far from the median length of the gene
    LengthOutlier
}

/// One sequence removed by the filter
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QcRejection {
    pub gene_id: Arc<str>,
    pub genome_id: Arc<str>,
    pub reason: QcReason,
    /// Sequence length in nucleotides
    pub length: usize
}

/// The sequences that passed and the ones that did not
#[derive(Clone, Debug)]
pub struct QualityOutcome {
    pub kept: SequenceSet,
    pub rejected: Vec<QcRejection>
}

/// Applies the configured ORF checks to a nucleotide sequence set
#[derive(Clone, Copy, Debug)]
pub struct QualityFilter<'a> {
    config: &'a QualityConfig,
    genetic_code: &'a GeneticCode
}

impl<'a> QualityFilter<'a> {
    /// Constructor
    pub fn new(config: &'a QualityConfig, genetic_code: &'a GeneticCode) -> QualityFilter<'a> {
        QualityFilter {
            config,
            genetic_code
        }
    }

    /// Splits a set into passing and rejected sequences; each rejected sequence reports the first check it failed.
    /// # Arguments
    /// * `set` - nucleotide sequences of one gene
    /// * `events` - event sink for this gene
    /// # Errors
    /// * if any sequence contains a symbol outside the nucleotide alphabet
    pub fn filter(&self, set: &SequenceSet, events: &StageEvents) -> AlleleomeResult<QualityOutcome> {
        for sequence in set.sequences().iter() {
            sequence.validate(SequenceKind::Nucleotide)?;
        }

        let median = median_length(set.sequences().iter().filter(|s| is_codon_aligned(s)));

        let mut kept = vec![];
        let mut rejected = vec![];
        for sequence in set.sequences().iter() {
            match self.check(sequence, median)? {
                None => kept.push(sequence.clone()),
                Some(reason) => {
                    events.debug(&format!(
                        "rejected {} ({} nt): {:?}", sequence.genome_id(), sequence.len(), reason
                    ));
                    rejected.push(QcRejection {
                        gene_id: set.gene_id().clone(),
                        genome_id: sequence.genome_id().clone(),
                        reason,
                        length: sequence.len()
                    });
                }
            }
        }

        if !rejected.is_empty() {
            events.info(&format!("{} of {} sequences failed quality control", rejected.len(), set.len()));
        }
        Ok(QualityOutcome {
            kept: set.with_sequences(kept),
            rejected
        })
    }

    /// Returns the first failed check, None if the sequence passes
    fn check(&self, sequence: &Sequence, median: Option<f64>) -> AlleleomeResult<Option<QcReason>> {
        if !is_codon_aligned(sequence) {
            return Ok(Some(QcReason::NotCodonAligned));
        }

        let codons: Vec<Codon> = sequence.residues().chunks_exact(3)
            .map(Codon::new)
            .collect::<AlleleomeResult<_>>()?;
        let last = codons.len() - 1;

        if self.config.require_start_codon && !self.genetic_code.is_start(&codons[0]) {
            return Ok(Some(QcReason::MissingStartCodon));
        }
        if self.config.require_stop_codon && !self.genetic_code.is_stop(&codons[last]) {
            return Ok(Some(QcReason::MissingStopCodon));
        }
        if self.config.reject_internal_stops && codons[..last].iter().any(|c| self.genetic_code.is_stop(c)) {
            return Ok(Some(QcReason::InternalStopCodon));
        }
        if let (Some(max_deviation), Some(median)) = (self.config.max_length_deviation, median) {
            let deviation = (sequence.len() as f64 - median).abs() / median;
            if deviation > max_deviation {
                return Ok(Some(QcReason::LengthOutlier));
            }
        }
        Ok(None)
    }
}

fn is_codon_aligned(sequence: &Sequence) -> bool {
    !sequence.is_empty() && sequence.len() % 3 == 0
}

/// Median of the sequence lengths, None if there are no sequences
fn median_length<'s>(sequences: impl Iterator<Item = &'s Sequence>) -> Option<f64> {
    let mut lengths: Vec<usize> = sequences.map(|s| s.len()).collect();
    if lengths.is_empty() {
        return None;
    }
    lengths.sort_unstable();
    let middle = lengths.len() / 2;
    if lengths.len() % 2 == 1 {
        Some(lengths[middle] as f64)
    } else {
        Some((lengths[middle - 1] + lengths[middle]) as f64 / 2.0)
    }
}
