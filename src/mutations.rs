/*!
Codon-level classification of nucleotide substitutions.
Each mutated codon is translated with the shared genetic code and tagged with its effect and the physico-chemical class transition of the amino acid.
*/

use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;

use crate::alignment::Alignment;
use crate::consensus::Consensus;
use crate::errors::{AlleleomeError, AlleleomeResult};
use crate::genetic_code::{Codon, GeneticCode};
use crate::sequence::{SequenceKind, GAP};
use crate::variants::{VariantKind, VariantRecord};

/// Coarse physico-chemical class of an amino acid
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum PropertyClass {
    /// A V L I M F W G P
    Hydrophobic,
    /// S T C Y N Q
    Polar,
    /// K R H
    Positive,
    /// D E
    Negative,
    /// translation stop
    Stop,
    /// X or anything not in the table
    Unknown
}

impl PropertyClass {
    /// Looks up the class of a one-letter amino acid
    pub fn of(amino_acid: u8) -> PropertyClass {
        match amino_acid {
            b'A' | b'V' | b'L' | b'I' | b'M' | b'F' | b'W' | b'G' | b'P' => PropertyClass::Hydrophobic,
            b'S' | b'T' | b'C' | b'Y' | b'N' | b'Q' => PropertyClass::Polar,
            b'K' | b'R' | b'H' => PropertyClass::Positive,
            b'D' | b'E' => PropertyClass::Negative,
            b'*' => PropertyClass::Stop,
            _ => PropertyClass::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PropertyClass::Hydrophobic => "hydrophobic",
            PropertyClass::Polar => "polar",
            PropertyClass::Positive => "positive",
            PropertyClass::Negative => "negative",
            PropertyClass::Stop => "stop",
            PropertyClass::Unknown => "unknown"
        }
    }
}

impl fmt::Display for PropertyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The consequence of a codon change on the encoded amino acid
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum MutationEffect {
    /// Same amino acid
    Synonymous,
    /// A different sense amino acid
    Missense,
    /// A sense codon became a stop codon
    Nonsense,
    /// A stop codon became a sense codon
    StopLost,
    /// One of the codons contains `N`, so the amino acid is unknown
    Indeterminate
}

impl MutationEffect {
    /// All effects, in reporting order
    pub const ALL: [MutationEffect; 5] = [
        MutationEffect::Synonymous,
        MutationEffect::Missense,
        MutationEffect::Nonsense,
        MutationEffect::StopLost,
        MutationEffect::Indeterminate
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MutationEffect::Synonymous => "synonymous",
            MutationEffect::Missense => "missense",
            MutationEffect::Nonsense => "nonsense",
            MutationEffect::StopLost => "stop_lost",
            MutationEffect::Indeterminate => "indeterminate"
        }
    }
}

/// The amino-acid side of a codon change
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct AminoAcidChange {
    pub reference: char,
    pub observed: char,
    pub reference_class: PropertyClass,
    pub observed_class: PropertyClass
}

impl AminoAcidChange {
    fn new(reference: u8, observed: u8) -> AminoAcidChange {
        AminoAcidChange {
            reference: reference as char,
            observed: observed as char,
            reference_class: PropertyClass::of(reference),
            observed_class: PropertyClass::of(observed)
        }
    }

    /// True if the amino acid moves to a different property class
    pub fn is_class_change(&self) -> bool {
        self.reference_class != self.observed_class
    }
}

/// Result of comparing two codons
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CodonChange {
    pub effect: MutationEffect,
    pub amino_acids: AminoAcidChange,
    /// Number of differing bases
    pub base_changes: usize
}

/// One mutated codon of one genome
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MutationRecord {
    pub gene_id: Arc<str>,
    /// 0-based codon index in the nucleotide alignment
    pub codon_index: usize,
    /// 1-based codon position in the ungapped consensus
    pub consensus_codon: usize,
    pub genome_id: Arc<str>,
    #[serde(skip)]
    pub row: usize,
    pub reference_codon: Codon,
    pub observed_codon: Codon,
    pub base_changes: usize,
    pub effect: MutationEffect,
    pub amino_acids: AminoAcidChange
}

impl MutationRecord {
    pub fn is_synonymous(&self) -> bool {
        self.effect == MutationEffect::Synonymous
    }
}

/// Classifies codon changes with a fixed genetic code
#[derive(Clone, Copy, Debug)]
pub struct MutationClassifier<'a> {
    genetic_code: &'a GeneticCode
}

impl<'a> MutationClassifier<'a> {
    /// Constructor
    pub fn new(genetic_code: &'a GeneticCode) -> MutationClassifier<'a> {
        MutationClassifier {
            genetic_code
        }
    }

    /// Compares an observed codon against the reference (consensus) codon.
    /// Codons containing `N` are always `Indeterminate`, the unknown base is never guessed.
    /// # Examples
    /// ```rust
    /// use alleleome::genetic_code::{Codon, GeneticCode, GeneticCodeId};
    /// use alleleome::mutations::{MutationClassifier, MutationEffect, PropertyClass};
    /// let code = GeneticCode::load(GeneticCodeId::Standard).unwrap();
    /// let classifier = MutationClassifier::new(&code);
    /// let change = classifier.classify_mutation(&Codon::new(b"GAA").unwrap(), &Codon::new(b"GAC").unwrap());
    /// assert_eq!(change.effect, MutationEffect::Missense);
    /// assert_eq!(change.amino_acids.observed_class, PropertyClass::Negative);
    /// ```
    pub fn classify_mutation(&self, reference: &Codon, observed: &Codon) -> CodonChange {
        let reference_aa = self.genetic_code.translate(reference);
        let observed_aa = self.genetic_code.translate(observed);

        let effect = if reference.is_indeterminate() || observed.is_indeterminate() {
            MutationEffect::Indeterminate
        } else if reference_aa == observed_aa {
            MutationEffect::Synonymous
        } else if self.genetic_code.is_stop(observed) {
            MutationEffect::Nonsense
        } else if self.genetic_code.is_stop(reference) {
            MutationEffect::StopLost
        } else {
            MutationEffect::Missense
        };

        CodonChange {
            effect,
            amino_acids: AminoAcidChange::new(reference_aa, observed_aa),
            base_changes: reference.differences(observed)
        }
    }

    /// Turns the nucleotide substitution records of a gene into one mutation record per mutated codon.
    /// Codons with a gap in the observed or consensus codon are skipped, they are already reported as insertions or deletions.
    /// # Arguments
    /// * `gene_id` - the gene being classified
    /// * `alignment` - the codon-threaded nucleotide alignment
    /// * `consensus` - the nucleotide consensus, with whole-codon gaps
    /// * `variants` - the nucleotide variant records in row-major order
    /// # Errors
    /// * if the alignment is not a nucleotide alignment with a width divisible by 3
    /// * if a codon contains a symbol outside the nucleotide alphabet
    pub fn classify_variants(&self, gene_id: &Arc<str>, alignment: &Alignment, consensus: &Consensus, variants: &[VariantRecord]) -> AlleleomeResult<Vec<MutationRecord>> {
        if alignment.kind() != SequenceKind::Nucleotide || alignment.width() % 3 != 0 {
            return Err(AlleleomeError::Alignment(format!(
                "mutation classification needs a codon nucleotide alignment, found {} alignment of width {}",
                alignment.kind().label(), alignment.width()
            )));
        }

        let mutated_codons = variants.iter()
            .filter(|v| v.kind == VariantKind::Substitution)
            .map(|v| (v.row, v.column / 3))
            .dedup();

        let mut mutations = vec![];
        for (row, codon_index) in mutated_codons {
            let start = codon_index * 3;
            let observed = &alignment.row(row)[start..start + 3];
            let reference = &consensus.gapped()[start..start + 3];
            if observed.contains(&GAP) || reference.contains(&GAP) {
                continue;
            }

            let reference_codon = Codon::new(reference)?;
            let observed_codon = Codon::new(observed)?;
            let change = self.classify_mutation(&reference_codon, &observed_codon);
            let consensus_codon = consensus.position(start)
                .map(|p| (p - 1) / 3 + 1)
                .unwrap_or_default();

            mutations.push(MutationRecord {
                gene_id: gene_id.clone(),
                codon_index,
                consensus_codon,
                genome_id: alignment.row_ids()[row].clone(),
                row,
                reference_codon,
                observed_codon,
                base_changes: change.base_changes,
                effect: change.effect,
                amino_acids: change.amino_acids
            });
        }
        Ok(mutations)
    }
}
