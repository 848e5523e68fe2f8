/*!
Compares every aligned row against the consensus and records the cells that differ.
Runs once on the nucleotide alignment and once on the protein alignment of a gene.
*/

use std::sync::Arc;

use serde::Serialize;

use crate::alignment::Alignment;
use crate::consensus::Consensus;
use crate::errors::{AlleleomeError, AlleleomeResult};
use crate::sequence::{SequenceKind, GAP};

/// Classification of one (row, column) cell against the consensus; exactly one applies to every cell
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CellClass {
    Match,
    Substitution,
    Insertion,
    Deletion,
    GapGap
}

impl CellClass {
    /// The variant kind for cells that are reported, None for matches and gap-gap cells
    pub fn variant_kind(&self) -> Option<VariantKind> {
        match self {
            CellClass::Substitution => Some(VariantKind::Substitution),
            CellClass::Insertion => Some(VariantKind::Insertion),
            CellClass::Deletion => Some(VariantKind::Deletion),
            CellClass::Match |
            CellClass::GapGap => None
        }
    }
}

/// Classifies an observed symbol against the consensus symbol of its column
/// # Examples
/// ```rust
/// use alleleome::variants::{classify_cell, CellClass};
/// assert_eq!(classify_cell(b'A', b'A'), CellClass::Match);
/// assert_eq!(classify_cell(b'C', b'A'), CellClass::Substitution);
/// assert_eq!(classify_cell(b'-', b'A'), CellClass::Deletion);
/// assert_eq!(classify_cell(b'A', b'-'), CellClass::Insertion);
/// assert_eq!(classify_cell(b'-', b'-'), CellClass::GapGap);
/// ```
pub fn classify_cell(observed: u8, consensus: u8) -> CellClass {
    match (observed == GAP, consensus == GAP) {
        (true, true) => CellClass::GapGap,
        (true, false) => CellClass::Deletion,
        (false, true) => CellClass::Insertion,
        (false, false) if observed == consensus => CellClass::Match,
        (false, false) => CellClass::Substitution
    }
}

/// The reported kinds of difference from consensus
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum VariantKind {
    Substitution,
    Insertion,
    Deletion
}

/// One cell that differs from the consensus
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantRecord {
    pub gene_id: Arc<str>,
    /// Which alignment the record comes from
    pub level: SequenceKind,
    /// 0-based alignment column
    pub column: usize,
    /// 1-based position in the ungapped consensus, None on gap-consensus columns
    pub consensus_position: Option<usize>,
    pub genome_id: Arc<str>,
    /// Row of the genome in the alignment
    #[serde(skip)]
    pub row: usize,
    pub observed: char,
    pub consensus: char,
    pub kind: VariantKind
}

/// Finds every substitution, insertion and deletion relative to the consensus, in row-major order.
/// # Arguments
/// * `gene_id` - the gene the alignment belongs to
/// * `alignment` - the aligned rows
/// * `consensus` - the consensus built from `alignment`
/// # Errors
/// * if the consensus and alignment differ in width or alphabet
pub fn detect_variants(gene_id: &Arc<str>, alignment: &Alignment, consensus: &Consensus) -> AlleleomeResult<Vec<VariantRecord>> {
    if alignment.width() != consensus.width() {
        return Err(AlleleomeError::Alignment(format!(
            "consensus width {} does not match alignment width {}", consensus.width(), alignment.width()
        )));
    }
    if alignment.kind() != consensus.kind() {
        return Err(AlleleomeError::Alignment(format!(
            "consensus is {} but alignment is {}", consensus.kind().label(), alignment.kind().label()
        )));
    }

    let mut variants = vec![];
    for (row, (genome_id, cells)) in alignment.row_ids().iter().zip(alignment.rows().iter()).enumerate() {
        for (column, (&observed, &expected)) in cells.iter().zip(consensus.gapped().iter()).enumerate() {
            if let Some(kind) = classify_cell(observed, expected).variant_kind() {
                variants.push(VariantRecord {
                    gene_id: gene_id.clone(),
                    level: alignment.kind(),
                    column,
                    consensus_position: consensus.position(column),
                    genome_id: genome_id.clone(),
                    row,
                    observed: observed as char,
                    consensus: expected as char,
                    kind
                });
            }
        }
    }
    Ok(variants)
}
