/*!
Column-wise majority consensus of a multiple sequence alignment.

The vote in each column follows fixed rules so that the result is reproducible:
* the ambiguous symbol (`N` or `X`) only takes part when no determinate residue is present in the column
* equal residue counts are resolved towards the lowest byte value, i.e. alphabetically
* the consensus is a gap only when gaps are strictly more frequent than the winning residue

# Example usage
```rust
use std::sync::Arc;
use alleleome::alignment::Alignment;
use alleleome::consensus::build_consensus;
use alleleome::sequence::SequenceKind;

let row_ids: Vec<Arc<str>> = vec!["g1".into(), "g2".into(), "g3".into()];
let alignment = Alignment::new(SequenceKind::AminoAcid, row_ids, vec![
    b"MK-L*".to_vec(),
    b"MKAL*".to_vec(),
    b"MR-L*".to_vec()
]).unwrap();

let consensus = build_consensus(&alignment).unwrap();
assert_eq!(consensus.gapped(), b"MK-L*");
assert_eq!(consensus.ungapped(), b"MKL*");
assert_eq!(consensus.position(3), Some(3));
assert_eq!(consensus.position(2), None);
```
*/

use crate::alignment::{Alignment, CodonAlignment};
use crate::errors::{AlleleomeError, AlleleomeResult};
use crate::sequence::{SequenceKind, GAP};

/// Symbol counts for one alignment column
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColumnCounts {
    /// (residue, count) pairs sorted by residue
    residues: Vec<(u8, usize)>,
    /// Number of gap cells
    gaps: usize
}

impl ColumnCounts {
    /// Tallies the symbols of one column
    pub fn from_symbols(symbols: impl Iterator<Item = u8>) -> ColumnCounts {
        let mut counts = ColumnCounts::default();
        for symbol in symbols {
            if symbol == GAP {
                counts.gaps += 1;
            } else {
                match counts.residues.binary_search_by_key(&symbol, |&(r, _c)| r) {
                    Ok(index) => counts.residues[index].1 += 1,
                    Err(index) => counts.residues.insert(index, (symbol, 1))
                }
            }
        }
        counts
    }

    /// Returns the count for a symbol, gaps included
    pub fn count(&self, symbol: u8) -> usize {
        if symbol == GAP {
            self.gaps
        } else {
            self.residues.iter()
                .find(|&&(r, _c)| r == symbol)
                .map(|&(_r, c)| c)
                .unwrap_or(0)
        }
    }

    /// The winning residue and its count, None if the column holds only gaps
    /// # Arguments
    /// * `ambiguous` - the symbol that only counts when nothing else is present
    fn top_residue(&self, ambiguous: u8) -> Option<(u8, usize)> {
        // strict comparison keeps the first, lowest residue on ties
        let mut best: Option<(u8, usize)> = None;
        for &(residue, count) in self.residues.iter().filter(|&&(r, _c)| r != ambiguous) {
            if best.map_or(true, |(_r, c)| count > c) {
                best = Some((residue, count));
            }
        }
        best.or_else(|| {
            let count = self.count(ambiguous);
            (count > 0).then_some((ambiguous, count))
        })
    }

    /// Picks the consensus symbol of this column, gaps included
    fn vote(&self, ambiguous: u8) -> u8 {
        match self.top_residue(ambiguous) {
            Some((residue, count)) if self.gaps <= count => residue,
            _ => GAP
        }
    }

    // getters
    pub fn residues(&self) -> &[(u8, usize)] {
        &self.residues
    }

    pub fn gaps(&self) -> usize {
        self.gaps
    }

    /// Total number of cells in the column
    pub fn depth(&self) -> usize {
        self.gaps + self.residues.iter().map(|&(_r, c)| c).sum::<usize>()
    }
}

/// The consensus of one alignment
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Consensus {
    /// Alphabet of the underlying alignment
    kind: SequenceKind,
    /// One symbol per alignment column, gaps included
    gapped: Vec<u8>,
    /// Symbol counts per alignment column
    counts: Vec<ColumnCounts>,
    /// The consensus with gap columns removed
    ungapped: Vec<u8>,
    /// For each column, the 1-based position in the ungapped consensus
    positions: Vec<Option<usize>>
}

impl Consensus {
    fn from_counts(kind: SequenceKind, counts: Vec<ColumnCounts>) -> Consensus {
        let ambiguous = kind.ambiguous_symbol();
        let gapped: Vec<u8> = counts.iter().map(|c| c.vote(ambiguous)).collect();
        Self::from_gapped(kind, gapped, counts)
    }

    fn from_gapped(kind: SequenceKind, gapped: Vec<u8>, counts: Vec<ColumnCounts>) -> Consensus {
        let mut ungapped = Vec::with_capacity(gapped.len());
        let positions = gapped.iter()
            .map(|&symbol| {
                if symbol == GAP {
                    None
                } else {
                    ungapped.push(symbol);
                    Some(ungapped.len())
                }
            })
            .collect();

        Consensus {
            kind,
            gapped,
            counts,
            ungapped,
            positions
        }
    }

    /// Consensus symbol of a column
    pub fn symbol(&self, column: usize) -> u8 {
        self.gapped[column]
    }

    /// 1-based position of a column in the ungapped consensus, None for gap columns
    pub fn position(&self, column: usize) -> Option<usize> {
        self.positions[column]
    }

    /// Symbol counts of a column
    pub fn column_counts(&self, column: usize) -> &ColumnCounts {
        &self.counts[column]
    }

    /// Number of alignment columns
    pub fn width(&self) -> usize {
        self.gapped.len()
    }

    // getters
    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    pub fn gapped(&self) -> &[u8] {
        &self.gapped
    }

    pub fn ungapped(&self) -> &[u8] {
        &self.ungapped
    }

    pub fn positions(&self) -> &[Option<usize>] {
        &self.positions
    }
}

/// Builds the majority consensus of an alignment, one symbol per column.
/// # Arguments
/// * `alignment` - the alignment to summarize
/// # Errors
/// * if the alignment has no rows
pub fn build_consensus(alignment: &Alignment) -> AlleleomeResult<Consensus> {
    if alignment.num_rows() == 0 {
        return Err(AlleleomeError::EmptyAlignment);
    }
    let counts: Vec<ColumnCounts> = (0..alignment.width())
        .map(|c| ColumnCounts::from_symbols(alignment.column(c)))
        .collect();
    Ok(Consensus::from_counts(alignment.kind(), counts))
}

/// Builds the protein and nucleotide consensus of a codon alignment.
/// The protein consensus is voted first and decides, codon by codon, whether the nucleotide consensus keeps or drops the codon.
/// A kept codon is the most frequent whole codon among the rows that carry the winning amino acid, lowest codon on ties,
/// so the ungapped nucleotide consensus stays in frame and translates to the ungapped protein consensus.
/// # Arguments
/// * `alignment` - the codon alignment of one gene
/// # Errors
/// * if the alignment has no rows
pub fn build_codon_consensus(alignment: &CodonAlignment) -> AlleleomeResult<(Consensus, Consensus)> {
    let protein = build_consensus(alignment.protein())?;
    let nucleotide = alignment.nucleotide();

    let counts: Vec<ColumnCounts> = (0..nucleotide.width())
        .map(|c| ColumnCounts::from_symbols(nucleotide.column(c)))
        .collect();
    let mut gapped: Vec<u8> = Vec::with_capacity(nucleotide.width());
    for (codon_index, &amino_acid) in protein.gapped().iter().enumerate() {
        if amino_acid == GAP {
            gapped.extend_from_slice(&[GAP; 3]);
        } else {
            gapped.extend_from_slice(&consensus_codon(alignment, codon_index, amino_acid)?);
        }
    }

    let nucleotide = Consensus::from_gapped(nucleotide.kind(), gapped, counts);
    Ok((protein, nucleotide))
}

/// Most frequent codon among the rows whose protein residue is `amino_acid`
fn consensus_codon(alignment: &CodonAlignment, codon_index: usize, amino_acid: u8) -> AlleleomeResult<[u8; 3]> {
    let start = codon_index * 3;
    let mut tally: Vec<([u8; 3], usize)> = vec![];
    for (protein_row, nucleotide_row) in alignment.protein().rows().iter().zip(alignment.nucleotide().rows().iter()) {
        if protein_row[codon_index] != amino_acid {
            continue;
        }
        let codon = [nucleotide_row[start], nucleotide_row[start + 1], nucleotide_row[start + 2]];
        match tally.binary_search_by_key(&codon, |&(c, _n)| c) {
            Ok(index) => tally[index].1 += 1,
            Err(index) => tally.insert(index, (codon, 1))
        }
    }

    // strict comparison keeps the first, lowest codon on ties
    let mut best: Option<([u8; 3], usize)> = None;
    for &(codon, count) in tally.iter() {
        if best.map_or(true, |(_c, n)| count > n) {
            best = Some((codon, count));
        }
    }
    best.map(|(codon, _count)| codon).ok_or_else(|| AlleleomeError::Alignment(format!(
        "no row carries consensus residue {} at codon {codon_index}", amino_acid as char
    )))
}
