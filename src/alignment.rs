/*!
The multiple sequence alignment matrix.
Rows are genomes, columns are alignment positions, and every cell holds a residue or [`GAP`].
*/

use std::sync::Arc;

use crate::errors::{AlleleomeError, AlleleomeResult};
use crate::sequence::{SequenceKind, GAP};

/// A validated multiple sequence alignment
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Alignment {
    /// Alphabet of the aligned residues
    kind: SequenceKind,
    /// Genome identifier of each row
    row_ids: Vec<Arc<str>>,
    /// The aligned rows, all the same width
    rows: Vec<Vec<u8>>,
    /// Number of columns
    width: usize
}

impl Alignment {
    /// Creates an alignment and checks the matrix invariants.
    /// # Arguments
    /// * `kind` - the alphabet of the rows
    /// * `row_ids` - one genome identifier per row
    /// * `rows` - the aligned rows
    /// # Errors
    /// * if the ids and rows differ in count
    /// * if rows differ in width
    /// * if any column consists only of gaps
    pub fn new(kind: SequenceKind, row_ids: Vec<Arc<str>>, rows: Vec<Vec<u8>>) -> AlleleomeResult<Alignment> {
        if row_ids.len() != rows.len() {
            return Err(AlleleomeError::Alignment(format!(
                "{} row identifiers for {} rows", row_ids.len(), rows.len()
            )));
        }

        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some((index, row)) = rows.iter().enumerate().find(|(_i, r)| r.len() != width) {
            return Err(AlleleomeError::Alignment(format!(
                "row {} has width {}, expected {width}", row_ids[index], row.len()
            )));
        }

        if !rows.is_empty() {
            if let Some(column) = (0..width).find(|&c| rows.iter().all(|r| r[c] == GAP)) {
                return Err(AlleleomeError::Alignment(format!("column {column} contains only gaps")));
            }
        }

        Ok(Alignment {
            kind,
            row_ids,
            rows,
            width
        })
    }

    /// Iterates over the symbols of one column, top to bottom
    pub fn column(&self, column: usize) -> impl Iterator<Item = u8> + '_ {
        self.rows.iter().map(move |r| r[column])
    }

    /// Returns a row with all gaps removed
    pub fn ungapped_row(&self, row: usize) -> Vec<u8> {
        self.rows[row].iter().copied().filter(|&s| s != GAP).collect()
    }

    /// Renders the alignment as aligned FASTA
    pub fn to_fasta(&self) -> String {
        let mut out = String::new();
        for (id, row) in self.row_ids.iter().zip(self.rows.iter()) {
            out.push('>');
            out.push_str(id);
            out.push('\n');
            out.push_str(&String::from_utf8_lossy(row));
            out.push('\n');
        }
        out
    }

    // getters
    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    pub fn row_ids(&self) -> &[Arc<str>] {
        &self.row_ids
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    pub fn row(&self, row: usize) -> &[u8] {
        &self.rows[row]
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

/// A protein alignment together with the nucleotide alignment threaded through it codon by codon
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CodonAlignment {
    protein: Alignment,
    nucleotide: Alignment
}

impl CodonAlignment {
    /// Pairs the two alignments after checking that they describe the same rows and codon layout.
    /// # Errors
    /// * if row identifiers differ or the nucleotide width is not three times the protein width
    pub fn new(protein: Alignment, nucleotide: Alignment) -> AlleleomeResult<CodonAlignment> {
        if protein.row_ids() != nucleotide.row_ids() {
            return Err(AlleleomeError::Alignment("protein and nucleotide alignments have different rows".to_string()));
        }
        if nucleotide.width() != protein.width() * 3 {
            return Err(AlleleomeError::Alignment(format!(
                "nucleotide width {} is not three times protein width {}", nucleotide.width(), protein.width()
            )));
        }
        Ok(CodonAlignment {
            protein,
            nucleotide
        })
    }

    pub fn protein(&self) -> &Alignment {
        &self.protein
    }

    pub fn nucleotide(&self) -> &Alignment {
        &self.nucleotide
    }
}
