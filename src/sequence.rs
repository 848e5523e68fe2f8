/*!
Core data model: alphabets, sequences with genome provenance, and the per-gene sequence set.
*/

use std::sync::Arc;

use rustc_hash::FxHashSet as HashSet;

use crate::errors::{AlleleomeError, AlleleomeResult};

/// The gap symbol used in every alignment
pub const GAP: u8 = b'-';

/// Residues accepted in nucleotide input
pub const NUCLEOTIDES: &[u8] = b"ACGTN";

/// Residues accepted in amino-acid input; `X` is unknown and `*` is a stop
pub const AMINO_ACIDS: &[u8] = b"ACDEFGHIKLMNPQRSTVWYX*";

/// Which alphabet a sequence or alignment uses
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Serialize)]
pub enum SequenceKind {
    Nucleotide,
    AminoAcid
}

impl SequenceKind {
    /// Residues that are valid for this kind, gap excluded
    pub fn alphabet(&self) -> &'static [u8] {
        match self {
            SequenceKind::Nucleotide => NUCLEOTIDES,
            SequenceKind::AminoAcid => AMINO_ACIDS
        }
    }

    /// The symbol that stands for "could be anything"
    pub fn ambiguous_symbol(&self) -> u8 {
        match self {
            SequenceKind::Nucleotide => b'N',
            SequenceKind::AminoAcid => b'X'
        }
    }

    /// Returns true if `symbol` is a valid residue of this alphabet (gap is not)
    pub fn is_residue(&self, symbol: u8) -> bool {
        self.alphabet().contains(&symbol)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SequenceKind::Nucleotide => "nucleotide",
            SequenceKind::AminoAcid => "amino_acid"
        }
    }
}

/// One observed sequence of a gene in one genome
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Sequence {
    /// Genome (strain) identifier
    genome_id: Arc<str>,
    /// Upper-cased residues
    residues: Vec<u8>
}

impl Sequence {
    /// Constructor, residues are upper-cased but otherwise stored as given
    /// # Arguments
    /// * `genome_id` - the genome this sequence was observed in
    /// * `residues` - raw residues
    pub fn new(genome_id: impl Into<Arc<str>>, residues: &[u8]) -> Sequence {
        Sequence {
            genome_id: genome_id.into(),
            residues: residues.to_ascii_uppercase()
        }
    }

    /// Checks that every residue belongs to the alphabet of `kind`
    /// # Errors
    /// * if any residue is outside the alphabet, including gaps
    pub fn validate(&self, kind: SequenceKind) -> AlleleomeResult<()> {
        if let Some((position, &symbol)) = self.residues.iter().enumerate().find(|&(_i, &s)| !kind.is_residue(s)) {
            return Err(AlleleomeError::Alignment(format!(
                "sequence {} has invalid {} symbol {:?} at position {}",
                self.genome_id, kind.label(), symbol as char, position + 1
            )));
        }
        Ok(())
    }

    // getters
    pub fn genome_id(&self) -> &Arc<str> {
        &self.genome_id
    }

    pub fn residues(&self) -> &[u8] {
        &self.residues
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

/// All the sequences observed for one gene
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceSet {
    gene_id: Arc<str>,
    kind: SequenceKind,
    sequences: Vec<Sequence>
}

impl SequenceSet {
    /// Creates a set after checking that genome identifiers are unique.
    /// # Arguments
    /// * `gene_id` - the gene all sequences belong to
    /// * `kind` - the alphabet of the sequences
    /// * `sequences` - the sequences in loader order
    /// # Errors
    /// * if the same genome identifier appears twice
    pub fn new(gene_id: impl Into<Arc<str>>, kind: SequenceKind, sequences: Vec<Sequence>) -> AlleleomeResult<SequenceSet> {
        let gene_id: Arc<str> = gene_id.into();
        let mut seen: HashSet<&str> = Default::default();
        for sequence in sequences.iter() {
            if !seen.insert(sequence.genome_id()) {
                return Err(AlleleomeError::Provider(format!(
                    "gene {gene_id} has duplicate genome identifier {}", sequence.genome_id()
                )));
            }
        }
        Ok(SequenceSet {
            gene_id,
            kind,
            sequences
        })
    }

    /// Returns a new set over the same gene with a subset of sequences, used after filtering
    pub fn with_sequences(&self, sequences: Vec<Sequence>) -> SequenceSet {
        SequenceSet {
            gene_id: self.gene_id.clone(),
            kind: self.kind,
            sequences
        }
    }

    // getters
    pub fn gene_id(&self) -> &Arc<str> {
        &self.gene_id
    }

    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uppercase_and_validate() {
        let sequence = Sequence::new("g1", b"atgNcc");
        assert_eq!(sequence.residues(), b"ATGNCC");
        assert!(sequence.validate(SequenceKind::Nucleotide).is_ok());

        let gapped = Sequence::new("g2", b"ATG-CC");
        let err = gapped.validate(SequenceKind::Nucleotide).unwrap_err();
        assert_eq!(err, AlleleomeError::Alignment("sequence g2 has invalid nucleotide symbol '-' at position 4".to_string()));

        let protein = Sequence::new("g3", b"MKV*");
        assert!(protein.validate(SequenceKind::AminoAcid).is_ok());
        assert!(protein.validate(SequenceKind::Nucleotide).is_err());
    }

    #[test]
    fn test_duplicate_genomes() {
        let sequences = vec![
            Sequence::new("g1", b"ATG"),
            Sequence::new("g1", b"ATG")
        ];
        let result = SequenceSet::new("geneA", SequenceKind::Nucleotide, sequences);
        assert_eq!(result.unwrap_err(), AlleleomeError::Provider("gene geneA has duplicate genome identifier g1".to_string()));
    }

    #[test]
    fn test_with_sequences() {
        let set = SequenceSet::new("geneA", SequenceKind::Nucleotide, vec![
            Sequence::new("g1", b"ATG"),
            Sequence::new("g2", b"ATA")
        ]).unwrap();
        let subset = set.with_sequences(vec![set.sequences()[1].clone()]);
        assert_eq!(subset.gene_id().as_ref(), "geneA");
        assert_eq!(subset.len(), 1);
        assert_eq!(subset.sequences()[0].genome_id().as_ref(), "g2");
    }
}
