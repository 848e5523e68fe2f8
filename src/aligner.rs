/*!
Progressive multiple sequence alignment of one gene's sequences.
Identical sequences are collapsed into alleles, a UPGMA guide tree orders the merges, and profiles are merged with affine-gap global alignment.
For codon analysis, proteins are aligned and the nucleotides are threaded through the protein alignment so that every codon stays in frame.

# Example usage
```rust
use alleleome::aligner::Aligner;
use alleleome::config::ScoringConfig;
use alleleome::events::{LogSink, StageEvents};
use alleleome::errors::Stage;
use alleleome::genetic_code::{GeneticCode, GeneticCodeId};
use alleleome::scoring::ScoringScheme;
use alleleome::sequence::{Sequence, SequenceKind};

let scoring = ScoringScheme::new(&ScoringConfig::default()).unwrap();
let code = GeneticCode::load(GeneticCodeId::Standard).unwrap();
let aligner = Aligner::new(&scoring, &code);
let events = StageEvents::new(&LogSink, "geneA", Stage::Alignment);

let sequences = [
    Sequence::new("g1", b"ATGCCCGGGTAA"),
    Sequence::new("g2", b"ATGCCCTAA")
];
let alignment = aligner.align(SequenceKind::Nucleotide, &sequences, &events).unwrap();
assert_eq!(alignment.row(1), b"ATGCCC---TAA");
```
*/

use std::sync::Arc;

use rustc_hash::FxHashMap as HashMap;

use crate::alignment::{Alignment, CodonAlignment};
use crate::errors::{AlleleomeError, AlleleomeResult};
use crate::events::StageEvents;
use crate::genetic_code::GeneticCode;
use crate::guide_tree::GuideTree;
use crate::profile::{align_profiles, Profile};
use crate::scoring::ScoringScheme;
use crate::sequence::{Sequence, SequenceKind, SequenceSet, GAP};

/// Distinct residue strings with the input rows that carry them
#[derive(Debug)]
struct Alleles<'s> {
    /// Unique residue strings, in first-occurrence order
    unique: Vec<&'s [u8]>,
    /// For every input sequence, the index of its allele
    assignment: Vec<usize>,
    /// How many input sequences carry each allele
    counts: Vec<usize>
}

impl<'s> Alleles<'s> {
    fn collapse(sequences: &'s [Sequence]) -> Alleles<'s> {
        let mut lookup: HashMap<&'s [u8], usize> = Default::default();
        let mut unique = vec![];
        let mut counts = vec![];
        let assignment = sequences.iter()
            .map(|s| {
                let index = *lookup.entry(s.residues()).or_insert_with(|| {
                    unique.push(s.residues());
                    counts.push(0);
                    unique.len() - 1
                });
                counts[index] += 1;
                index
            })
            .collect();
        Alleles {
            unique,
            assignment,
            counts
        }
    }
}

/// Builds alignments with a fixed scoring scheme and genetic code
#[derive(Clone, Copy, Debug)]
pub struct Aligner<'a> {
    scoring: &'a ScoringScheme,
    genetic_code: &'a GeneticCode
}

impl<'a> Aligner<'a> {
    /// Constructor
    /// # Arguments
    /// * `scoring` - residue scores and gap penalties
    /// * `genetic_code` - translation table used by [`Aligner::align_codons`]
    pub fn new(scoring: &'a ScoringScheme, genetic_code: &'a GeneticCode) -> Aligner<'a> {
        Aligner {
            scoring,
            genetic_code
        }
    }

    /// Aligns sequences of one alphabet into a multiple sequence alignment.
    /// Rows of the result follow the input order.
    /// # Arguments
    /// * `kind` - the alphabet of `sequences`
    /// * `sequences` - two or more sequences of the same gene
    /// * `events` - event sink for this gene
    /// # Errors
    /// * if fewer than 2 sequences are provided
    /// * if any sequence contains a symbol outside the alphabet
    /// * if every sequence is empty
    pub fn align(&self, kind: SequenceKind, sequences: &[Sequence], events: &StageEvents) -> AlleleomeResult<Alignment> {
        if sequences.len() < 2 {
            return Err(AlleleomeError::Alignment(format!(
                "need at least 2 sequences to align, found {}", sequences.len()
            )));
        }
        for sequence in sequences.iter() {
            sequence.validate(kind)?;
        }
        if sequences.iter().all(|s| s.is_empty()) {
            return Err(AlleleomeError::Alignment("all sequences are empty".to_string()));
        }

        let alleles = Alleles::collapse(sequences);
        events.debug(&format!(
            "aligning {} {} sequences as {} unique alleles",
            sequences.len(), kind.label(), alleles.unique.len()
        ));

        let allele_rows = self.align_alleles(kind, &alleles, events)?;
        let row_ids: Vec<Arc<str>> = sequences.iter().map(|s| s.genome_id().clone()).collect();
        let rows: Vec<Vec<u8>> = alleles.assignment.iter()
            .map(|&a| allele_rows[a].clone())
            .collect();
        Alignment::new(kind, row_ids, rows)
    }

    /// Progressive alignment of the unique alleles, returns one aligned row per allele
    fn align_alleles(&self, kind: SequenceKind, alleles: &Alleles, events: &StageEvents) -> AlleleomeResult<Vec<Vec<u8>>> {
        if alleles.unique.len() == 1 {
            return Ok(vec![alleles.unique[0].to_vec()]);
        }

        let scores = self.scoring.residues(kind);
        let tree = GuideTree::build(&alleles.unique, Some(kind.ambiguous_symbol()));

        // profiles are indexed by guide tree cluster id; merged clusters are taken out as they are consumed
        let mut profiles: Vec<Option<Profile>> = alleles.unique.iter().enumerate()
            .map(|(i, residues)| Some(Profile::from_sequence(i, residues, alleles.counts[i] as f64, scores)))
            .collect();

        for merge in tree.merges() {
            let left = profiles[merge.left].take()
                .ok_or_else(|| AlleleomeError::Alignment(format!("guide tree reused cluster {}", merge.left)))?;
            let right = profiles[merge.right].take()
                .ok_or_else(|| AlleleomeError::Alignment(format!("guide tree reused cluster {}", merge.right)))?;
            let (ops, score) = align_profiles(&left, &right, self.scoring, scores);
            events.trace(&format!(
                "merged clusters {} + {} (distance {:.4}) into {} with score {score}",
                merge.left, merge.right, merge.distance, merge.id
            ));
            profiles.push(Some(Profile::merge(&left, &right, &ops, scores)));
        }

        let root = profiles.pop().flatten()
            .ok_or_else(|| AlleleomeError::Alignment("guide tree produced no root".to_string()))?;

        let mut allele_rows: Vec<Vec<u8>> = vec![vec![]; alleles.unique.len()];
        for (&member, row) in root.members().iter().zip(root.rows().iter()) {
            allele_rows[member] = row.clone();
        }
        Ok(allele_rows)
    }

    /// Aligns a nucleotide set codon by codon.
    /// Sequences are translated, the proteins are aligned, and each protein gap becomes a gapped codon in the nucleotide alignment.
    /// # Arguments
    /// * `set` - the nucleotide sequences of one gene
    /// * `events` - event sink for this gene
    /// # Errors
    /// * if the set is not nucleotide, has fewer than 2 sequences, or contains invalid symbols
    /// * if any sequence length is not a multiple of 3
    pub fn align_codons(&self, set: &SequenceSet, events: &StageEvents) -> AlleleomeResult<CodonAlignment> {
        if set.kind() != SequenceKind::Nucleotide {
            return Err(AlleleomeError::Alignment("codon alignment requires nucleotide sequences".to_string()));
        }
        if set.len() < 2 {
            return Err(AlleleomeError::Alignment(format!(
                "need at least 2 sequences to align, found {}", set.len()
            )));
        }
        for sequence in set.sequences().iter() {
            sequence.validate(SequenceKind::Nucleotide)?;
            if sequence.len() % 3 != 0 {
                return Err(AlleleomeError::Alignment(format!(
                    "sequence {} has length {}, which is not a multiple of 3", sequence.genome_id(), sequence.len()
                )));
            }
        }

        let proteins: Vec<Sequence> = set.sequences().iter()
            .map(|s| Sequence::new(s.genome_id().clone(), &self.genetic_code.translate_sequence(s.residues())))
            .collect();
        let protein = self.align(SequenceKind::AminoAcid, &proteins, events)?;

        let rows: Vec<Vec<u8>> = set.sequences().iter().enumerate()
            .map(|(r, sequence)| thread_codons(protein.row(r), sequence.residues()))
            .collect();
        let row_ids = protein.row_ids().to_vec();
        let nucleotide = Alignment::new(SequenceKind::Nucleotide, row_ids, rows)?;
        events.debug(&format!(
            "codon alignment has {} protein columns and {} nucleotide columns", protein.width(), nucleotide.width()
        ));
        CodonAlignment::new(protein, nucleotide)
    }
}

/// Expands an aligned protein row into its nucleotide row, three gaps per protein gap
fn thread_codons(protein_row: &[u8], nucleotides: &[u8]) -> Vec<u8> {
    let mut codons = nucleotides.chunks_exact(3);
    let mut row = Vec::with_capacity(protein_row.len() * 3);
    for &residue in protein_row.iter() {
        let codon = if residue == GAP { None } else { codons.next() };
        match codon {
            Some(codon) => row.extend_from_slice(codon),
            None => row.extend_from_slice(&[GAP; 3])
        }
    }
    row
}
