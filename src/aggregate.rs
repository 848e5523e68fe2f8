/*!
Folds the per-cell and per-codon records of one gene into descriptive summary statistics.
Everything here is a pure function of its inputs, so re-running aggregation on the same records gives the same summary.
*/

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashSet as HashSet;
use serde::Serialize;

use crate::alignment::CodonAlignment;
use crate::consensus::Consensus;
use crate::mutations::{MutationEffect, MutationRecord, PropertyClass};
use crate::sequence::{SequenceKind, GAP};
use crate::variants::{VariantKind, VariantRecord};

/// Statistics for one alignment column
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnStat {
    /// 0-based alignment column
    pub column: usize,
    /// Consensus symbol, `-` for gap-consensus columns
    pub consensus: char,
    /// Fraction of sequences matching the consensus; None on gap-consensus columns
    pub conservation: Option<f64>,
    /// Fraction of sequences with an insertion; None on residue-consensus columns
    pub insertion_rate: Option<f64>
}

/// Number of variant records of each kind
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct VariantCounts {
    pub substitutions: usize,
    pub insertions: usize,
    pub deletions: usize
}

impl VariantCounts {
    fn add(&mut self, kind: VariantKind) {
        match kind {
            VariantKind::Substitution => self.substitutions += 1,
            VariantKind::Insertion => self.insertions += 1,
            VariantKind::Deletion => self.deletions += 1
        }
    }

    pub fn total(&self) -> usize {
        self.substitutions + self.insertions + self.deletions
    }
}

/// Summary of one alignment level (nucleotide or amino acid)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LevelSummary {
    pub level: SequenceKind,
    pub columns: Vec<ColumnStat>,
    pub variants: VariantCounts,
    /// Mean conservation over the residue-consensus columns
    pub mean_conservation: f64,
    /// Residue-consensus columns where every sequence matches
    pub conserved_columns: usize,
    /// Number of residue-consensus columns
    pub consensus_length: usize
}

/// Tallies of the mutation records of one gene
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MutationHistogram {
    pub by_effect: BTreeMap<MutationEffect, usize>,
    pub synonymous: usize,
    /// Missense, nonsense and stop-lost changes
    pub non_synonymous: usize,
    pub indeterminate: usize,
    /// (reference class, observed class) transitions of the non-synonymous changes
    pub class_transitions: BTreeMap<(PropertyClass, PropertyClass), usize>
}

impl MutationHistogram {
    /// Tallies mutation records
    pub fn from_records(mutations: &[MutationRecord]) -> MutationHistogram {
        let mut histogram = MutationHistogram::default();
        for mutation in mutations.iter() {
            *histogram.by_effect.entry(mutation.effect).or_insert(0) += 1;
            match mutation.effect {
                MutationEffect::Synonymous => histogram.synonymous += 1,
                MutationEffect::Indeterminate => histogram.indeterminate += 1,
                MutationEffect::Missense |
                MutationEffect::Nonsense |
                MutationEffect::StopLost => {
                    histogram.non_synonymous += 1;
                    let transition = (mutation.amino_acids.reference_class, mutation.amino_acids.observed_class);
                    *histogram.class_transitions.entry(transition).or_insert(0) += 1;
                }
            }
        }
        histogram
    }

    /// Count for one effect, 0 if absent
    pub fn count(&self, effect: MutationEffect) -> usize {
        self.by_effect.get(&effect).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.by_effect.values().sum()
    }
}

/// Allele diversity of one gene
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlleleStats {
    /// Distinct nucleotide sequences
    pub nucleotide_alleles: usize,
    /// Distinct protein sequences
    pub protein_alleles: usize,
    /// Fraction of sequences carrying the most common nucleotide allele
    pub dominant_allele_frequency: f64
}

impl AlleleStats {
    /// Counts alleles from the aligned rows; identical inputs always produce identical aligned rows
    pub fn from_alignment(alignment: &CodonAlignment) -> AlleleStats {
        let nucleotide = alignment.nucleotide();
        let mut counts: BTreeMap<&[u8], usize> = BTreeMap::new();
        for row in nucleotide.rows().iter() {
            *counts.entry(row.as_slice()).or_insert(0) += 1;
        }
        let proteins: HashSet<&[u8]> = alignment.protein().rows().iter()
            .map(|r| r.as_slice())
            .collect();

        let dominant = counts.values().max().copied().unwrap_or(0);
        let dominant_allele_frequency = if nucleotide.num_rows() == 0 {
            0.0
        } else {
            dominant as f64 / nucleotide.num_rows() as f64
        };

        AlleleStats {
            nucleotide_alleles: counts.len(),
            protein_alleles: proteins.len(),
            dominant_allele_frequency
        }
    }
}

/// The final per-gene summary
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeneSummary {
    pub gene_id: Arc<str>,
    pub total_sequences: usize,
    pub alleles: AlleleStats,
    pub nucleotide: LevelSummary,
    pub amino_acid: LevelSummary,
    pub mutations: MutationHistogram
}

/// Computes the per-column statistics of one alignment level.
/// Conservation on a residue-consensus column is `(total - substitutions - deletions) / total`;
/// gap-consensus columns report an insertion rate instead.
/// # Arguments
/// * `consensus` - the consensus of the level
/// * `variants` - variant records; records of another level are ignored
/// * `total_sequences` - number of aligned sequences
pub fn summarize_level(consensus: &Consensus, variants: &[VariantRecord], total_sequences: usize) -> LevelSummary {
    let level = consensus.kind();
    let mut per_column: Vec<VariantCounts> = vec![Default::default(); consensus.width()];
    let mut counts = VariantCounts::default();
    let width = per_column.len();
    for variant in variants.iter().filter(|v| v.level == level && v.column < width) {
        per_column[variant.column].add(variant.kind);
        counts.add(variant.kind);
    }

    let total = total_sequences.max(1) as f64;
    let mut conservation_sum = 0.0;
    let mut conserved_columns = 0;
    let mut consensus_length = 0;
    let columns: Vec<ColumnStat> = consensus.gapped().iter().zip(per_column.iter()).enumerate()
        .map(|(column, (&symbol, column_counts))| {
            if symbol == GAP {
                ColumnStat {
                    column,
                    consensus: symbol as char,
                    conservation: None,
                    insertion_rate: Some(column_counts.insertions as f64 / total)
                }
            } else {
                let mismatched = column_counts.substitutions + column_counts.deletions;
                let conservation = total_sequences.saturating_sub(mismatched) as f64 / total;
                conservation_sum += conservation;
                consensus_length += 1;
                if mismatched == 0 {
                    conserved_columns += 1;
                }
                ColumnStat {
                    column,
                    consensus: symbol as char,
                    conservation: Some(conservation),
                    insertion_rate: None
                }
            }
        })
        .collect();

    let mean_conservation = if consensus_length == 0 {
        0.0
    } else {
        conservation_sum / consensus_length as f64
    };

    LevelSummary {
        level,
        columns,
        variants: counts,
        mean_conservation,
        conserved_columns,
        consensus_length
    }
}

/// Assembles the gene summary from the level summaries and mutation records
pub fn aggregate(
    gene_id: &Arc<str>, total_sequences: usize, alleles: AlleleStats,
    nucleotide: LevelSummary, amino_acid: LevelSummary, mutations: &[MutationRecord]
) -> GeneSummary {
    GeneSummary {
        gene_id: gene_id.clone(),
        total_sequences,
        alleles,
        nucleotide,
        amino_acid,
        mutations: MutationHistogram::from_records(mutations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::alignment::Alignment;
    use crate::consensus::{build_codon_consensus, build_consensus};
    use crate::genetic_code::{GeneticCode, GeneticCodeId};
    use crate::mutations::MutationClassifier;
    use crate::variants::detect_variants;

    fn ids(n: usize) -> Vec<Arc<str>> {
        (0..n).map(|i| Arc::from(format!("g{i}"))).collect()
    }

    fn alignment(kind: SequenceKind, rows: &[&[u8]]) -> Alignment {
        Alignment::new(kind, ids(rows.len()), rows.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    #[test]
    fn test_fully_conserved() {
        let gene_id: Arc<str> = Arc::from("geneA");
        let msa = alignment(SequenceKind::Nucleotide, &[b"ATGAAATAA", b"ATGAAATAA", b"ATGAAATAA"]);
        let consensus = build_consensus(&msa).unwrap();
        let variants = detect_variants(&gene_id, &msa, &consensus).unwrap();
        let summary = summarize_level(&consensus, &variants, 3);
        assert_eq!(summary.columns.len(), 9);
        assert!(summary.columns.iter().all(|c| c.conservation == Some(1.0)));
        assert_eq!(summary.mean_conservation, 1.0);
        assert_eq!(summary.conserved_columns, 9);
        assert_eq!(summary.variants.total(), 0);
    }

    #[test]
    fn test_gap_columns() {
        let gene_id: Arc<str> = Arc::from("geneA");
        let msa = alignment(SequenceKind::AminoAcid, &[
            b"MK-L*",
            b"MKAL*",
            b"MR-L*",
            b"M--L*"
        ]);
        let consensus = build_consensus(&msa).unwrap();
        let variants = detect_variants(&gene_id, &msa, &consensus).unwrap();
        let summary = summarize_level(&consensus, &variants, 4);

        assert_eq!(summary.columns[1].conservation, Some(0.5));
        assert_eq!(summary.columns[2].conservation, None);
        assert_eq!(summary.columns[2].insertion_rate, Some(0.25));
        assert_eq!(summary.columns[2].consensus, '-');
        assert_eq!(summary.consensus_length, 4);
        assert_eq!(summary.conserved_columns, 3);
        assert_eq!(summary.mean_conservation, 3.5 / 4.0);
        assert_eq!(summary.variants, VariantCounts { substitutions: 1, insertions: 1, deletions: 1 });
    }

    #[test]
    fn test_other_level_ignored() {
        let gene_id: Arc<str> = Arc::from("geneA");
        let protein = alignment(SequenceKind::AminoAcid, &[b"MK*", b"MR*"]);
        let nucleotide = alignment(SequenceKind::Nucleotide, &[b"ATGAAATAA", b"ATGAGATAA"]);
        let protein_consensus = build_consensus(&protein).unwrap();
        let nucleotide_consensus = build_consensus(&nucleotide).unwrap();
        let protein_variants = detect_variants(&gene_id, &protein, &protein_consensus).unwrap();
        let summary = summarize_level(&nucleotide_consensus, &protein_variants, 2);
        assert_eq!(summary.variants.total(), 0);
    }

    #[test]
    fn test_histogram() {
        let code = GeneticCode::load(GeneticCodeId::Standard).unwrap();
        let classifier = MutationClassifier::new(&code);
        let gene_id: Arc<str> = Arc::from("geneA");
        let msa = alignment(SequenceKind::Nucleotide, &[
            b"ATGGAACTTTGGTAA",
            b"ATGGAGCTTTGGTAA",
            b"ATGGACCTTTGATAA",
            b"ATGGAACGTTGGTAA",
            b"ATGGAACTTTGGTAA"
        ]);
        let consensus = build_consensus(&msa).unwrap();
        let variants = detect_variants(&gene_id, &msa, &consensus).unwrap();
        let mutations = classifier.classify_variants(&gene_id, &msa, &consensus, &variants).unwrap();
        let histogram = MutationHistogram::from_records(&mutations);

        assert_eq!(histogram.total(), 4);
        assert_eq!(histogram.synonymous, 1);
        assert_eq!(histogram.non_synonymous, 3);
        assert_eq!(histogram.count(MutationEffect::Missense), 2);
        assert_eq!(histogram.count(MutationEffect::Nonsense), 1);
        assert_eq!(histogram.count(MutationEffect::StopLost), 0);
        assert_eq!(histogram.class_transitions.get(&(PropertyClass::Negative, PropertyClass::Negative)), Some(&1));
        assert_eq!(histogram.class_transitions.get(&(PropertyClass::Hydrophobic, PropertyClass::Positive)), Some(&1));
        assert_eq!(histogram.class_transitions.get(&(PropertyClass::Hydrophobic, PropertyClass::Stop)), Some(&1));
    }

    #[test]
    fn test_allele_stats() {
        let protein = Alignment::new(SequenceKind::AminoAcid, ids(4), vec![
            b"MK*".to_vec(), b"MK*".to_vec(), b"MK*".to_vec(), b"MR*".to_vec()
        ]).unwrap();
        let nucleotide = Alignment::new(SequenceKind::Nucleotide, ids(4), vec![
            b"ATGAAATAA".to_vec(), b"ATGAAATAA".to_vec(), b"ATGAAGTAA".to_vec(), b"ATGAGATAA".to_vec()
        ]).unwrap();
        let stats = AlleleStats::from_alignment(&CodonAlignment::new(protein, nucleotide).unwrap());
        assert_eq!(stats.nucleotide_alleles, 3);
        assert_eq!(stats.protein_alleles, 2);
        assert_eq!(stats.dominant_allele_frequency, 0.5);
    }

    #[test]
    fn test_aggregate_idempotent() {
        let code = GeneticCode::load(GeneticCodeId::Standard).unwrap();
        let classifier = MutationClassifier::new(&code);
        let gene_id: Arc<str> = Arc::from("geneA");
        let protein = alignment(SequenceKind::AminoAcid, &[b"MPE*", b"MPE*", b"M-D*"]);
        let nucleotide = alignment(SequenceKind::Nucleotide, &[
            b"ATGCCCGAATAA",
            b"ATGCCCGAATAA",
            b"ATG---GACTAA"
        ]);
        let codons = CodonAlignment::new(protein, nucleotide).unwrap();
        let (protein_consensus, nucleotide_consensus) = build_codon_consensus(&codons).unwrap();
        let nt_variants = detect_variants(&gene_id, codons.nucleotide(), &nucleotide_consensus).unwrap();
        let aa_variants = detect_variants(&gene_id, codons.protein(), &protein_consensus).unwrap();
        let mutations = classifier.classify_variants(&gene_id, codons.nucleotide(), &nucleotide_consensus, &nt_variants).unwrap();

        let run = || aggregate(
            &gene_id, 3, AlleleStats::from_alignment(&codons),
            summarize_level(&nucleotide_consensus, &nt_variants, 3),
            summarize_level(&protein_consensus, &aa_variants, 3),
            &mutations
        );
        let first = run();
        let second = run();
        assert_eq!(first, second);
        assert_eq!(first.mutations.non_synonymous, 1);
        assert_eq!(first.amino_acid.variants.deletions, 1);
        assert_eq!(first.nucleotide.variants.deletions, 3);
    }
}
