/*!
# alleleome
This library characterizes allele variation across the genes of a pan-genome.
For each gene, the ORF sequences of every genome are filtered, codon-aligned, collapsed to a consensus, and compared back against that consensus at both the nucleotide and the amino acid level.

Key features:
* Codon-aware progressive alignment: proteins are aligned and the nucleotides are threaded onto the protein alignment, so indels never break the reading frame
* Majority-vote consensus with deterministic tie-breaking
* Per-sequence variant calls (substitutions, insertions, deletions) and per-codon mutation effects (synonymous, missense, nonsense, stop-lost)
* Genes are analyzed in parallel, and a failing gene is reported without stopping the run

# Example usage
```rust
use alleleome::config::AnalysisConfig;
use alleleome::events::LogSink;
use alleleome::mutations::MutationEffect;
use alleleome::pipeline::{Analysis, GenePipeline};
use alleleome::sequence::{Sequence, SequenceKind, SequenceSet};

let set = SequenceSet::new("geneA", SequenceKind::Nucleotide, vec![
    Sequence::new("genome1", b"ATGAAATTTTAA"),
    Sequence::new("genome2", b"ATGAAATTTTAA"),
    Sequence::new("genome3", b"ATGAAGTTTTAA") // synonymous AAA -> AAG
]).unwrap();

let analysis = Analysis::new(AnalysisConfig::default()).unwrap();
let report = GenePipeline::new(&analysis, &LogSink).run(&set).unwrap();
assert_eq!(report.nucleotide_consensus.ungapped(), b"ATGAAATTTTAA");
assert_eq!(report.protein_consensus.ungapped(), b"MKF*");
assert_eq!(report.mutations.len(), 1);
assert_eq!(report.mutations[0].effect, MutationEffect::Synonymous);
assert_eq!(report.summary.mutations.synonymous, 1);
```
*/

/// Per-gene statistics rolled up from the variant and mutation calls
pub mod aggregate;
/// Progressive protein alignment and codon threading
pub mod aligner;
/// Alignment containers
pub mod alignment;
/// Configuration for an analysis run
pub mod config;
/// Column-wise majority consensus
pub mod consensus;
/// Error types for the per-gene pipeline
pub mod errors;
/// Gene-scoped event logging
pub mod events;
/// Utility for generating examples
pub mod example_gen;
/// Codon translation tables
pub mod genetic_code;
/// Guide tree construction for progressive alignment
pub mod guide_tree;
/// Codon-level mutation effects
pub mod mutations;
/// The per-gene pipeline and its shared state
pub mod pipeline;
/// Alignment profiles and profile-profile dynamic programming
pub mod profile;
/// Sources of per-gene sequence sets
pub mod provider;
/// Pre-alignment ORF quality control
pub mod quality;
/// Output sinks for reports and failures
pub mod report;
/// Parallel execution over all genes
pub mod runner;
/// Substitution matrices and gap penalties
pub mod scoring;
/// Basic sequence types
pub mod sequence;
/// Per-sequence variant calls against a consensus
pub mod variants;
