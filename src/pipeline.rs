/*!
The per-gene unit of work.
[`Analysis`] holds the shared read-only tables, [`GenePipeline`] runs every stage for one gene in order and turns any error or panic into a [`GeneFailure`] attributed to the stage it came from.
Caught panics still pass through the process-wide panic hook, which prints to stderr unless the binary replaces it.

# Example usage
```rust
use alleleome::config::AnalysisConfig;
use alleleome::events::LogSink;
use alleleome::pipeline::{Analysis, GenePipeline};
use alleleome::sequence::{Sequence, SequenceKind, SequenceSet};

let analysis = Analysis::new(AnalysisConfig::default()).unwrap();
let pipeline = GenePipeline::new(&analysis, &LogSink);
let set = SequenceSet::new("geneA", SequenceKind::Nucleotide, vec![
    Sequence::new("g1", b"ATGGAATAA"),
    Sequence::new("g2", b"ATGGACTAA")
]).unwrap();

let report = pipeline.run(&set).unwrap();
assert_eq!(report.nucleotide_variants.len(), 1);
assert_eq!(report.mutations.len(), 1);
assert!(!report.mutations[0].is_synonymous());
```
*/

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::aggregate::{aggregate, summarize_level, AlleleStats, GeneSummary};
use crate::aligner::Aligner;
use crate::config::AnalysisConfig;
use crate::consensus::{build_codon_consensus, Consensus};
use crate::errors::{AlleleomeError, Stage};
use crate::events::{EventSink, StageEvents};
use crate::genetic_code::GeneticCode;
use crate::mutations::{MutationClassifier, MutationRecord};
use crate::quality::{QcRejection, QualityFilter};
use crate::scoring::ScoringScheme;
use crate::sequence::SequenceSet;
use crate::variants::{detect_variants, VariantRecord};

/// Shared, read-only state for a whole run
#[derive(Clone, Debug)]
pub struct Analysis {
    config: AnalysisConfig,
    genetic_code: Arc<GeneticCode>,
    scoring: Arc<ScoringScheme>
}

impl Analysis {
    /// Loads the static tables for a run.
    /// # Errors
    /// * if the genetic code or the substitution matrix cannot be loaded, or the gap penalties are invalid
    pub fn new(config: AnalysisConfig) -> Result<Analysis, Box<dyn std::error::Error>> {
        let genetic_code = GeneticCode::load(config.genetic_code)?;
        let scoring = ScoringScheme::new(&config.scoring)?;
        debug!(
            "Loaded genetic code {} and {:?} scoring (gap open {}, extend {})",
            genetic_code.id().ncbi_id(), config.scoring.matrix, config.scoring.gap_open, config.scoring.gap_extend
        );
        Ok(Analysis {
            config,
            genetic_code: Arc::new(genetic_code),
            scoring: Arc::new(scoring)
        })
    }

    // getters
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn genetic_code(&self) -> &GeneticCode {
        &self.genetic_code
    }

    pub fn scoring(&self) -> &ScoringScheme {
        &self.scoring
    }
}

/// Everything produced for one successfully analyzed gene
#[derive(Clone, Debug)]
pub struct GeneReport {
    pub summary: GeneSummary,
    pub nucleotide_consensus: Consensus,
    pub protein_consensus: Consensus,
    pub nucleotide_variants: Vec<VariantRecord>,
    pub amino_acid_variants: Vec<VariantRecord>,
    pub mutations: Vec<MutationRecord>,
    pub rejections: Vec<QcRejection>
}

impl GeneReport {
    pub fn gene_id(&self) -> &Arc<str> {
        &self.summary.gene_id
    }
}

/// A gene that could not be analyzed
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct GeneFailure {
    pub gene_id: Arc<str>,
    pub stage: Stage,
    pub message: String
}

impl GeneFailure {
    pub fn new(gene_id: Arc<str>, stage: Stage, message: String) -> GeneFailure {
        GeneFailure {
            gene_id,
            stage,
            message
        }
    }
}

/// Runs every stage of the analysis for one gene at a time
#[derive(Clone, Copy)]
pub struct GenePipeline<'a> {
    analysis: &'a Analysis,
    sink: &'a dyn EventSink
}

impl<'a> GenePipeline<'a> {
    /// Constructor
    /// # Arguments
    /// * `analysis` - shared tables and configuration
    /// * `sink` - receives the events of every stage
    pub fn new(analysis: &'a Analysis, sink: &'a dyn EventSink) -> GenePipeline<'a> {
        GenePipeline {
            analysis,
            sink
        }
    }

    /// Analyzes one gene.
    /// Errors and panics are caught here and returned as a failure of the stage that was running.
    /// # Arguments
    /// * `set` - the nucleotide sequences of the gene
    pub fn run(&self, set: &SequenceSet) -> Result<GeneReport, GeneFailure> {
        self.guarded(set.gene_id(), |progress| self.run_stages(set, progress))
    }

    /// Runs `stages` and turns a panic into a failure of the stage last recorded in `progress`.
    /// The panic is reported through the event sink, but the process-wide panic hook still runs first;
    /// binaries that want panics only in their logs need to install their own hook.
    fn guarded<T>(
        &self, gene_id: &Arc<str>, stages: impl FnOnce(&Cell<Stage>) -> Result<T, GeneFailure>
    ) -> Result<T, GeneFailure> {
        let progress = Cell::new(Stage::QualityControl);
        match panic::catch_unwind(AssertUnwindSafe(|| stages(&progress))) {
            Ok(result) => result,
            Err(payload) => {
                let stage = progress.get();
                let message = format!("panic: {}", panic_message(payload.as_ref()));
                StageEvents::new(self.sink, gene_id, stage).error(&message);
                Err(GeneFailure::new(gene_id.clone(), stage, message))
            }
        }
    }

    fn run_stages(&self, set: &SequenceSet, progress: &Cell<Stage>) -> Result<GeneReport, GeneFailure> {
        let gene_id = set.gene_id();
        let events = StageEvents::new(self.sink, gene_id, Stage::QualityControl);
        let enter = |stage: Stage| {
            progress.set(stage);
            events.with_stage(stage)
        };
        let fail = |stage_events: &StageEvents, error: AlleleomeError| {
            let message = error.to_string();
            stage_events.error(&message);
            GeneFailure::new(gene_id.clone(), stage_events.stage(), message)
        };

        let stage_events = enter(Stage::QualityControl);
        let filter = QualityFilter::new(&self.analysis.config.quality, &self.analysis.genetic_code);
        let outcome = filter.filter(set, &stage_events).map_err(|e| fail(&stage_events, e))?;
        let kept = outcome.kept;
        let total_sequences = kept.len();

        let stage_events = enter(Stage::Alignment);
        let aligner = Aligner::new(&self.analysis.scoring, &self.analysis.genetic_code);
        let codons = aligner.align_codons(&kept, &stage_events).map_err(|e| fail(&stage_events, e))?;

        let stage_events = enter(Stage::Consensus);
        let (protein_consensus, nucleotide_consensus) = build_codon_consensus(&codons)
            .map_err(|e| fail(&stage_events, e))?;
        stage_events.trace(&format!(
            "protein consensus {}", String::from_utf8_lossy(protein_consensus.ungapped())
        ));

        let stage_events = enter(Stage::Variants);
        let nucleotide_variants = detect_variants(gene_id, codons.nucleotide(), &nucleotide_consensus)
            .map_err(|e| fail(&stage_events, e))?;
        let amino_acid_variants = detect_variants(gene_id, codons.protein(), &protein_consensus)
            .map_err(|e| fail(&stage_events, e))?;
        stage_events.debug(&format!(
            "{} nucleotide and {} amino acid variants", nucleotide_variants.len(), amino_acid_variants.len()
        ));

        let stage_events = enter(Stage::Mutations);
        let classifier = MutationClassifier::new(&self.analysis.genetic_code);
        let mutations = classifier.classify_variants(gene_id, codons.nucleotide(), &nucleotide_consensus, &nucleotide_variants)
            .map_err(|e| fail(&stage_events, e))?;

        let stage_events = enter(Stage::Aggregation);
        let summary = aggregate(
            gene_id, total_sequences, AlleleStats::from_alignment(&codons),
            summarize_level(&nucleotide_consensus, &nucleotide_variants, total_sequences),
            summarize_level(&protein_consensus, &amino_acid_variants, total_sequences),
            &mutations
        );
        stage_events.debug(&format!(
            "{} sequences, {} alleles, mean amino acid conservation {:.4}",
            total_sequences, summary.alleles.nucleotide_alleles, summary.amino_acid.mean_conservation
        ));

        Ok(GeneReport {
            summary,
            nucleotide_consensus,
            protein_consensus,
            nucleotide_variants,
            amino_acid_variants,
            mutations,
            rejections: outcome.rejected
        })
    }
}

/// Extracts the message of a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
