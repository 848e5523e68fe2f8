/*!
Report sinks receive finished genes and failures from the runner as they arrive.
[`TsvReportWriter`] writes one tab-separated table per record type and flushes after every gene, so partial output survives an interrupted run.
*/

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::aggregate::LevelSummary;
use crate::mutations::{MutationEffect, MutationRecord, PropertyClass};
use crate::pipeline::{GeneFailure, GeneReport};
use crate::sequence::SequenceKind;

/// Consumer of per-gene results
pub trait ReportSink {
    /// Records one analyzed gene
    fn write_gene(&mut self, report: &GeneReport) -> Result<(), Box<dyn std::error::Error>>;

    /// Records one failed gene
    fn write_failure(&mut self, failure: &GeneFailure) -> Result<(), Box<dyn std::error::Error>>;

    /// Called once after the last gene
    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

/// Keeps all results in memory
#[derive(Debug, Default)]
pub struct MemoryReport {
    reports: Vec<GeneReport>,
    failures: Vec<GeneFailure>,
    finished: bool
}

impl MemoryReport {
    /// Looks up the report of a gene
    pub fn report(&self, gene_id: &str) -> Option<&GeneReport> {
        self.reports.iter().find(|r| r.gene_id().as_ref() == gene_id)
    }

    // getters
    pub fn reports(&self) -> &[GeneReport] {
        &self.reports
    }

    pub fn failures(&self) -> &[GeneFailure] {
        &self.failures
    }

    pub fn finished(&self) -> bool {
        self.finished
    }
}

impl ReportSink for MemoryReport {
    fn write_gene(&mut self, report: &GeneReport) -> Result<(), Box<dyn std::error::Error>> {
        self.reports.push(report.clone());
        Ok(())
    }

    fn write_failure(&mut self, failure: &GeneFailure) -> Result<(), Box<dyn std::error::Error>> {
        self.failures.push(failure.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.finished = true;
        Ok(())
    }
}

pub const GENE_SUMMARY_FILE: &str = "gene_summary.tsv";
pub const COLUMNS_FILE: &str = "columns.tsv";
pub const VARIANTS_FILE: &str = "variants.tsv";
pub const MUTATIONS_FILE: &str = "mutations.tsv";
pub const QC_REJECTIONS_FILE: &str = "qc_rejections.tsv";
pub const FAILURES_FILE: &str = "failures.tsv";

/// One line of `gene_summary.tsv`
#[derive(Debug, Serialize)]
struct GeneSummaryRow {
    gene_id: Arc<str>,
    total_sequences: usize,
    qc_rejected: usize,
    nucleotide_alleles: usize,
    protein_alleles: usize,
    dominant_allele_frequency: f64,
    nucleotide_consensus: String,
    protein_consensus: String,
    nucleotide_mean_conservation: f64,
    protein_mean_conservation: f64,
    nucleotide_conserved_columns: usize,
    protein_conserved_columns: usize,
    nucleotide_substitutions: usize,
    nucleotide_insertions: usize,
    nucleotide_deletions: usize,
    protein_substitutions: usize,
    protein_insertions: usize,
    protein_deletions: usize,
    synonymous: usize,
    missense: usize,
    nonsense: usize,
    stop_lost: usize,
    indeterminate: usize
}

impl GeneSummaryRow {
    fn new(report: &GeneReport) -> GeneSummaryRow {
        let summary = &report.summary;
        let histogram = &summary.mutations;
        GeneSummaryRow {
            gene_id: summary.gene_id.clone(),
            total_sequences: summary.total_sequences,
            qc_rejected: report.rejections.len(),
            nucleotide_alleles: summary.alleles.nucleotide_alleles,
            protein_alleles: summary.alleles.protein_alleles,
            dominant_allele_frequency: summary.alleles.dominant_allele_frequency,
            nucleotide_consensus: String::from_utf8_lossy(report.nucleotide_consensus.ungapped()).into_owned(),
            protein_consensus: String::from_utf8_lossy(report.protein_consensus.ungapped()).into_owned(),
            nucleotide_mean_conservation: summary.nucleotide.mean_conservation,
            protein_mean_conservation: summary.amino_acid.mean_conservation,
            nucleotide_conserved_columns: summary.nucleotide.conserved_columns,
            protein_conserved_columns: summary.amino_acid.conserved_columns,
            nucleotide_substitutions: summary.nucleotide.variants.substitutions,
            nucleotide_insertions: summary.nucleotide.variants.insertions,
            nucleotide_deletions: summary.nucleotide.variants.deletions,
            protein_substitutions: summary.amino_acid.variants.substitutions,
            protein_insertions: summary.amino_acid.variants.insertions,
            protein_deletions: summary.amino_acid.variants.deletions,
            synonymous: histogram.count(MutationEffect::Synonymous),
            missense: histogram.count(MutationEffect::Missense),
            nonsense: histogram.count(MutationEffect::Nonsense),
            stop_lost: histogram.count(MutationEffect::StopLost),
            indeterminate: histogram.count(MutationEffect::Indeterminate)
        }
    }
}

/// One line of `columns.tsv`
#[derive(Debug, Serialize)]
struct ColumnRow {
    gene_id: Arc<str>,
    level: SequenceKind,
    column: usize,
    consensus: char,
    conservation: Option<f64>,
    insertion_rate: Option<f64>
}

/// One line of `mutations.tsv`, the amino-acid change is flattened into columns
#[derive(Debug, Serialize)]
struct MutationRow {
    gene_id: Arc<str>,
    codon_index: usize,
    consensus_codon: usize,
    genome_id: Arc<str>,
    reference_codon: String,
    observed_codon: String,
    base_changes: usize,
    effect: MutationEffect,
    reference_amino_acid: char,
    observed_amino_acid: char,
    reference_class: PropertyClass,
    observed_class: PropertyClass
}

impl MutationRow {
    fn new(mutation: &MutationRecord) -> MutationRow {
        MutationRow {
            gene_id: mutation.gene_id.clone(),
            codon_index: mutation.codon_index,
            consensus_codon: mutation.consensus_codon,
            genome_id: mutation.genome_id.clone(),
            reference_codon: mutation.reference_codon.to_string(),
            observed_codon: mutation.observed_codon.to_string(),
            base_changes: mutation.base_changes,
            effect: mutation.effect,
            reference_amino_acid: mutation.amino_acids.reference,
            observed_amino_acid: mutation.amino_acids.observed,
            reference_class: mutation.amino_acids.reference_class,
            observed_class: mutation.amino_acids.observed_class
        }
    }
}

type TsvWriter = csv::Writer<File>;

/// Writes results as tab-separated tables in one output directory
pub struct TsvReportWriter {
    output_dir: PathBuf,
    summaries: TsvWriter,
    columns: TsvWriter,
    variants: TsvWriter,
    mutations: TsvWriter,
    rejections: TsvWriter,
    failures: TsvWriter
}

impl TsvReportWriter {
    /// Creates the output directory if needed and opens every table
    /// # Errors
    /// * if the directory or any of the files cannot be created
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<TsvReportWriter, Box<dyn std::error::Error>> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        let open = |name: &str| -> Result<TsvWriter, Box<dyn std::error::Error>> {
            let writer = csv::WriterBuilder::new()
                .delimiter(b'\t')
                .from_path(output_dir.join(name))?;
            Ok(writer)
        };
        Ok(TsvReportWriter {
            summaries: open(GENE_SUMMARY_FILE)?,
            columns: open(COLUMNS_FILE)?,
            variants: open(VARIANTS_FILE)?,
            mutations: open(MUTATIONS_FILE)?,
            rejections: open(QC_REJECTIONS_FILE)?,
            failures: open(FAILURES_FILE)?,
            output_dir
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_columns(&mut self, gene_id: &Arc<str>, level: &LevelSummary) -> Result<(), Box<dyn std::error::Error>> {
        for column in level.columns.iter() {
            self.columns.serialize(ColumnRow {
                gene_id: gene_id.clone(),
                level: level.level,
                column: column.column,
                consensus: column.consensus,
                conservation: column.conservation,
                insertion_rate: column.insertion_rate
            })?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        for writer in [
            &mut self.summaries, &mut self.columns, &mut self.variants,
            &mut self.mutations, &mut self.rejections, &mut self.failures
        ] {
            writer.flush()?;
        }
        Ok(())
    }
}

impl ReportSink for TsvReportWriter {
    fn write_gene(&mut self, report: &GeneReport) -> Result<(), Box<dyn std::error::Error>> {
        let gene_id = report.gene_id().clone();
        self.summaries.serialize(GeneSummaryRow::new(report))?;
        self.write_columns(&gene_id, &report.summary.nucleotide)?;
        self.write_columns(&gene_id, &report.summary.amino_acid)?;
        for variant in report.nucleotide_variants.iter().chain(report.amino_acid_variants.iter()) {
            self.variants.serialize(variant)?;
        }
        for mutation in report.mutations.iter() {
            self.mutations.serialize(MutationRow::new(mutation))?;
        }
        for rejection in report.rejections.iter() {
            self.rejections.serialize(rejection)?;
        }
        self.flush()
    }

    fn write_failure(&mut self, failure: &GeneFailure) -> Result<(), Box<dyn std::error::Error>> {
        self.failures.serialize(failure)?;
        self.failures.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.flush()?;
        debug!("Finished writing reports to {:?}", self.output_dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::AnalysisConfig;
    use crate::errors::Stage;
    use crate::events::LogSink;
    use crate::pipeline::{Analysis, GenePipeline};
    use crate::sequence::{Sequence, SequenceSet};

    fn report() -> GeneReport {
        let analysis = Analysis::new(AnalysisConfig::default()).unwrap();
        let pipeline = GenePipeline::new(&analysis, &LogSink);
        let set = SequenceSet::new("geneB", SequenceKind::Nucleotide, vec![
            Sequence::new("g1", b"ATGGAATAA"),
            Sequence::new("g2", b"ATGGACTAA"),
            Sequence::new("g3", b"ATGGAATA")
        ]).unwrap();
        pipeline.run(&set).unwrap()
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_memory_report() {
        let mut sink = MemoryReport::default();
        sink.write_gene(&report()).unwrap();
        sink.write_failure(&GeneFailure::new(Arc::from("geneZ"), Stage::Provider, "missing".to_string())).unwrap();
        sink.finish().unwrap();
        assert!(sink.finished());
        assert!(sink.report("geneB").is_some());
        assert!(sink.report("geneZ").is_none());
        assert_eq!(sink.failures().len(), 1);
    }

    #[test]
    fn test_tsv_writer() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("out");
        let mut writer = TsvReportWriter::new(&output_dir).unwrap();
        writer.write_gene(&report()).unwrap();

        // everything for the gene is on disk before finish
        let summaries = read_lines(&output_dir.join(GENE_SUMMARY_FILE));
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].starts_with("gene_id\ttotal_sequences\tqc_rejected"));
        assert!(summaries[1].starts_with("geneB\t2\t1\t2\t2\t0.5\tATGGACTAA\tMD*\t"));

        let columns = read_lines(&output_dir.join(COLUMNS_FILE));
        assert_eq!(columns.len(), 1 + 9 + 3);
        assert_eq!(columns[1], "geneB\tNucleotide\t0\tA\t1.0\t");

        let variants = read_lines(&output_dir.join(VARIANTS_FILE));
        assert_eq!(variants[0], "gene_id\tlevel\tcolumn\tconsensus_position\tgenome_id\tobserved\tconsensus\tkind");
        assert_eq!(variants[1], "geneB\tNucleotide\t5\t6\tg1\tA\tC\tSubstitution");
        assert_eq!(variants[2], "geneB\tAminoAcid\t1\t2\tg1\tE\tD\tSubstitution");

        let mutations = read_lines(&output_dir.join(MUTATIONS_FILE));
        assert_eq!(mutations[1], "geneB\t1\t2\tg1\tGAC\tGAA\t1\tMissense\tD\tE\tNegative\tNegative");

        let rejections = read_lines(&output_dir.join(QC_REJECTIONS_FILE));
        assert_eq!(rejections[1], "geneB\tg3\tNotCodonAligned\t8");

        writer.write_failure(&GeneFailure::new(Arc::from("geneZ"), Stage::Alignment, "too few".to_string())).unwrap();
        writer.finish().unwrap();
        let failures = read_lines(&output_dir.join(FAILURES_FILE));
        assert_eq!(failures, vec!["gene_id\tstage\tmessage", "geneZ\tAlignment\ttoo few"]);
    }
}
