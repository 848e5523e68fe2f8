/*!
Runs the gene pipeline over every gene of a provider on a rayon worker pool.
Workers send each finished gene over a bounded channel to the calling thread, which hands it to the report sink straight away.
A failing gene is recorded and the run continues; only plumbing errors (thread pool, provider start, report output) abort the run.

# Example usage
```rust
use alleleome::config::AnalysisConfig;
use alleleome::events::LogSink;
use alleleome::pipeline::Analysis;
use alleleome::provider::MemoryProvider;
use alleleome::report::MemoryReport;
use alleleome::runner::Runner;
use alleleome::sequence::{Sequence, SequenceKind, SequenceSet};

let analysis = Analysis::new(AnalysisConfig::default()).unwrap();
let provider = MemoryProvider::new(vec![
    SequenceSet::new("geneA", SequenceKind::Nucleotide, vec![
        Sequence::new("g1", b"ATGAAATAA"),
        Sequence::new("g2", b"ATGAAGTAA")
    ]).unwrap()
]);

let mut report = MemoryReport::default();
let summary = Runner::new(&analysis, &LogSink).run(&provider, &mut report).unwrap();
assert_eq!(summary.succeeded, 1);
assert_eq!(report.reports().len(), 1);
```
*/

use std::sync::mpsc;
use std::thread;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use simple_error::bail;

use crate::errors::Stage;
use crate::events::{EventSink, StageEvents};
use crate::pipeline::{Analysis, GeneFailure, GenePipeline, GeneReport};
use crate::provider::GeneProvider;
use crate::report::ReportSink;

/// Counts for a finished run
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RunSummary {
    /// Genes that reached the pipeline
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<GeneFailure>
}

/// The result of one gene as it travels back from a worker
type GeneOutcome = Result<GeneReport, GeneFailure>;

/// Drives a whole analysis run
#[derive(Clone, Copy)]
pub struct Runner<'a> {
    analysis: &'a Analysis,
    events: &'a dyn EventSink
}

impl<'a> Runner<'a> {
    /// Constructor
    /// # Arguments
    /// * `analysis` - shared tables and configuration
    /// * `events` - receives per-gene events from every worker
    pub fn new(analysis: &'a Analysis, events: &'a dyn EventSink) -> Runner<'a> {
        Runner {
            analysis,
            events
        }
    }

    /// Analyzes every gene from `provider` and hands the results to `report` as they complete.
    /// Genes finish in no particular order.
    /// # Arguments
    /// * `provider` - source of the per-gene sequence sets
    /// * `report` - receives every report and failure
    /// # Errors
    /// * if the worker pool cannot be built or the channel capacity is 0
    /// * if the provider cannot start
    /// * if the report sink fails to write
    pub fn run(&self, provider: &dyn GeneProvider, report: &mut dyn ReportSink) -> Result<RunSummary, Box<dyn std::error::Error>> {
        let config = self.analysis.config();
        if config.channel_capacity == 0 {
            bail!("channel_capacity must be at least 1");
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()?;
        info!("Starting {} mode analysis on {} threads", config.mode, pool.current_num_threads());

        let genes = provider.genes()?;
        let pipeline = GenePipeline::new(self.analysis, self.events);
        let events = self.events;
        let (sender, receiver) = mpsc::sync_channel::<GeneOutcome>(config.channel_capacity);

        thread::scope(|scope| -> Result<RunSummary, Box<dyn std::error::Error>> {
            let workers = scope.spawn(move || {
                pool.install(|| {
                    // a closed channel means the report sink gave up, so stop pulling genes
                    let _ = genes.par_bridge().try_for_each_with(sender, |sender, (gene_id, set)| {
                        let outcome = match set {
                            Ok(set) => pipeline.run(&set),
                            Err(error) => {
                                let message = error.to_string();
                                StageEvents::new(events, &gene_id, Stage::Provider).error(&message);
                                Err(GeneFailure::new(gene_id, Stage::Provider, message))
                            }
                        };
                        sender.send(outcome)
                    });
                });
            });

            let mut summary = RunSummary::default();
            for outcome in receiver {
                summary.attempted += 1;
                match outcome {
                    Ok(gene_report) => {
                        debug!("Writing results for {}", gene_report.gene_id());
                        report.write_gene(&gene_report)?;
                        summary.succeeded += 1;
                    },
                    Err(failure) => {
                        report.write_failure(&failure)?;
                        summary.failed += 1;
                        summary.failures.push(failure);
                    }
                }
            }

            if workers.join().is_err() {
                bail!("worker pool panicked");
            }
            report.finish()?;

            if summary.failed > 0 {
                warn!("{} of {} genes failed", summary.failed, summary.attempted);
            }
            info!("Finished analysis: {} genes succeeded, {} failed", summary.succeeded, summary.failed);
            Ok(summary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use std::sync::Arc;

    use crate::config::{AnalysisConfigBuilder, AnalysisMode};
    use crate::errors::AlleleomeError;
    use crate::events::{LogSink, RecordingSink};
    use crate::provider::{FastaDirectoryProvider, GeneItem, GeneIter, MemoryProvider, DEFAULT_TABLE_NAME};
    use crate::report::{MemoryReport, TsvReportWriter, FAILURES_FILE, GENE_SUMMARY_FILE};
    use crate::sequence::{Sequence, SequenceKind, SequenceSet};

    fn gene(gene_id: &str, residues: &[&[u8]]) -> SequenceSet {
        let sequences = residues.iter().enumerate()
            .map(|(i, r)| Sequence::new(format!("genome{i}"), r))
            .collect();
        SequenceSet::new(gene_id, SequenceKind::Nucleotide, sequences).unwrap()
    }

    fn analysis(threads: usize) -> Analysis {
        let config = AnalysisConfigBuilder::default()
            .threads(threads)
            .channel_capacity(2)
            .build().unwrap();
        Analysis::new(config).unwrap()
    }

    /// Yields fixed items, including genes that failed to load
    struct FixedProvider {
        items: Vec<GeneItem>
    }

    impl GeneProvider for FixedProvider {
        fn genes(&self) -> Result<GeneIter<'_>, Box<dyn std::error::Error>> {
            Ok(Box::new(self.items.clone().into_iter()))
        }
    }

    /// Refuses every write
    struct BrokenReport;

    impl ReportSink for BrokenReport {
        fn write_gene(&mut self, _report: &GeneReport) -> Result<(), Box<dyn std::error::Error>> {
            bail!("disk full");
        }

        fn write_failure(&mut self, _failure: &GeneFailure) -> Result<(), Box<dyn std::error::Error>> {
            bail!("disk full");
        }

        fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
    }

    #[test_log::test]
    fn test_failing_gene_isolated() {
        let analysis = analysis(2);
        let provider = MemoryProvider::new(vec![
            gene("geneA", &[b"ATGAAATAA", b"ATGAAATAA"]),
            gene("geneB", &[b"ATGAAATAA"]),
            gene("geneC", &[b"ATGGAATAA", b"ATGGACTAA", b"ATGGAATAA"])
        ]);
        let sink = RecordingSink::default();
        let mut report = MemoryReport::default();
        let summary = Runner::new(&analysis, &sink).run(&provider, &mut report).unwrap();

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].gene_id.as_ref(), "geneB");
        assert_eq!(summary.failures[0].stage, Stage::Alignment);

        assert!(report.finished());
        assert!(report.report("geneA").is_some());
        assert_eq!(report.report("geneC").unwrap().mutations.len(), 1);
        assert_eq!(report.failures().len(), 1);

        // events from concurrent genes keep their gene attribution
        let errors: Vec<_> = sink.events().into_iter()
            .filter(|e| e.level == log::Level::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].gene_id, "geneB");
    }

    #[test]
    fn test_provider_errors() {
        let analysis = analysis(1);
        let provider = FixedProvider {
            items: vec![
                (Arc::from("geneA"), Ok(gene("geneA", &[b"ATGAAATAA", b"ATGAAGTAA"]))),
                (Arc::from("geneB"), Err(AlleleomeError::Provider("no FASTA file for gene geneB".to_string())))
            ]
        };
        let mut report = MemoryReport::default();
        let summary = Runner::new(&analysis, &LogSink).run(&provider, &mut report).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failures, vec![GeneFailure::new(
            Arc::from("geneB"), Stage::Provider, "provider error: no FASTA file for gene geneB".to_string()
        )]);
    }

    #[test]
    fn test_report_errors_abort() {
        let analysis = analysis(2);
        let sets = (0..10)
            .map(|i| gene(&format!("gene{i}"), &[b"ATGAAATAA", b"ATGAAGTAA"]))
            .collect();
        let provider = MemoryProvider::new(sets);
        let result = Runner::new(&analysis, &LogSink).run(&provider, &mut BrokenReport);
        assert_eq!(result.unwrap_err().to_string(), "disk full");
    }

    #[test]
    fn test_zero_capacity() {
        let config = AnalysisConfigBuilder::default().channel_capacity(0).build().unwrap();
        let analysis = Analysis::new(config).unwrap();
        let provider = MemoryProvider::default();
        let result = Runner::new(&analysis, &LogSink).run(&provider, &mut MemoryReport::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_directory_to_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("genes");
        fs::create_dir_all(&input).unwrap();
        let table = dir.path().join(DEFAULT_TABLE_NAME);
        fs::write(&table, "gene,class\ngeneA,Core\ngeneB,Core\ngeneC,Accessory\n").unwrap();
        fs::write(input.join("geneA.fna"), ">g1\nATGAAACCCGGGTTTTAA\n>g2\nATGAAACCCGGGTTTTAA\n>g3\nATGAAACCCTTTTAA\n").unwrap();
        fs::write(input.join("geneC.fna"), ">g1\nATGTAA\n>g2\nATGTAG\n").unwrap();

        let analysis = Analysis::new(AnalysisConfigBuilder::default().mode(AnalysisMode::Core).build().unwrap()).unwrap();
        let provider = FastaDirectoryProvider::new(&input, &table, analysis.config().mode);
        let output = dir.path().join("out");
        let mut writer = TsvReportWriter::new(&output).unwrap();
        let summary = Runner::new(&analysis, &LogSink).run(&provider, &mut writer).unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failures[0].stage, Stage::Provider);

        let summaries = fs::read_to_string(output.join(GENE_SUMMARY_FILE)).unwrap();
        assert_eq!(summaries.lines().count(), 2);
        assert!(summaries.lines().nth(1).unwrap().starts_with("geneA\t3\t0\t2\t2\t"));
        let failures = fs::read_to_string(output.join(FAILURES_FILE)).unwrap();
        assert!(failures.lines().nth(1).unwrap().starts_with("geneB\tProvider\t"));
    }
}
