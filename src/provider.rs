/*!
Gene providers hand the pipeline one nucleotide [`SequenceSet`] per gene.
Providers are lazy: sequences for a gene are only read when the iterator reaches it, so the runner can start working before all input is loaded.
*/

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bio::io::fasta;
use log::{debug, warn};
use serde::Deserialize;

use crate::config::AnalysisMode;
use crate::errors::{AlleleomeError, AlleleomeResult};
use crate::sequence::{Sequence, SequenceKind, SequenceSet};

/// One gene from a provider; the sequences may have failed to load
pub type GeneItem = (Arc<str>, AlleleomeResult<SequenceSet>);

/// Lazy sequence of genes, sendable so that it can be bridged into the worker pool
pub type GeneIter<'a> = Box<dyn Iterator<Item = GeneItem> + Send + 'a>;

/// Source of per-gene sequence sets
pub trait GeneProvider: Sync {
    /// Starts iterating over the genes.
    /// # Errors
    /// * if the provider cannot start at all, e.g. the gene table is missing; this aborts the run
    fn genes(&self) -> Result<GeneIter<'_>, Box<dyn std::error::Error>>;
}

/// Provider over sets that are already in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryProvider {
    sets: Vec<SequenceSet>
}

impl MemoryProvider {
    pub fn new(sets: Vec<SequenceSet>) -> MemoryProvider {
        MemoryProvider {
            sets
        }
    }

    pub fn sets(&self) -> &[SequenceSet] {
        &self.sets
    }
}

impl GeneProvider for MemoryProvider {
    fn genes(&self) -> Result<GeneIter<'_>, Box<dyn std::error::Error>> {
        Ok(Box::new(self.sets.iter().map(|set| (set.gene_id().clone(), Ok(set.clone())))))
    }
}

/// Default file name of the pangene summary table
pub const DEFAULT_TABLE_NAME: &str = "pangene_summary_v2.csv";

/// FASTA extensions tried in order for each gene
const FASTA_EXTENSIONS: [&str; 4] = ["fna", "fa", "fasta", "ffn"];

/// Class label of core genes in the pangene table
const CORE_CLASS: &str = "Core";

/// One row of the pangene summary table, other columns are ignored
#[derive(Clone, Debug, Deserialize)]
struct PangeneRow {
    gene: String,
    class: String
}

/// Reads a pangene summary table and one FASTA file of ORF sequences per gene
#[derive(Clone, Debug)]
pub struct FastaDirectoryProvider {
    /// Directory holding `<gene>.fna` (or `.fa`, `.fasta`, `.ffn`) files
    sequence_dir: PathBuf,
    /// The pangene summary table
    table_path: PathBuf,
    /// Core genes only, or every gene
    mode: AnalysisMode,
    /// Field delimiter of the table
    delimiter: u8
}

impl FastaDirectoryProvider {
    /// Constructor
    /// # Arguments
    /// * `sequence_dir` - directory with one FASTA file per gene
    /// * `table_path` - the pangene table with `gene` and `class` columns
    /// * `mode` - `Core` yields only genes classified as `Core`, `Pan` yields all of them
    pub fn new(sequence_dir: impl Into<PathBuf>, table_path: impl Into<PathBuf>, mode: AnalysisMode) -> FastaDirectoryProvider {
        FastaDirectoryProvider {
            sequence_dir: sequence_dir.into(),
            table_path: table_path.into(),
            mode,
            delimiter: b','
        }
    }

    /// Changes the table delimiter, e.g. `b'\t'` for a TSV table
    pub fn with_delimiter(mut self, delimiter: u8) -> FastaDirectoryProvider {
        self.delimiter = delimiter;
        self
    }

    /// Reads the gene table and returns the genes selected by the analysis mode, in table order
    fn selected_genes(&self) -> Result<Vec<Arc<str>>, Box<dyn std::error::Error>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .flexible(true)
            .from_path(&self.table_path)?;

        let mut genes = vec![];
        let mut skipped = 0;
        for row in csv_reader.deserialize() {
            let row: PangeneRow = row?;
            if self.mode == AnalysisMode::Pan || row.class == CORE_CLASS {
                genes.push(Arc::from(row.gene.as_str()));
            } else {
                skipped += 1;
            }
        }
        debug!(
            "Selected {} genes from {:?} in {} mode, skipped {}",
            genes.len(), self.table_path, self.mode, skipped
        );
        if genes.is_empty() {
            warn!("No genes selected from {:?}", self.table_path);
        }
        Ok(genes)
    }

    /// Finds and parses the FASTA file of one gene
    fn load_gene(sequence_dir: &Path, gene_id: &Arc<str>) -> AlleleomeResult<SequenceSet> {
        let path = FASTA_EXTENSIONS.iter()
            .map(|extension| sequence_dir.join(format!("{gene_id}.{extension}")))
            .find(|path| path.is_file())
            .ok_or_else(|| AlleleomeError::Provider(format!(
                "no FASTA file for gene {gene_id} in {sequence_dir:?}"
            )))?;

        let file = File::open(&path)
            .map_err(|e| AlleleomeError::Provider(format!("failed to open {path:?}: {e}")))?;
        let sequences = parse_fasta(BufReader::new(file))
            .map_err(|e| AlleleomeError::Provider(format!("{path:?}: {e}")))?;
        if sequences.is_empty() {
            return Err(AlleleomeError::Provider(format!("{path:?} contains no sequences")));
        }
        SequenceSet::new(gene_id.clone(), SequenceKind::Nucleotide, sequences)
    }
}

impl GeneProvider for FastaDirectoryProvider {
    fn genes(&self) -> Result<GeneIter<'_>, Box<dyn std::error::Error>> {
        let genes = self.selected_genes()?;
        let sequence_dir = self.sequence_dir.as_path();
        Ok(Box::new(genes.into_iter().map(move |gene_id| {
            let set = Self::load_gene(sequence_dir, &gene_id);
            (gene_id, set)
        })))
    }
}

/// Parses FASTA records from a reader, the first whitespace-separated word of each header is the genome id.
/// Multi-line sequences are joined and residues are upper-cased.
/// # Errors
/// * on read failures, malformed records, or empty identifiers
pub fn parse_fasta<R: BufRead>(reader: R) -> Result<Vec<Sequence>, String> {
    let mut sequences = vec![];
    for (index, record) in fasta::Reader::from_bufread(reader).records().enumerate() {
        let record_number = index + 1;
        let record = record.map_err(|e| format!("record {record_number}: {e}"))?;
        if record.id().is_empty() {
            return Err(format!("empty sequence identifier in record {record_number}"));
        }
        sequences.push(Sequence::new(record.id(), record.seq()));
    }
    Ok(sequences)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    fn write_file(path: &Path, content: &str) {
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_parse_fasta() {
        let content = ">g1 some description\nATGAAA\nTAA\n\n>g2\natgaaataa\n>g3\r\natg\r\ntaa\r\n";
        let sequences = parse_fasta(content.as_bytes()).unwrap();
        assert_eq!(sequences.len(), 3);
        assert_eq!(sequences[2].residues(), b"ATGTAA");
        assert_eq!(sequences[0].genome_id().as_ref(), "g1");
        assert_eq!(sequences[0].residues(), b"ATGAAATAA");
        assert_eq!(sequences[1].residues(), b"ATGAAATAA");
    }

    #[test]
    fn test_parse_fasta_errors() {
        assert!(parse_fasta("ATG\n>g1\nATG\n".as_bytes()).unwrap_err().starts_with("record 1: "));
        assert_eq!(parse_fasta(">g1\nATG\n> \nATG\n".as_bytes()).unwrap_err(), "empty sequence identifier in record 2");
        assert!(parse_fasta("".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_memory_provider() {
        let set = SequenceSet::new("geneA", SequenceKind::Nucleotide, vec![Sequence::new("g1", b"ATG")]).unwrap();
        let provider = MemoryProvider::new(vec![set.clone()]);
        let genes: Vec<GeneItem> = provider.genes().unwrap().collect();
        assert_eq!(genes.len(), 1);
        assert_eq!(genes[0].0.as_ref(), "geneA");
        assert_eq!(genes[0].1.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_directory_provider_modes() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join(DEFAULT_TABLE_NAME);
        write_file(&table, "gene,class,frequency\ngeneA,Core,1.0\ngeneB,Accessory,0.4\ngeneC,Core,0.99\n");
        write_file(&dir.path().join("geneA.fna"), ">g1\nATGAAATAA\n>g2\nATGAAGTAA\n");
        write_file(&dir.path().join("geneB.fasta"), ">g1\nATGCCCTAA\n");
        write_file(&dir.path().join("geneC.fa"), ">g1\nATGTAA\n>g1\nATGTAA\n");

        let core = FastaDirectoryProvider::new(dir.path(), &table, AnalysisMode::Core);
        let genes: Vec<GeneItem> = core.genes().unwrap().collect();
        let ids: Vec<&str> = genes.iter().map(|(id, _set)| id.as_ref()).collect();
        assert_eq!(ids, vec!["geneA", "geneC"]);
        assert_eq!(genes[0].1.as_ref().unwrap().len(), 2);
        // duplicate genome ids fail only that gene
        assert!(matches!(genes[1].1, Err(AlleleomeError::Provider(_))));

        let pan = FastaDirectoryProvider::new(dir.path(), &table, AnalysisMode::Pan);
        let genes: Vec<GeneItem> = pan.genes().unwrap().collect();
        assert_eq!(genes.len(), 3);
        assert_eq!(genes[1].1.as_ref().unwrap().sequences()[0].residues(), b"ATGCCCTAA");
    }

    #[test]
    fn test_directory_provider_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("genes.tsv");

        // a missing table aborts before any gene is produced
        let provider = FastaDirectoryProvider::new(dir.path(), &table, AnalysisMode::Pan);
        assert!(provider.genes().is_err());

        write_file(&table, "gene\tclass\ngeneA\tCore\ngeneB\tCore\n");
        write_file(&dir.path().join("geneB.ffn"), "");
        let provider = FastaDirectoryProvider::new(dir.path(), &table, AnalysisMode::Core).with_delimiter(b'\t');
        let genes: Vec<GeneItem> = provider.genes().unwrap().collect();
        assert_eq!(genes.len(), 2);
        match &genes[0].1 {
            Err(AlleleomeError::Provider(message)) => assert!(message.starts_with("no FASTA file for gene geneA")),
            other => panic!("unexpected result {other:?}")
        }
        match &genes[1].1 {
            Err(AlleleomeError::Provider(message)) => assert!(message.ends_with("contains no sequences")),
            other => panic!("unexpected result {other:?}")
        }
    }
}
