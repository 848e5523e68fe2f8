/*!
Residue scoring for alignment: the BLOSUM62 amino-acid matrix, nucleotide match/mismatch scores and affine gap penalties.
Everything here is built once per run and shared read-only between workers.
*/

use rustc_hash::FxHashMap as HashMap;

use crate::config::{ScoringConfig, SubstitutionMatrixKind};
use crate::errors::{AlleleomeError, AlleleomeResult};
use crate::sequence::SequenceKind;

/// BLOSUM62 as published by NCBI
const BLOSUM62: &str = "\
   A  R  N  D  C  Q  E  G  H  I  L  K  M  F  P  S  T  W  Y  V  B  Z  X  *
A  4 -1 -2 -2  0 -1 -1  0 -2 -1 -1 -1 -1 -2 -1  1  0 -3 -2  0 -2 -1  0 -4
R -1  5  0 -2 -3  1  0 -2  0 -3 -2  2 -1 -3 -2 -1 -1 -3 -2 -3 -1  0 -1 -4
N -2  0  6  1 -3  0  0  0  1 -3 -3  0 -2 -3 -2  1  0 -4 -2 -3  3  0 -1 -4
D -2 -2  1  6 -3  0  2 -1 -1 -3 -4 -1 -3 -3 -1  0 -1 -4 -3 -3  4  1 -1 -4
C  0 -3 -3 -3  9 -3 -4 -3 -3 -1 -1 -3 -1 -2 -3 -1 -1 -2 -2 -1 -3 -3 -2 -4
Q -1  1  0  0 -3  5  2 -2  0 -3 -2  1  0 -3 -1  0 -1 -2 -1 -2  0  3 -1 -4
E -1  0  0  2 -4  2  5 -2  0 -3 -3  1 -2 -3 -1  0 -1 -3 -2 -2  1  4 -1 -4
G  0 -2  0 -1 -3 -2 -2  6 -2 -4 -4 -2 -3 -3 -2  0 -2 -2 -3 -3 -1 -2 -1 -4
H -2  0  1 -1 -3  0  0 -2  8 -3 -3 -1 -2 -1 -2 -1 -2 -2  2 -3  0  0 -1 -4
I -1 -3 -3 -3 -1 -3 -3 -4 -3  4  2 -3  1  0 -3 -2 -1 -3 -1  3 -3 -3 -1 -4
L -1 -2 -3 -4 -1 -2 -3 -4 -3  2  4 -2  2  0 -3 -2 -1 -2 -1  1 -4 -3 -1 -4
K -1  2  0 -1 -3  1  1 -2 -1 -3 -2  5 -1 -3 -1  0 -1 -3 -2 -2  0  1 -1 -4
M -1 -1 -2 -3 -1  0 -2 -3 -2  1  2 -1  5  0 -2 -1 -1 -1 -1  1 -3 -1 -1 -4
F -2 -3 -3 -3 -2 -3 -3 -3 -1  0  0 -3  0  6 -4 -2 -2  1  3 -1 -3 -3 -1 -4
P -1 -2 -2 -1 -3 -1 -1 -2 -2 -3 -3 -1 -2 -4  7 -1 -1 -4 -3 -2 -2 -1 -2 -4
S  1 -1  1  0 -1  0  0  0 -1 -2 -2  0 -1 -2 -1  4  1 -3 -2 -2  0  0  0 -4
T  0 -1  0 -1 -1 -1 -1 -2 -2 -1 -1 -1 -1 -2 -1  1  5 -2 -2  0 -1 -1  0 -4
W -3 -3 -4 -4 -2 -2 -3 -2 -2 -3 -2 -3 -1  1 -4 -3 -2 11  2 -3 -4 -3 -2 -4
Y -2 -2 -2 -3 -2 -1 -2 -3  2 -1 -1 -2 -1  3 -3 -2 -2  2  7 -1 -3 -2 -1 -4
V  0 -3 -3 -3 -1 -2 -2 -3 -3  3  1 -2  1 -1 -2 -2  0 -3 -1  4 -3 -2 -1 -4
B -2 -1  3  4 -3  0  1 -1  0 -3 -4  0 -3 -3 -2  0 -1 -4 -3 -3  4  1 -1 -4
Z -1  0  0  1 -3  3  4 -2  0 -3 -3  1 -1 -3 -1  0 -1 -3 -2 -2  1  4 -1 -4
X  0 -1 -1 -1 -2 -1 -1 -1 -1 -1 -1 -1 -1 -1 -2  0  0 -2 -1 -1 -1 -1 -1 -4
* -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4 -4  1
";

/// A square, symmetric substitution matrix keyed by residue letters
#[derive(Clone, Debug)]
pub struct SubstitutionMatrix {
    letters: Vec<u8>,
    index: HashMap<u8, usize>,
    scores: Vec<i32>
}

impl SubstitutionMatrix {
    /// Returns the built-in BLOSUM62 matrix.
    /// # Errors
    /// * if the embedded table fails to parse
    pub fn blosum62() -> AlleleomeResult<SubstitutionMatrix> {
        Self::parse(BLOSUM62)
    }

    /// Parses a matrix in the NCBI text layout: a header of column letters followed by one row per letter.
    /// # Arguments
    /// * `text` - the full matrix text, `#` lines are comments
    /// # Errors
    /// * if the matrix is not square, has unparseable scores, or is not symmetric
    pub fn parse(text: &str) -> AlleleomeResult<SubstitutionMatrix> {
        let mut lines = text.lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty() && !l.starts_with('#'));

        let header = lines.next()
            .ok_or_else(|| AlleleomeError::StaticTable("substitution matrix is empty".to_string()))?;
        let letters: Vec<u8> = header.split_whitespace()
            .map(|token| token.as_bytes()[0])
            .collect();
        let n = letters.len();
        let index: HashMap<u8, usize> = letters.iter().enumerate()
            .map(|(i, &l)| (l, i))
            .collect();
        if index.len() != n {
            return Err(AlleleomeError::StaticTable("substitution matrix header has duplicate letters".to_string()));
        }

        let mut scores = vec![0; n * n];
        let mut rows_seen = 0;
        for line in lines {
            let mut tokens = line.split_whitespace();
            let row_letter = tokens.next().map(|t| t.as_bytes()[0]).unwrap_or(b' ');
            let row = *index.get(&row_letter).ok_or_else(|| AlleleomeError::StaticTable(
                format!("substitution matrix row {:?} is not in the header", row_letter as char)
            ))?;
            let values: Vec<i32> = tokens
                .map(|t| t.parse::<i32>())
                .collect::<Result<_, _>>()
                .map_err(|e| AlleleomeError::StaticTable(format!("substitution matrix row {:?}: {e}", row_letter as char)))?;
            if values.len() != n {
                return Err(AlleleomeError::StaticTable(format!(
                    "substitution matrix row {:?} has {} scores, expected {n}", row_letter as char, values.len()
                )));
            }
            scores[row * n..(row + 1) * n].copy_from_slice(&values);
            rows_seen += 1;
        }

        if rows_seen != n {
            return Err(AlleleomeError::StaticTable(format!("substitution matrix has {rows_seen} rows, expected {n}")));
        }
        for i in 0..n {
            for j in (i + 1)..n {
                if scores[i * n + j] != scores[j * n + i] {
                    return Err(AlleleomeError::StaticTable(format!(
                        "substitution matrix is not symmetric at {:?}/{:?}", letters[i] as char, letters[j] as char
                    )));
                }
            }
        }

        Ok(SubstitutionMatrix {
            letters,
            index,
            scores
        })
    }

    /// Score for a pair of residues, None if either is not in the matrix
    pub fn score(&self, a: u8, b: u8) -> Option<i32> {
        let i = *self.index.get(&a)?;
        let j = *self.index.get(&b)?;
        Some(self.scores[i * self.letters.len() + j])
    }

    pub fn letters(&self) -> &[u8] {
        &self.letters
    }
}

/// Dense scores over one alphabet, indexed by residue position in [`SequenceKind::alphabet`]
#[derive(Clone, Debug)]
pub struct ResidueScores {
    alphabet: &'static [u8],
    lookup: [Option<u8>; 256],
    scores: Vec<f64>
}

impl ResidueScores {
    /// Builds the dense table for `kind`
    /// # Errors
    /// * if the matrix lacks a residue of the alphabet
    fn new(kind: SequenceKind, config: &ScoringConfig, matrix: Option<&SubstitutionMatrix>) -> AlleleomeResult<ResidueScores> {
        let alphabet = kind.alphabet();
        let ambiguous = kind.ambiguous_symbol();
        let n = alphabet.len();
        let mut lookup = [None; 256];
        for (i, &residue) in alphabet.iter().enumerate() {
            lookup[residue as usize] = Some(i as u8);
        }

        let mut scores = vec![0.0; n * n];
        for (i, &a) in alphabet.iter().enumerate() {
            for (j, &b) in alphabet.iter().enumerate() {
                let score = match matrix {
                    Some(m) => m.score(a, b).ok_or_else(|| AlleleomeError::StaticTable(
                        format!("substitution matrix has no score for {:?}/{:?}", a as char, b as char)
                    ))?,
                    None if a == ambiguous || b == ambiguous => 0,
                    None if a == b => config.match_score,
                    None => config.mismatch_score
                };
                scores[i * n + j] = score as f64;
            }
        }

        Ok(ResidueScores {
            alphabet,
            lookup,
            scores
        })
    }

    /// Position of a residue in the alphabet, None for gaps and foreign symbols
    pub fn index_of(&self, residue: u8) -> Option<usize> {
        self.lookup[residue as usize].map(|i| i as usize)
    }

    /// Score by alphabet index
    pub fn score_index(&self, i: usize, j: usize) -> f64 {
        self.scores[i * self.alphabet.len() + j]
    }

    /// Score by residue, gaps and foreign symbols score 0
    pub fn score(&self, a: u8, b: u8) -> f64 {
        match (self.index_of(a), self.index_of(b)) {
            (Some(i), Some(j)) => self.score_index(i, j),
            _ => 0.0
        }
    }

    pub fn alphabet(&self) -> &'static [u8] {
        self.alphabet
    }

    pub fn alphabet_len(&self) -> usize {
        self.alphabet.len()
    }
}

/// The full scoring scheme: dense tables for both alphabets plus gap penalties
#[derive(Clone, Debug)]
pub struct ScoringScheme {
    nucleotide: ResidueScores,
    amino_acid: ResidueScores,
    gap_open: f64,
    gap_extend: f64
}

impl ScoringScheme {
    /// Loads the matrix selected in `config` and builds both tables.
    /// # Errors
    /// * if the gap penalties are negative or `gap_extend > gap_open`
    /// * if the substitution matrix fails to load
    pub fn new(config: &ScoringConfig) -> AlleleomeResult<ScoringScheme> {
        if config.gap_extend < 0 || config.gap_open < config.gap_extend {
            return Err(AlleleomeError::StaticTable(format!(
                "gap penalties must satisfy 0 <= gap_extend <= gap_open, found open={} extend={}",
                config.gap_open, config.gap_extend
            )));
        }
        let matrix = match config.matrix {
            SubstitutionMatrixKind::Blosum62 => Some(SubstitutionMatrix::blosum62()?),
            SubstitutionMatrixKind::Identity => None
        };
        Ok(ScoringScheme {
            nucleotide: ResidueScores::new(SequenceKind::Nucleotide, config, None)?,
            amino_acid: ResidueScores::new(SequenceKind::AminoAcid, config, matrix.as_ref())?,
            gap_open: config.gap_open as f64,
            gap_extend: config.gap_extend as f64
        })
    }

    /// The residue table for one alphabet
    pub fn residues(&self, kind: SequenceKind) -> &ResidueScores {
        match kind {
            SequenceKind::Nucleotide => &self.nucleotide,
            SequenceKind::AminoAcid => &self.amino_acid
        }
    }

    pub fn gap_open(&self) -> f64 {
        self.gap_open
    }

    pub fn gap_extend(&self) -> f64 {
        self.gap_extend
    }
}
