/*!
Fixed genetic code tables and the codon type.
Tables are parsed once from the NCBI one-line representation (codon order TCAG) and then shared read-only between workers.
```
use alleleome::genetic_code::{Codon, GeneticCode, GeneticCodeId};
let code = GeneticCode::load(GeneticCodeId::Standard).unwrap();
assert_eq!(code.translate(&Codon::new(b"GAA").unwrap()), b'E');
assert_eq!(code.translate(&Codon::new(b"GAN").unwrap()), b'X');
```
*/

use std::fmt;

use serde::{Serialize, Serializer};

use crate::errors::{AlleleomeError, AlleleomeResult};

/// Amino acids for the standard code, NCBI TCAG order
const STANDARD_AMINO_ACIDS: &str = "FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";
/// Start codons for the standard code (TTG, CTG, ATG)
const STANDARD_STARTS: &str = "---M---------------M---------------M----------------------------";
/// Start codons for the bacterial, archaeal and plant plastid code (TTG, CTG, ATT, ATC, ATA, ATG, GTG)
const BACTERIAL_STARTS: &str = "---M---------------M------------MMMM---------------M------------";

/// Which NCBI translation table to use
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum GeneticCodeId {
    /// NCBI table 1
    #[default]
    Standard,
    /// NCBI table 11, same amino acids as table 1 but more alternative start codons
    Bacterial
}

impl GeneticCodeId {
    /// The NCBI table number
    pub fn ncbi_id(&self) -> u8 {
        match self {
            GeneticCodeId::Standard => 1,
            GeneticCodeId::Bacterial => 11
        }
    }
}

/// Maps a nucleotide to its TCAG index
fn base_index(base: u8) -> Option<usize> {
    match base {
        b'T' => Some(0),
        b'C' => Some(1),
        b'A' => Some(2),
        b'G' => Some(3),
        _ => None
    }
}

/// A codon of exactly three nucleotides; `N` is allowed and makes the codon indeterminate
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Codon([u8; 3]);

impl Codon {
    /// Creates a codon after validating the symbols.
    /// # Arguments
    /// * `symbols` - the three nucleotides, upper-case
    /// # Errors
    /// * if `symbols` is not exactly three symbols from A, C, G, T, N
    pub fn new(symbols: &[u8]) -> AlleleomeResult<Codon> {
        if symbols.len() != 3 {
            return Err(AlleleomeError::InvalidCodon(format!(
                "expected 3 nucleotides, found {} in {:?}", symbols.len(), String::from_utf8_lossy(symbols)
            )));
        }
        if let Some(&bad) = symbols.iter().find(|&&s| base_index(s).is_none() && s != b'N') {
            return Err(AlleleomeError::InvalidCodon(format!(
                "symbol {:?} is not a nucleotide in {:?}", bad as char, String::from_utf8_lossy(symbols)
            )));
        }
        Ok(Codon([symbols[0], symbols[1], symbols[2]]))
    }

    /// Returns true if any base is `N`
    pub fn is_indeterminate(&self) -> bool {
        self.0.contains(&b'N')
    }

    /// Number of positions that differ from `other`
    pub fn differences(&self, other: &Codon) -> usize {
        self.0.iter().zip(other.0.iter()).filter(|(a, b)| a != b).count()
    }

    /// Index into the 64-entry TCAG table, None if indeterminate
    fn table_index(&self) -> Option<usize> {
        let b1 = base_index(self.0[0])?;
        let b2 = base_index(self.0[1])?;
        let b3 = base_index(self.0[2])?;
        Some(b1 * 16 + b2 * 4 + b3)
    }

    pub fn bases(&self) -> &[u8; 3] {
        &self.0
    }
}

impl fmt::Display for Codon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for Codon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A loaded genetic code
#[derive(Clone, Debug)]
pub struct GeneticCode {
    id: GeneticCodeId,
    amino_acids: [u8; 64],
    starts: [bool; 64]
}

impl GeneticCode {
    /// Loads one of the built-in tables.
    /// # Errors
    /// * if the built-in table strings are malformed; callers treat this as fatal
    pub fn load(id: GeneticCodeId) -> AlleleomeResult<GeneticCode> {
        let starts = match id {
            GeneticCodeId::Standard => STANDARD_STARTS,
            GeneticCodeId::Bacterial => BACTERIAL_STARTS
        };
        Self::from_ncbi(id, STANDARD_AMINO_ACIDS, starts)
    }

    /// Parses the NCBI one-line representation of a table.
    /// # Arguments
    /// * `id` - identifier for the table
    /// * `ncbieaa` - 64 amino acids in TCAG codon order
    /// * `starts` - 64 symbols in TCAG order, `M` marks a start codon
    /// # Errors
    /// * if either string is not 64 symbols or contains an unknown amino acid
    pub fn from_ncbi(id: GeneticCodeId, ncbieaa: &str, starts: &str) -> AlleleomeResult<GeneticCode> {
        let aa_bytes = ncbieaa.as_bytes();
        let start_bytes = starts.as_bytes();
        if aa_bytes.len() != 64 || start_bytes.len() != 64 {
            return Err(AlleleomeError::StaticTable(format!(
                "genetic code {} must have 64 entries, found {} amino acids and {} start flags",
                id.ncbi_id(), aa_bytes.len(), start_bytes.len()
            )));
        }

        let mut amino_acids = [b'X'; 64];
        let mut start_flags = [false; 64];
        for (i, (&aa, &start)) in aa_bytes.iter().zip(start_bytes.iter()).enumerate() {
            if !crate::sequence::AMINO_ACIDS.contains(&aa) || aa == b'X' {
                return Err(AlleleomeError::StaticTable(format!(
                    "genetic code {} has invalid amino acid {:?} at entry {i}", id.ncbi_id(), aa as char
                )));
            }
            amino_acids[i] = aa;
            start_flags[i] = start == b'M';
        }

        Ok(GeneticCode {
            id,
            amino_acids,
            starts: start_flags
        })
    }

    /// Translates a codon, indeterminate codons become `X`
    pub fn translate(&self, codon: &Codon) -> u8 {
        match codon.table_index() {
            Some(index) => self.amino_acids[index],
            None => b'X'
        }
    }

    /// Translates all complete codons of an ungapped nucleotide sequence.
    /// Anything that is not a valid codon translates to `X`; a trailing partial codon is ignored.
    pub fn translate_sequence(&self, nucleotides: &[u8]) -> Vec<u8> {
        nucleotides.chunks_exact(3)
            .map(|chunk| match Codon::new(chunk) {
                Ok(codon) => self.translate(&codon),
                Err(_e) => b'X'
            })
            .collect()
    }

    pub fn is_start(&self, codon: &Codon) -> bool {
        codon.table_index().map_or(false, |i| self.starts[i])
    }

    pub fn is_stop(&self, codon: &Codon) -> bool {
        self.translate(codon) == b'*'
    }

    pub fn id(&self) -> GeneticCodeId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codon_validation() {
        assert!(Codon::new(b"ATG").is_ok());
        assert!(Codon::new(b"ANG").unwrap().is_indeterminate());
        assert_eq!(
            Codon::new(b"AT").unwrap_err(),
            AlleleomeError::InvalidCodon("expected 3 nucleotides, found 2 in \"AT\"".to_string())
        );
        assert!(matches!(Codon::new(b"A-G"), Err(AlleleomeError::InvalidCodon(_))));
        assert!(matches!(Codon::new(b"ATGC"), Err(AlleleomeError::InvalidCodon(_))));
        assert!(matches!(Codon::new(b"atg"), Err(AlleleomeError::InvalidCodon(_))));
    }

    #[test]
    fn test_standard_translation() {
        let code = GeneticCode::load(GeneticCodeId::Standard).unwrap();
        let expected = [
            (b"ATG", b'M'), (b"TGG", b'W'), (b"GAA", b'E'), (b"GAC", b'D'),
            (b"TAA", b'*'), (b"TAG", b'*'), (b"TGA", b'*'), (b"TTT", b'F'),
            (b"GGG", b'G'), (b"AAA", b'K'), (b"CGT", b'R'), (b"AGT", b'S')
        ];
        for (codon, aa) in expected.iter() {
            assert_eq!(code.translate(&Codon::new(*codon).unwrap()), *aa, "{:?}", codon);
        }
        assert_eq!(code.translate_sequence(b"ATGGAAGACTAAGC"), b"MED*".to_vec());
        assert_eq!(code.translate_sequence(b"ATGNNN"), b"MX".to_vec());
    }

    #[test]
    fn test_start_and_stop() {
        let standard = GeneticCode::load(GeneticCodeId::Standard).unwrap();
        let bacterial = GeneticCode::load(GeneticCodeId::Bacterial).unwrap();
        let gtg = Codon::new(b"GTG").unwrap();
        assert!(!standard.is_start(&gtg));
        assert!(bacterial.is_start(&gtg));
        for codon in [b"ATG", b"TTG", b"CTG"] {
            assert!(standard.is_start(&Codon::new(codon).unwrap()));
        }
        assert!(standard.is_stop(&Codon::new(b"TGA").unwrap()));
        assert!(!standard.is_stop(&Codon::new(b"TGN").unwrap()));
        assert_eq!(bacterial.id().ncbi_id(), 11);
    }

    #[test]
    fn test_bad_table() {
        let result = GeneticCode::from_ncbi(GeneticCodeId::Standard, "FFLL", STANDARD_STARTS);
        assert!(matches!(result, Err(AlleleomeError::StaticTable(_))));
    }

    #[test]
    fn test_codon_differences() {
        let a = Codon::new(b"GAA").unwrap();
        let b = Codon::new(b"GAC").unwrap();
        assert_eq!(a.differences(&b), 1);
        assert_eq!(a.differences(&a), 0);
        assert_eq!(a.to_string(), "GAA");
    }
}
