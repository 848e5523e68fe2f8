/*!
Profile-profile global alignment with affine gaps (Gotoh, three states).
A profile is a group of already aligned rows; each column is summarised as weighted residue counts.
Column pairs score as the weighted average substitution score over residue pairs, gaps contribute 0.
*/

use crate::scoring::{ResidueScores, ScoringScheme};
use crate::sequence::GAP;

/// One step of a profile-profile alignment
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AlignOp {
    /// A column of the left profile aligned to a column of the right profile
    Match,
    /// A left column aligned to a gap inserted into the right profile
    GapInRight,
    /// A right column aligned to a gap inserted into the left profile
    GapInLeft
}

/// A group of aligned rows with per-column residue weights
#[derive(Clone, Debug)]
pub struct Profile {
    /// Leaf (allele) index of each row
    members: Vec<usize>,
    /// Aligned rows, all the same width
    rows: Vec<Vec<u8>>,
    /// Weight of each row, e.g. how many genomes carry that allele
    weights: Vec<f64>,
    /// Sparse (alphabet index, weight) pairs per column
    columns: Vec<Vec<(usize, f64)>>,
    /// Sum of all row weights
    total_weight: f64
}

impl Profile {
    /// Creates a single-row profile
    /// # Arguments
    /// * `member` - the allele index this row stands for
    /// * `residues` - the ungapped residues
    /// * `weight` - the number of sequences sharing this allele
    /// * `scores` - residue table used to index the alphabet
    pub fn from_sequence(member: usize, residues: &[u8], weight: f64, scores: &ResidueScores) -> Profile {
        Self::from_rows(vec![member], vec![residues.to_vec()], vec![weight], scores)
    }

    fn from_rows(members: Vec<usize>, rows: Vec<Vec<u8>>, weights: Vec<f64>, scores: &ResidueScores) -> Profile {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut columns: Vec<Vec<(usize, f64)>> = vec![vec![]; width];
        for (row, &weight) in rows.iter().zip(weights.iter()) {
            for (column, &symbol) in row.iter().enumerate() {
                if let Some(index) = scores.index_of(symbol) {
                    let entry = &mut columns[column];
                    match entry.iter_mut().find(|(i, _w)| *i == index) {
                        Some((_i, w)) => *w += weight,
                        None => entry.push((index, weight))
                    }
                }
            }
        }
        // keep a fixed order so floating point sums are reproducible
        for column in columns.iter_mut() {
            column.sort_by_key(|&(i, _w)| i);
        }
        let total_weight = weights.iter().sum();
        Profile {
            members,
            rows,
            weights,
            columns,
            total_weight
        }
    }

    /// Dense per-column expected score against every residue of the alphabet
    fn expected_scores(&self, scores: &ResidueScores) -> Vec<Vec<f64>> {
        let n = scores.alphabet_len();
        self.columns.iter()
            .map(|column| {
                let mut expected = vec![0.0; n];
                for (r, value) in expected.iter_mut().enumerate() {
                    let total: f64 = column.iter().map(|&(i, w)| w * scores.score_index(r, i)).sum();
                    *value = total / self.total_weight;
                }
                expected
            })
            .collect()
    }

    /// Merges two profiles by applying an alignment path
    /// # Arguments
    /// * `left` - the left profile
    /// * `right` - the right profile
    /// * `ops` - the path returned by [`align_profiles`]
    /// * `scores` - residue table used to rebuild the columns
    pub fn merge(left: &Profile, right: &Profile, ops: &[AlignOp], scores: &ResidueScores) -> Profile {
        let mut left_rows: Vec<Vec<u8>> = vec![Vec::with_capacity(ops.len()); left.rows.len()];
        let mut right_rows: Vec<Vec<u8>> = vec![Vec::with_capacity(ops.len()); right.rows.len()];
        let mut i = 0;
        let mut j = 0;
        for op in ops.iter() {
            let (take_left, take_right) = match op {
                AlignOp::Match => (true, true),
                AlignOp::GapInRight => (true, false),
                AlignOp::GapInLeft => (false, true)
            };
            for (out, row) in left_rows.iter_mut().zip(left.rows.iter()) {
                out.push(if take_left { row[i] } else { GAP });
            }
            for (out, row) in right_rows.iter_mut().zip(right.rows.iter()) {
                out.push(if take_right { row[j] } else { GAP });
            }
            if take_left {
                i += 1;
            }
            if take_right {
                j += 1;
            }
        }

        let members = left.members.iter().chain(right.members.iter()).copied().collect();
        let weights = left.weights.iter().chain(right.weights.iter()).copied().collect();
        left_rows.extend(right_rows);
        Self::from_rows(members, left_rows, weights, scores)
    }

    // getters
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }
}

/// Traceback states
const FROM_M: u8 = 0;
const FROM_X: u8 = 1;
const FROM_Y: u8 = 2;

/// Picks the best of the three states, preferring M, then X, then Y on ties
fn best_of(m: f64, x: f64, y: f64) -> (f64, u8) {
    let mut best = (m, FROM_M);
    if x > best.0 {
        best = (x, FROM_X);
    }
    if y > best.0 {
        best = (y, FROM_Y);
    }
    best
}

/// Globally aligns two profiles and returns the alignment path together with its score.
/// State M aligns two columns, X puts a gap in the right profile, Y puts a gap in the left profile.
/// A gap of length `L` costs `gap_open + (L-1) * gap_extend`, terminal gaps included.
/// # Arguments
/// * `left` - the left profile
/// * `right` - the right profile
/// * `scoring` - the gap penalties
/// * `scores` - residue scores for the profiles' alphabet
pub fn align_profiles(left: &Profile, right: &Profile, scoring: &ScoringScheme, scores: &ResidueScores) -> (Vec<AlignOp>, f64) {
    let n = left.width();
    let m = right.width();
    let open = scoring.gap_open();
    let extend = scoring.gap_extend();
    let neg_inf = f64::NEG_INFINITY;

    let right_expected = right.expected_scores(scores);
    let column_score = |i: usize, j: usize| -> f64 {
        let column = &left.columns[i];
        let expected = &right_expected[j];
        let total: f64 = column.iter().map(|&(r, w)| w * expected[r]).sum();
        total / left.total_weight
    };

    // traceback for each state is stored per cell; scores only need the previous row
    let cols = m + 1;
    let mut trace_m = vec![FROM_M; (n + 1) * cols];
    let mut trace_x = vec![FROM_M; (n + 1) * cols];
    let mut trace_y = vec![FROM_M; (n + 1) * cols];

    let mut prev_m = vec![neg_inf; cols];
    let mut prev_x = vec![neg_inf; cols];
    let mut prev_y = vec![neg_inf; cols];
    prev_m[0] = 0.0;
    for j in 1..cols {
        prev_y[j] = -(open + (j - 1) as f64 * extend);
        trace_y[j] = if j == 1 { FROM_M } else { FROM_Y };
    }

    let mut curr_m = vec![neg_inf; cols];
    let mut curr_x = vec![neg_inf; cols];
    let mut curr_y = vec![neg_inf; cols];
    for i in 1..=n {
        curr_m[0] = neg_inf;
        curr_y[0] = neg_inf;
        curr_x[0] = -(open + (i - 1) as f64 * extend);
        trace_x[i * cols] = if i == 1 { FROM_M } else { FROM_X };

        for j in 1..cols {
            let cell = i * cols + j;

            let (diag, diag_from) = best_of(prev_m[j - 1], prev_x[j - 1], prev_y[j - 1]);
            curr_m[j] = diag + column_score(i - 1, j - 1);
            trace_m[cell] = diag_from;

            let (up, up_from) = best_of(prev_m[j] - open, prev_x[j] - extend, prev_y[j] - open);
            curr_x[j] = up;
            trace_x[cell] = up_from;

            let (left_score, left_from) = best_of(curr_m[j - 1] - open, curr_x[j - 1] - open, curr_y[j - 1] - extend);
            curr_y[j] = left_score;
            trace_y[cell] = left_from;
        }

        std::mem::swap(&mut prev_m, &mut curr_m);
        std::mem::swap(&mut prev_x, &mut curr_x);
        std::mem::swap(&mut prev_y, &mut curr_y);
    }

    let (final_score, mut state) = best_of(prev_m[m], prev_x[m], prev_y[m]);

    let mut ops = Vec::with_capacity(n + m);
    let mut i = n;
    let mut j = m;
    while i > 0 || j > 0 {
        let cell = i * cols + j;
        match state {
            FROM_M => {
                ops.push(AlignOp::Match);
                state = trace_m[cell];
                i -= 1;
                j -= 1;
            },
            FROM_X => {
                ops.push(AlignOp::GapInRight);
                state = trace_x[cell];
                i -= 1;
            },
            _ => {
                ops.push(AlignOp::GapInLeft);
                state = trace_y[cell];
                j -= 1;
            }
        }
    }
    ops.reverse();
    (ops, final_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::ScoringConfig;
    use crate::sequence::SequenceKind;

    fn scheme() -> ScoringScheme {
        ScoringScheme::new(&ScoringConfig::default()).unwrap()
    }

    fn aligned_pair(a: &[u8], b: &[u8], kind: SequenceKind) -> (Vec<Vec<u8>>, f64) {
        let scheme = scheme();
        let scores = scheme.residues(kind);
        let left = Profile::from_sequence(0, a, 1.0, scores);
        let right = Profile::from_sequence(1, b, 1.0, scores);
        let (ops, score) = align_profiles(&left, &right, &scheme, scores);
        let merged = Profile::merge(&left, &right, &ops, scores);
        assert_eq!(merged.members(), &[0, 1]);
        (merged.rows().to_vec(), score)
    }

    #[test]
    fn test_identical() {
        let (rows, score) = aligned_pair(b"ATGAAATAA", b"ATGAAATAA", SequenceKind::Nucleotide);
        assert_eq!(rows, vec![b"ATGAAATAA".to_vec(), b"ATGAAATAA".to_vec()]);
        assert_eq!(score, 18.0);
    }

    #[test]
    fn test_codon_deletion() {
        let (rows, score) = aligned_pair(b"ATGCCCGGGTAA", b"ATGCCCTAA", SequenceKind::Nucleotide);
        assert_eq!(rows, vec![b"ATGCCCGGGTAA".to_vec(), b"ATGCCC---TAA".to_vec()]);
        // 9 matches at +2, one gap of length 3
        assert_eq!(score, 18.0 - 12.0);
    }

    #[test]
    fn test_protein_deletion() {
        let (rows, _score) = aligned_pair(b"MPG*", b"MP*", SequenceKind::AminoAcid);
        assert_eq!(rows, vec![b"MPG*".to_vec(), b"MP-*".to_vec()]);
    }

    #[test]
    fn test_mismatch_preferred_over_gaps() {
        let (rows, score) = aligned_pair(b"MKVLA", b"MKILA", SequenceKind::AminoAcid);
        assert_eq!(rows, vec![b"MKVLA".to_vec(), b"MKILA".to_vec()]);
        // M/M 5, K/K 5, V/I 3, L/L 4, A/A 4
        assert_eq!(score, 21.0);
    }

    #[test]
    fn test_empty_side() {
        let (rows, score) = aligned_pair(b"MK", b"", SequenceKind::AminoAcid);
        assert_eq!(rows, vec![b"MK".to_vec(), b"--".to_vec()]);
        assert_eq!(score, -11.0);
    }

    #[test]
    fn test_profile_weights() {
        let scheme = scheme();
        let scores = scheme.residues(SequenceKind::Nucleotide);
        let left = Profile::from_sequence(0, b"ACGT", 3.0, scores);
        let right = Profile::from_sequence(1, b"ACCT", 1.0, scores);
        let (ops, _score) = align_profiles(&left, &right, &scheme, scores);
        assert_eq!(ops, vec![AlignOp::Match; 4]);
        let merged = Profile::merge(&left, &right, &ops, scores);
        assert_eq!(merged.width(), 4);
        // column 2 holds G with weight 3 and C with weight 1, sorted by alphabet index (A C G T N)
        assert_eq!(merged.columns[2], vec![(1, 1.0), (2, 3.0)]);
        assert_eq!(merged.total_weight, 4.0);
    }
}
