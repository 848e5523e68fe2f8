/*!
Guide tree for progressive alignment.
Alleles of one gene are usually very similar, so distances come from a wavefront (WFA) edit distance, which is cheap for low divergence.
The merge order is UPGMA; the closest pair is taken from a priority queue with ties resolved towards the lowest cluster ids, which keeps the tree deterministic.
*/

use std::cmp::Reverse;

use priority_queue::PriorityQueue;
use rustc_hash::FxHashMap as HashMap;

/// Returns the end-to-end edit distance between two residue strings using a wavefront search.
/// # Arguments
/// * `a` - the first sequence
/// * `b` - the second sequence
/// * `wildcard` - optional symbol that matches anything
/// # Examples
/// ```rust
/// use alleleome::guide_tree::edit_distance;
/// assert_eq!(edit_distance(b"ATGAAA", b"ATGAAA", None), 0);
/// assert_eq!(edit_distance(b"ATGAAA", b"ATGCAA", None), 1);
/// assert_eq!(edit_distance(b"ATGAAA", b"ATGNAA", Some(b'N')), 0);
/// assert_eq!(edit_distance(b"ATGAAATAA", b"ATGTAA", None), 3);
/// ```
pub fn edit_distance(a: &[u8], b: &[u8], wildcard: Option<u8>) -> usize {
    let len_a = a.len();
    let len_b = b.len();
    let matches = |x: u8, y: u8| x == y || wildcard.map_or(false, |w| x == w || y == w);

    // each wavefront entry is the furthest (i, j) reached on one diagonal
    let mut current: Vec<(usize, usize)> = vec![(0, 0)];
    let mut edits = 0;
    loop {
        let mut next: Vec<(usize, usize)> = vec![(0, 0); current.len() + 2];
        for (diagonal, &(start_i, start_j)) in current.iter().enumerate() {
            let mut i = start_i;
            let mut j = start_j;
            while i < len_a && j < len_b && matches(a[i], b[j]) {
                i += 1;
                j += 1;
            }

            if i == len_a && j == len_b {
                return edits;
            }

            // deletion from `a`, substitution, insertion into `a`; neither index may run past its end
            let step_i = if i < len_a { i + 1 } else { i };
            let step_j = if j < len_b { j + 1 } else { j };
            next[diagonal] = next[diagonal].max((step_i, j));
            next[diagonal + 1] = next[diagonal + 1].max((step_i, step_j));
            next[diagonal + 2] = next[diagonal + 2].max((i, step_j));
        }
        edits += 1;
        current = next;
    }
}

/// One merge of the guide tree; cluster ids below the leaf count are leaves
#[derive(Clone, Debug, PartialEq)]
pub struct Merge {
    /// The lower cluster id
    pub left: usize,
    /// The higher cluster id
    pub right: usize,
    /// Id given to the merged cluster
    pub id: usize,
    /// UPGMA distance between the two clusters
    pub distance: f64
}

/// A UPGMA guide tree stored as its merge order
#[derive(Clone, Debug, PartialEq)]
pub struct GuideTree {
    leaves: usize,
    merges: Vec<Merge>
}

type PairPriority = Reverse<(u64, usize, usize)>;

/// Priority for a pair; non-negative floats order the same way as their bit patterns
fn pair_priority(distance: f64, left: usize, right: usize) -> PairPriority {
    Reverse((distance.to_bits(), left, right))
}

fn pair_key(x: usize, y: usize) -> (usize, usize) {
    if x < y { (x, y) } else { (y, x) }
}

impl GuideTree {
    /// Builds the tree over unique alleles.
    /// Distances are edit distances normalised by the longer sequence length.
    /// # Arguments
    /// * `alleles` - the distinct sequences, leaf `i` is `alleles[i]`
    /// * `wildcard` - optional ambiguous symbol that matches anything during distance calculation
    pub fn build(alleles: &[&[u8]], wildcard: Option<u8>) -> GuideTree {
        let leaves = alleles.len();
        let mut distances: HashMap<(usize, usize), f64> = Default::default();
        let mut pqueue: PriorityQueue<(usize, usize), PairPriority> = PriorityQueue::new();

        for i in 0..leaves {
            for j in (i + 1)..leaves {
                let longest = alleles[i].len().max(alleles[j].len());
                let distance = if longest == 0 {
                    0.0
                } else {
                    edit_distance(alleles[i], alleles[j], wildcard) as f64 / longest as f64
                };
                distances.insert((i, j), distance);
                pqueue.push((i, j), pair_priority(distance, i, j));
            }
        }

        let mut sizes: Vec<usize> = vec![1; leaves];
        let mut alive: Vec<bool> = vec![true; leaves];
        let mut merges = Vec::with_capacity(leaves.saturating_sub(1));

        while let Some(((left, right), _priority)) = pqueue.pop() {
            let new_id = sizes.len();
            let left_size = sizes[left] as f64;
            let right_size = sizes[right] as f64;
            let pair_distance = distances.remove(&(left, right)).unwrap_or_default();

            alive[left] = false;
            alive[right] = false;

            // average linkage to every remaining cluster, dropping the stale pairs as we go
            let remaining: Vec<usize> = (0..alive.len()).filter(|&k| alive[k]).collect();
            sizes.push(sizes[left] + sizes[right]);
            alive.push(true);
            for k in remaining {
                let left_pair = pair_key(left, k);
                let right_pair = pair_key(right, k);
                let d_left = distances.remove(&left_pair).unwrap_or_default();
                let d_right = distances.remove(&right_pair).unwrap_or_default();
                pqueue.remove(&left_pair);
                pqueue.remove(&right_pair);

                let merged = (left_size * d_left + right_size * d_right) / (left_size + right_size);
                distances.insert((k, new_id), merged);
                pqueue.push((k, new_id), pair_priority(merged, k, new_id));
            }

            merges.push(Merge {
                left,
                right,
                id: new_id,
                distance: pair_distance
            });
        }

        GuideTree {
            leaves,
            merges
        }
    }

    /// Number of leaves (unique alleles)
    pub fn leaves(&self) -> usize {
        self.leaves
    }

    /// Merges in the order they should be aligned
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance(b"", b"", None), 0);
        assert_eq!(edit_distance(b"ACGT", b"", None), 4);
        assert_eq!(edit_distance(b"", b"ACG", None), 3);
        assert_eq!(edit_distance(b"ACGT", b"AGT", None), 1);
        assert_eq!(edit_distance(b"ACGT", b"TGCA", None), 4);
        assert_eq!(edit_distance(b"ACGTACGT", b"ACGTTACGT", None), 1);
        assert_eq!(edit_distance(b"MKVLA", b"MKLA", None), 1);
    }

    #[test]
    fn test_two_leaves() {
        let alleles: [&[u8]; 2] = [b"ACGT", b"ACGA"];
        let tree = GuideTree::build(&alleles, None);
        assert_eq!(tree.leaves(), 2);
        assert_eq!(tree.merges(), &[Merge { left: 0, right: 1, id: 2, distance: 0.25 }]);
    }

    #[test]
    fn test_closest_pair_first() {
        let alleles: [&[u8]; 4] = [
            b"AAAAAAAA",
            b"CCCCCCCC",
            b"AAAAAAAT",
            b"CCCCCCCA"
        ];
        let tree = GuideTree::build(&alleles, None);
        let merges = tree.merges();
        assert_eq!(merges.len(), 3);
        // 0 and 2 tie with 1 and 3 at 1/8, the lowest ids win
        assert_eq!((merges[0].left, merges[0].right), (0, 2));
        assert_eq!((merges[1].left, merges[1].right), (1, 3));
        assert_eq!((merges[2].left, merges[2].right), (4, 5));
        assert_eq!(merges[2].id, 6);
    }

    #[test]
    fn test_single_leaf() {
        let alleles: [&[u8]; 1] = [b"ACGT"];
        let tree = GuideTree::build(&alleles, None);
        assert!(tree.merges().is_empty());
    }

    #[test]
    fn test_deterministic() {
        let alleles: [&[u8]; 5] = [b"ATGAAA", b"ATGAAC", b"ATGCCC", b"TTGAAA", b"ATGAAT"];
        let tree1 = GuideTree::build(&alleles, None);
        let tree2 = GuideTree::build(&alleles, None);
        assert_eq!(tree1, tree2);
        assert_eq!(tree1.merges().len(), 4);
    }
}
