//! Ratcliff/Obershelp sequence alignment over arbitrary token sequences.
//!
//! The longest common contiguous run of two windows is matched first, then the
//! windows to the left and to the right of it are aligned the same way. Windows
//! are kept on an explicit stack, so the depth of the alignment never depends on
//! the call stack.

use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Range;

use log::trace;

/// A contiguous run of `len` equal tokens, starting at `a` in the first sequence and at `b` in the second.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Match {
    pub a: usize,
    pub b: usize,
    pub len: usize,
}

impl Match {
    fn a_end(&self) -> usize {
        self.a + self.len
    }

    fn b_end(&self) -> usize {
        self.b + self.len
    }
}

/// Positions of every token in a sequence, in ascending order.
struct TokenIndex<'a, T> {
    positions: HashMap<&'a T, Vec<usize>>,
}

impl<'a, T: Eq + Hash> TokenIndex<'a, T> {
    fn new(seq: &'a [T]) -> Self {
        let mut positions = HashMap::<_, Vec<_>>::new();
        for (index, token) in seq.iter().enumerate() {
            positions.entry(token).or_default().push(index);
        }

        TokenIndex {
            positions,
        }
    }

    /// Finds the longest run of `a[a_range]` that also occurs in `b[b_range]`.
    ///
    /// Of all runs with maximal length, the one starting earliest in `a` is returned.
    /// Ties within `a` go to the earliest start in `b`.
    fn longest_match(&self, a: &[T], a_range: Range<usize>, b_range: Range<usize>) -> Match {
        let mut best = Match {
            a: a_range.start,
            b: b_range.start,
            len: 0,
        };

        // run_len[j] = length of the match ending at a[i - 1] and b[j]
        let mut run_len = HashMap::<usize, usize>::new();
        for i in a_range {
            let mut next_run_len = HashMap::new();
            if let Some(positions) = self.positions.get(&a[i]) {
                for &j in positions {
                    if j < b_range.start {
                        continue;
                    }

                    if j >= b_range.end {
                        break;
                    }

                    let k = j.checked_sub(1).and_then(|prev| run_len.get(&prev)).copied().unwrap_or(0) + 1;
                    next_run_len.insert(j, k);
                    if k > best.len {
                        best = Match {
                            a: i + 1 - k,
                            b: j + 1 - k,
                            len: k,
                        };
                    }
                }
            }

            run_len = next_run_len;
        }

        best
    }
}

/// Returns the non-overlapping matching blocks of `a` and `b`, ordered by position.
pub fn matching_blocks<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<Match> {
    let index = TokenIndex::new(b);
    let mut windows = vec![(0..a.len(), 0..b.len())];
    let mut blocks = Vec::new();

    while let Some((a_range, b_range)) = windows.pop() {
        if a_range.is_empty() || b_range.is_empty() {
            continue;
        }

        let m = index.longest_match(a, a_range.clone(), b_range.clone());
        if m.len == 0 {
            continue;
        }

        trace!("Matched {m:?} in window {a_range:?} x {b_range:?}");
        windows.push((a_range.start..m.a, b_range.start..m.b));
        windows.push((m.a_end()..a_range.end, m.b_end()..b_range.end));
        blocks.push(m);
    }

    blocks.sort();
    blocks
}

/// Total number of tokens covered by the matching blocks of `a` against `b`.
pub fn matched_len<T: Eq + Hash>(a: &[T], b: &[T]) -> usize {
    matching_blocks(a, b).iter().map(|m| m.len).sum()
}

/// Similarity of two token sequences in `[0, 1]`, computed as `2 * M / (len(a) + len(b))`.
///
/// The tie rule of [`matching_blocks`] makes `M` depend on argument order for some inputs,
/// so `M` is taken as the larger of both orientations. Two empty sequences are identical (1.0).
pub fn ratio<T: Eq + Hash>(a: &[T], b: &[T]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let matched = matched_len(a, b).max(matched_len(b, a));
    2.0 * matched as f64 / total as f64
}
