//! Plain Levenshtein DP over two flat strings: the grid is indexed
//! `matrix[h][v]`, `h` counting characters consumed from `text` and `v`
//! counting characters consumed from `pattern`. Used both standalone and as
//! the correctness oracle for the wavefront aligner.

use crate::cigar::{Cigar, CigarOp};

/// Boundary cells outside a banded matrix's window carry this value instead
/// of a magic number, so an accidental read of an unset cell is loud
/// (`POISON + 1` stays far above any reachable real distance) rather than
/// silently plausible.
pub const BANDED_DP_POISON: i32 = i32::MAX / 4;

/// Computes the full (unbanded) edit-distance matrix between `pattern` and
/// `text`. `matrix[h][v]` holds the edit distance between `text[..h]` and
/// `pattern[..v]`.
pub fn compute(pattern: &str, text: &str) -> Vec<Vec<i32>> {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let mut matrix = vec![vec![0i32; pattern.len() + 1]; text.len() + 1];
    for v in 0..=pattern.len() {
        matrix[0][v] = v as i32;
    }
    for h in 0..=text.len() {
        matrix[h][0] = h as i32;
    }
    for h in 1..=text.len() {
        for v in 1..=pattern.len() {
            let sub_cost = if pattern[v - 1] == text[h - 1] { 0 } else { 1 };
            let del = matrix[h][v - 1] + 1;
            let ins = matrix[h - 1][v] + 1;
            let diag = matrix[h - 1][v - 1] + sub_cost;
            matrix[h][v] = del.min(ins).min(diag);
        }
    }
    matrix
}

/// Computes a banded edit-distance matrix: cells farther than
/// `effective_bandwidth` from the main diagonal are left at
/// [`BANDED_DP_POISON`]. `effective_bandwidth` is always widened to at
/// least `|text.len() - pattern.len()| + 1`, otherwise the band could miss
/// the bottom-right corner entirely.
pub fn compute_banded(pattern: &str, text: &str, bandwidth: usize) -> Vec<Vec<i32>> {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let k_end = (text.len() as i64 - pattern.len() as i64).unsigned_abs() as usize + 1;
    let effective_bandwidth = bandwidth.max(k_end);

    let mut matrix = vec![vec![BANDED_DP_POISON; pattern.len() + 1]; text.len() + 1];
    matrix[0][0] = 0;
    for v in 1..=pattern.len().min(effective_bandwidth) {
        matrix[0][v] = v as i32;
    }
    for h in 1..=text.len().min(effective_bandwidth) {
        matrix[h][0] = h as i32;
    }

    for h in 1..=text.len() {
        let lo = h.saturating_sub(effective_bandwidth).max(1);
        let hi = (h + effective_bandwidth).min(pattern.len());
        for v in lo..=hi {
            let sub_cost = if pattern[v - 1] == text[h - 1] { 0 } else { 1 };
            let del = if matrix[h][v - 1] >= BANDED_DP_POISON {
                BANDED_DP_POISON
            } else {
                matrix[h][v - 1] + 1
            };
            let ins = if matrix[h - 1][v] >= BANDED_DP_POISON {
                BANDED_DP_POISON
            } else {
                matrix[h - 1][v] + 1
            };
            let diag = if matrix[h - 1][v - 1] >= BANDED_DP_POISON {
                BANDED_DP_POISON
            } else {
                matrix[h - 1][v - 1] + sub_cost
            };
            matrix[h][v] = del.min(ins).min(diag);
        }
    }
    matrix
}

/// Computes only the final banded edit-distance score between `pattern` and
/// `text`, for callers that don't need the backtrace. `bandwidth` is the
/// configured half-bandwidth handed to [`compute_banded`].
pub fn score_banded(pattern: &str, text: &str, bandwidth: usize) -> i32 {
    let matrix = compute_banded(pattern, text, bandwidth);
    matrix[text.chars().count()][pattern.chars().count()]
}

/// Backtraces a computed matrix into a CIGAR, preferring Deletion over
/// Insertion over Match/Mismatch when several predecessors tie.
pub fn backtrace(matrix: &[Vec<i32>], pattern: &str, text: &str) -> Cigar {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let mut h = text.len();
    let mut v = pattern.len();
    let mut cigar = Cigar::new();

    while h > 0 || v > 0 {
        if v == 0 {
            cigar.push(CigarOp::Insertion);
            h -= 1;
            continue;
        }
        if h == 0 {
            cigar.push(CigarOp::Deletion);
            v -= 1;
            continue;
        }
        let del = matrix[h][v - 1] + 1;
        let ins = matrix[h - 1][v] + 1;
        let current = matrix[h][v];
        if current == del {
            cigar.push(CigarOp::Deletion);
            v -= 1;
        } else if current == ins {
            cigar.push(CigarOp::Insertion);
            h -= 1;
        } else if pattern[v - 1] == text[h - 1] {
            cigar.push(CigarOp::Match);
            h -= 1;
            v -= 1;
        } else {
            cigar.push(CigarOp::Mismatch);
            h -= 1;
            v -= 1;
        }
    }
    cigar.finish();
    cigar
}

/// Computes the edit distance and its backtrace in one call.
pub fn align(pattern: &str, text: &str) -> (i32, Cigar) {
    let matrix = compute(pattern, text);
    let score = matrix[text.chars().count()][pattern.chars().count()];
    let cigar = backtrace(&matrix, pattern, text);
    (score, cigar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_have_zero_distance() {
        let (score, _) = align("ACT", "ACT");
        assert_eq!(score, 0);
    }

    #[test]
    fn single_mismatch_costs_one() {
        let (score, cigar) = align("ACT", "AGT");
        assert_eq!(score, 1);
        assert_eq!(cigar.to_string(), "1M1X1M");
    }

    #[test]
    fn banded_matches_unbanded_for_similar_length_strings() {
        let pattern = "ACCTGACT";
        let text = "ACGTGACT";
        let full = compute(pattern, text);
        let banded = compute_banded(pattern, text, 2);
        assert_eq!(
            full[text.len()][pattern.len()],
            banded[text.len()][pattern.len()]
        );
    }

    #[test]
    fn score_banded_matches_full_score_for_similar_length_strings() {
        let pattern = "ACCTGACT";
        let text = "ACGTGACT";
        let (full_score, _) = align(pattern, text);
        assert_eq!(score_banded(pattern, text, 2), full_score);
    }

    #[test]
    fn pure_insertion_and_deletion() {
        let (score, cigar) = align("", "ACT");
        assert_eq!(score, 3);
        assert_eq!(cigar.to_string(), "3I");

        let (score, cigar) = align("ACT", "");
        assert_eq!(score, 3);
        assert_eq!(cigar.to_string(), "3D");
    }
}
