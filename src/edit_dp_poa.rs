//! Edit-distance dynamic programming over a text-DAG: the correctness
//! oracle WFPOA is checked against. Each segment gets its own DP matrix；
//! a segment's first row is the pointwise minimum, column by column, of
//! its predecessors' last rows (or the standard linear base case `v` for a
//! source segment with no predecessors).

use crate::cigar::{Cigar, CigarOp};
use crate::error::PoaError;
use crate::text_dag::TextDag;
use std::collections::HashMap;

/// Per-segment DP matrices, `matrix[h][v]` being the edit distance between
/// `text_segment[..h]` and `pattern[..v]`, given the best way to have
/// reached the start of this segment.
pub struct PoaDpMatrices {
    pub matrices: HashMap<usize, Vec<Vec<i32>>>,
}

/// Computes DP matrices for every segment of `dag`, in topological order.
pub fn compute(pattern: &str, dag: &TextDag) -> Result<PoaDpMatrices, PoaError> {
    let pattern: Vec<char> = pattern.chars().collect();
    let order = dag.topological_sort()?;
    let mut matrices: HashMap<usize, Vec<Vec<i32>>> = HashMap::new();

    for &seg_id in &order {
        let seg = dag.segment(seg_id)?;
        let text: Vec<char> = seg.sequence.chars().collect();
        let mut matrix = vec![vec![0i32; pattern.len() + 1]; text.len() + 1];

        if seg.predecessors.is_empty() {
            for v in 0..=pattern.len() {
                matrix[0][v] = v as i32;
            }
        } else {
            for v in 0..=pattern.len() {
                matrix[0][v] = seg
                    .predecessors
                    .iter()
                    .map(|&p| {
                        let pred_matrix = &matrices[&p];
                        pred_matrix[pred_matrix.len() - 1][v]
                    })
                    .min()
                    .unwrap();
            }
        }

        for h in 1..=text.len() {
            matrix[h][0] = matrix[0][0] + h as i32;
            for v in 1..=pattern.len() {
                let sub_cost = if pattern[v - 1] == text[h - 1] { 0 } else { 1 };
                let del = matrix[h][v - 1] + 1;
                let ins = matrix[h - 1][v] + 1;
                let diag = matrix[h - 1][v - 1] + sub_cost;
                matrix[h][v] = del.min(ins).min(diag);
            }
        }
        matrices.insert(seg_id, matrix);
    }

    Ok(PoaDpMatrices { matrices })
}

/// Minimum edit distance between `pattern` and any source-to-sink path
/// through `dag`.
pub fn score(pattern: &str, dag: &TextDag) -> Result<i32, PoaError> {
    let pattern_len = pattern.chars().count();
    let dp = compute(pattern, dag)?;
    dag.segments()
        .iter()
        .enumerate()
        .filter(|(_, seg)| seg.is_sink())
        .map(|(id, _)| {
            let m = &dp.matrices[&id];
            m[m.len() - 1][pattern_len]
        })
        .min()
        .ok_or(PoaError::NotADag)
}

/// Computes the best score and its CIGAR trace (with `Segment` markers at
/// every crossing), backtracing from the best-scoring sink.
pub fn align(pattern: &str, dag: &TextDag) -> Result<(i32, Cigar), PoaError> {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let pattern_len = pattern_chars.len();
    let dp = compute(pattern, dag)?;

    let (mut seg_id, best_score) = dag
        .segments()
        .iter()
        .enumerate()
        .filter(|(_, seg)| seg.is_sink())
        .map(|(id, _)| (id, dp.matrices[&id][dp.matrices[&id].len() - 1][pattern_len]))
        .min_by_key(|&(_, s)| s)
        .ok_or(PoaError::NotADag)?;

    let mut cigar = Cigar::new();
    let mut v = pattern_len;
    let mut h = {
        let m = &dp.matrices[&seg_id];
        m.len() - 1
    };

    loop {
        let seg = dag.segment(seg_id)?;
        let text: Vec<char> = seg.sequence.chars().collect();
        let matrix = &dp.matrices[&seg_id];

        while h > 0 {
            let current = matrix[h][v];
            if v > 0 && current == matrix[h][v - 1] + 1 {
                cigar.push(CigarOp::Deletion);
                v -= 1;
            } else if current == matrix[h - 1][v] + 1 {
                cigar.push(CigarOp::Insertion);
                h -= 1;
            } else {
                let sub_match = v > 0 && pattern_chars[v - 1] == text[h - 1];
                cigar.push(if sub_match { CigarOp::Match } else { CigarOp::Mismatch });
                h -= 1;
                v -= 1;
            }
        }
        cigar.push_segment(seg_id);

        if seg.predecessors.is_empty() {
            break;
        }
        let pred = seg
            .predecessors
            .iter()
            .copied()
            .min_by_key(|&p| {
                let pm = &dp.matrices[&p];
                pm[pm.len() - 1][v]
            })
            .unwrap();
        seg_id = pred;
        h = dp.matrices[&pred].len() - 1;
    }

    cigar.finish();
    Ok((best_score, cigar))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_exact_path_through_branch() {
        let dag = TextDag::example_branch_rejoin();
        let (dist, cigar) = align("ACTGTACT", &dag).unwrap();
        assert_eq!(dist, 0);
        assert_eq!(cigar.to_string(), "(0)3M(2)2M(3)3M");
    }

    #[test]
    fn s6_short_pattern_forces_insertions_around_branch() {
        let dag = TextDag::example_branch_rejoin();
        let (dist, cigar) = align("GT", &dag).unwrap();
        assert_eq!(dist, 6);
        assert_eq!(cigar.to_string(), "(0)3I(2)2M(3)3I");
    }

    #[test]
    fn source_segment_uses_linear_base_case() {
        let dag = TextDag::example_branch_rejoin();
        let dp = compute("ACTGTACT", &dag).unwrap();
        let seg0 = &dp.matrices[&0];
        assert_eq!(seg0[0], (0..=8).collect::<Vec<i32>>());
    }
}
