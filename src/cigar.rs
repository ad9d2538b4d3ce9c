//! CIGAR-like alignment traces, extended with segment-crossing markers for
//! alignments against a text-DAG.
//!
//! The original format packed a segment index into a single ASCII digit
//! byte sitting alongside `M`/`X`/`I`/`D` operations, which silently broke
//! once a text-DAG had more than ten segments. Here a segment crossing is
//! its own `CigarOp::Segment(usize)` variant, so the index is never
//! truncated.

use crate::error::PoaError;
use std::fmt;

/// A single step of an alignment trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    Match,
    Mismatch,
    Insertion,
    Deletion,
    /// Marks that the trace crosses into the given text-DAG segment.
    Segment(usize),
}

/// An alignment trace, built by appending operations from the end of the
/// alignment back to the start, then reversed once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cigar {
    ops: Vec<CigarOp>,
}

impl Cigar {
    pub fn new() -> Self {
        Cigar { ops: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[CigarOp] {
        &self.ops
    }

    /// Appends an operation. During backtrace this is called walking from
    /// the alignment's end towards its start; call [`Cigar::finish`] once
    /// done to restore forward order.
    pub fn push(&mut self, op: CigarOp) {
        self.ops.push(op);
    }

    pub fn push_matches(&mut self, count: usize) {
        self.ops.extend(std::iter::repeat(CigarOp::Match).take(count));
    }

    pub fn push_segment(&mut self, segment_idx: usize) {
        self.ops.push(CigarOp::Segment(segment_idx));
    }

    /// Reverses operations pushed back-to-front during backtrace into their
    /// natural left-to-right order.
    pub fn finish(&mut self) {
        self.ops.reverse();
    }

    /// Splits `Match` runs into `Match`/`Mismatch` by comparing against the
    /// actual pattern/text content, walking segment markers as they're
    /// encountered. `text_segments` must be given in the same order the
    /// `Segment` markers appear.
    pub fn compute_mismatches(&mut self, pattern: &str, text_segments: &[&str]) {
        let pattern: Vec<char> = pattern.chars().collect();
        let mut p = 0usize;
        let mut seg_idx = 0usize;
        let mut t = 0usize;
        let mut text: Vec<char> = text_segments.first().map(|s| s.chars().collect()).unwrap_or_default();

        let mut out = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            match op {
                CigarOp::Segment(_) => {
                    out.push(*op);
                    seg_idx += 1;
                    t = 0;
                    text = text_segments
                        .get(seg_idx)
                        .map(|s| s.chars().collect())
                        .unwrap_or_default();
                }
                CigarOp::Match | CigarOp::Mismatch => {
                    let is_match = pattern.get(p) == text.get(t);
                    out.push(if is_match { CigarOp::Match } else { CigarOp::Mismatch });
                    p += 1;
                    t += 1;
                }
                CigarOp::Insertion => {
                    out.push(*op);
                    t += 1;
                }
                CigarOp::Deletion => {
                    out.push(*op);
                    p += 1;
                }
            }
        }
        self.ops = out;
    }

    /// Total edit-distance score: one per mismatch, insertion or deletion.
    pub fn score_edit(&self) -> u32 {
        self.ops
            .iter()
            .map(|op| match op {
                CigarOp::Mismatch | CigarOp::Insertion | CigarOp::Deletion => 1,
                CigarOp::Match | CigarOp::Segment(_) => 0,
            })
            .sum()
    }

    /// Verifies that replaying this CIGAR against `pattern` and the
    /// concatenation of `text_segments` (in the order their `Segment`
    /// markers appear) actually reconciles character-for-character, and
    /// that the whole pattern and every visited text segment is consumed.
    pub fn check_alignment(&self, pattern: &str, text_segments: &[&str]) -> Result<(), PoaError> {
        let pattern: Vec<char> = pattern.chars().collect();
        let mut p = 0usize;
        let mut seg_idx: Option<usize> = None;
        let mut t = 0usize;
        let mut text: Vec<char> = Vec::new();

        for op in &self.ops {
            match op {
                CigarOp::Segment(idx) => {
                    if let Some(prev) = seg_idx {
                        let prev_text = text_segments.get(prev).map(|s| s.len()).unwrap_or(0);
                        if t != prev_text {
                            return Err(PoaError::InvalidCigar(format!(
                                "segment {prev} only consumed {t}/{prev_text} chars"
                            )));
                        }
                    }
                    seg_idx = Some(*idx);
                    t = 0;
                    text = text_segments
                        .get(*idx)
                        .map(|s| s.chars().collect())
                        .unwrap_or_default();
                }
                CigarOp::Match => {
                    if pattern.get(p) != text.get(t) {
                        return Err(PoaError::InvalidCigar(format!(
                            "position {p} marked Match but characters differ"
                        )));
                    }
                    p += 1;
                    t += 1;
                }
                CigarOp::Mismatch => {
                    if pattern.get(p) == text.get(t) {
                        return Err(PoaError::InvalidCigar(format!(
                            "position {p} marked Mismatch but characters are equal"
                        )));
                    }
                    p += 1;
                    t += 1;
                }
                CigarOp::Insertion => t += 1,
                CigarOp::Deletion => p += 1,
            }
        }
        if p != pattern.len() {
            return Err(PoaError::InvalidCigar(format!(
                "pattern only consumed {p}/{} chars",
                pattern.len()
            )));
        }
        Ok(())
    }

    /// Length in operations, excluding segment markers.
    pub fn len(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| !matches!(op, CigarOp::Segment(_)))
            .count()
    }
}

impl fmt::Display for Cigar {
    /// Run-length encodes consecutive identical operations, printing
    /// segment crossings as `(idx)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.ops.iter().peekable();
        while let Some(op) = iter.next() {
            match op {
                CigarOp::Segment(idx) => write!(f, "({idx})")?,
                _ => {
                    let mut run = 1;
                    while let Some(next) = iter.peek() {
                        if *next == op {
                            run += 1;
                            iter.next();
                        } else {
                            break;
                        }
                    }
                    let letter = match op {
                        CigarOp::Match => 'M',
                        CigarOp::Mismatch => 'X',
                        CigarOp::Insertion => 'I',
                        CigarOp::Deletion => 'D',
                        CigarOp::Segment(_) => unreachable!(),
                    };
                    write!(f, "{run}{letter}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_runs_and_segments() {
        let mut c = Cigar::new();
        c.push_segment(0);
        c.push(CigarOp::Match);
        c.push(CigarOp::Match);
        c.push(CigarOp::Match);
        c.push_segment(2);
        c.push(CigarOp::Match);
        c.push(CigarOp::Match);
        c.push_segment(3);
        c.push(CigarOp::Match);
        c.push(CigarOp::Match);
        c.push(CigarOp::Match);
        assert_eq!(c.to_string(), "(0)3M(2)2M(3)3M");
    }

    #[test]
    fn score_edit_counts_non_matches() {
        let mut c = Cigar::new();
        c.push(CigarOp::Match);
        c.push(CigarOp::Mismatch);
        c.push(CigarOp::Insertion);
        c.push(CigarOp::Deletion);
        assert_eq!(c.score_edit(), 3);
    }

    #[test]
    fn check_alignment_accepts_matching_trace() {
        let mut c = Cigar::new();
        c.push_segment(0);
        c.push(CigarOp::Match);
        c.push(CigarOp::Match);
        c.push(CigarOp::Match);
        assert!(c.check_alignment("ACT", &["ACT"]).is_ok());
    }

    #[test]
    fn check_alignment_rejects_mislabeled_mismatch() {
        let mut c = Cigar::new();
        c.push_segment(0);
        c.push(CigarOp::Mismatch);
        c.push(CigarOp::Match);
        c.push(CigarOp::Match);
        assert!(c.check_alignment("ACT", &["ACT"]).is_err());
    }
}
