//! Wavefront alignment against a text-DAG: a diagonal-wavefront Levenshtein
//! aligner (mismatch and indel both cost 1) extended to branch and rejoin
//! at text-DAG segment boundaries.
//!
//! A closed or never-opened wavefront cell is represented as `None` rather
//! than a reserved sentinel integer — the natural idiomatic-Rust rendering
//! of "a dedicated, clearly documented out-of-band value" that the original
//! magic `-10` offset called for.

use crate::cigar::{Cigar, CigarOp};
use crate::error::AlignError;
use crate::text_dag::TextDag;
use std::collections::BTreeMap;

/// Patterns longer than this are rejected outright rather than risking an
/// offset overflow: `Locator`/`Wavefront` offsets are assumed to fit the
/// 16-bit range the original wavefront implementation relied on.
const MAX_SEQUENCE_LEN: usize = 32_000;

/// Where a wavefront of a given segment/distance/diagonal reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    pub segment: usize,
    pub distance: u32,
    pub k: i32,
    pub offset: i32,
}

/// One wavefront: the furthest-reaching offset on every diagonal in
/// `[lo, hi]`, at a fixed distance.
#[derive(Debug, Clone)]
struct Wavefront {
    lo: i32,
    hi: i32,
    offsets: Vec<Option<i32>>,
}

impl Wavefront {
    fn singleton(k: i32, offset: i32) -> Self {
        Wavefront {
            lo: k,
            hi: k,
            offsets: vec![Some(offset)],
        }
    }

    fn get(&self, k: i32) -> Option<i32> {
        if k < self.lo || k > self.hi {
            return None;
        }
        self.offsets[(k - self.lo) as usize]
    }

    fn set(&mut self, k: i32, offset: Option<i32>) {
        if k < self.lo {
            let mut grown = vec![None; (self.lo - k) as usize];
            grown.extend(std::mem::take(&mut self.offsets));
            self.offsets = grown;
            self.lo = k;
        } else if k > self.hi {
            self.offsets.resize((k - self.lo + 1) as usize, None);
            self.hi = k;
        }
        self.offsets[(k - self.lo) as usize] = offset;
    }
}

/// Where an already-opened segment's wavefront at diagonal `k` came from,
/// and where it begins, needed to splice backtraces across a connection.
#[derive(Debug, Clone, Copy)]
struct Control {
    previous_wf_end: Locator,
    current_wf_begin: Locator,
}

/// All wavefronts (indexed by distance) for a single text-DAG segment.
struct SegmentWavefronts {
    text_len: usize,
    wavefronts: Vec<Option<Wavefront>>,
    control: std::collections::HashMap<i32, Control>,
}

impl SegmentWavefronts {
    fn new(text_len: usize) -> Self {
        SegmentWavefronts {
            text_len,
            wavefronts: Vec::new(),
            control: std::collections::HashMap::new(),
        }
    }

    fn ensure_distance(&mut self, distance: u32) {
        let idx = distance as usize;
        if self.wavefronts.len() <= idx {
            self.wavefronts.resize_with(idx + 1, || None);
        }
    }
}

/// Wavefront state across every segment of a text-DAG, for one alignment.
pub struct WavefrontPoa<'a> {
    dag: &'a TextDag,
    pattern: Vec<char>,
    segments: BTreeMap<usize, SegmentWavefronts>,
    distance_cap: u32,
}

impl<'a> WavefrontPoa<'a> {
    pub fn new(pattern: &str, dag: &'a TextDag, distance_cap: u32) -> Result<Self, AlignError> {
        let pattern: Vec<char> = pattern.chars().collect();
        if pattern.len() > MAX_SEQUENCE_LEN {
            return Err(AlignError::PatternTooLong { len: pattern.len(), max: MAX_SEQUENCE_LEN });
        }
        Ok(WavefrontPoa {
            dag,
            pattern,
            segments: BTreeMap::new(),
            distance_cap,
        })
    }

    fn open_segment(&mut self, idx: usize) -> &mut SegmentWavefronts {
        let text_len = self.dag.segment(idx).map(|s| s.len()).unwrap_or(0);
        self.segments
            .entry(idx)
            .or_insert_with(|| SegmentWavefronts::new(text_len))
    }

    /// Runs the alignment to completion, returning the best score and its
    /// CIGAR (with `Segment` markers at every crossing).
    pub fn align(&mut self) -> Result<(i32, Cigar), AlignError> {
        if self.pattern.is_empty() {
            return Err(AlignError::ZeroLength {
                pattern_len: 0,
                text_len: self.dag.len(),
            });
        }
        self.open_segment(0);
        self.segments.get_mut(&0).unwrap().ensure_distance(0);
        self.segments.get_mut(&0).unwrap().wavefronts[0] = Some(Wavefront::singleton(0, 0));

        let mut distance = 0u32;
        let found = loop {
            let open_indices: Vec<usize> = self.segments.keys().copied().collect();
            let mut found_here = None;
            let mut any_active = false;
            for seg_idx in open_indices {
                let is_active = self
                    .segments
                    .get(&seg_idx)
                    .map(|s| matches!(s.wavefronts.get(distance as usize), Some(Some(_))))
                    .unwrap_or(false);
                if !is_active {
                    continue;
                }
                any_active = true;
                if let Some(loc) = self.segment_extend(seg_idx, distance) {
                    found_here = Some(loc);
                    break;
                }
                self.segment_compute_next(seg_idx, distance + 1);
            }
            if let Some(loc) = found_here {
                break loc;
            }
            if !any_active {
                return Err(AlignError::NoAlignmentFound);
            }
            if distance >= self.distance_cap {
                return Err(AlignError::DistanceCapExceeded { cap: self.distance_cap });
            }
            distance += 1;
        };

        let cigar = self.backtrace(found)?;
        Ok((found.distance as i32, cigar))
    }

    /// Extends every diagonal of `segment_idx`'s wavefront at `distance` as
    /// far as exact matches allow, connecting to successor segments (or
    /// reporting alignment completion) whenever a diagonal reaches the
    /// segment's end.
    fn segment_extend(&mut self, segment_idx: usize, distance: u32) -> Option<Locator> {
        let pattern_len = self.pattern.len();
        let text: Vec<char> = self
            .dag
            .segment(segment_idx)
            .map(|s| s.sequence.chars().collect())
            .unwrap_or_default();
        let text_len = text.len();
        let is_sink = self.dag.segment(segment_idx).map(|s| s.is_sink()).unwrap_or(true);

        let mut wavefront = self
            .segments
            .get_mut(&segment_idx)
            .unwrap()
            .wavefronts[distance as usize]
            .take()
            .unwrap();

        let lo = wavefront.lo;
        let hi = wavefront.hi;
        let mut alignment_found = None;

        for k in lo..=hi {
            let Some(mut h) = wavefront.get(k) else { continue };
            let mut v = (h - k) as usize;
            let mut h_us = h as usize;
            while v < pattern_len && h_us < text_len && self.pattern[v] == text[h_us] {
                h_us += 1;
                v += 1;
            }
            h = h_us as i32;
            wavefront.set(k, Some(h));

            if h_us == text_len {
                if is_sink {
                    if v == pattern_len {
                        alignment_found = Some(Locator {
                            segment: segment_idx,
                            distance,
                            k,
                            offset: h,
                        });
                    }
                } else {
                    self.connect_offset(segment_idx, distance, k, h);
                }
                wavefront.set(k, None);
            }
        }

        self.segments.get_mut(&segment_idx).unwrap().wavefronts[distance as usize] = Some(wavefront);
        alignment_found
    }

    /// Opens (or extends) the wavefronts of every successor of
    /// `segment_idx`, carrying the pattern position reached at `(k, offset)`
    /// across the connection. When two predecessor paths propagate onto the
    /// same successor diagonal in the same distance step, this is an
    /// expected path-merge, resolved deterministically by keeping the
    /// smaller `(distance, offset)` pair rather than whichever predecessor
    /// happened to be visited last.
    fn connect_offset(&mut self, segment_idx: usize, distance: u32, k: i32, offset: i32) {
        let successors: Vec<usize> = self
            .dag
            .segment(segment_idx)
            .map(|s| s.successors.clone())
            .unwrap_or_default();

        for next_idx in successors {
            self.open_segment(next_idx);
            let next_v = offset - k;
            let next_k = -next_v;
            let next_offset = 0;

            {
                let next_seg = self.segments.get_mut(&next_idx).unwrap();
                next_seg.ensure_distance(distance);
            }
            let wf_is_new = self.segments[&next_idx].wavefronts[distance as usize].is_none();
            if wf_is_new {
                self.segments.get_mut(&next_idx).unwrap().wavefronts[distance as usize] =
                    Some(Wavefront::singleton(next_k, next_offset));
            } else {
                let next_seg = self.segments.get_mut(&next_idx).unwrap();
                let wf = next_seg.wavefronts[distance as usize].as_mut().unwrap();
                let existing = wf.get(next_k);
                let should_set = match existing {
                    Some(existing) => existing < next_offset,
                    None => true,
                };
                if should_set {
                    if existing.is_some() {
                        tracing::debug!(
                            segment = next_idx,
                            diagonal = next_k,
                            distance,
                            "connect_offset overwrote an existing offset (expected path-merge)"
                        );
                    }
                    wf.set(next_k, Some(next_offset));
                }
            }

            let candidate_previous_end = Locator { segment: segment_idx, distance, k, offset };
            let candidate_begin = Locator { segment: next_idx, distance, k: next_k, offset: next_offset };

            let next_seg = self.segments.get_mut(&next_idx).unwrap();
            let keep_existing = match next_seg.control.get(&next_k) {
                Some(existing) => {
                    (existing.previous_wf_end.distance, existing.previous_wf_end.offset)
                        <= (candidate_previous_end.distance, candidate_previous_end.offset)
                }
                None => false,
            };

            if keep_existing {
                tracing::debug!(
                    segment = next_idx,
                    diagonal = next_k,
                    existing_offset = next_seg.control[&next_k].previous_wf_end.offset,
                    candidate_offset = candidate_previous_end.offset,
                    "keeping smaller previous_wf_end at path merge"
                );
            } else {
                next_seg.control.insert(
                    next_k,
                    Control {
                        previous_wf_end: candidate_previous_end,
                        current_wf_begin: candidate_begin,
                    },
                );
            }
        }
    }

    /// Computes the next distance's wavefront for `segment_idx` from its
    /// wavefront one distance lower, peeling the diagonal range by one on
    /// each side (insertion/deletion) plus a same-diagonal mismatch step.
    fn segment_compute_next(&mut self, segment_idx: usize, distance: u32) {
        let Some(seg) = self.segments.get_mut(&segment_idx) else { return };
        seg.ensure_distance(distance);
        let Some(prev) = seg.wavefronts[(distance - 1) as usize].clone() else { return };

        let lo = prev.lo - 1;
        let hi = prev.hi + 1;
        let mut offsets = Vec::with_capacity((hi - lo + 1) as usize);
        for k in lo..=hi {
            let mismatch = prev.get(k).map(|o| o + 1);
            let insertion = prev.get(k - 1).map(|o| o + 1);
            let deletion = prev.get(k + 1);
            let best = [mismatch, insertion, deletion].into_iter().flatten().max();
            offsets.push(best);
        }

        // Trim leading/trailing cells that never got a valid offset, so lo/hi
        // stay tight instead of growing forever on dead diagonals.
        let first = offsets.iter().position(Option::is_some);
        let last = offsets.iter().rposition(Option::is_some);
        let wavefront = match (first, last) {
            (Some(f), Some(l)) => Wavefront {
                lo: lo + f as i32,
                hi: lo + l as i32,
                offsets: offsets[f..=l].to_vec(),
            },
            _ => Wavefront { lo, hi: lo - 1, offsets: Vec::new() },
        };
        self.segments.get_mut(&segment_idx).unwrap().wavefronts[distance as usize] = Some(wavefront);
    }

    /// Backtraces from the alignment-completing locator back to segment 0,
    /// emitting `Segment` markers at every crossing.
    fn backtrace(&self, alignment_end: Locator) -> Result<Cigar, AlignError> {
        let mut cigar = Cigar::new();
        let mut loc = alignment_end;
        loop {
            let seg_idx = loc.segment;
            self.backtrace_segment(seg_idx, &mut loc, &mut cigar)?;
            cigar.push_segment(seg_idx);
            if seg_idx == 0 {
                break;
            }
        }
        cigar.finish();
        Ok(cigar)
    }

    fn backtrace_segment(
        &self,
        segment_idx: usize,
        loc: &mut Locator,
        cigar: &mut Cigar,
    ) -> Result<(), AlignError> {
        let seg = self
            .segments
            .get(&segment_idx)
            .ok_or(AlignError::SegmentNotOpen { segment: segment_idx })?;
        let root_begin = Locator { segment: 0, distance: 0, k: 0, offset: 0 };
        let mut wf_begin = if segment_idx == 0 {
            root_begin
        } else {
            seg.control[&loc.k].current_wf_begin
        };

        while wf_begin.distance != loc.distance || wf_begin.k != loc.k {
            let wavefront = seg.wavefronts[(loc.distance - 1) as usize].as_ref().unwrap();
            let offset_del = wavefront.get(loc.k + 1);
            let offset_ins = wavefront.get(loc.k - 1).map(|o| o + 1);
            let offset_mism = wavefront.get(loc.k).map(|o| o + 1);
            let offset_max = [offset_del, offset_ins, offset_mism].into_iter().flatten().max().unwrap();

            let num_matches = loc.offset - offset_max;
            for _ in 0..num_matches {
                cigar.push(CigarOp::Match);
            }

            loc.offset = offset_max;
            if Some(offset_max) == offset_del {
                cigar.push(CigarOp::Deletion);
                loc.k += 1;
                loc.distance -= 1;
            } else if Some(offset_max) == offset_ins {
                cigar.push(CigarOp::Insertion);
                loc.k -= 1;
                loc.offset -= 1;
                loc.distance -= 1;
            } else {
                cigar.push(CigarOp::Mismatch);
                loc.distance -= 1;
                loc.offset -= 1;
            }

            wf_begin = if segment_idx == 0 {
                root_begin
            } else {
                seg.control[&loc.k].current_wf_begin
            };
        }

        let leading_matches = loc.offset - wf_begin.offset;
        for _ in 0..leading_matches {
            cigar.push(CigarOp::Match);
        }

        if segment_idx != 0 {
            *loc = seg.control[&loc.k].previous_wf_end;
        }
        Ok(())
    }
}

/// Convenience entry point: aligns `pattern` against `dag` and returns the
/// best score and its CIGAR.
pub fn align(pattern: &str, dag: &TextDag, distance_cap: u32) -> Result<(i32, Cigar), AlignError> {
    let mut wf = WavefrontPoa::new(pattern, dag, distance_cap)?;
    wf.align()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_exact_path_scores_zero() {
        let dag = TextDag::example_branch_rejoin();
        let (score, cigar) = align("ACTGTACT", &dag, 1000).unwrap();
        assert_eq!(score, 0);
        assert_eq!(cigar.to_string(), "(0)3M(2)2M(3)3M");
    }

    #[test]
    fn s5_single_mismatch_per_segment_scores_four() {
        let dag = TextDag::example_branch_rejoin();
        // One mismatch within each of the 3 traversed segments (0, 2, 3)
        // relative to the S4 exact path "ACT"+"GT"+"ACT".
        let (score, cigar) = align("AGTGAAGT", &dag, 1000).unwrap();
        assert_eq!(score, 4);
        assert_eq!(cigar.to_string(), "(0)1M1X1M(2)1M1X(3)1M1X1M");
    }

    #[test]
    fn s6_short_pattern_forces_insertions_around_branch() {
        let dag = TextDag::example_branch_rejoin();
        let (score, cigar) = align("GT", &dag, 1000).unwrap();
        assert_eq!(score, 6);
        assert_eq!(cigar.to_string(), "(0)3I(2)2M(3)3I");
    }

    #[test]
    fn matches_dp_oracle_on_random_like_input() {
        let dag = TextDag::example_branch_rejoin();
        for pattern in ["ACTGTACT", "ACCTGACT", "ACTACT", "GTACTX"] {
            let (wf_score, _) = align(pattern, &dag, 1000).unwrap();
            let dp_score = crate::edit_dp_poa::score(pattern, &dag).unwrap();
            assert_eq!(wf_score, dp_score, "mismatch for pattern {pattern}");
        }
    }
}
