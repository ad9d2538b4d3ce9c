//! A topologically-ordered DAG of sequence segments, the coarse-grained
//! structure WFPOA aligns against. Each segment is a short run of bases;
//! edges between segments carry a weight (how many source sequences took
//! that path).
//!
//! Segment 0 is the real first segment of the graph, not a virtual END
//! placeholder; see the design note in `DESIGN.md` for why this departs
//! from a literal reading of the distilled spec. A "sink" segment is simply
//! any segment with no successors.

use crate::error::PoaError;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct TextDagSegment {
    pub sequence: String,
    pub predecessors: Vec<usize>,
    pub successors: Vec<usize>,
    /// Ranks of the source sequences whose path passes through this
    /// segment, in the order [`TextDag::add_sequence_path`] recorded them.
    pub traversing_sequences: Vec<usize>,
}

impl TextDagSegment {
    fn new(sequence: impl Into<String>) -> Self {
        TextDagSegment {
            sequence: sequence.into(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            traversing_sequences: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_sink(&self) -> bool {
        self.successors.is_empty()
    }

    pub fn is_source(&self) -> bool {
        self.predecessors.is_empty()
    }
}

/// A DAG of text segments with weighted connections between them.
#[derive(Debug, Clone, Default)]
pub struct TextDag {
    segments: Vec<TextDagSegment>,
    /// weight[(from, to)]
    weights: std::collections::HashMap<(usize, usize), u32>,
    /// Segment path recorded for each source sequence, parallel to its rank
    /// (the index a GFA `P` line names it by).
    sequence_paths: Vec<Vec<usize>>,
}

impl TextDag {
    pub fn new() -> Self {
        TextDag::default()
    }

    pub fn segment(&self, id: usize) -> Result<&TextDagSegment, PoaError> {
        self.segments.get(id).ok_or(PoaError::UnknownSegment(id))
    }

    pub fn segments(&self) -> &[TextDagSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Adds a new segment and returns its index.
    pub fn add_segment(&mut self, sequence: impl Into<String>) -> usize {
        let id = self.segments.len();
        self.segments.push(TextDagSegment::new(sequence));
        id
    }

    /// Connects `from -> to` with the given weight, coalescing with an
    /// existing connection between the same pair instead of duplicating it.
    pub fn add_connection(&mut self, from: usize, to: usize, weight: u32) -> Result<(), PoaError> {
        if from >= self.segments.len() {
            return Err(PoaError::UnknownSegment(from));
        }
        if to >= self.segments.len() {
            return Err(PoaError::UnknownSegment(to));
        }
        let key = (from, to);
        if let Some(existing) = self.weights.get_mut(&key) {
            *existing += weight;
            return Ok(());
        }
        self.weights.insert(key, weight);
        self.segments[from].successors.push(to);
        self.segments[to].predecessors.push(from);
        Ok(())
    }

    pub fn connection_weight(&self, from: usize, to: usize) -> u32 {
        self.weights.get(&(from, to)).copied().unwrap_or(0)
    }

    /// Files `path` under a new sequence rank without touching connection
    /// weights, for reconstructing a `P` line whose steps are already
    /// accounted for by the `L` lines' own `RC:i:` tags.
    fn record_sequence_path(&mut self, path: Vec<usize>) {
        let rank = self.sequence_paths.len();
        for &seg in &path {
            if let Some(segment) = self.segments.get_mut(seg) {
                segment.traversing_sequences.push(rank);
            }
        }
        self.sequence_paths.push(path);
    }

    /// Records that a source sequence traverses `path` (a run of segment
    /// ids in visitation order), adding one unit of connection weight per
    /// step and returning the sequence's rank. This is what lets `to_gfa`
    /// emit a `P` line for every input sequence, not just the aggregate `L`
    /// weights.
    pub fn add_sequence_path(&mut self, path: &[usize]) -> Result<usize, PoaError> {
        if path.is_empty() {
            return Err(PoaError::EmptySequence);
        }
        for win in path.windows(2) {
            self.add_connection(win[0], win[1], 1)?;
        }
        let rank = self.sequence_paths.len();
        self.record_sequence_path(path.to_vec());
        Ok(rank)
    }

    /// Kahn's algorithm. Returns segments in topological order, or
    /// `PoaError::NotADag` if the graph contains a cycle.
    pub fn topological_sort(&self) -> Result<Vec<usize>, PoaError> {
        let n = self.segments.len();
        let mut in_degree = vec![0usize; n];
        for seg in &self.segments {
            for &succ in &seg.successors {
                in_degree[succ] += 1;
            }
        }
        let mut stack: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(node) = stack.pop() {
            order.push(node);
            for &succ in &self.segments[node].successors {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    stack.push(succ);
                }
            }
        }
        if order.len() != n {
            return Err(PoaError::NotADag);
        }
        Ok(order)
    }

    /// Heaviest-bundle consensus, mirroring the POG's rank-order DP at
    /// segment granularity: `score[seg] = max over in-edges e of e.weight +
    /// score[e.begin]`, ties broken toward the in-edge whose begin has the
    /// higher score. The overall highest-scoring segment anchors the path;
    /// if it isn't a sink, a branch-completion pass advances to the
    /// highest-scoring segment among later ranks until a sink is found.
    /// Predecessor pointers recorded during the DP give the path itself.
    pub fn heaviest_bundle_consensus(&self) -> Result<String, PoaError> {
        if self.segments.is_empty() {
            return Ok(String::new());
        }
        let order = self.topological_sort()?;
        let mut score = vec![0i64; self.segments.len()];
        let mut predecessor_of: Vec<Option<usize>> = vec![None; self.segments.len()];

        for &seg in &order {
            let mut best: Option<(i64, usize)> = None;
            for &pred in &self.segments[seg].predecessors {
                let candidate = self.connection_weight(pred, seg) as i64 + score[pred];
                let is_better = match best {
                    None => true,
                    Some((best_score, best_pred)) => {
                        candidate > best_score || (candidate == best_score && score[pred] > score[best_pred])
                    }
                };
                if is_better {
                    best = Some((candidate, pred));
                }
            }
            if let Some((candidate, pred)) = best {
                score[seg] = candidate;
                predecessor_of[seg] = Some(pred);
            }
        }

        let rank_of_segment = |id: usize| order.iter().position(|&n| n == id).unwrap();
        let mut anchor = *order.iter().max_by_key(|&&id| score[id]).unwrap();
        while !self.segments[anchor].is_sink() {
            let rank = rank_of_segment(anchor);
            match order[rank + 1..].iter().max_by_key(|&&id| score[id]) {
                Some(&candidate) => anchor = candidate,
                None => break,
            }
        }

        let mut path = Vec::new();
        let mut current = Some(anchor);
        while let Some(id) = current {
            path.push(id);
            current = predecessor_of[id];
        }
        path.reverse();
        Ok(path.into_iter().map(|id| self.segments[id].sequence.as_str()).collect())
    }

    /// Emits the DAG as a GFA1 text: one `S` line per segment, one `L` line
    /// per connection (all overlaps reported as `0M`, since segments never
    /// overlap here), and one `P` line per recorded sequence path.
    pub fn to_gfa(&self) -> String {
        let mut out = String::from("H\tVN:Z:1.0\n");
        for (id, seg) in self.segments.iter().enumerate() {
            out.push_str(&format!("S\t{id}\t{}\n", seg.sequence));
        }
        for (id, seg) in self.segments.iter().enumerate() {
            for &succ in &seg.successors {
                let w = self.connection_weight(id, succ);
                out.push_str(&format!("L\t{id}\t+\t{succ}\t+\t0M\tRC:i:{w}\n"));
            }
        }
        for (rank, path) in self.sequence_paths.iter().enumerate() {
            let nodes: Vec<String> = path.iter().map(|id| format!("{id}+")).collect();
            out.push_str(&format!("P\t{rank}\t{}\t*\n", nodes.join(",")));
        }
        out
    }

    /// Parses a GFA1 text back into a `TextDag`, the inverse of
    /// [`TextDag::to_gfa`]. `S` lines are read in the order they appear and
    /// must number segments `0..n` contiguously; `L` lines add connections,
    /// reading the weight back out of the `RC:i:` tag when present; `P`
    /// lines restore each segment's `traversing_sequences` without
    /// double-counting weight the `L` lines already carried.
    pub fn from_gfa(gfa: &str) -> Result<TextDag, PoaError> {
        let mut dag = TextDag::new();
        for line in gfa.lines() {
            let mut fields = line.split('\t');
            match fields.next() {
                Some("S") => {
                    let id: usize = fields
                        .next()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| PoaError::InvalidCigar("malformed S line".to_string()))?;
                    let seq = fields
                        .next()
                        .ok_or_else(|| PoaError::InvalidCigar("S line missing sequence".to_string()))?;
                    if id != dag.segments.len() {
                        return Err(PoaError::InvalidCigar(format!(
                            "S lines must be contiguous from 0, got {id} after {}",
                            dag.segments.len()
                        )));
                    }
                    dag.add_segment(seq);
                }
                Some("L") => {
                    let from: usize = fields
                        .next()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| PoaError::InvalidCigar("malformed L line".to_string()))?;
                    fields.next(); // strand
                    let to: usize = fields
                        .next()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| PoaError::InvalidCigar("malformed L line".to_string()))?;
                    let weight = line
                        .split('\t')
                        .find_map(|f| f.strip_prefix("RC:i:"))
                        .and_then(|w| w.parse().ok())
                        .unwrap_or(1);
                    dag.add_connection(from, to, weight)?;
                }
                Some("P") => {
                    fields.next(); // path rank; reassigned in append order
                    let nodes = fields
                        .next()
                        .ok_or_else(|| PoaError::InvalidCigar("P line missing path field".to_string()))?;
                    let path: Vec<usize> = nodes
                        .split(',')
                        .map(|n| {
                            n.trim_end_matches(['+', '-'])
                                .parse()
                                .map_err(|_| PoaError::InvalidCigar(format!("malformed P line segment {n}")))
                        })
                        .collect::<Result<_, _>>()?;
                    dag.record_sequence_path(path);
                }
                _ => continue,
            }
        }
        Ok(dag)
    }

    /// Builds the three-segment branch-and-rejoin DAG used throughout the
    /// test suite: 0="ACT" branches to 1="ACCTG" and 2="GT", both of which
    /// rejoin at 3="ACT".
    pub fn example_branch_rejoin() -> TextDag {
        let mut dag = TextDag::new();
        let s0 = dag.add_segment("ACT");
        let s1 = dag.add_segment("ACCTG");
        let s2 = dag.add_segment("GT");
        let s3 = dag.add_segment("ACT");
        dag.add_connection(s0, s1, 2).unwrap();
        dag.add_connection(s0, s2, 2).unwrap();
        dag.add_connection(s1, s3, 2).unwrap();
        dag.add_connection(s2, s3, 2).unwrap();
        dag
    }
}

#[allow(dead_code)]
fn bfs_reachable(dag: &TextDag, from: usize) -> VecDeque<usize> {
    let mut queue = VecDeque::new();
    let mut seen = std::collections::HashSet::new();
    queue.push_back(from);
    seen.insert(from);
    let mut order = VecDeque::new();
    while let Some(node) = queue.pop_front() {
        order.push_back(node);
        for &succ in &dag.segments[node].successors {
            if seen.insert(succ) {
                queue.push_back(succ);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_numbering_matches_no_virtual_end_segment() {
        let dag = TextDag::example_branch_rejoin();
        assert_eq!(dag.segment(0).unwrap().sequence, "ACT");
        assert_eq!(dag.segment(1).unwrap().sequence, "ACCTG");
        assert_eq!(dag.segment(2).unwrap().sequence, "GT");
        assert_eq!(dag.segment(3).unwrap().sequence, "ACT");
        assert!(dag.segment(3).unwrap().is_sink());
        assert!(dag.segment(0).unwrap().is_source());
    }

    #[test]
    fn topological_sort_respects_edges() {
        let dag = TextDag::example_branch_rejoin();
        let order = dag.topological_sort().unwrap();
        let pos = |id: usize| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(0) < pos(1));
        assert!(pos(0) < pos(2));
        assert!(pos(1) < pos(3));
        assert!(pos(2) < pos(3));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut dag = TextDag::new();
        let a = dag.add_segment("A");
        let b = dag.add_segment("B");
        dag.add_connection(a, b, 1).unwrap();
        dag.add_connection(b, a, 1).unwrap();
        assert_eq!(dag.topological_sort(), Err(PoaError::NotADag));
    }

    #[test]
    fn connection_weight_coalesces() {
        let mut dag = TextDag::new();
        let a = dag.add_segment("A");
        let b = dag.add_segment("B");
        dag.add_connection(a, b, 1).unwrap();
        dag.add_connection(a, b, 3).unwrap();
        assert_eq!(dag.connection_weight(a, b), 4);
        assert_eq!(dag.segment(a).unwrap().successors, vec![b]);
    }

    #[test]
    fn gfa_round_trips_through_to_gfa_and_from_gfa() {
        let dag = TextDag::example_branch_rejoin();
        let gfa = dag.to_gfa();
        let parsed = TextDag::from_gfa(&gfa).unwrap();
        assert_eq!(parsed.len(), dag.len());
        for id in 0..dag.len() {
            assert_eq!(parsed.segment(id).unwrap().sequence, dag.segment(id).unwrap().sequence);
        }
        assert_eq!(parsed.connection_weight(0, 1), dag.connection_weight(0, 1));
    }

    #[test]
    fn gfa_round_trips_path_lines() {
        let mut dag = TextDag::example_branch_rejoin();
        dag.add_sequence_path(&[0, 1, 3]).unwrap();
        dag.add_sequence_path(&[0, 2, 3]).unwrap();

        let gfa = dag.to_gfa();
        assert!(gfa.contains("P\t0\t0+,1+,3+\t*"));
        assert!(gfa.contains("P\t1\t0+,2+,3+\t*"));

        let parsed = TextDag::from_gfa(&gfa).unwrap();
        assert_eq!(parsed.segment(0).unwrap().traversing_sequences, vec![0, 1]);
        assert_eq!(parsed.segment(1).unwrap().traversing_sequences, vec![0]);
        assert_eq!(parsed.segment(2).unwrap().traversing_sequences, vec![1]);
        // The `L` lines' RC:i: tags already carry the aggregate weight that
        // add_sequence_path contributed, so parsing the P lines back must
        // not add it a second time.
        assert_eq!(parsed.connection_weight(0, 1), dag.connection_weight(0, 1));
        assert_eq!(parsed.connection_weight(1, 3), dag.connection_weight(1, 3));
    }

    #[test]
    fn heaviest_bundle_prefers_downstream_weight_over_first_edge() {
        // 0 -> 1 (w=5), 0 -> 2 (w=6), 1 -> 3 (w=10), 2 -> 3 (w=1), 3 is the
        // sink. The heaviest full path is 0 -> 1 -> 3 (score 15), not the
        // locally-heavier first edge 0 -> 2 (score 7 via 2 -> 3).
        let mut dag = TextDag::new();
        let s0 = dag.add_segment("A");
        let s1 = dag.add_segment("C");
        let s2 = dag.add_segment("G");
        let s3 = dag.add_segment("T");
        dag.add_connection(s0, s1, 5).unwrap();
        dag.add_connection(s0, s2, 6).unwrap();
        dag.add_connection(s1, s3, 10).unwrap();
        dag.add_connection(s2, s3, 1).unwrap();
        assert_eq!(dag.heaviest_bundle_consensus().unwrap(), "ACT");
    }

    #[test]
    fn heaviest_bundle_picks_heavier_branch() {
        let mut dag = TextDag::new();
        let s0 = dag.add_segment("AC");
        let s1 = dag.add_segment("TG");
        let s2 = dag.add_segment("GT");
        let s3 = dag.add_segment("X");
        dag.add_connection(s0, s1, 5).unwrap();
        dag.add_connection(s0, s2, 1).unwrap();
        dag.add_connection(s1, s3, 1).unwrap();
        dag.add_connection(s2, s3, 1).unwrap();
        assert_eq!(dag.heaviest_bundle_consensus().unwrap(), "ACTGX");
    }
}
