//! The partial-order graph (POG): a DAG of single-character nodes built up
//! incrementally from a family of related sequences, with an aligned-set
//! union over nodes that occupy the same MSA column.
//!
//! Node identity is a plain `usize` index into `PoGraph::nodes`; there are
//! no owned pointers or cycles to manage, just indices into a growable
//! `Vec` (see `DESIGN.md`'s resolution of the aligned-node-storage open
//! question).

use crate::error::PoaError;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PoaNode {
    pub base: char,
    pub predecessors: Vec<usize>,
    pub successors: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct PoaEdge {
    pub weight: u32,
    pub labels: Vec<usize>,
}

/// A partial-order alignment graph.
#[derive(Debug, Clone, Default)]
pub struct PoGraph {
    nodes: Vec<PoaNode>,
    edges: HashMap<(usize, usize), PoaEdge>,
    /// Union-find over node ids: nodes sharing a root occupy the same MSA
    /// column (the "aligned set" of the original design).
    aligned_parent: Vec<usize>,
    num_sequences: usize,
    /// First node of each sequence's path, parallel to sequence index.
    sequences_begin_node: Vec<usize>,
}

impl PoGraph {
    pub fn new() -> Self {
        PoGraph::default()
    }

    pub fn node(&self, id: usize) -> Result<&PoaNode, PoaError> {
        self.nodes.get(id).ok_or(PoaError::UnknownNode(id))
    }

    pub fn nodes(&self) -> &[PoaNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_sequences(&self) -> usize {
        self.num_sequences
    }

    fn new_node(&mut self, base: char) -> usize {
        let id = self.nodes.len();
        self.nodes.push(PoaNode {
            base,
            predecessors: Vec::new(),
            successors: Vec::new(),
        });
        self.aligned_parent.push(id);
        id
    }

    fn find(&mut self, x: usize) -> usize {
        if self.aligned_parent[x] != x {
            let root = self.find(self.aligned_parent[x]);
            self.aligned_parent[x] = root;
        }
        self.aligned_parent[x]
    }

    /// Marks `a` and `b` as occupying the same MSA column.
    fn union_aligned(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.aligned_parent[ra] = rb;
        }
    }

    /// Returns every node id that shares `id`'s MSA column, `id` included.
    pub fn aligned_siblings(&mut self, id: usize) -> Vec<usize> {
        let root = self.find(id);
        (0..self.nodes.len())
            .filter(|&n| self.find(n) == root)
            .collect()
    }

    fn connect(&mut self, from: usize, to: usize, label: usize) {
        self.connect_weighted(from, to, label, 1);
    }

    /// Connects `from -> to`, labelling the edge with `label` and adding
    /// `weight` to its running total. Coalesces with an existing edge
    /// between the same pair instead of creating a second one.
    fn connect_weighted(&mut self, from: usize, to: usize, label: usize, weight: u32) {
        if !self.edges.contains_key(&(from, to)) {
            self.nodes[from].successors.push(to);
            self.nodes[to].predecessors.push(from);
        }
        self.edges
            .entry((from, to))
            .and_modify(|e| {
                e.weight += weight;
                e.labels.push(label);
            })
            .or_insert(PoaEdge {
                weight,
                labels: vec![label],
            });
    }

    pub fn edge_weight(&self, from: usize, to: usize) -> u32 {
        self.edges.get(&(from, to)).map(|e| e.weight).unwrap_or(0)
    }

    /// Seeds the graph with the first sequence as a straight chain of
    /// single-character nodes. Returns the node id for each character.
    pub fn add_sequence(&mut self, seq: &str) -> Result<Vec<usize>, PoaError> {
        if seq.is_empty() {
            return Err(PoaError::EmptySequence);
        }
        let label = self.num_sequences;
        self.num_sequences += 1;
        let mut node_ids = Vec::with_capacity(seq.len());
        let mut prev: Option<usize> = None;
        for ch in seq.chars() {
            let id = self.new_node(ch);
            node_ids.push(id);
            if let Some(p) = prev {
                self.connect(p, id, label);
            }
            prev = Some(id);
        }
        self.sequences_begin_node.push(node_ids[0]);
        Ok(node_ids)
    }

    /// Incorporates `seq` into the graph given an alignment against it and
    /// a per-character weight (e.g. how many source reads support each
    /// base). `mapping[i]` is `Some(existing_node_id)` when position `i` of
    /// `seq` aligns to that node (match or mismatch; a mismatch gets its own
    /// new node, unioned into the existing node's aligned set) or `None`
    /// when position `i` is an insertion with no counterpart — this covers
    /// unaligned prefixes/suffixes too, since they're just runs of `None`.
    ///
    /// Edges are weighted "both endpoints contribute": connecting node `i`
    /// to node `i+1` adds `weights[i] + weights[i+1]` to that edge's total,
    /// coalescing with an existing edge between the same pair rather than
    /// duplicating it.
    pub fn add_alignment(
        &mut self,
        seq: &str,
        mapping: &[Option<usize>],
        weights: &[u32],
    ) -> Result<Vec<usize>, PoaError> {
        if seq.is_empty() {
            return Err(PoaError::EmptySequence);
        }
        let len = seq.chars().count();
        if mapping.len() != len {
            return Err(PoaError::MismatchedLengths(format!(
                "alignment mapping has {} entries for a {len}-character sequence",
                mapping.len()
            )));
        }
        if weights.len() != len {
            return Err(PoaError::MismatchedLengths(format!(
                "weights has {} entries for a {len}-character sequence",
                weights.len()
            )));
        }
        let label = self.num_sequences;
        self.num_sequences += 1;

        let mut node_ids = Vec::with_capacity(mapping.len());
        for (ch, m) in seq.chars().zip(mapping.iter()) {
            match m {
                Some(&existing) => {
                    let existing_node = self.node(existing)?;
                    if existing_node.base == ch {
                        node_ids.push(existing);
                    } else {
                        let siblings = self.aligned_siblings(existing);
                        if let Some(&reuse) = siblings.iter().find(|&&s| self.nodes[s].base == ch) {
                            node_ids.push(reuse);
                        } else {
                            let new_id = self.new_node(ch);
                            self.union_aligned(new_id, existing);
                            node_ids.push(new_id);
                        }
                    }
                }
                None => {
                    node_ids.push(self.new_node(ch));
                }
            }
        }

        for (i, pair) in node_ids.windows(2).enumerate() {
            let weight = weights[i] + weights[i + 1];
            self.connect_weighted(pair[0], pair[1], label, weight);
        }
        self.sequences_begin_node.push(node_ids[0]);
        Ok(node_ids)
    }

    /// Renders the multiple sequence alignment: one row per added sequence,
    /// columns from [`PoGraph::column_assignment`], gaps filled with `-`.
    /// Walks each sequence's own path by following, from its begin node,
    /// the unique outgoing edge labelled with that sequence's index.
    pub fn msa(&mut self) -> Result<Vec<String>, PoaError> {
        let columns = self.column_assignment()?;
        let num_columns = columns.iter().copied().max().map(|m| m + 1).unwrap_or(0);
        let mut rows = vec![vec!['-'; num_columns]; self.num_sequences];

        for (s, row) in rows.iter_mut().enumerate() {
            let mut current = self.sequences_begin_node.get(s).copied();
            while let Some(node_id) = current {
                row[columns[node_id]] = self.nodes[node_id].base;
                current = self.nodes[node_id].successors.iter().copied().find(|&succ| {
                    self.edges
                        .get(&(node_id, succ))
                        .map(|e| e.labels.contains(&s))
                        .unwrap_or(false)
                });
            }
        }
        Ok(rows.into_iter().map(|r| r.into_iter().collect()).collect())
    }

    /// Iterative DFS topological sort with cycle detection (white/gray/black
    /// marking), returning node ids with all predecessors before successors.
    pub fn topological_sort(&self) -> Result<Vec<usize>, PoaError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Gray,
            Black,
        }
        let n = self.nodes.len();
        let mut mark = vec![Mark::White; n];
        let mut order = Vec::with_capacity(n);

        for start in 0..n {
            if mark[start] != Mark::White {
                continue;
            }
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            mark[start] = Mark::Gray;
            while let Some(&mut (node, ref mut next_child)) = stack.last_mut() {
                if *next_child < self.nodes[node].successors.len() {
                    let child = self.nodes[node].successors[*next_child];
                    *next_child += 1;
                    match mark[child] {
                        Mark::White => {
                            mark[child] = Mark::Gray;
                            stack.push((child, 0));
                        }
                        Mark::Gray => return Err(PoaError::NotADag),
                        Mark::Black => {}
                    }
                } else {
                    mark[node] = Mark::Black;
                    order.push(node);
                    stack.pop();
                }
            }
        }
        order.reverse();
        Ok(order)
    }

    /// Assigns each node an MSA column: nodes walked in topological order
    /// join the column of an already-placed aligned sibling if one exists,
    /// otherwise open a new column.
    pub fn column_assignment(&mut self) -> Result<Vec<usize>, PoaError> {
        let order = self.topological_sort()?;
        let mut column = vec![usize::MAX; self.nodes.len()];
        let mut next_column = 0usize;
        for &node in &order {
            if column[node] != usize::MAX {
                continue;
            }
            let siblings = self.aligned_siblings(node);
            let existing_column = siblings.iter().find_map(|&s| {
                let c = column[s];
                if c != usize::MAX {
                    Some(c)
                } else {
                    None
                }
            });
            let col = existing_column.unwrap_or_else(|| {
                let c = next_column;
                next_column += 1;
                c
            });
            for &s in &siblings {
                column[s] = col;
            }
        }
        Ok(column)
    }

    /// Heaviest-bundle consensus, computed as a rank-order DP rather than a
    /// greedy walk: `score[node] = max over in-edges e of e.weight +
    /// score[e.begin]`, ties broken toward the in-edge whose begin has the
    /// higher score. The node with the overall maximum score anchors the
    /// path; if it isn't a sink, a branch-completion pass keeps advancing to
    /// the highest-scoring node among later ranks until one with no
    /// successors is found. The path itself comes from tracing the
    /// per-node predecessor pointers recorded during the DP back to a root.
    pub fn heaviest_bundle_consensus(&self) -> Result<String, PoaError> {
        if self.nodes.is_empty() {
            return Ok(String::new());
        }
        let order = self.topological_sort()?;
        let mut score = vec![0i64; self.nodes.len()];
        let mut predecessor_of: Vec<Option<usize>> = vec![None; self.nodes.len()];

        for &node in &order {
            let mut best: Option<(i64, usize)> = None;
            for &pred in &self.nodes[node].predecessors {
                let candidate = self.edge_weight(pred, node) as i64 + score[pred];
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
                score[node] = candidate;
                predecessor_of[node] = Some(pred);
            }
        }

        let rank_of_node = |id: usize| order.iter().position(|&n| n == id).unwrap();
        let mut anchor = *order.iter().max_by_key(|&&id| score[id]).unwrap();
        while !self.nodes[anchor].successors.is_empty() {
            let rank = rank_of_node(anchor);
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
        Ok(path.into_iter().map(|id| self.nodes[id].base).collect())
    }

    /// Renders the graph as Graphviz DOT: one node per base, solid edges for
    /// sequence adjacency, dashed edges between aligned (same-column) nodes.
    pub fn to_dot(&mut self) -> String {
        let mut out = String::from("digraph POA {\n  rankdir=LR;\n");
        for (id, node) in self.nodes.iter().enumerate() {
            out.push_str(&format!("  n{id} [label=\"{}\"];\n", node.base));
        }
        for (&(from, to), edge) in &self.edges {
            out.push_str(&format!(
                "  n{from} -> n{to} [label=\"{}\"];\n",
                edge.weight
            ));
        }
        let mut seen_pairs = std::collections::HashSet::new();
        for id in 0..self.nodes.len() {
            for sibling in self.aligned_siblings(id) {
                if sibling <= id {
                    continue;
                }
                let pair = (id, sibling);
                if seen_pairs.insert(pair) {
                    out.push_str(&format!(
                        "  n{id} -> n{sibling} [style=dashed, constraint=false];\n"
                    ));
                }
            }
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sequence_is_a_chain() {
        let mut g = PoGraph::new();
        let ids = g.add_sequence("ACT").unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(g.node(ids[0]).unwrap().base, 'A');
        assert_eq!(g.node(ids[1]).unwrap().predecessors, vec![ids[0]]);
        assert_eq!(g.edge_weight(ids[0], ids[1]), 1);
    }

    #[test]
    fn add_alignment_reuses_matching_nodes() {
        let mut g = PoGraph::new();
        let first = g.add_sequence("ACT").unwrap();
        let mapping = vec![Some(first[0]), Some(first[1]), Some(first[2])];
        let second = g.add_alignment("ACT", &mapping, &[1, 0, 1]).unwrap();
        assert_eq!(second, first);
        assert_eq!(g.edge_weight(first[0], first[1]), 2);
    }

    #[test]
    fn add_alignment_forks_on_mismatch() {
        let mut g = PoGraph::new();
        let first = g.add_sequence("ACT").unwrap();
        let mapping = vec![Some(first[0]), Some(first[1]), Some(first[2])];
        let second = g.add_alignment("ACG", &mapping, &[1, 1, 1]).unwrap();
        assert_ne!(second[2], first[2]);
        assert_eq!(g.node(second[2]).unwrap().base, 'G');
    }

    #[test]
    fn add_alignment_reuses_aligned_sibling_on_repeated_mismatch() {
        let mut g = PoGraph::new();
        let first = g.add_sequence("ACT").unwrap();
        let mapping = vec![Some(first[0]), Some(first[1]), Some(first[2])];
        let second = g.add_alignment("ACG", &mapping, &[1, 1, 1]).unwrap();
        let third = g.add_alignment("ACG", &mapping, &[1, 1, 1]).unwrap();
        assert_eq!(third[2], second[2]);
        assert_eq!(g.edge_weight(first[1], second[2]), 4);
    }

    #[test]
    fn add_alignment_rejects_mismatched_weights_length() {
        let mut g = PoGraph::new();
        let first = g.add_sequence("ACT").unwrap();
        let mapping = vec![Some(first[0]), Some(first[1]), Some(first[2])];
        assert!(g.add_alignment("ACT", &mapping, &[1, 1]).is_err());
    }

    #[test]
    fn topological_sort_orders_chain() {
        let mut g = PoGraph::new();
        let ids = g.add_sequence("ACT").unwrap();
        let order = g.topological_sort().unwrap();
        let pos = |id: usize| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(ids[0]) < pos(ids[1]));
        assert!(pos(ids[1]) < pos(ids[2]));
    }

    #[test]
    fn s1_first_sequence_seeds_a_linear_chain_and_msa() {
        let mut g = PoGraph::new();
        let ids = g.add_sequence("CAAATAAGT").unwrap();
        assert_eq!(ids.len(), 9);
        assert_eq!(g.num_sequences(), 1);
        let order = g.topological_sort().unwrap();
        assert_eq!(order, ids);
        let msa = g.msa().unwrap();
        assert_eq!(msa, vec!["CAAATAAGT".to_string()]);
    }

    #[test]
    fn s2_second_sequence_with_one_deletion_leaves_a_gap_column() {
        let mut g = PoGraph::new();
        let first = g.add_sequence("CAAATAAGT").unwrap();
        // seq2 = "CCAATAAT" skips first[7] ('G') entirely (a deletion) and
        // otherwise walks the same chain, forking at position 1 where its
        // 'C' mismatches first[1]'s 'A'.
        let mapping = vec![
            Some(first[0]),
            Some(first[1]),
            Some(first[2]),
            Some(first[3]),
            Some(first[4]),
            Some(first[5]),
            Some(first[6]),
            Some(first[8]),
        ];
        let weights = vec![1u32; mapping.len()];
        let second = g.add_alignment("CCAATAAT", &mapping, &weights).unwrap();
        assert_eq!(g.num_sequences(), 2);
        assert_ne!(second[1], first[1]);
        assert_eq!(g.node(second[1]).unwrap().base, 'C');

        let msa = g.msa().unwrap();
        assert_eq!(msa[0], "CAAATAAGT");
        assert_eq!(msa[1], "CCAATAA-T");
    }

    #[test]
    fn s3_third_sequence_round_trips_through_msa_gaps() {
        let mut g = PoGraph::new();
        let first = g.add_sequence("CAAATAAGT").unwrap();
        let mapping2 = vec![
            Some(first[0]),
            Some(first[1]),
            Some(first[2]),
            Some(first[3]),
            Some(first[4]),
            Some(first[5]),
            Some(first[6]),
            Some(first[8]),
        ];
        let w2 = vec![1u32; mapping2.len()];
        g.add_alignment("CCAATAAT", &mapping2, &w2).unwrap();

        // seq3 = "CCTATC" branches off early, skips two source bases, and
        // appends a trailing base with no existing counterpart.
        let mapping3 = vec![
            Some(first[0]),
            None,
            Some(first[4]),
            Some(first[5]),
            Some(first[6]),
            None,
        ];
        let w3 = vec![1u32; mapping3.len()];
        g.add_alignment("CCTATC", &mapping3, &w3).unwrap();
        assert_eq!(g.num_sequences(), 3);

        let msa = g.msa().unwrap();
        assert_eq!(msa.len(), 3);
        for (row, original) in msa.iter().zip(["CAAATAAGT", "CCAATAAT", "CCTATC"]) {
            let stripped: String = row.chars().filter(|&c| c != '-').collect();
            assert_eq!(stripped, original);
        }
    }

    #[test]
    fn heaviest_bundle_prefers_downstream_weight_over_first_edge() {
        // 0 -> 1 (w=5), 0 -> 2 (w=6), 1 -> 3 (w=10), 2 -> 3 (w=1), 3 is the
        // sink. The immediate edge out of 0 favors 2 (6 > 5), but the
        // heaviest full path is 0 -> 1 -> 3 (score 15) over 0 -> 2 -> 3
        // (score 7): the DP must look past the first edge.
        let mut g = PoGraph::new();
        let n0 = g.new_node('A');
        let n1 = g.new_node('C');
        let n2 = g.new_node('G');
        let n3 = g.new_node('T');
        g.connect_weighted(n0, n1, 0, 5);
        g.connect_weighted(n0, n2, 1, 6);
        g.connect_weighted(n1, n3, 0, 10);
        g.connect_weighted(n2, n3, 1, 1);
        assert_eq!(g.heaviest_bundle_consensus().unwrap(), "ACT");
    }

    #[test]
    fn heaviest_bundle_follows_majority_path() {
        let mut g = PoGraph::new();
        let first = g.add_sequence("ACT").unwrap();
        let mapping = vec![Some(first[0]), Some(first[1]), Some(first[2])];
        g.add_alignment("ACT", &mapping, &[1, 1, 1]).unwrap();
        g.add_alignment("ACT", &mapping, &[1, 1, 1]).unwrap();
        let mapping2 = vec![Some(first[0]), Some(first[1]), None];
        g.add_alignment("ACG", &mapping2, &[1, 1, 1]).unwrap();
        assert_eq!(g.heaviest_bundle_consensus().unwrap(), "ACT");
    }
}
