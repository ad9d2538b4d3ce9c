//! Error types shared across the crate.
//!
//! Every fallible operation returns a `Result` rooted in one of these enums
//! instead of aborting the process. `AlignError` covers pairwise/wavefront
//! alignment failures, `PoaError` covers partial-order-graph and text-DAG
//! construction/traversal failures.

use thiserror::Error;

/// Errors produced while aligning a pattern against a text or text-DAG.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum AlignError {
    #[error("pattern or text is empty (pattern len {pattern_len}, text len {text_len})")]
    ZeroLength { pattern_len: usize, text_len: usize },

    #[error("pattern length {len} exceeds the supported maximum of {max}")]
    PatternTooLong { len: usize, max: usize },

    #[error("wavefront exceeded its distance cap of {cap}")]
    DistanceCapExceeded { cap: u32 },

    #[error("wavefront segment {segment} was referenced before being opened")]
    SegmentNotOpen { segment: usize },

    #[error("alignment never reached the end of the text-DAG")]
    NoAlignmentFound,
}

/// Errors produced while building or traversing a partial-order graph or
/// text-DAG.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum PoaError {
    #[error("node id {0} does not exist in the graph")]
    UnknownNode(usize),

    #[error("segment id {0} does not exist in the text-DAG")]
    UnknownSegment(usize),

    #[error("graph contains a cycle: topological sort could not place every node")]
    NotADag,

    #[error("cannot align an empty sequence into the graph")]
    EmptySequence,

    #[error("consensus traversal found no outgoing edge from a non-sink node {0}")]
    DeadEndInConsensus(usize),

    #[error("CIGAR does not reconcile with pattern/text: {0}")]
    InvalidCigar(String),

    #[error("sequence and weights lengths disagree: {0}")]
    MismatchedLengths(String),
}
