//! Fuzz-style validation: compares the wavefront aligner against the
//! edit-distance-over-DAG oracle on randomly mutated paths through a
//! text-DAG, the way the upstream project cross-checks its wavefront
//! aligner against a reference SWG implementation.

use crate::edit_dp_poa;
use crate::text_dag::TextDag;
use crate::wfpoa;
use rand::distributions::{Alphanumeric, Distribution, Standard};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

const BASES: [char; 4] = ['A', 'C', 'G', 'T'];

enum MutationType {
    Insertion,
    Deletion,
    Substitution,
}

impl Distribution<MutationType> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> MutationType {
        match rng.gen_range(0..=2) {
            0 => MutationType::Insertion,
            1 => MutationType::Deletion,
            _ => MutationType::Substitution,
        }
    }
}

fn gen_new_base() -> char {
    let mut rng = thread_rng();
    *BASES.choose(&mut rng).unwrap()
}

fn gen_new_base_different(a: char) -> char {
    loop {
        let c = gen_new_base();
        if c != a {
            return c;
        }
    }
}

/// Mutates `text` with a number of random insertions/deletions/
/// substitutions proportional to `error_rate` (0..100, percent of length).
pub fn mutate(text: &str, error_rate: u32) -> String {
    let mut rng = thread_rng();
    let mut mutated: Vec<char> = text.chars().collect();
    let final_err_count = (error_rate as usize * mutated.len()) / 100;

    for _ in 0..final_err_count {
        if mutated.is_empty() {
            mutated.push(gen_new_base());
            continue;
        }
        let position = rng.gen_range(0..mutated.len());
        let mutation: MutationType = rand::random();
        match mutation {
            MutationType::Insertion => mutated.insert(position, gen_new_base()),
            MutationType::Deletion => {
                mutated.remove(position);
            }
            MutationType::Substitution => mutated[position] = gen_new_base_different(mutated[position]),
        }
    }
    mutated.into_iter().collect()
}

/// Draws a random source-to-sink path through `dag` and concatenates its
/// segment sequences.
pub fn random_path_sequence(dag: &TextDag) -> String {
    let mut rng = thread_rng();
    let mut current = (0..dag.len())
        .find(|&id| dag.segment(id).unwrap().is_source())
        .unwrap_or(0);
    let mut sequence = String::new();
    loop {
        let seg = dag.segment(current).unwrap();
        sequence.push_str(&seg.sequence);
        if seg.is_sink() {
            break;
        }
        let next_idx = rng.gen_range(0..seg.successors.len());
        current = seg.successors[next_idx];
    }
    sequence
}

/// Random-alphanumeric sequence, reused for alignments against a flat text
/// rather than a DAG.
pub fn random_string(min_length: usize, max_length: usize) -> String {
    let mut rng = thread_rng();
    let length = rng.gen_range(min_length..max_length.max(min_length + 1));
    (&mut rng)
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[derive(Debug)]
pub struct ScoreMismatch {
    pub pattern: String,
    pub wfpoa_score: i32,
    pub oracle_score: i32,
}

impl fmt::Display for ScoreMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WFPOA scored {} but the DP oracle scored {} for pattern {:?}",
            self.wfpoa_score, self.oracle_score, self.pattern
        )
    }
}

#[derive(Debug)]
pub enum ValidationError {
    ScoreMismatch(ScoreMismatch),
    InvalidCigar(String),
    AlignFailed(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::ScoreMismatch(m) => write!(f, "{m}"),
            ValidationError::InvalidCigar(s) => write!(f, "invalid CIGAR: {s}"),
            ValidationError::AlignFailed(s) => write!(f, "alignment failed: {s}"),
        }
    }
}

/// Generates one random case against `dag`, aligns it with both WFPOA and
/// the DP oracle, and checks that their scores and CIGARs agree.
pub fn run_validation(dag: &TextDag, error_rate: u32) -> Result<(), ValidationError> {
    let base_path = random_path_sequence(dag);
    let pattern = mutate(&base_path, error_rate);
    if pattern.is_empty() {
        return Ok(());
    }

    let (wf_score, wf_cigar) = wfpoa::align(&pattern, dag, 10_000)
        .map_err(|e| ValidationError::AlignFailed(e.to_string()))?;
    let oracle_score =
        edit_dp_poa::score(&pattern, dag).map_err(|e| ValidationError::AlignFailed(e.to_string()))?;

    if wf_score != oracle_score {
        return Err(ValidationError::ScoreMismatch(ScoreMismatch {
            pattern,
            wfpoa_score: wf_score,
            oracle_score,
        }));
    }

    let text_segments: Vec<&str> = dag.segments().iter().map(|s| s.sequence.as_str()).collect();
    if let Err(e) = wf_cigar.check_alignment(&pattern, &text_segments) {
        return Err(ValidationError::InvalidCigar(e.to_string()));
    }

    Ok(())
}

/// Runs `count` validation cycles sequentially, returning on the first
/// failure.
pub fn validate(dag: &TextDag, error_rate: u32, count: u64) -> Result<(), ValidationError> {
    for _ in 0..count {
        run_validation(dag, error_rate)?;
    }
    Ok(())
}

/// Runs validation cycles concurrently across `num_cpus::get()` threads,
/// stopping at the first failure reported over the channel.
pub fn validate_concurrent(dag: TextDag, error_rate: u32, count: u64) -> Result<(), ValidationError> {
    let dag = std::sync::Arc::new(dag);
    let num_threads = num_cpus::get().max(1);
    let (tx, rx): (Sender<Result<(), ValidationError>>, Receiver<Result<(), ValidationError>>) =
        mpsc::channel();

    for _ in 0..num_threads {
        let tx = tx.clone();
        let dag = dag.clone();
        thread::spawn(move || {
            while tx.send(run_validation(&dag, error_rate)).is_ok() {}
        });
    }
    drop(tx);

    for _ in 0..count {
        match rx.recv() {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => return Err(e),
            Err(_) => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_branch_rejoin_example_sequentially() {
        let dag = TextDag::example_branch_rejoin();
        validate(&dag, 20, 100).unwrap();
    }

    #[test]
    fn validate_branch_rejoin_example_concurrently() {
        let dag = TextDag::example_branch_rejoin();
        validate_concurrent(dag, 20, 200).unwrap();
    }
}
