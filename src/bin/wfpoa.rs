//! Command-line entry point: aligns a pattern against a text-DAG, either the
//! bundled branch-and-rejoin example or one loaded from a GFA1 file, and
//! optionally emits GFA/DOT renderings of the resulting structures.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use wfpoa::cigar::{Cigar, CigarOp};
use wfpoa::config::AlignerConfig;
use wfpoa::edit_dp;
use wfpoa::graph::PoGraph;
use wfpoa::text_dag::TextDag;
use wfpoa::{validation, wfpoa as wavefront};

#[derive(Parser, Debug)]
#[clap(name = "wfpoa", about = "Wavefront-accelerated partial order alignment")]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Path to a TOML config file; falls back to built-in defaults.
    #[clap(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aligns a pattern against a text-DAG and prints its score and CIGAR.
    Align {
        /// Sequence to align.
        #[clap(long)]
        pattern: String,

        /// GFA1 file describing the text-DAG; omit to use the bundled
        /// branch-and-rejoin example.
        #[clap(long)]
        dag: Option<PathBuf>,
    },
    /// Fuzz-tests the wavefront aligner against the DP-over-DAG oracle.
    Validate {
        /// Number of random cases to run.
        #[clap(long, default_value_t = 1000)]
        count: u64,

        /// Percentage of pattern length randomly mutated per case.
        #[clap(long, default_value_t = 15)]
        error_rate: u32,

        /// Spread cases across all available CPUs instead of running
        /// sequentially.
        #[clap(long)]
        concurrent: bool,
    },
}

fn load_dag(path: &Option<PathBuf>) -> anyhow::Result<TextDag> {
    match path {
        Some(p) => {
            let gfa = fs::read_to_string(p)?;
            Ok(TextDag::from_gfa(&gfa)?)
        }
        None => Ok(TextDag::example_branch_rejoin()),
    }
}

/// Concatenates the sequence of every segment a CIGAR's `Segment` markers
/// visit, in visitation order: the reference text `build_mapping`'s ref
/// positions are indexed against.
fn reference_path_for(dag: &TextDag, cigar: &Cigar) -> anyhow::Result<String> {
    let mut path = String::new();
    for op in cigar.ops() {
        if let CigarOp::Segment(idx) = op {
            path.push_str(&dag.segment(*idx)?.sequence);
        }
    }
    Ok(path)
}

/// Builds the `add_alignment` mapping for the pattern's characters from its
/// CIGAR against `ref_ids` (the reference path's node ids, one per
/// character of [`reference_path_for`]'s output, in the same order).
///
/// Only `Match`/`Mismatch`/`Deletion` consume a pattern character (see
/// `cigar.rs::check_alignment`, where `Insertion` advances the text/ref
/// side and `Deletion` advances the pattern side); the mapping has exactly
/// one entry per consumed pattern character, `None` for a `Deletion` with
/// no reference counterpart.
fn build_mapping(cigar: &Cigar, ref_ids: &[usize]) -> Vec<Option<usize>> {
    let mut mapping = Vec::new();
    let mut ref_pos = 0usize;
    for op in cigar.ops() {
        match op {
            CigarOp::Segment(_) => {}
            CigarOp::Match | CigarOp::Mismatch => {
                mapping.push(ref_ids.get(ref_pos).copied());
                ref_pos += 1;
            }
            CigarOp::Deletion => mapping.push(None),
            CigarOp::Insertion => ref_pos += 1,
        }
    }
    mapping
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => AlignerConfig::load(path)?,
        None => AlignerConfig::default(),
    };

    match cli.command {
        Command::Align { pattern, dag } => {
            let dag = load_dag(&dag)?;
            let (score, cigar) = wavefront::align(&pattern, &dag, cfg.distance_cap)?;
            println!("score: {score}");
            println!("cigar: {cigar}");

            let consensus = dag.heaviest_bundle_consensus()?;
            let banded_score = edit_dp::score_banded(&pattern, &consensus, cfg.banded_bandwidth);
            println!("banded score vs consensus: {banded_score}");

            if cfg.emit_gfa {
                fs::write("WFPOA_graph.gfa", dag.to_gfa())?;
                tracing::info!(path = "WFPOA_graph.gfa", "wrote GFA dump");
            }
            if cfg.emit_dot {
                let mut graph = PoGraph::new();
                let reference_path = reference_path_for(&dag, &cigar)?;
                let ref_ids = graph.add_sequence(&reference_path)?;
                let mapping = build_mapping(&cigar, &ref_ids);
                let weights = vec![1u32; pattern.chars().count()];
                graph.add_alignment(&pattern, &mapping, &weights)?;
                fs::write("WFPOA_graph.dot", graph.to_dot())?;
                tracing::info!(path = "WFPOA_graph.dot", "wrote DOT dump");
            }
        }
        Command::Validate { count, error_rate, concurrent } => {
            tracing::info!(count, error_rate, concurrent, "starting validation run");
            let dag = TextDag::example_branch_rejoin();
            if concurrent {
                validation::validate_concurrent(dag, error_rate, count)
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
            } else {
                validation::validate(&dag, error_rate, count).map_err(|e| anyhow::anyhow!("{e}"))?;
            }
            println!("{count} cases passed at error rate {error_rate}%");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    wfpoa::logging::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "wfpoa failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
