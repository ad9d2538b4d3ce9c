//! Runtime configuration.
//!
//! `ConfigFile` mirrors whatever a user supplies on disk; every field is
//! optional and defaulted. `AlignerConfig` is the effective, fully resolved
//! configuration the rest of the crate actually reads.

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// On-disk representation, loaded from TOML. Every field is optional so that
/// a partial config file only overrides what it mentions.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub banded_bandwidth: Option<usize>,
    #[serde(default)]
    pub distance_cap: Option<u32>,
    #[serde(default)]
    pub emit_gfa: Option<bool>,
    #[serde(default)]
    pub emit_dot: Option<bool>,
}

/// Effective configuration used by the aligner and the POA graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignerConfig {
    /// Minimum half-bandwidth used by the banded DP oracle, in addition to
    /// `|text_len - pattern_len| + 1`.
    pub banded_bandwidth: usize,
    /// Upper bound on the wavefront distance before a WFPOA alignment gives
    /// up and returns `AlignError::DistanceCapExceeded`.
    pub distance_cap: u32,
    /// Whether the CLI should emit a GFA rendering of the text-DAG.
    pub emit_gfa: bool,
    /// Whether the CLI should emit a DOT rendering of the partial-order graph.
    pub emit_dot: bool,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        AlignerConfig {
            banded_bandwidth: 8,
            distance_cap: 10_000,
            emit_gfa: false,
            emit_dot: false,
        }
    }
}

impl AlignerConfig {
    /// Folds a parsed `ConfigFile` on top of the defaults.
    pub fn from_file(file: ConfigFile) -> Self {
        let defaults = AlignerConfig::default();
        AlignerConfig {
            banded_bandwidth: file.banded_bandwidth.unwrap_or(defaults.banded_bandwidth),
            distance_cap: file.distance_cap.unwrap_or(defaults.distance_cap),
            emit_gfa: file.emit_gfa.unwrap_or(defaults.emit_gfa),
            emit_dot: file.emit_dot.unwrap_or(defaults.emit_dot),
        }
    }

    /// Reads and parses a TOML config file from disk.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&raw)?;
        Ok(Self::from_file(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_used_when_file_is_empty() {
        let cfg = AlignerConfig::from_file(ConfigFile::default());
        assert_eq!(cfg, AlignerConfig::default());
    }

    #[test]
    fn partial_file_only_overrides_mentioned_fields() {
        let file = ConfigFile {
            banded_bandwidth: Some(32),
            distance_cap: None,
            emit_gfa: Some(true),
            emit_dot: None,
        };
        let cfg = AlignerConfig::from_file(file);
        assert_eq!(cfg.banded_bandwidth, 32);
        assert_eq!(cfg.distance_cap, AlignerConfig::default().distance_cap);
        assert!(cfg.emit_gfa);
        assert!(!cfg.emit_dot);
    }

    #[test]
    fn loads_from_toml_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wfpoa.toml");
        fs::write(&path, "banded_bandwidth = 16\nemit_dot = true\n").unwrap();
        let cfg = AlignerConfig::load(&path).unwrap();
        assert_eq!(cfg.banded_bandwidth, 16);
        assert!(cfg.emit_dot);
        assert!(!cfg.emit_gfa);
    }
}
