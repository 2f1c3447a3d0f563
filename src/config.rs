// src/config.rs

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::locate::LocatorKind;

/// Tuning for the fixed-width text locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreformattedConfig {
    /// Lines scanned after each "summary compensation table" anchor.
    pub window_after: usize,
    /// Lines searched for a header row from each scan start.
    pub header_lookahead: usize,
    /// Maximum lines captured for one block.
    pub capture_max: usize,
    pub min_score: i32,
}

impl Default for PreformattedConfig {
    fn default() -> Self {
        Self {
            window_after: 300,
            header_lookahead: 60,
            capture_max: 220,
            min_score: 4,
        }
    }
}

/// Tuning for the prose fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub window_after: usize,
    pub min_score: i32,
    pub top_k: usize,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            window_after: 800,
            min_score: 3,
            top_k: 8,
        }
    }
}

/// Every knob of the extraction engine. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Rows read into the header sample when scoring a table.
    pub header_sample_rows: usize,
    /// Cap on distinct compensation-vocabulary hits.
    pub comp_keyword_cap: usize,
    /// Minimum score for the `scored` strategy.
    pub min_candidate_score: i32,
    /// Rows scanned when detecting the header row.
    pub header_scan_rows: usize,
    /// Vocabulary groups a row needs to count as the header.
    pub min_header_hits: usize,
    /// Upper bound on rows merged into one header.
    pub max_header_rows: usize,
    /// Locator strategies in preference order.
    pub strategies: Vec<LocatorKind>,
    /// Collect prose paragraphs when no table is found.
    pub narrative_fallback: bool,
    pub preformatted: PreformattedConfig,
    pub narrative: NarrativeConfig,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            header_sample_rows: 12,
            comp_keyword_cap: 8,
            min_candidate_score: 6,
            header_scan_rows: 15,
            min_header_hits: 2,
            max_header_rows: 6,
            strategies: vec![
                LocatorKind::Scored,
                LocatorKind::HeaderRow,
                LocatorKind::Preformatted,
            ],
            narrative_fallback: true,
            preformatted: PreformattedConfig::default(),
            narrative: NarrativeConfig::default(),
        }
    }
}

impl ExtractConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("parsing extraction config")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_yaml_keeps_defaults() -> Result<()> {
        let cfg = ExtractConfig::from_yaml_str(
            "min_candidate_score: 9\nstrategies: [header_row, preformatted]\npreformatted:\n  min_score: 6\n",
        )?;
        assert_eq!(cfg.min_candidate_score, 9);
        assert_eq!(cfg.strategies, vec![LocatorKind::HeaderRow, LocatorKind::Preformatted]);
        assert_eq!(cfg.preformatted.min_score, 6);
        assert_eq!(cfg.preformatted.window_after, 300);
        assert_eq!(cfg.narrative, NarrativeConfig::default());
        assert_eq!(cfg.header_scan_rows, 15);
        Ok(())
    }

    #[test]
    fn load_from_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "narrative_fallback: false")?;
        writeln!(file, "narrative:\n  top_k: 3")?;
        let cfg = ExtractConfig::load(file.path())?;
        assert!(!cfg.narrative_fallback);
        assert_eq!(cfg.narrative.top_k, 3);
        assert_eq!(cfg.narrative.min_score, 3);
        Ok(())
    }

    #[test]
    fn unknown_strategy_is_an_error() {
        let err = ExtractConfig::from_yaml_str("strategies: [psychic]").unwrap_err();
        assert!(format!("{err:#}").contains("parsing extraction config"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = ExtractConfig::load("/nonexistent/sct.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sct.yaml"));
    }
}
