// src/locate/mod.rs

pub mod dom;
pub mod preformatted;
pub mod score;

use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ExtractConfig;

/// One table-like structure pulled out of a filing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Position among all `<table>` elements of the document (document order).
    pub index: usize,
    /// Text of a direct `<caption>` child, if any.
    pub caption: Option<String>,
    /// Rectangular grid of cell texts; spanned cells are copied into every slot they cover.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(|c| c.trim().is_empty()))
    }
}

/// Strength of the name/title cue found in a candidate's header sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderSignal {
    None,
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub table: RawTable,
    pub score: i32,
    pub header_signal: HeaderSignal,
}

/// Candidate generators, tried in the configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// Keyword, caption and heading-proximity scoring over every table.
    Scored,
    /// Tables whose header rows spell out "name ... principal position"; no proximity.
    HeaderRow,
    /// Fixed-width text tables from legacy plain-text submissions.
    Preformatted,
}

impl LocatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorKind::Scored => "scored",
            LocatorKind::HeaderRow => "header_row",
            LocatorKind::Preformatted => "preformatted",
        }
    }

    fn run(&self, doc: &Html, raw: &str, cfg: &ExtractConfig) -> Option<ScoredCandidate> {
        match self {
            LocatorKind::Scored => score::locate_scored(doc, cfg),
            LocatorKind::HeaderRow => score::locate_by_header_row(doc, cfg),
            // HTML filings carry text tables inside <pre>; the parser decodes their entities
            LocatorKind::Preformatted if dom::looks_like_html(raw) => {
                preformatted::locate_preformatted(&dom::preformatted_text(doc), &cfg.preformatted)
            }
            LocatorKind::Preformatted => preformatted::locate_preformatted(raw, &cfg.preformatted),
        }
    }
}

/// Evaluate the configured strategies in order; the first non-empty result wins.
pub fn locate_candidate(
    doc: &Html,
    raw: &str,
    cfg: &ExtractConfig,
) -> Option<(LocatorKind, ScoredCandidate)> {
    for kind in &cfg.strategies {
        match kind.run(doc, raw, cfg) {
            Some(candidate) => {
                info!(
                    strategy = kind.as_str(),
                    score = candidate.score,
                    signal = ?candidate.header_signal,
                    table = candidate.table.index,
                    "candidate table selected"
                );
                return Some((*kind, candidate));
            }
            None => debug!(strategy = kind.as_str(), "no candidate"),
        }
    }
    None
}
