// src/pipeline.rs

use rayon::prelude::*;
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::clean::clean_table;
use crate::config::ExtractConfig;
use crate::locate::{locate_candidate, HeaderSignal, LocatorKind, RawTable, ScoredCandidate};
use crate::narrative::{extract_narrative, NarrativeSnippet};
use crate::record::{assemble, FilingRecord};
use crate::segment::segment;

/// Recoverable problems noticed while extracting one filing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No row carried enough header vocabulary; row 0 was used as the header.
    HeaderDetectionFailure,
    /// A pay cell that did not parse as a number; kept as text.
    NumericCoercionFailure { field: String, value: String },
    /// Duplicate columns disagreed; the later value was stored under `key`.
    ConflictingDuplicateColumn { field: String, year: String, key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Extracted { executives: usize },
    /// No strategy produced a table; the record is empty.
    NoCandidateFound,
    /// A table was found but yielded no executive with data.
    EmptyResult,
}

/// Identity of a filing, supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingMeta {
    pub ticker: String,
    pub report_date: String,
    /// Overrides the year derived from `report_date`.
    #[serde(default)]
    pub report_year: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FilingInput {
    pub markup: Vec<u8>,
    pub meta: FilingMeta,
}

/// Which table was chosen and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSummary {
    pub strategy: LocatorKind,
    pub score: i32,
    pub header_signal: HeaderSignal,
    pub table_index: usize,
    pub rows: usize,
    pub columns: usize,
}

impl CandidateSummary {
    fn new(strategy: LocatorKind, candidate: &ScoredCandidate) -> Self {
        Self {
            strategy,
            score: candidate.score,
            header_signal: candidate.header_signal,
            table_index: candidate.table.index,
            rows: candidate.table.rows.len(),
            columns: candidate.table.width(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub record: FilingRecord,
    pub outcome: Outcome,
    pub candidate: Option<CandidateSummary>,
    pub diagnostics: Vec<Diagnostic>,
    pub narrative: Option<NarrativeSnippet>,
}

/// Header reconciliation, normalization, segmentation and assembly on an
/// already located table.
pub fn extract_from_table(table: &RawTable, meta: &FilingMeta, cfg: &ExtractConfig) -> Extraction {
    let mut diagnostics = Vec::new();
    let headered = clean_table(table, cfg, &mut diagnostics);
    let blocks = segment(&headered);
    let record = assemble(&headered, &blocks, meta, &mut diagnostics);

    let outcome = if record.executives.is_empty() {
        Outcome::EmptyResult
    } else {
        Outcome::Extracted {
            executives: record.executives.len(),
        }
    };
    Extraction {
        record,
        outcome,
        candidate: None,
        diagnostics,
        narrative: None,
    }
}

/// Extract the summary compensation table of one filing. Never fails: a
/// filing without a usable table yields an empty record and an outcome
/// saying why.
#[instrument(level = "info", skip(markup, cfg), fields(ticker = %meta.ticker, date = %meta.report_date))]
pub fn extract_filing(markup: &[u8], meta: &FilingMeta, cfg: &ExtractConfig) -> Extraction {
    // 1) parse
    let raw = String::from_utf8_lossy(markup);
    let doc = Html::parse_document(&raw);

    // 2) locate
    let Some((kind, candidate)) = locate_candidate(&doc, &raw, cfg) else {
        let narrative = if cfg.narrative_fallback {
            extract_narrative(&raw, &cfg.narrative)
        } else {
            None
        };
        warn!(narrative = narrative.is_some(), "no candidate table");
        return Extraction {
            record: FilingRecord::empty(meta),
            outcome: Outcome::NoCandidateFound,
            candidate: None,
            diagnostics: Vec::new(),
            narrative,
        };
    };

    // 3) clean, segment, assemble
    let mut extraction = extract_from_table(&candidate.table, meta, cfg);
    extraction.candidate = Some(CandidateSummary::new(kind, &candidate));
    info!(
        outcome = ?extraction.outcome,
        diagnostics = extraction.diagnostics.len(),
        "filing extracted"
    );
    extraction
}

/// Extract independent filings in parallel; results keep input order.
pub fn extract_many(inputs: &[FilingInput], cfg: &ExtractConfig) -> Vec<Extraction> {
    inputs
        .par_iter()
        .map(|input| extract_filing(&input.markup, &input.meta, cfg))
        .collect()
}
