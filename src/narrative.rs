// src/narrative.rs

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::NarrativeConfig;
use crate::locate::dom::{element_text, looks_like_html};
use crate::text::normalize_ws;

/// Lines searched when no anchor is present.
const UNANCHORED_LINES: usize = 2000;

/// Anchors in preference order; every word must appear on the line.
const ANCHORS: &[&str] = &[
    "summary compensation table",
    "executive compensation",
    "compensation discussion and analysis",
];

const PAY_TOKENS: &[&str] = &[
    "salary", "bonus", "compensation", "equity", "stock", "option", "sars", "rsu", "award",
    "incentive", "non-equity", "pension", "severance", "total", "grant",
];

const OFFICER_TOKENS: &[&str] = &[
    "chief executive officer",
    "ceo",
    "chief financial officer",
    "cfo",
    "vice president",
    "named executive officer",
    "neos",
    "executive officer",
];

const AWARD_VERBS: &[&str] = &["paid", "awarded", "granted", "received", "earned", "accrued", "vested"];

static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$\s?\d[\d,]*(?:\.\d+)?|\d+\s?(?:shares|stock|options|sars|rsus)|\d+%")
        .expect("currency regex should compile")
});

/// SGML markers of plain-text submissions.
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<>]*>").expect("tag regex should compile"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredParagraph {
    pub score: i32,
    pub text: String,
}

/// Compensation prose pulled from a filing that has no usable table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeSnippet {
    /// Line of the anchor the window starts at; `None` when no anchor was found.
    pub anchor_line: Option<usize>,
    /// Best paragraphs, highest score first.
    pub paragraphs: Vec<ScoredParagraph>,
    /// The kept paragraphs joined by blank lines.
    pub text: String,
}

/// HTML goes through the parser, which decodes entities and breaks
/// paragraphs at block elements. SGML text only loses its markers.
fn plain_text(markup: &str) -> String {
    if looks_like_html(markup) {
        let doc = Html::parse_document(markup);
        return element_text(&doc.root_element());
    }
    TAG_RE.replace_all(markup, " ").into_owned()
}

fn find_anchor(lines: &[&str]) -> Option<usize> {
    let lowers: Vec<String> = lines.iter().map(|l| l.to_lowercase()).collect();
    ANCHORS.iter().find_map(|anchor| {
        lowers
            .iter()
            .position(|line| anchor.split_whitespace().all(|w| line.contains(w)))
    })
}

/// Consecutive non-blank lines joined into one paragraph each.
fn reflow(lines: &[&str]) -> Vec<String> {
    lines
        .split(|l| l.trim().is_empty())
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| normalize_ws(&chunk.join(" ")))
        .filter(|p| !p.is_empty())
        .collect()
}

pub fn score_paragraph(paragraph: &str) -> i32 {
    let lower = paragraph.to_lowercase();
    let has = |tokens: &[&str]| tokens.iter().any(|t| lower.contains(t));
    let amounts = CURRENCY_RE.find_iter(paragraph).count();

    let mut score = 0;
    if amounts > 0 {
        score += 2;
    }
    if has(PAY_TOKENS) {
        score += 2;
    }
    if has(OFFICER_TOKENS) {
        score += 1;
    }
    if has(AWARD_VERBS) {
        score += 1;
    }
    if amounts >= 2 {
        score += 1;
    }
    score
}

/// Score the paragraphs following the first compensation anchor and keep the
/// best `top_k` reaching `min_score`.
#[instrument(level = "debug", skip_all)]
pub fn extract_narrative(text: &str, cfg: &NarrativeConfig) -> Option<NarrativeSnippet> {
    let plain = plain_text(text);
    let lines: Vec<&str> = plain.lines().collect();

    // 1) window
    let anchor_line = find_anchor(&lines);
    let (start, end) = match anchor_line {
        Some(a) => (a, lines.len().min(a + cfg.window_after)),
        None => (0, lines.len().min(UNANCHORED_LINES)),
    };

    // 2) score paragraphs; the sort is stable so ties keep document order
    let mut scored: Vec<ScoredParagraph> = reflow(&lines[start..end])
        .into_iter()
        .map(|text| ScoredParagraph {
            score: score_paragraph(&text),
            text,
        })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    let paragraphs: Vec<ScoredParagraph> = scored
        .into_iter()
        .filter(|p| p.score >= cfg.min_score)
        .take(cfg.top_k)
        .collect();

    debug!(?anchor_line, kept = paragraphs.len(), "narrative paragraphs");
    if paragraphs.is_empty() {
        return None;
    }
    let text = paragraphs
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    Some(NarrativeSnippet {
        anchor_line,
        paragraphs,
        text,
    })
}
