// src/locate/score.rs

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, instrument, trace};

use super::dom::{flat_text, has_nested_table, raw_table, table_elements};
use super::{HeaderSignal, RawTable, ScoredCandidate};
use crate::config::ExtractConfig;
use crate::text::lower_norm;

/// Compensation vocabulary; each entry counts once however many aliases hit.
const COMP_KEYS: &[&[&str]] = &[
    &["salary"],
    &["bonus"],
    &["stock"],
    &["option"],
    &["non-equity", "non equity", "nonequity"],
    &["incentive"],
    &["pension"],
    &["all other"],
    &["total"],
    &["compensation"],
    &["awards"],
    &["cash"],
    &["year"],
];

/// Plan-based award tables share most of the vocabulary above.
const GRANT_KEYS: &[&str] = &["grant", "grant date", "estimated future payouts"];

pub const TITLE_PHRASE: &str = "summary compensation table";

const NAME_TITLE_BONUS: [i32; 4] = [0, 2, 5, 7];
const MONEY_BONUS: i32 = 2;
const GRANT_PENALTY: i32 = 4;
const CAPTION_BONUS: i32 = 4;
const PROXIMITY_BONUS: i32 = 4;

static MONEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$|\b\d{3,}\b").expect("money regex should compile"));

/// Lowercased text of the first `rows` rows.
pub fn header_sample(table: &RawTable, rows: usize) -> String {
    let bits: Vec<String> = table
        .rows
        .iter()
        .take(rows)
        .flat_map(|r| r.iter().map(|c| lower_norm(c)))
        .filter(|c| !c.is_empty())
        .collect();
    bits.join(" ")
}

pub fn header_signal(sample: &str) -> HeaderSignal {
    let name = sample.contains("name");
    let principal = sample.contains("principal") || sample.contains("named executive");
    let position = sample.contains("position") || sample.contains("occupation");
    match (name, principal, position) {
        (true, true, true) => HeaderSignal::Strong,
        (true, true, false) | (true, false, true) => HeaderSignal::Medium,
        (true, false, false) => HeaderSignal::Weak,
        _ => HeaderSignal::None,
    }
}

fn signal_bonus(signal: HeaderSignal) -> i32 {
    NAME_TITLE_BONUS[signal as usize]
}

/// Distinct compensation-vocabulary groups present in `sample`.
pub fn comp_hits(sample: &str) -> usize {
    COMP_KEYS
        .iter()
        .filter(|aliases| aliases.iter().any(|a| sample.contains(a)))
        .count()
}

/// Name/title, vocabulary, money and grant-penalty components; no caption or proximity.
pub fn keyword_score(table: &RawTable, full_text: &str, cfg: &ExtractConfig) -> (i32, HeaderSignal) {
    let sample = header_sample(table, cfg.header_sample_rows);
    let signal = header_signal(&sample);
    let mut score = signal_bonus(signal);
    score += comp_hits(&sample).min(cfg.comp_keyword_cap) as i32;
    if MONEY_RE.is_match(full_text) {
        score += MONEY_BONUS;
    }
    if GRANT_KEYS.iter().any(|g| sample.contains(g)) {
        score -= GRANT_PENALTY;
    }
    (score, signal)
}

/// Elements whose text contains `phrase` while none of their children does.
fn deepest_matches<'a>(el: ElementRef<'a>, phrase: &str, out: &mut Vec<ElementRef<'a>>) {
    let mut child_hit = false;
    for child in el.children().filter_map(ElementRef::wrap) {
        if lower_norm(&flat_text(&child)).contains(phrase) {
            child_hit = true;
            deepest_matches(child, phrase, out);
        }
    }
    if !child_hit {
        out.push(el);
    }
}

/// Indexes of tables that contain, or are the first table after, a heading
/// naming the summary compensation table.
pub fn title_bonus_tables(doc: &Html, tables: &[ElementRef]) -> HashSet<usize> {
    let mut bonus = HashSet::new();
    let root = doc.root_element();
    if !lower_norm(&flat_text(&root)).contains(TITLE_PHRASE) {
        return bonus;
    }

    // preorder position of every node
    let order: HashMap<_, usize> = doc
        .tree
        .root()
        .descendants()
        .enumerate()
        .map(|(i, n)| (n.id(), i))
        .collect();
    let table_index: HashMap<_, usize> =
        tables.iter().enumerate().map(|(i, t)| (t.id(), i)).collect();
    let table_pos: Vec<usize> = tables.iter().map(|t| order[&t.id()]).collect();

    let mut headings = Vec::new();
    deepest_matches(root, TITLE_PHRASE, &mut headings);

    for heading in headings {
        let enclosing = std::iter::once(*heading)
            .chain(heading.ancestors())
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "table");
        if let Some(idx) = enclosing.and_then(|t| table_index.get(&t.id())) {
            bonus.insert(*idx);
        }

        let subtree_end = heading
            .descendants()
            .last()
            .map(|n| order[&n.id()])
            .unwrap_or(order[&heading.id()]);
        if let Some(next) = table_pos.iter().position(|&p| p > subtree_end) {
            bonus.insert(next);
        }
    }
    trace!(tables = ?bonus, "title proximity bonus");
    bonus
}

fn caption_names_table(table: &RawTable) -> bool {
    table
        .caption
        .as_deref()
        .map_or(false, |c| lower_norm(c).contains(TITLE_PHRASE))
}

fn best(mut scored: Vec<ScoredCandidate>) -> Option<ScoredCandidate> {
    // highest score, earliest table on ties
    scored.sort_by(|a, b| b.score.cmp(&a.score).then(a.table.index.cmp(&b.table.index)));
    scored.into_iter().next()
}

/// Full scoring: keywords plus caption and heading-proximity bonuses. Only
/// candidates reaching `min_candidate_score` qualify.
#[instrument(level = "debug", skip_all)]
pub fn locate_scored(doc: &Html, cfg: &ExtractConfig) -> Option<ScoredCandidate> {
    let tables = table_elements(doc);
    if tables.is_empty() {
        return None;
    }
    let near_title = title_bonus_tables(doc, &tables);

    let mut scored = Vec::new();
    for (idx, el) in tables.iter().enumerate() {
        if has_nested_table(el) {
            continue;
        }
        let table = raw_table(idx, el);
        if table.is_empty() {
            continue;
        }
        let (mut score, header_signal) = keyword_score(&table, &flat_text(el), cfg);
        if caption_names_table(&table) {
            score += CAPTION_BONUS;
        }
        if near_title.contains(&idx) {
            score += PROXIMITY_BONUS;
        }
        trace!(table = idx, score, signal = ?header_signal, "scored table");
        scored.push(ScoredCandidate {
            table,
            score,
            header_signal,
        });
    }

    let winner = best(scored)?;
    if winner.score < cfg.min_candidate_score {
        debug!(
            score = winner.score,
            threshold = cfg.min_candidate_score,
            "best table below threshold"
        );
        return None;
    }
    Some(winner)
}

/// A row naming "name" with "principal" and "position" in the same or the next row.
fn has_sct_header_row(table: &RawTable, sample_rows: usize) -> bool {
    let rows: Vec<String> = table
        .rows
        .iter()
        .take(sample_rows)
        .map(|r| lower_norm(&r.join(" ")))
        .collect();
    let spells_position = |s: &str| s.contains("principal") && s.contains("position");
    rows.iter().enumerate().any(|(i, row)| {
        row.contains("name")
            && (spells_position(row) || rows.get(i + 1).map_or(false, |n| spells_position(n)))
    })
}

/// Structural strategy: only tables with an explicit name/principal-position
/// header row are considered, ranked by keyword score alone.
#[instrument(level = "debug", skip_all)]
pub fn locate_by_header_row(doc: &Html, cfg: &ExtractConfig) -> Option<ScoredCandidate> {
    let scored = table_elements(doc)
        .iter()
        .enumerate()
        .filter(|(_, el)| !has_nested_table(el))
        .map(|(idx, el)| (raw_table(idx, el), el))
        .filter(|(table, _)| has_sct_header_row(table, cfg.header_sample_rows))
        .map(|(table, el)| {
            let (score, header_signal) = keyword_score(&table, &flat_text(el), cfg);
            ScoredCandidate {
                table,
                score,
                header_signal,
            }
        })
        .collect();
    best(scored)
}
