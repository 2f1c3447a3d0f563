// src/locate/preformatted.rs

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, instrument, trace};

use super::score::TITLE_PHRASE;
use super::{HeaderSignal, RawTable, ScoredCandidate};
use crate::config::PreformattedConfig;

/// Column-label vocabulary counted once each when scoring a captured block.
const COL_TOKENS: &[&str] = &[
    "fiscal year",
    "year",
    "salary",
    "bonus",
    "stock",
    "option",
    "options",
    "sars",
    "award",
    "awards",
    "non-equity",
    "incentive",
    "pension",
    "all other",
    "total",
    "compensation",
];

const PAY_WORDS: &[&str] = &["salary", "bonus", "total", "compensation", "options", "stock"];

/// Minimum run of blank character positions that separates two columns.
const MIN_GAP: usize = 2;
const TAB_STOP: usize = 8;

static STOP_SECTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)grants of plan[- ]based awards|outstanding equity awards|pension benefits|director compensation|change[- ]in[- ]control|severance pay plan|retirement plans",
    )
    .expect("stop section regex should compile")
});

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^<>\n]*>").expect("tag regex should compile"));

static COLUMN_GAP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S\s{2,}\S").expect("column gap regex should compile"));

static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\s\-=_]+$").expect("separator regex should compile"));

static FOOTNOTE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\(\d{1,2}\)|\*)\s").expect("footnote line regex should compile"));

static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[$,\d]").expect("numeric regex should compile"));

/// One captured fixed-width block.
#[derive(Debug)]
struct Block {
    start: usize,
    lines: Vec<String>,
    score: i32,
    signal: HeaderSignal,
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut col = 0usize;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = TAB_STOP - col % TAB_STOP;
            out.extend(std::iter::repeat(' ').take(pad));
            col += pad;
        } else {
            out.push(if ch == '\u{a0}' { ' ' } else { ch });
            col += 1;
        }
    }
    out
}

/// SGML text lines with markup blanked out column-for-column. Lines that held
/// nothing but SGML markers (`<S>`, `<C>`, `<TABLE>`, ...) are dropped.
fn plain_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let had_tag = TAG_RE.is_match(line);
            let stripped = TAG_RE.replace_all(line, |c: &Captures| " ".repeat(c[0].chars().count()));
            let decoded = stripped
                .replace("&nbsp;", " ")
                .replace("&amp;", "&")
                .replace("&lt;", "<")
                .replace("&gt;", ">");
            let line = expand_tabs(decoded.trim_end());
            if had_tag && line.trim().is_empty() {
                None
            } else {
                Some(line)
            }
        })
        .collect()
}

fn header_type(lower: &str) -> HeaderSignal {
    let principal_position = lower.contains("principal") && lower.contains("position");
    if lower.contains("name") && principal_position {
        HeaderSignal::Strong
    } else if principal_position {
        HeaderSignal::Medium
    } else if lower.contains("position") {
        HeaderSignal::Weak
    } else {
        HeaderSignal::None
    }
}

/// Mostly-uppercase line of some length: a section title in plain-text filings.
fn is_new_heading(line: &str) -> bool {
    let s = line.trim();
    if s.chars().count() < 6 {
        return false;
    }
    let letters = s.chars().filter(|c| c.is_alphabetic()).count();
    if letters == 0 {
        return false;
    }
    let upper = s.chars().filter(|c| c.is_uppercase()).count();
    upper as f64 / letters as f64 > 0.7
}

fn row_like(line: &str) -> bool {
    line.chars().any(|c| c.is_ascii_digit()) && line.trim().contains("  ")
}

/// Header candidates in `[start, min(start + lookahead, end))`; each line is
/// judged together with the two lines after it so wrapped headers still match.
fn find_headers(lines: &[String], start: usize, end: usize, lookahead: usize) -> Vec<(usize, HeaderSignal)> {
    let limit = (start + lookahead).min(end);
    (start..limit)
        .filter_map(|j| {
            let block = (j..(j + 3).min(end))
                .map(|k| lines[k].as_str())
                .collect::<Vec<_>>()
                .join("\n")
                .to_lowercase();
            match header_type(&block) {
                HeaderSignal::Strong => Some((j, HeaderSignal::Strong)),
                HeaderSignal::Medium => Some((j, HeaderSignal::Medium)),
                HeaderSignal::Weak => {
                    let has_year = block.contains("year");
                    let has_pay = PAY_WORDS.iter().any(|w| block.contains(w));
                    let has_cols = COLUMN_GAP_RE.is_match(&block);
                    (has_year && has_pay && has_cols).then_some((j, HeaderSignal::Weak))
                }
                HeaderSignal::None => None,
            }
        })
        .collect()
}

/// Lines from two above the header until two blank lines, a new heading, a
/// stop section or `capture_max` lines.
fn capture(lines: &[String], header: usize, window_end: usize, cfg: &PreformattedConfig) -> (usize, Vec<String>) {
    let start = header.saturating_sub(2);
    let mut out: Vec<String> = Vec::new();
    let mut blanks = 0;
    for line in &lines[start..window_end.max(start)] {
        if out.len() >= cfg.capture_max {
            break;
        }
        out.push(line.clone());
        if line.trim().is_empty() {
            blanks += 1;
        } else {
            blanks = 0;
        }
        if blanks >= 2 && out.len() > 6 {
            break;
        }
        if out.len() > 10 && ((is_new_heading(line) && !row_like(line)) || STOP_SECTION_RE.is_match(line)) {
            out.pop();
            break;
        }
    }

    // trim surrounding blank lines
    let first = out.iter().position(|l| !l.trim().is_empty()).unwrap_or(out.len());
    while out.last().map_or(false, |l| l.trim().is_empty()) {
        out.pop();
    }
    let lines = out.split_off(first.min(out.len()));
    (start + first, lines)
}

fn score_block(lines: &[String]) -> (i32, HeaderSignal) {
    let joined = lines.join("\n");
    let lower = joined.to_lowercase();
    let signal = header_type(&lower);
    let columns = COL_TOKENS.iter().filter(|t| lower.contains(*t)).count() as i32;
    let mut shape = 0;
    if lines.iter().filter(|l| row_like(l)).count() >= 2 {
        shape += 1;
    }
    if NUMERIC_RE.is_match(&joined) {
        shape += 1;
    }
    (signal as i32 + columns + shape, signal)
}

fn push_block(blocks: &mut Vec<Block>, start: usize, lines: Vec<String>, header_kind: HeaderSignal) {
    if lines.is_empty() {
        return;
    }
    // position-only headers need at least two data-looking lines
    if header_kind == HeaderSignal::Weak && lines.iter().filter(|l| row_like(l)).count() < 2 {
        return;
    }
    let (score, signal) = score_block(&lines);
    trace!(start, score, ?signal, "preformatted block");
    blocks.push(Block {
        start,
        lines,
        score,
        signal,
    });
}

/// Character spans occupied in at least one line; blank runs shorter than
/// `MIN_GAP` do not split a column.
fn column_spans(lines: &[Vec<char>]) -> Vec<(usize, usize)> {
    let width = lines.iter().map(Vec::len).max().unwrap_or(0);
    let mut occupied = vec![false; width];
    for line in lines {
        for (i, c) in line.iter().enumerate() {
            if !c.is_whitespace() {
                occupied[i] = true;
            }
        }
    }

    let mut spans = Vec::new();
    let mut i = 0;
    while i < width {
        if !occupied[i] {
            i += 1;
            continue;
        }
        let start = i;
        let mut end = i;
        while end < width {
            if occupied[end] {
                end += 1;
                continue;
            }
            let gap = occupied[end..].iter().take_while(|o| !**o).count();
            if gap >= MIN_GAP || end + gap >= width {
                break;
            }
            end += gap;
        }
        spans.push((start, end));
        i = end;
    }
    spans
}

/// Whitespace-separated words with their character ranges.
fn words(line: &[char]) -> Vec<(usize, usize, String)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < line.len() {
        if line[i].is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        while i < line.len() && !line[i].is_whitespace() {
            i += 1;
        }
        out.push((start, i, line[start..i].iter().collect()));
    }
    out
}

/// Span with the largest overlap, or the nearest one for words sitting in a gap.
fn span_for(word: (usize, usize), spans: &[(usize, usize)]) -> usize {
    let (ws, we) = word;
    let overlap = |&(s, e): &(usize, usize)| we.min(e).saturating_sub(ws.max(s));
    let distance = |&(s, e): &(usize, usize)| {
        if we <= s {
            s - we
        } else {
            ws.saturating_sub(e)
        }
    };
    let mut best = 0;
    for (k, span) in spans.iter().enumerate() {
        let (cur, prev) = (overlap(span), overlap(&spans[best]));
        if cur > prev || (cur == 0 && prev == 0 && distance(span) < distance(&spans[best])) {
            best = k;
        }
    }
    best
}

fn is_rule(word: &str) -> bool {
    word.chars().count() >= 3 && word.chars().all(|c| matches!(c, '-' | '=' | '_'))
}

/// Slice a captured block into a grid at the columns inferred from its data lines.
fn block_to_table(start: usize, block: &[String]) -> Option<RawTable> {
    let mut lines: Vec<Vec<char>> = Vec::new();
    let mut seen_data = false;
    for line in block {
        if line.trim().is_empty() || SEPARATOR_RE.is_match(line) {
            continue;
        }
        if line.to_lowercase().contains(TITLE_PHRASE) {
            continue;
        }
        if seen_data && FOOTNOTE_LINE_RE.is_match(line) {
            break;
        }
        seen_data |= row_like(line);
        lines.push(line.chars().collect());
    }

    let data: Vec<Vec<char>> = lines
        .iter()
        .filter(|l| row_like(&l.iter().collect::<String>()))
        .cloned()
        .collect();
    let spans = column_spans(if data.is_empty() { &lines } else { &data });
    if spans.len() < 2 {
        return None;
    }

    let rows = lines
        .iter()
        .map(|line| {
            let mut row = vec![String::new(); spans.len()];
            for (ws, we, word) in words(line) {
                if is_rule(&word) {
                    continue;
                }
                let cell = &mut row[span_for((ws, we), &spans)];
                if !cell.is_empty() {
                    cell.push(' ');
                }
                cell.push_str(&word);
            }
            row
        })
        .collect();

    Some(RawTable {
        index: start,
        caption: None,
        rows,
    })
}

/// Locate a fixed-width summary compensation table in plain or `<PRE>` text.
/// The returned table's `index` is the line number where the block starts.
#[instrument(level = "debug", skip_all)]
pub fn locate_preformatted(text: &str, cfg: &PreformattedConfig) -> Option<ScoredCandidate> {
    let lines = plain_lines(text);
    let total = lines.len();

    // 1) anchors naming the table
    let anchors: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| {
            let lower = l.to_lowercase();
            lower.contains("summary") && lower.contains("compensation") && lower.contains("table")
        })
        .map(|(i, _)| i)
        .collect();

    // 2) header candidates near anchors, or in strides over the whole text
    let mut blocks = Vec::new();
    if !anchors.is_empty() {
        for &anchor in &anchors {
            let window_end = (anchor + cfg.window_after).min(total);
            for (header, kind) in find_headers(&lines, anchor, window_end, cfg.header_lookahead) {
                let (start, captured) = capture(&lines, header, window_end, cfg);
                push_block(&mut blocks, start, captured, kind);
            }
        }
    } else {
        let stride = (cfg.header_lookahead / 2).max(20);
        for i in (0..total).step_by(stride) {
            let end = (i + cfg.header_lookahead).min(total);
            for (header, kind) in find_headers(&lines, i, end, cfg.header_lookahead) {
                let window_end = (header + cfg.window_after).min(total);
                let (start, captured) = capture(&lines, header, window_end, cfg);
                push_block(&mut blocks, start, captured, kind);
            }
        }
    }

    // 3) best block, earliest on ties
    let mut best: Option<Block> = None;
    for block in blocks {
        if best.as_ref().map_or(true, |b| block.score > b.score) {
            best = Some(block);
        }
    }
    let best = best?;
    if best.score < cfg.min_score {
        debug!(score = best.score, threshold = cfg.min_score, "preformatted block below threshold");
        return None;
    }

    // 4) fixed-width columns
    let table = block_to_table(best.start, &best.lines)?;
    if table.is_empty() {
        return None;
    }
    debug!(
        start = best.start,
        rows = table.rows.len(),
        columns = table.width(),
        "preformatted table captured"
    );
    Some(ScoredCandidate {
        table,
        score: best.score,
        header_signal: best.signal,
    })
}
