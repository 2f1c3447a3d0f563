// src/text.rs

use once_cell::sync::Lazy;
use regex::Regex;

/// Four-digit fiscal year between 1900 and 2099.
pub static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("year regex should compile"));

static YEAR_ONLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:19|20)\d{2}$").expect("year-only regex should compile"));

static HYPHEN_SPLIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z])-\s+([a-z])").expect("hyphen split regex should compile")
});

/// Footnote markers: `(1)`, `(1,2)`, `(a)`, `($)`, `(#)`.
static FOOTNOTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*\((?:\s*[$#]\s*|\d{1,2}(?:\s*,\s*\d{1,2})*|[A-Za-z])\)")
        .expect("footnote regex should compile")
});

static SNAKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("snake case regex should compile"));

/// Collapse every whitespace run (NBSP included) to one space and trim.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() || ch == '\u{a0}' {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

/// Whitespace-normalized, lowercased text for keyword matching.
pub fn lower_norm(s: &str) -> String {
    normalize_ws(s).to_lowercase()
}

/// Clean one table cell: rejoin hyphenation splits, drop footnote markers and
/// currency signs, collapse whitespace. Case is preserved.
pub fn clean_cell(raw: &str) -> String {
    let s = normalize_ws(raw);
    if s.is_empty() {
        return s;
    }
    let s = HYPHEN_SPLIT_RE.replace_all(&s, "$1$2");
    let s = s.replace('/', " ");
    let s = FOOTNOTE_RE.replace_all(&s, "");
    let s = s.replace('$', "");
    normalize_ws(&s)
}

/// Empty, whitespace, em-dash, en-dash or bare hyphen.
pub fn is_placeholder(s: &str) -> bool {
    matches!(s.trim(), "" | "-" | "--" | "\u{2014}" | "\u{2013}" | "\u{2014}\u{2014}")
}

/// All year tokens in `s`, in order of appearance.
pub fn year_tokens(s: &str) -> Vec<&str> {
    YEAR_RE.find_iter(s).map(|m| m.as_str()).collect()
}

pub fn has_year(s: &str) -> bool {
    YEAR_RE.is_match(s)
}

/// Year tokens of a cell made of nothing but years (`2006 2005`, `2019*`).
/// Any other word, like a title carrying a year, yields `None`.
pub fn year_cell_tokens(s: &str) -> Option<Vec<&str>> {
    let tokens: Vec<&str> = s
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() || !tokens.iter().all(|t| YEAR_ONLY_RE.is_match(t)) {
        return None;
    }
    Some(tokens)
}

/// The numeric year of a cell holding exactly one year and nothing else.
pub fn single_year(s: &str) -> Option<u32> {
    match year_cell_tokens(s)?.as_slice() {
        [year] => year.parse().ok(),
        _ => None,
    }
}

pub fn contains_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
}

/// Parse an amount like `$1,234`, `(1,234)` or `12.5`. Placeholders and text
/// yield `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if is_placeholder(s) {
        return None;
    }
    let negative = s.starts_with('(') && s.ends_with(')');
    let digits: String = s
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '(' | ')') && !c.is_whitespace())
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-') {
        return None;
    }
    let v: f64 = digits.parse().ok()?;
    Some(if negative { -v } else { v })
}

/// Render a parsed amount without a trailing `.0` when it is integral.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Lowercase snake-case label; empty input stays empty.
pub fn snake_case(s: &str) -> String {
    let lower = s.to_lowercase();
    SNAKE_RE.replace_all(&lower, "_").trim_matches('_').to_string()
}
