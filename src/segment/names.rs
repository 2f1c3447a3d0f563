// src/segment/names.rs

use once_cell::sync::Lazy;
use regex::Regex;

use super::FRAGMENT_JOIN;

/// Title keywords, longest phrases first so they win at a shared start.
static POSITION_RE: Lazy<Regex> = Lazy::new(|| {
    let keywords = [
        r"chief\s+executive\s+officer",
        r"chief\s+financial\s+officer",
        r"chief\s+operating\s+officer",
        r"chief\s+legal\s+officer",
        r"principal\s+accounting\s+officer",
        r"senior\s+vice\s+president",
        r"executive\s+vice\s+president",
        r"vice\s+chairman",
        r"vice\s+president",
        r"general\s+counsel",
        r"lead\s+director",
        r"ceo",
        r"cfo",
        r"coo",
        r"clo",
        r"pao",
        r"svp",
        r"evp",
        r"vp",
        r"president",
        r"chairman",
        r"chair",
        r"chief",
        r"director",
        r"officer",
        r"secretary",
        r"treasurer",
        r"principal",
        r"founder",
    ];
    Regex::new(&format!(r"(?i)\b(?:{})\b", keywords.join("|"))).expect("position regex should compile")
});

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z]+").expect("word regex should compile"));

/// Initials (`J.`), generational suffixes or a comma.
static NAME_MARK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z]\.|,|\b(?:jr|sr|ii|iii|iv)\b\.?").expect("name mark regex should compile")
});

/// Words that may sit between title keywords without making the text a name.
const TITLE_FILLER: &[&str] = &[
    "and", "of", "the", "to", "for", "at", "former", "interim", "acting", "co", "executive", "senior",
    "group", "board", "company", "corporation", "inc",
];

const CONNECTORS: &[&str] = &["and ", "of ", "at ", "for "];

/// Text built only from title keywords and filler words.
fn is_title_phrase(text: &str) -> bool {
    let rest = POSITION_RE.replace_all(text, " ");
    POSITION_RE.is_match(text)
        && WORD_RE
            .find_iter(&rest)
            .all(|w| TITLE_FILLER.contains(&w.as_str().to_lowercase().as_str()))
}

/// Whether `text` reads like a person's name rather than a job title.
pub fn looks_like_name(text: &str) -> bool {
    let t = text.trim();
    if !t.chars().any(char::is_alphabetic) || t.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    if POSITION_RE.find(t).map_or(false, |m| m.start() == 0) {
        return false;
    }
    NAME_MARK_RE.is_match(t) || !is_title_phrase(t)
}

fn trim_name(s: &str) -> String {
    s.trim().trim_end_matches(|c: char| matches!(c, ',' | ';' | ':' | '-') || c.is_whitespace()).to_string()
}

/// Drop leading connectors and punctuation left over from a split.
fn clean_position(s: &str) -> String {
    let mut p = s.trim().trim_start_matches(|c: char| matches!(c, ',' | ';' | ':' | '-') || c.is_whitespace());
    loop {
        let lower = p.to_lowercase();
        match CONNECTORS.iter().find(|c| lower.starts_with(*c)) {
            Some(c) => p = p[c.len()..].trim_start(),
            None => break,
        }
    }
    p.trim_start_matches(':').trim().to_string()
}

fn join_nonempty(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split at the first title keyword when the text before it is name-like.
fn split_on_keyword(text: &str) -> Option<(String, String)> {
    let m = POSITION_RE.find(text)?;
    let pre = trim_name(&text[..m.start()]);
    if !looks_like_name(&pre) {
        return None;
    }
    Some((pre, clean_position(&text[m.start()..])))
}

/// (a) several fragments: the first name-like one is the name, the rest the
/// position. A fragment free of title keywords wins over one that only reads
/// as a name because of a comma or initials.
fn by_fragments(fragments: &[&str]) -> Option<(String, String)> {
    if fragments.len() < 2 {
        return None;
    }
    let idx = fragments
        .iter()
        .position(|f| looks_like_name(f) && !POSITION_RE.is_match(f))
        .or_else(|| fragments.iter().position(|f| looks_like_name(f)))?;
    let others: Vec<&str> = fragments
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx)
        .map(|(_, f)| *f)
        .collect();
    let others = join_nonempty(&others);

    // a title glued to the name fragment moves to the position
    match split_on_keyword(fragments[idx]) {
        Some((name, title)) => Some((name, clean_position(&join_nonempty(&[title.as_str(), others.as_str()])))),
        None => Some((trim_name(fragments[idx]), clean_position(&others))),
    }
}

/// (b) keyword split.
fn by_keyword(text: &str) -> Option<(String, String)> {
    split_on_keyword(text)
}

/// (c) first comma; whichever side alone reads as a name.
fn by_comma(text: &str) -> Option<(String, String)> {
    let (left, right) = text.split_once(',')?;
    let (left, right) = (left.trim(), right.trim());
    match (looks_like_name(left), looks_like_name(right)) {
        (true, false) => Some((left.to_string(), clean_position(right))),
        (false, true) => Some((right.to_string(), clean_position(left))),
        // "Last, First" and the like
        (true, true) if !POSITION_RE.is_match(text) => None,
        (true, true) => Some((left.to_string(), clean_position(right))),
        (false, false) => None,
    }
}

/// (d) the whole text is either the name or the position.
fn whole(text: &str) -> (String, String) {
    if looks_like_name(text) {
        (trim_name(text), String::new())
    } else {
        (String::new(), clean_position(text))
    }
}

/// Split consolidated name/position text into `(name, position)`. Strategies
/// run in order and the first that succeeds wins.
pub fn split_name_position(consolidated: &str) -> (String, String) {
    let fragments: Vec<&str> = consolidated
        .split(FRAGMENT_JOIN)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    if fragments.is_empty() {
        return (String::new(), String::new());
    }
    let text = fragments.join(" ");

    by_fragments(&fragments)
        .or_else(|| by_keyword(&text))
        .or_else(|| by_comma(&text))
        .unwrap_or_else(|| whole(&text))
}
