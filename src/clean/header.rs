// src/clean/header.rs

use std::fmt;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::{ColumnDescriptor, HeaderedTable, NormalizedRow};
use crate::config::ExtractConfig;
use crate::locate::score::TITLE_PHRASE;
use crate::locate::RawTable;
use crate::pipeline::Diagnostic;
use crate::text::{clean_cell, has_year, lower_norm, snake_case};

/// Controlled output vocabulary. Unmapped headers keep a snake-case label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Year,
    NamePosition,
    Salary,
    Bonus,
    OtherAnnualCompensation,
    StockAwards,
    OptionAwards,
    NonEquityIncentive,
    PensionValue,
    AllOtherCompensation,
    Total,
    Other(String),
}

impl CanonicalField {
    pub fn as_str(&self) -> &str {
        match self {
            CanonicalField::Year => "year",
            CanonicalField::NamePosition => "name_position",
            CanonicalField::Salary => "salary",
            CanonicalField::Bonus => "bonus",
            CanonicalField::OtherAnnualCompensation => "other_annual_compensation",
            CanonicalField::StockAwards => "stock_awards",
            CanonicalField::OptionAwards => "option_awards",
            CanonicalField::NonEquityIncentive => "non_equity_incentive",
            CanonicalField::PensionValue => "pension_value",
            CanonicalField::AllOtherCompensation => "all_other_compensation",
            CanonicalField::Total => "total",
            CanonicalField::Other(label) => label,
        }
    }

    /// Key used in the serialized record.
    pub fn output_key(&self) -> &str {
        match self {
            CanonicalField::NonEquityIncentive => "non_equity_incentive_plan",
            other => other.as_str(),
        }
    }

    /// Dollar-amount columns of the summary compensation table.
    pub fn is_pay_field(&self) -> bool {
        matches!(
            self,
            CanonicalField::Salary
                | CanonicalField::Bonus
                | CanonicalField::OtherAnnualCompensation
                | CanonicalField::StockAwards
                | CanonicalField::OptionAwards
                | CanonicalField::NonEquityIncentive
                | CanonicalField::PensionValue
                | CanonicalField::AllOtherCompensation
                | CanonicalField::Total
        )
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static NON_ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("non-alnum regex should compile"));

/// Map header text to its canonical field. Rules are checked in a fixed
/// order; the first that matches wins.
pub fn canonical_field(raw: &str) -> CanonicalField {
    let lower = raw.to_lowercase();
    let s = NON_ALNUM_RE.replace_all(&lower, " ");
    let s = s.trim();
    let has = |t: &str| s.contains(t);

    if (has("name") && (has("position") || has("title") || has("occupation")))
        || has("principal position")
        || s == "name"
    {
        CanonicalField::NamePosition
    } else if has("fiscal") || has("year") {
        CanonicalField::Year
    } else if has("salary") {
        CanonicalField::Salary
    } else if has("bonus") {
        CanonicalField::Bonus
    } else if has("other annual") {
        CanonicalField::OtherAnnualCompensation
    } else if has("stock") && has("award") {
        CanonicalField::StockAwards
    } else if has("option") && has("award") {
        CanonicalField::OptionAwards
    } else if has("incentive") {
        CanonicalField::NonEquityIncentive
    } else if has("pension") || has("deferred compensation") {
        CanonicalField::PensionValue
    } else if has("all other") {
        CanonicalField::AllOtherCompensation
    } else if has("total") {
        CanonicalField::Total
    } else {
        CanonicalField::Other(snake_case(s))
    }
}

/// Vocabulary groups counted when looking for the header row.
const HEADER_GROUPS: &[&[&str]] = &[
    &["salary"],
    &["bonus"],
    &["stock awards", "stock-awards"],
    &["option awards", "option-awards"],
    &["non-equity incentive", "non equity incentive"],
    &["pension", "deferred compensation earnings"],
    &["all other compensation"],
    &["total"],
    &["year", "fiscal year"],
    &["name and principal position", "name & principal position", "principal position", "name"],
];

static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*\d|\b\d{3,}\b|\d,\d{3}").expect("amount regex should compile"));

/// Words seen in header cells and group captions.
static FRAGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:name|principal|position|title|year|fiscal|salary|bonus|stock|options?|sars|incentive|pension|deferred|all other|total|compensation|awards?|payouts?|ltip|annual|long[- ]term|restricted|underlying|securities|plan|earnings|value|change|other)\b",
    )
    .expect("header fragment regex should compile")
});

/// Title words that mark a person row rather than a header continuation.
static OFFICER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:officer|president|director|chairman|chair|ceo|cfo|coo|chief|treasurer|secretary|counsel)\b")
        .expect("officer regex should compile")
});

fn header_hits(row: &[String]) -> usize {
    let text = lower_norm(&row.join(" "));
    if has_year(&text) {
        return 0;
    }
    HEADER_GROUPS
        .iter()
        .filter(|group| group.iter().any(|t| text.contains(t)))
        .count()
}

/// Row with the most vocabulary groups among the first `header_scan_rows`,
/// earliest on ties; `None` when no row reaches `min_header_hits`.
pub fn detect_header_row(rows: &[Vec<String>], cfg: &ExtractConfig) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, row) in rows.iter().take(cfg.header_scan_rows).enumerate() {
        let hits = header_hits(row);
        if hits < cfg.min_header_hits {
            continue;
        }
        if best.map_or(true, |(_, b)| hits > b) {
            best = Some((i, hits));
        }
    }
    best.map(|(i, _)| i)
}

fn cleaned_cells(row: &[String]) -> Vec<String> {
    row.iter().map(|c| clean_cell(c)).filter(|c| !c.is_empty()).collect()
}

/// Group captions, unit rows and wrapped header lines.
fn is_header_fragment_row(row: &[String], below: bool) -> bool {
    let cells = cleaned_cells(row);
    if cells.is_empty() {
        return true;
    }
    if cells.iter().any(|c| has_year(c) || AMOUNT_RE.is_match(c)) {
        return false;
    }
    if cells.iter().any(|c| lower_norm(c).contains(TITLE_PHRASE)) {
        return false;
    }
    if below && cells.iter().any(|c| OFFICER_RE.is_match(c)) {
        return false;
    }
    cells.iter().all(|c| FRAGMENT_RE.is_match(c))
}

/// Rows that together form the header around the detected row.
fn header_block(rows: &[Vec<String>], header: usize, max_rows: usize) -> Range<usize> {
    let max_rows = max_rows.max(1);
    let mut start = header;
    let mut end = header + 1;
    while start > 0 && end - start < max_rows && is_header_fragment_row(&rows[start - 1], false) {
        start -= 1;
    }
    while end < rows.len() && end - start < max_rows && is_header_fragment_row(&rows[end], true) {
        end += 1;
    }
    start..end
}

/// Per column, the distinct non-empty fragments of the header rows top to bottom.
fn merge_header(rows: &[Vec<String>], block: Range<usize>, width: usize) -> Vec<String> {
    (0..width)
        .map(|c| {
            let mut parts: Vec<String> = Vec::new();
            for row in &rows[block.clone()] {
                let frag = clean_cell(row.get(c).map(String::as_str).unwrap_or(""));
                if !frag.is_empty() && !parts.iter().any(|p| p.eq_ignore_ascii_case(&frag)) {
                    parts.push(frag);
                }
            }
            parts.join(" ")
        })
        .collect()
}

/// Find and merge the header, map it to canonical fields and split off the body.
pub fn reconcile(raw: &RawTable, cfg: &ExtractConfig, diagnostics: &mut Vec<Diagnostic>) -> HeaderedTable {
    let rows = &raw.rows;
    let width = raw.width();
    if rows.is_empty() || width == 0 {
        return HeaderedTable::default();
    }

    let header = match detect_header_row(rows, cfg) {
        Some(h) => h,
        None => {
            warn!(table = raw.index, "no header row found; using the first row");
            diagnostics.push(Diagnostic::HeaderDetectionFailure);
            0
        }
    };
    let block = header_block(rows, header, cfg.max_header_rows);
    let merged = merge_header(rows, block.clone(), width);

    let columns: Vec<ColumnDescriptor> = merged
        .into_iter()
        .enumerate()
        .map(|(position, raw_header)| {
            let field = match canonical_field(&raw_header) {
                CanonicalField::Other(label) if label.is_empty() => {
                    CanonicalField::Other(format!("column_{position}"))
                }
                field => field,
            };
            ColumnDescriptor {
                position,
                field,
                raw_header,
            }
        })
        .collect();

    let body = rows
        .iter()
        .enumerate()
        .filter(|(i, _)| !block.contains(i))
        .map(|(origin, row)| NormalizedRow {
            origin,
            cells: (0..width)
                .map(|c| {
                    let v = clean_cell(row.get(c).map(String::as_str).unwrap_or(""));
                    (!v.is_empty()).then_some(v)
                })
                .collect(),
        })
        .collect();

    debug!(
        header_row = header,
        header_rows = block.len(),
        fields = ?columns.iter().map(|c| c.field.as_str()).collect::<Vec<_>>(),
        "header reconciled"
    );
    HeaderedTable {
        columns,
        rows: body,
    }
}
