// src/clean/rows.rs

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use super::{CanonicalField, HeaderedTable, NormalizedRow};
use crate::segment::FRAGMENT_JOIN;
use crate::text::{contains_digit, format_number, has_year, is_placeholder, parse_number, year_cell_tokens};

/// Header vocabulary that marks a leftover header row above the data.
static HEADER_JUNK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(name|principal|position|year|fiscal|salary|bonus|stock|option|incentive|pension|all other|total)")
        .expect("header junk regex should compile")
});

/// Run every normalization step in order.
pub fn normalize(mut table: HeaderedTable) -> HeaderedTable {
    // 1) structurally empty rows and columns
    drop_empty(&mut table);
    coalesce_duplicate_key_columns(&mut table);
    drop_duplicate_columns(&mut table);
    drop_yearless_year_cells(&mut table);

    // 2) header residue above the first data row
    drop_pre_data_junk(&mut table);

    // 3) one row per fiscal year
    let table = expand_stacked_rows(table);

    // 4) placeholders become missing
    let mut table = blank_placeholders(table);
    drop_empty(&mut table);
    table
}

/// Drop rows with no content, then columns with no content in any row.
pub fn drop_empty(table: &mut HeaderedTable) {
    table.rows.retain(|r| !r.is_blank());
    let width = table.columns.len();
    let used: Vec<bool> = (0..width)
        .map(|c| table.rows.iter().any(|r| r.cell(c).is_some()))
        .collect();
    table.retain_columns(|c| used[c]);
}

/// Fold duplicate `year` and `name_position` columns into the first one. The
/// year keeps the first non-blank value per row; distinct name/position texts
/// are joined with `FRAGMENT_JOIN` so a separate position column survives.
pub fn coalesce_duplicate_key_columns(table: &mut HeaderedTable) {
    let mut dropped = vec![false; table.columns.len()];
    for key in [CanonicalField::Year, CanonicalField::NamePosition] {
        let cols: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.field == key)
            .map(|(i, _)| i)
            .collect();
        let Some((&first, rest)) = cols.split_first() else {
            continue;
        };
        for row in &mut table.rows {
            match key {
                CanonicalField::NamePosition => {
                    let mut parts: Vec<String> = Vec::new();
                    for text in cols.iter().filter_map(|&c| row.cells[c].as_deref()) {
                        if !parts.iter().any(|p| p == text) {
                            parts.push(text.to_string());
                        }
                    }
                    row.cells[first] = (!parts.is_empty()).then(|| parts.join(FRAGMENT_JOIN));
                }
                _ => {
                    if row.cells[first].is_none() {
                        row.cells[first] = rest.iter().find_map(|&c| row.cells[c].clone());
                    }
                }
            }
        }
        for &c in rest {
            dropped[c] = true;
        }
    }
    table.retain_columns(|c| !dropped[c]);
}

/// Drop columns whose field and body repeat an earlier column exactly
/// (colspan copies).
pub fn drop_duplicate_columns(table: &mut HeaderedTable) {
    let width = table.columns.len();
    let column = |c: usize| table.rows.iter().map(|r| r.cell(c)).collect::<Vec<_>>();
    let duplicate: Vec<bool> = (0..width)
        .map(|c| {
            (0..c).any(|p| table.columns[p].field == table.columns[c].field && column(p) == column(c))
        })
        .collect();
    table.retain_columns(|c| !duplicate[c]);
}

/// A non-blank year cell without a year token is footnote residue.
pub fn drop_yearless_year_cells(table: &mut HeaderedTable) {
    let Some(year) = table.year_column() else {
        return;
    };
    table.rows.retain(|r| r.cell(year).map_or(true, has_year));
}

fn is_junk(row: &NormalizedRow) -> bool {
    let cells: Vec<&str> = row.cells.iter().flatten().map(String::as_str).collect();
    // one text spread over the row by colspan: a title or caption line
    if cells.len() > 1 && cells.iter().all(|c| *c == cells[0]) {
        return true;
    }
    let joined = cells.join(" ");
    HEADER_JUNK_RE.is_match(&joined) || !contains_digit(&joined)
}

fn is_year_row(row: &NormalizedRow, year: usize) -> bool {
    row.cell(year).and_then(year_cell_tokens).is_some()
}

/// Before the first row whose year cell holds only years, drop header-like
/// rows and rows without digits. Everything from that row on is kept.
pub fn drop_pre_data_junk(table: &mut HeaderedTable) {
    let Some(year) = table.year_column() else {
        return;
    };
    let Some(first) = table
        .rows
        .iter()
        .position(|r| is_year_row(r, year))
    else {
        return;
    };
    let before = table.rows.len();
    let mut idx = 0;
    table.rows.retain(|r| {
        let keep = idx >= first || !is_junk(r);
        idx += 1;
        keep
    });
    trace!(dropped = before - table.rows.len(), "pre-data junk rows");
}

/// Cleaned numeric string for one stacked token; placeholders are zero.
fn stacked_value(token: &str) -> String {
    if is_placeholder(token) {
        return "0".to_string();
    }
    parse_number(token).map(format_number).unwrap_or_else(|| token.to_string())
}

fn is_numeric_token(token: &str) -> bool {
    is_placeholder(token) || parse_number(token).is_some()
}

/// Split rows whose year cell carries several years into one row per year,
/// zipping pay-field tokens against the years by position.
pub fn expand_stacked_rows(mut table: HeaderedTable) -> HeaderedTable {
    let Some(year_col) = table.year_column() else {
        return table;
    };
    let needs_expansion = table
        .rows
        .iter()
        .any(|r| r.cell(year_col).and_then(year_cell_tokens).map_or(false, |y| y.len() >= 2));
    if !needs_expansion {
        return table;
    }

    let fields: Vec<CanonicalField> = table.columns.iter().map(|c| c.field.clone()).collect();
    let rows = std::mem::take(&mut table.rows);
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let years: Vec<String> = row
            .cell(year_col)
            .and_then(year_cell_tokens)
            .map(|y| y.into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        let n = years.len();
        if n < 2 {
            out.push(row);
            continue;
        }

        let tokens: Vec<Vec<&str>> = row
            .cells
            .iter()
            .map(|c| c.as_deref().map(|s| s.split_whitespace().collect()).unwrap_or_default())
            .collect();

        for (k, year) in years.iter().enumerate() {
            let cells = fields
                .iter()
                .enumerate()
                .map(|(c, field)| {
                    let toks = &tokens[c];
                    match field {
                        CanonicalField::Year => Some(year.clone()),
                        f if f.is_pay_field() => Some(match toks.len() {
                            0 => "0".to_string(),
                            1 => stacked_value(toks[0]),
                            _ => toks.get(k).map_or_else(|| "0".to_string(), |t| stacked_value(t)),
                        }),
                        CanonicalField::Other(_)
                            if toks.len() == n && toks.iter().all(|t| is_numeric_token(t)) =>
                        {
                            Some(stacked_value(toks[k]))
                        }
                        _ => row.cells[c].clone(),
                    }
                })
                .collect();
            out.push(NormalizedRow {
                origin: row.origin,
                cells,
            });
        }
    }
    debug!(rows = out.len(), "stacked rows expanded");
    table.rows = out;
    table
}

/// Dashes and whitespace-only cells become missing.
pub fn blank_placeholders(mut table: HeaderedTable) -> HeaderedTable {
    for row in &mut table.rows {
        for cell in &mut row.cells {
            if cell.as_deref().map_or(false, is_placeholder) {
                *cell = None;
            }
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::ColumnDescriptor;
    use pretty_assertions::assert_eq;

    fn table(fields: &[CanonicalField], rows: &[&[&str]]) -> HeaderedTable {
        HeaderedTable {
            columns: fields
                .iter()
                .enumerate()
                .map(|(position, field)| ColumnDescriptor {
                    position,
                    field: field.clone(),
                    raw_header: field.as_str().to_string(),
                })
                .collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(origin, r)| NormalizedRow {
                    origin,
                    cells: r
                        .iter()
                        .map(|c| (!c.is_empty()).then(|| c.to_string()))
                        .collect(),
                })
                .collect(),
        }
    }

    fn cells(t: &HeaderedTable) -> Vec<Vec<Option<&str>>> {
        t.rows
            .iter()
            .map(|r| r.cells.iter().map(|c| c.as_deref()).collect())
            .collect()
    }

    #[test]
    fn two_stacked_years_expand_in_order() {
        let t = table(
            &[CanonicalField::NamePosition, CanonicalField::Year, CanonicalField::Salary],
            &[&["J. Smith", "2006 2005", "100,000 200,000"]],
        );
        let t = expand_stacked_rows(t);
        assert_eq!(
            cells(&t),
            vec![
                vec![Some("J. Smith"), Some("2006"), Some("100000")],
                vec![Some("J. Smith"), Some("2005"), Some("200000")],
            ]
        );
        assert!(t.rows.iter().all(|r| r.origin == 0));
    }

    #[test]
    fn stacked_placeholders_and_broadcast() {
        let t = table(
            &[
                CanonicalField::Year,
                CanonicalField::Bonus,
                CanonicalField::Total,
                CanonicalField::Other("ltip_payouts".into()),
                CanonicalField::Other("note".into()),
            ],
            &[&["2006 2005 2004", "\u{2014} 5,000 -", "7,500", "1 2 3", "see text"]],
        );
        let t = expand_stacked_rows(t);
        assert_eq!(
            cells(&t),
            vec![
                vec![Some("2006"), Some("0"), Some("7500"), Some("1"), Some("see text")],
                vec![Some("2005"), Some("5000"), Some("7500"), Some("2"), Some("see text")],
                vec![Some("2004"), Some("0"), Some("7500"), Some("3"), Some("see text")],
            ]
        );
    }

    #[test]
    fn junk_above_first_year_is_dropped_but_data_after_is_kept() {
        let t = table(
            &[CanonicalField::NamePosition, CanonicalField::Year, CanonicalField::Salary],
            &[
                &["Annual Compensation", "", ""],
                &["(in dollars)", "", ""],
                &["J. Smith", "2019", "500"],
                &["Chief Executive Officer", "", ""],
                &["", "2018", "400"],
            ],
        );
        let t = normalize(t);
        let origins: Vec<usize> = t.rows.iter().map(|r| r.origin).collect();
        assert_eq!(origins, vec![2, 3, 4]);
    }

    #[test]
    fn duplicate_and_empty_columns_collapse() {
        let t = table(
            &[
                CanonicalField::NamePosition,
                CanonicalField::Year,
                CanonicalField::Salary,
                CanonicalField::Salary,
                CanonicalField::Other("column_4".into()),
                CanonicalField::Year,
            ],
            &[
                &["J. Smith", "2019", "500", "500", "", ""],
                &["", "", "400", "400", "", "2018"],
            ],
        );
        let t = normalize(t);
        let fields: Vec<&str> = t.columns.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["name_position", "year", "salary"]);
        assert_eq!(t.rows[1].cell(1), Some("2018"));
    }

    #[test]
    fn title_row_spread_by_colspan_is_not_data() {
        let title = "Summary Compensation Table for Fiscal 2019";
        let t = table(
            &[CanonicalField::NamePosition, CanonicalField::Year, CanonicalField::Salary],
            &[
                &[title, title, title],
                &["Jane Doe", "2019", "300,000"],
                &["", "2018", "280,000"],
            ],
        );
        let t = normalize(t);
        let origins: Vec<usize> = t.rows.iter().map(|r| r.origin).collect();
        assert_eq!(origins, vec![1, 2]);
    }

    #[test]
    fn separate_name_and_position_columns_are_joined() {
        let t = table(
            &[
                CanonicalField::NamePosition,
                CanonicalField::NamePosition,
                CanonicalField::Year,
                CanonicalField::Salary,
            ],
            &[
                &["Jane Doe", "Chief Financial Officer", "2019", "300,000"],
                &["", "", "2018", "280,000"],
                &["John Roe", "John Roe", "2019", "250,000"],
            ],
        );
        let t = normalize(t);
        let fields: Vec<&str> = t.columns.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["name_position", "year", "salary"]);
        assert_eq!(t.rows[0].cell(0), Some("Jane Doe | Chief Financial Officer"));
        assert_eq!(t.rows[1].cell(0), None);
        assert_eq!(t.rows[2].cell(0), Some("John Roe"));
    }

    #[test]
    fn footnote_residue_in_year_column_is_dropped_and_dashes_blank_out() {
        let t = table(
            &[CanonicalField::NamePosition, CanonicalField::Year, CanonicalField::Bonus],
            &[
                &["J. Smith", "2019", "\u{2014}"],
                &["", "(a) includes deferral", "100"],
            ],
        );
        let t = normalize(t);
        assert_eq!(t.rows.len(), 1);
        // the bonus column is all placeholders and disappears
        assert_eq!(t.columns.len(), 2);
    }
}
