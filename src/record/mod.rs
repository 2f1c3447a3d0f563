// src/record/mod.rs

pub mod merge;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::clean::{CanonicalField, HeaderedTable, NormalizedRow};
use crate::pipeline::{Diagnostic, FilingMeta};
use crate::segment::names::split_name_position;
use crate::segment::ExecutiveBlock;
use crate::text::{is_placeholder, parse_number, single_year, year_tokens};
use merge::{merge_values, rank_columns, Merge};

/// Key reserved for the executive's position inside every year entry.
const POSITION_KEY: &str = "position";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Coerce a cleaned cell. Unparseable text is kept as text.
    pub fn from_cell(cell: Option<&str>) -> Self {
        match cell {
            None => FieldValue::Missing,
            Some(s) if is_placeholder(s) => FieldValue::Missing,
            Some(s) => parse_number(s).map_or_else(|| FieldValue::Text(s.to_string()), FieldValue::Number),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Number(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => s.serialize_i64(*v as i64),
            FieldValue::Number(v) => s.serialize_f64(*v),
            FieldValue::Text(t) => s.serialize_str(t),
            FieldValue::Missing => s.serialize_none(),
        }
    }
}

/// Fields of one executive and year, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearFields {
    pub position: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl YearFields {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn has_values(&self) -> bool {
        self.fields.iter().any(|(_, v)| !v.is_missing())
    }

    /// Merge `value` into `key`; a conflicting value lands under `key_2`, `key_3`, ...
    /// Returns the suffixed key on conflict.
    fn merge(&mut self, key: &str, value: FieldValue) -> Option<String> {
        let Some(idx) = self.fields.iter().position(|(k, _)| k == key) else {
            self.fields.push((key.to_string(), value));
            return None;
        };
        match merge_values(&self.fields[idx].1, &value) {
            Merge::Keep => None,
            Merge::Replace => {
                self.fields[idx].1 = value;
                None
            }
            Merge::Conflict => {
                let mut n = 2;
                loop {
                    let suffixed = format!("{key}_{n}");
                    match self.get(&suffixed) {
                        Some(existing) if merge_values(existing, &value) != Merge::Conflict => return None,
                        Some(_) => n += 1,
                        None => {
                            self.fields.push((suffixed.clone(), value));
                            return Some(suffixed);
                        }
                    }
                }
            }
        }
    }
}

impl Serialize for YearFields {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(POSITION_KEY, &self.position)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// One executive's history; serializes as the year map alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutiveRecord {
    pub name: String,
    pub position: String,
    pub years: BTreeMap<String, YearFields>,
}

impl Serialize for ExecutiveRecord {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.years.serialize(s)
    }
}

/// Terminal artifact of one filing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilingRecord {
    pub ticker: String,
    pub report_date: String,
    pub report_year: String,
    pub executives: BTreeMap<String, ExecutiveRecord>,
}

impl FilingRecord {
    /// An empty record carrying the filing's identity.
    pub fn empty(meta: &FilingMeta) -> Self {
        let report_year = meta
            .report_year
            .clone()
            .or_else(|| report_year_of(&meta.report_date))
            .unwrap_or_default();
        Self {
            ticker: meta.ticker.trim().to_uppercase(),
            report_date: meta.report_date.trim().to_string(),
            report_year,
            executives: BTreeMap::new(),
        }
    }
}

impl Serialize for FilingRecord {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Report<'a> {
            report_date: &'a str,
            executives: &'a BTreeMap<String, ExecutiveRecord>,
        }
        #[derive(Serialize)]
        struct Company<'a> {
            ticker: &'a str,
            report_year: &'a str,
            summary_compensation_table: [Report<'a>; 1],
        }
        #[derive(Serialize)]
        struct Envelope<'a> {
            company: Company<'a>,
        }

        Envelope {
            company: Company {
                ticker: &self.ticker,
                report_year: &self.report_year,
                summary_compensation_table: [Report {
                    report_date: &self.report_date,
                    executives: &self.executives,
                }],
            },
        }
        .serialize(s)
    }
}

/// Calendar year of a report date in `YYYY-MM-DD`, `YYYYMMDD` or `MM/DD/YYYY`
/// form, else the first year token in it.
pub fn report_year_of(report_date: &str) -> Option<String> {
    let d = report_date.trim();
    ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(d, fmt).ok())
        .map(|date| date.year().to_string())
        .or_else(|| year_tokens(d).first().map(|y| y.to_string()))
}

/// `"<name> | <position>"`, one side alone when the other is empty, `unknown` when both are.
pub fn executive_key(name: &str, position: &str) -> String {
    match (name.trim(), position.trim()) {
        ("", "") => "unknown".to_string(),
        (n, "") => n.to_string(),
        ("", p) => p.to_string(),
        (n, p) => format!("{n} | {p}"),
    }
}

/// Output key per group of columns sharing it, groups in first-seen order.
fn column_groups(table: &HeaderedTable) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, col) in table.columns.iter().enumerate() {
        if matches!(col.field, CanonicalField::Year | CanonicalField::NamePosition) {
            continue;
        }
        let mut key = col.field.output_key().to_string();
        if key == POSITION_KEY {
            key = format!("{POSITION_KEY}_2");
        }
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, cols)) => cols.push(i),
            None => groups.push((key, vec![i])),
        }
    }
    groups
}

fn row_values(row: &NormalizedRow, width: usize) -> Vec<FieldValue> {
    (0..width).map(|c| FieldValue::from_cell(row.cell(c))).collect()
}

fn merge_executive(into: &mut ExecutiveRecord, from: ExecutiveRecord, diagnostics: &mut Vec<Diagnostic>) {
    for (year, fields) in from.years {
        let entry = into.years.entry(year.clone()).or_insert_with(|| YearFields {
            position: fields.position.clone(),
            fields: Vec::new(),
        });
        for (key, value) in fields.fields {
            if let Some(suffixed) = entry.merge(&key, value) {
                diagnostics.push(Diagnostic::ConflictingDuplicateColumn {
                    field: key,
                    year: year.clone(),
                    key: suffixed,
                });
            }
        }
    }
}

/// Build the filing record from segmented blocks. Rows without a numeric year
/// are dropped here; executives left without any value are omitted.
pub fn assemble(
    table: &HeaderedTable,
    blocks: &[ExecutiveBlock],
    meta: &FilingMeta,
    diagnostics: &mut Vec<Diagnostic>,
) -> FilingRecord {
    let mut record = FilingRecord::empty(meta);
    let Some(year_col) = table.year_column() else {
        debug!("no year column; nothing to assemble");
        return record;
    };
    let width = table.columns.len();

    // 1) duplicate groups ranked over the whole table
    let table_values: Vec<Vec<FieldValue>> = table.rows.iter().map(|r| row_values(r, width)).collect();
    let groups: Vec<(String, Vec<usize>)> = column_groups(table)
        .into_iter()
        .map(|(key, cols)| {
            let ranked = rank_columns(&table_values, &cols);
            (key, ranked)
        })
        .collect();

    // numeric coercion failures on pay columns, reported once per cell
    for row in &table.rows {
        for (c, col) in table.columns.iter().enumerate() {
            if !col.field.is_pay_field() {
                continue;
            }
            if let FieldValue::Text(value) = FieldValue::from_cell(row.cell(c)) {
                debug!(field = col.field.as_str(), %value, "non-numeric pay cell kept as text");
                diagnostics.push(Diagnostic::NumericCoercionFailure {
                    field: col.field.output_key().to_string(),
                    value,
                });
            }
        }
    }

    // 2) one record per block
    for block in blocks {
        let (name, position) = split_name_position(&block.consolidated_name_position);
        let mut exec = ExecutiveRecord {
            name: name.clone(),
            position: position.clone(),
            years: BTreeMap::new(),
        };
        for row in &block.rows {
            let Some(year) = row.cell(year_col).and_then(single_year) else {
                continue;
            };
            let year = year.to_string();
            let values = row_values(row, width);
            let entry = exec.years.entry(year.clone()).or_insert_with(|| YearFields {
                position: position.clone(),
                fields: Vec::new(),
            });
            for (key, cols) in &groups {
                for &c in cols {
                    if let Some(suffixed) = entry.merge(key, values[c].clone()) {
                        warn!(field = %key, %year, %suffixed, "conflicting duplicate column");
                        diagnostics.push(Diagnostic::ConflictingDuplicateColumn {
                            field: key.clone(),
                            year: year.clone(),
                            key: suffixed,
                        });
                    }
                }
            }
        }
        exec.years.retain(|_, fields| fields.has_values());
        if exec.years.is_empty() {
            debug!(block = block.block_id, "block has no values");
            continue;
        }

        // 3) colliding executives merge year by year
        let key = executive_key(&name, &position);
        match record.executives.remove(&key) {
            Some(mut existing) => {
                merge_executive(&mut existing, exec, diagnostics);
                record.executives.insert(key, existing);
            }
            None => {
                record.executives.insert(key, exec);
            }
        }
    }
    debug!(executives = record.executives.len(), "record assembled");
    record
}

/// Per report date executives of several filings of one ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedReport {
    pub executives: BTreeMap<String, ExecutiveRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedRecord {
    pub ticker: String,
    pub report_years: Vec<String>,
    pub summary_compensation_table: BTreeMap<String, CombinedReport>,
}

/// Aggregate the filings of one ticker keyed by report date. Filings without
/// executives or report date are skipped; later filings replace earlier ones
/// sharing a date. `None` when nothing remains.
pub fn combine_filings(records: &[FilingRecord]) -> Option<CombinedRecord> {
    let ticker = records.iter().map(|r| r.ticker.as_str()).find(|t| !t.is_empty())?;
    let mut years = BTreeSet::new();
    let mut reports = BTreeMap::new();
    for record in records {
        if !record.ticker.eq_ignore_ascii_case(ticker) {
            warn!(expected = ticker, found = %record.ticker, "skipping filing of another ticker");
            continue;
        }
        if record.executives.is_empty() || record.report_date.is_empty() {
            continue;
        }
        if !record.report_year.is_empty() {
            years.insert(record.report_year.clone());
        }
        reports.insert(
            record.report_date.clone(),
            CombinedReport {
                executives: record.executives.clone(),
            },
        );
    }
    if reports.is_empty() {
        return None;
    }
    Some(CombinedRecord {
        ticker: ticker.to_uppercase(),
        report_years: years.into_iter().collect(),
        summary_compensation_table: reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::ColumnDescriptor;
    use crate::segment::segment;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn meta() -> FilingMeta {
        FilingMeta {
            ticker: "acme".into(),
            report_date: "2020-04-01".into(),
            report_year: None,
        }
    }

    fn table(fields: &[CanonicalField], rows: &[&[&str]]) -> HeaderedTable {
        HeaderedTable {
            columns: fields
                .iter()
                .enumerate()
                .map(|(position, field)| ColumnDescriptor {
                    position,
                    field: field.clone(),
                    raw_header: field.to_string(),
                })
                .collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(origin, r)| NormalizedRow {
                    origin,
                    cells: r.iter().map(|c| (!c.is_empty()).then(|| c.to_string())).collect(),
                })
                .collect(),
        }
    }

    fn build(t: &HeaderedTable) -> (FilingRecord, Vec<Diagnostic>) {
        let mut diags = Vec::new();
        let blocks = segment(t);
        (assemble(t, &blocks, &meta(), &mut diags), diags)
    }

    #[test]
    fn conflicting_salary_columns_keep_both() {
        let t = table(
            &[
                CanonicalField::NamePosition,
                CanonicalField::Year,
                CanonicalField::Salary,
                CanonicalField::Salary,
            ],
            &[&["J. Smith | Chief Executive Officer", "2019", "50000", "55000"]],
        );
        let (record, diags) = build(&t);
        let year = &record.executives["J. Smith | Chief Executive Officer"].years["2019"];
        assert_eq!(year.get("salary"), Some(&FieldValue::Number(50000.0)));
        assert_eq!(year.get("salary_2"), Some(&FieldValue::Number(55000.0)));
        assert_eq!(
            diags,
            vec![Diagnostic::ConflictingDuplicateColumn {
                field: "salary".into(),
                year: "2019".into(),
                key: "salary_2".into(),
            }]
        );
    }

    #[test]
    fn zero_duplicates_and_equal_duplicates_collapse() {
        let t = table(
            &[
                CanonicalField::NamePosition,
                CanonicalField::Year,
                CanonicalField::Bonus,
                CanonicalField::Bonus,
            ],
            &[&["Jane Doe", "2019", "0", "7,000"], &["", "2018", "6,000", "6,000"]],
        );
        let (record, diags) = build(&t);
        let exec = &record.executives["Jane Doe"];
        assert_eq!(exec.years["2019"].get("bonus"), Some(&FieldValue::Number(7000.0)));
        assert_eq!(exec.years["2018"].get("bonus"), Some(&FieldValue::Number(6000.0)));
        assert!(exec.years["2019"].get("bonus_2").is_none());
        assert!(diags.is_empty());
    }

    #[test]
    fn record_serializes_to_the_company_shape() {
        let t = table(
            &[
                CanonicalField::NamePosition,
                CanonicalField::Year,
                CanonicalField::Salary,
                CanonicalField::NonEquityIncentive,
                CanonicalField::Other("ltip_payouts".into()),
                CanonicalField::Total,
            ],
            &[
                &["J. Smith, Chief Executive Officer", "2019", "500,000", "", "n/a", "512,500.50"],
                &["", "2018", "450,000", "10,000", "", "460,000"],
            ],
        );
        let (record, diags) = build(&t);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "company": {
                    "ticker": "ACME",
                    "report_year": "2020",
                    "summary_compensation_table": [{
                        "report_date": "2020-04-01",
                        "executives": {
                            "J. Smith | Chief Executive Officer": {
                                "2018": {
                                    "position": "Chief Executive Officer",
                                    "salary": 450000,
                                    "non_equity_incentive_plan": 10000,
                                    "ltip_payouts": null,
                                    "total": 460000
                                },
                                "2019": {
                                    "position": "Chief Executive Officer",
                                    "salary": 500000,
                                    "non_equity_incentive_plan": null,
                                    "ltip_payouts": "n/a",
                                    "total": 512500.5
                                }
                            }
                        }
                    }]
                }
            })
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn text_in_pay_column_is_reported_and_kept() {
        let t = table(
            &[CanonicalField::NamePosition, CanonicalField::Year, CanonicalField::Bonus],
            &[&["Jane Doe", "2019", "see note"]],
        );
        let (record, diags) = build(&t);
        assert_eq!(
            record.executives["Jane Doe"].years["2019"].get("bonus"),
            Some(&FieldValue::Text("see note".into()))
        );
        assert_eq!(
            diags,
            vec![Diagnostic::NumericCoercionFailure {
                field: "bonus".into(),
                value: "see note".into(),
            }]
        );
    }

    #[test]
    fn blocks_without_values_or_years_produce_nothing() {
        let t = table(
            &[CanonicalField::NamePosition, CanonicalField::Year, CanonicalField::Salary],
            &[&["Jane Doe", "2019", ""], &["John Roe", "", "100"]],
        );
        let (record, _) = build(&t);
        assert!(record.executives.is_empty());
    }

    #[test]
    fn report_year_from_date_formats() {
        assert_eq!(report_year_of("2021-03-15").as_deref(), Some("2021"));
        assert_eq!(report_year_of("20210315").as_deref(), Some("2021"));
        assert_eq!(report_year_of("03/15/2021").as_deref(), Some("2021"));
        assert_eq!(report_year_of("fiscal 2019 proxy").as_deref(), Some("2019"));
        assert_eq!(report_year_of("unknown"), None);
        assert_eq!(executive_key("", ""), "unknown");
        assert_eq!(executive_key("", "Director"), "Director");
    }

    #[test]
    fn combine_keys_filings_by_report_date() {
        let mut a = FilingRecord::empty(&meta());
        a.executives.insert("Jane Doe".into(), ExecutiveRecord::default());
        let mut b = FilingRecord::empty(&FilingMeta {
            ticker: "ACME".into(),
            report_date: "2021-04-01".into(),
            report_year: None,
        });
        b.executives.insert("Jane Doe".into(), ExecutiveRecord::default());
        let empty = FilingRecord::empty(&FilingMeta {
            ticker: "acme".into(),
            report_date: "2022-04-01".into(),
            report_year: None,
        });

        let combined = combine_filings(&[b, empty, a]).expect("combined");
        assert_eq!(combined.ticker, "ACME");
        assert_eq!(combined.report_years, vec!["2020", "2021"]);
        assert_eq!(
            combined.summary_compensation_table.keys().collect::<Vec<_>>(),
            vec!["2020-04-01", "2021-04-01"]
        );
        assert!(combine_filings(&[]).is_none());
    }
}
