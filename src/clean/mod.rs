// src/clean/mod.rs

pub mod header;
pub mod rows;

use tracing::debug;

pub use header::{canonical_field, CanonicalField};

use crate::config::ExtractConfig;
use crate::locate::RawTable;
use crate::pipeline::Diagnostic;

/// One output column: where it came from and what it means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column index in the source grid.
    pub position: usize,
    pub field: CanonicalField,
    /// Merged header text the field was derived from.
    pub raw_header: String,
}

/// A body row addressed positionally against `HeaderedTable::columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    /// Source row index; expanded rows share their origin.
    pub origin: usize,
    pub cells: Vec<Option<String>>,
}

impl NormalizedRow {
    pub fn cell(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).and_then(|c| c.as_deref())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }
}

/// Column descriptors plus rows, kept in lockstep: `rows[i].cells.len() == columns.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderedTable {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<NormalizedRow>,
}

impl HeaderedTable {
    /// Index of the first column mapped to `field`.
    pub fn column_of(&self, field: &CanonicalField) -> Option<usize> {
        self.columns.iter().position(|c| &c.field == field)
    }

    pub fn year_column(&self) -> Option<usize> {
        self.column_of(&CanonicalField::Year)
    }

    pub fn name_column(&self) -> Option<usize> {
        self.column_of(&CanonicalField::NamePosition)
    }

    /// Keep only the columns whose index satisfies `keep`.
    pub(crate) fn retain_columns<F: Fn(usize) -> bool>(&mut self, keep: F) {
        let kept: Vec<usize> = (0..self.columns.len()).filter(|&i| keep(i)).collect();
        if kept.len() == self.columns.len() {
            return;
        }
        self.columns = kept.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            row.cells = kept.iter().map(|&i| row.cells.get(i).cloned().flatten()).collect();
        }
    }
}

/// Header reconciliation followed by row normalization.
pub fn clean_table(raw: &RawTable, cfg: &ExtractConfig, diagnostics: &mut Vec<Diagnostic>) -> HeaderedTable {
    let table = header::reconcile(raw, cfg, diagnostics);
    let table = rows::normalize(table);
    debug!(
        rows = table.rows.len(),
        columns = table.columns.len(),
        "table cleaned"
    );
    table
}
