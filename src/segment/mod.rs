// src/segment/mod.rs

pub mod names;

use tracing::{debug, trace};

use crate::clean::{HeaderedTable, NormalizedRow};
use crate::text::single_year;

/// Separator between name/position fragments gathered from one block.
pub const FRAGMENT_JOIN: &str = " | ";

/// The contiguous rows of one executive's multi-year history.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutiveBlock {
    pub block_id: usize,
    pub rows: Vec<NormalizedRow>,
    /// Distinct non-blank name/position cells of the block, in encounter order.
    pub consolidated_name_position: String,
}

/// Block id for each row. A year at or above the previous year opens a new
/// block; blank years and falling years continue the current one. Rows before
/// the first year belong to block 0.
pub fn assign_blocks<I>(years: I) -> Vec<usize>
where
    I: IntoIterator<Item = Option<u32>>,
{
    let (ids, _, _) = years.into_iter().fold(
        (Vec::new(), 0usize, None::<u32>),
        |(mut ids, block, prev), year| {
            let block = match (year, prev) {
                (Some(y), Some(p)) if y >= p => block + 1,
                _ => block,
            };
            ids.push(block);
            (ids, block, year.or(prev))
        },
    );
    ids
}

fn consolidate(rows: &[NormalizedRow], name_col: Option<usize>) -> String {
    let Some(col) = name_col else {
        return String::new();
    };
    let mut seen: Vec<&str> = Vec::new();
    for text in rows.iter().filter_map(|r| r.cell(col)).map(str::trim) {
        if !text.is_empty() && !seen.contains(&text) {
            seen.push(text);
        }
    }
    seen.join(FRAGMENT_JOIN)
}

/// Partition the normalized rows into executive blocks, preserving row order.
pub fn segment(table: &HeaderedTable) -> Vec<ExecutiveBlock> {
    let year_col = table.year_column();
    let name_col = table.name_column();
    let ids = assign_blocks(
        table
            .rows
            .iter()
            .map(|r| year_col.and_then(|c| r.cell(c)).and_then(single_year)),
    );

    let mut blocks: Vec<ExecutiveBlock> = Vec::new();
    for (row, id) in table.rows.iter().zip(ids) {
        match blocks.last_mut() {
            Some(block) if block.block_id == id => block.rows.push(row.clone()),
            _ => blocks.push(ExecutiveBlock {
                block_id: id,
                rows: vec![row.clone()],
                consolidated_name_position: String::new(),
            }),
        }
    }
    for block in &mut blocks {
        block.consolidated_name_position = consolidate(&block.rows, name_col);
        trace!(
            block = block.block_id,
            rows = block.rows.len(),
            name = %block.consolidated_name_position,
            "executive block"
        );
    }
    debug!(blocks = blocks.len(), "rows segmented");
    blocks
}
