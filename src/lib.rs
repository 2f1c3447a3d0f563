// src/lib.rs

pub mod clean;
pub mod config;
pub mod locate;
pub mod logging;
pub mod narrative;
pub mod pipeline;
pub mod record;
pub mod segment;
pub mod text;

pub use config::ExtractConfig;
pub use pipeline::{
    extract_filing, extract_from_table, extract_many, Diagnostic, Extraction, FilingInput, FilingMeta, Outcome,
};
pub use record::{combine_filings, CombinedRecord, FilingRecord};
