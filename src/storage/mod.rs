//! File system storage operations
//!
//! Concrete extractors and writers backed by files:
//! - Delimited text (CSV/TSV) extraction
//! - NDJSON reading/writing

mod delimited;
mod ndjson;

pub use delimited::{CsvExtractor, CsvRecords};
pub use ndjson::{NdjsonExtractor, NdjsonRecords, NdjsonWriter};
