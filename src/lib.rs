//! Plumber
//!
//! Composable extract, transform and write pipes over scoped resources.
//!
//! A [`Pipe`] joins one [`Extractor`], one [`Transformer`] chain and one
//! [`Writer`]. Extractors and writers acquire what they need in setup and
//! release it in cleanup; the pipe guarantees both run exactly once around
//! its single run.

pub mod cli;
pub mod etl;
pub mod storage;
pub mod transform;

// Re-exports for convenience
pub use etl::{Cleanable, Extractor, Pipe, Resource, Transformer, Writer};
pub use storage::{CsvExtractor, NdjsonExtractor, NdjsonWriter};
pub use transform::FieldDropper;
