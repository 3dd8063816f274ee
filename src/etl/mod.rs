//! Core ETL (Extract, Transform, Load) abstractions
//!
//! This module provides the three pipe roles and the algebra that combines
//! them: extractors pair up with [`zip_with_fill`] and [`product`],
//! transformers chain with [`Transformer::chain`], and plain functions or
//! iterables are lifted into roles with [`extractor`], [`transformer`] and
//! [`writer`]. Extractors and writers are [`Cleanable`] resources whose setup
//! and cleanup are paired by a [`Scope`] guard.

mod error;
mod extract;
mod load;
mod pipeline;
mod scope;
mod transform;

pub use error::LifecycleError;
pub use extract::{
    Extractor, FnExtractor, IterExtractor, Lifted, Product, ProductRecords, Zip, ZipRecords,
    extractor, extractor_fn, product, zip_with_fill,
};
pub use load::{
    Fanout, FnWriter, IntoExtractor, TryFnWriter, VecWriter, Writer, try_writer, writer,
};
pub use pipeline::{BothPresent, Pipe, PipeState, Sequence};
pub use scope::{Cleanable, Handle, Lifecycle, Resource, Scope};
pub use transform::{
    Bound, Chain, Flow, FlowRecords, FnTransformer, Identity, Transformer, TryFnTransformer,
    transformer, try_transformer,
};
