//! Transform implementations for JSON records

mod field_dropper;

pub use field_dropper::FieldDropper;
