//! Domain layer: record shapes, the key schema, and error types.

pub mod errors;
pub mod keys;
pub mod records;
