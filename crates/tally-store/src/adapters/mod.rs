//! Storage adapters implementing the outbound port.

pub mod file;
pub mod memory;
