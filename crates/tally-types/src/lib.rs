//! # Tally Types Crate
//!
//! Domain entities and wire protocol messages shared by every Tally
//! subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: all cross-subsystem types live here.
//! - **Unrepresentable invalids**: entity kinds and vote directions are
//!   closed enums, so an unsupported kind cannot travel past the wire
//!   boundary.
//! - **Stable wire shapes**: payload maps are ordered so serialized frames
//!   are deterministic.

pub mod entities;
pub mod protocol;

pub use entities::*;
pub use protocol::*;
