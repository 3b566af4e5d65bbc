//! Ports: the inbound API this crate offers and the outbound storage
//! interface it requires.

pub mod inbound;
pub mod outbound;
