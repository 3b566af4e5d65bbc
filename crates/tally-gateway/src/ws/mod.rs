//! WebSocket connection handling.

pub mod handler;

pub use handler::WebSocketHandler;
