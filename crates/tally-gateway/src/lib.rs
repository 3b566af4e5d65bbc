// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Tally Gateway - WebSocket front door for the live vote engine.
//!
//! This crate owns everything between the TCP socket and the vote store:
//! connection lifecycle, session authentication, rate limiting, and fan-out
//! of vote broadcasts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       VOTE GATEWAY                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐               │
//! │  │  /ws       │   │  /health   │   │  fallback  │               │
//! │  │  upgrade   │   │   check    │   │    403     │               │
//! │  └─────┬──────┘   └────────────┘   └────────────┘               │
//! │        │                                                         │
//! │  ┌─────┴──────────────────────────────────────┐                  │
//! │  │        WebSocketHandler (per connection)   │                  │
//! │  │   parse frame → session gate → dispatch    │                  │
//! │  └─────┬──────────────┬──────────────┬────────┘                  │
//! │        │              │              │                           │
//! │  ┌─────┴─────┐  ┌─────┴──────┐  ┌────┴────────┐                  │
//! │  │ SessionReg│  │ RateLimiter│  │ BroadcastHub│                  │
//! │  │ auth state│  │ per-user   │  │ fan-out     │                  │
//! │  └─────┬─────┘  │ buckets    │  └─────────────┘                  │
//! │        │        └────────────┘                                   │
//! │  ┌─────┴──────────┐                                              │
//! │  │ Authenticator  │  (Derpibooru credential validation)          │
//! │  └────────────────┘                                              │
//! └────────┬─────────────────────────────────────────────────────────┘
//!          │
//!     VoteStoreApi
//!          │
//!    tally-store (journaled key-value storage)
//! ```
//!
//! # Message Flow
//!
//! - **auth**: credential shape check → upstream validation → session bind.
//!   A bound session re-acknowledges and never rebinds.
//! - **get-scores**: authenticated only; batched lookup, direct reply.
//! - **vote**: authenticated only; token bucket gate → store mutation →
//!   private limit notices → broadcast to every live connection.
//!
//! Plain HTTP requests outside `/ws` and `/health` get a 403.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod auth;
pub mod domain;
pub mod hub;
pub mod session;
pub mod service;
pub mod ws;

// Re-exports for public API
pub use auth::{Authenticator, HttpAuthenticator, MockAuthenticator};
pub use domain::config::GatewayConfig;
pub use domain::error::{AuthError, GatewayError};
pub use hub::BroadcastHub;
pub use session::{ConnectionId, SessionRegistry, SessionState};
pub use service::{GatewayState, VoteGatewayService};
pub use ws::WebSocketHandler;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(GatewayConfig::default().validate().is_ok());
    }
}
