//! Connection sessions and their authentication state.
//!
//! A session moves through exactly one life: it opens unauthenticated, may
//! bind to a user once, and closing it is terminal. Closed sessions leave the
//! registry entirely, so no operation can resurrect one.

use dashmap::DashMap;
use std::fmt;
use tally_types::AuthenticatedUser;
use tracing::debug;
use uuid::Uuid;

/// Identifier of one live connection, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authentication state of one open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no identity bound. Votes and queries are ignored.
    Unauthenticated,
    /// Bound to a user. The binding never changes for the session's life.
    Authenticated(AuthenticatedUser),
}

/// Registry of open sessions.
pub struct SessionRegistry {
    sessions: DashMap<ConnectionId, SessionState>,
}

impl SessionRegistry {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a freshly opened connection.
    pub fn open(&self, id: ConnectionId) {
        self.sessions.insert(id, SessionState::Unauthenticated);
    }

    /// Bind a session to a user.
    ///
    /// Returns the binding in effect afterwards: the given user on first
    /// authentication, the original user on any later attempt (a session
    /// never rebinds), or `None` when the session is already closed.
    pub fn authenticate(
        &self,
        id: ConnectionId,
        user: AuthenticatedUser,
    ) -> Option<AuthenticatedUser> {
        let mut entry = self.sessions.get_mut(&id)?;
        match entry.value() {
            SessionState::Unauthenticated => {
                *entry.value_mut() = SessionState::Authenticated(user.clone());
                debug!(connection_id = %id, user = %user.id, "session authenticated");
                Some(user)
            }
            SessionState::Authenticated(existing) => Some(existing.clone()),
        }
    }

    /// The user bound to a session, if it is open and authenticated.
    pub fn user_of(&self, id: ConnectionId) -> Option<AuthenticatedUser> {
        match self.sessions.get(&id)?.value() {
            SessionState::Authenticated(user) => Some(user.clone()),
            SessionState::Unauthenticated => None,
        }
    }

    /// Close a session. Terminal: the id is forgotten entirely.
    pub fn close(&self, id: ConnectionId) {
        self.sessions.remove(&id);
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
