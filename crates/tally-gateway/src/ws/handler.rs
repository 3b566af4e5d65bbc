//! Per-connection WebSocket handler.
//!
//! One handler instance lives for the duration of one connection. Incoming
//! frames are parsed and dispatched against the session's authentication
//! state; every outgoing message, direct reply and broadcast alike, is queued
//! on the hub and drained by this connection's send pump, so nothing else
//! ever touches the socket sink.

use crate::service::GatewayState;
use crate::session::ConnectionId;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tally_types::{AuthAck, ClientMessage, EntitySelection, ServerMessage, VoteRequest};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// WebSocket connection handler
pub struct WebSocketHandler {
    state: Arc<GatewayState>,
    connection_id: ConnectionId,
}

impl WebSocketHandler {
    /// Create a new handler with a fresh connection id.
    pub fn new(state: Arc<GatewayState>) -> Self {
        Self {
            state,
            connection_id: ConnectionId::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Register this connection: an unauthenticated session plus a hub
    /// channel. The returned receiver is the connection's outbound queue.
    pub fn open(&self) -> mpsc::UnboundedReceiver<ServerMessage> {
        self.state.sessions.open(self.connection_id);
        self.state.hub.subscribe(self.connection_id)
    }

    /// Remove this connection from the hub and the session registry.
    /// Terminal; the session never comes back under this id.
    pub fn close(&self) {
        self.state.hub.unsubscribe(self.connection_id);
        self.state.sessions.close(self.connection_id);
    }

    /// Drive one WebSocket connection from upgrade to disconnect.
    pub async fn handle(self, socket: WebSocket) {
        info!(connection_id = %self.connection_id, "New WebSocket connection");

        let mut outbound = self.open();
        let (mut sender, mut receiver) = socket.split();

        // Send pump: sole owner of the sink. Ends when the hub entry is
        // dropped and the queue drains.
        let send_task = tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                let frame = match serde_json::to_string(&message) {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!(error = %e, "Failed to encode outbound message");
                        continue;
                    }
                };
                if sender.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
        });

        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => self.handle_frame(&text).await,
                Ok(Message::Binary(_)) => {
                    debug!(connection_id = %self.connection_id, "Ignoring binary frame");
                }
                // Pings are answered by the protocol layer underneath us.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => {
                    debug!(connection_id = %self.connection_id, "Close frame received");
                    break;
                }
                Err(e) => {
                    warn!(connection_id = %self.connection_id, error = %e, "WebSocket error");
                    break;
                }
            }
        }

        self.close();
        let _ = send_task.await;

        info!(connection_id = %self.connection_id, "WebSocket connection closed");
    }

    /// Parse one text frame and dispatch it. Frames that do not parse as a
    /// client message are logged and dropped; the connection stays up.
    pub async fn handle_frame(&self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                debug!(connection_id = %self.connection_id, error = %e, "Ignoring unparseable frame");
            }
        }
    }

    /// Dispatch one parsed client message.
    pub async fn handle_message(&self, message: ClientMessage) {
        match message {
            ClientMessage::Auth { credential } => self.handle_auth(&credential).await,
            ClientMessage::GetScores { entities } => self.handle_get_scores(&entities).await,
            ClientMessage::Vote(request) => self.handle_vote(&request).await,
        }
    }

    async fn handle_auth(&self, credential: &str) {
        // A bound session re-acknowledges its existing identity. It never
        // rebinds, whatever credential arrives.
        if let Some(user) = self.state.sessions.user_of(self.connection_id) {
            debug!(connection_id = %self.connection_id, user = %user.id, "Re-auth on bound session");
            self.reply(ServerMessage::Auth(AuthAck::success(
                user,
                self.state.version.clone(),
            )));
            return;
        }

        match self.state.auth.authenticate(credential).await {
            Ok(user) => match self.state.sessions.authenticate(self.connection_id, user) {
                Some(bound) => {
                    info!(connection_id = %self.connection_id, user = %bound.id, "Session authenticated");
                    self.reply(ServerMessage::Auth(AuthAck::success(
                        bound,
                        self.state.version.clone(),
                    )));
                }
                // The session closed while the validator was answering.
                None => {
                    debug!(connection_id = %self.connection_id, "Auth completed after close");
                }
            },
            Err(e) => {
                debug!(connection_id = %self.connection_id, reason = %e, "Authentication failed");
                self.reply(ServerMessage::Auth(AuthAck::failure()));
            }
        }
    }

    async fn handle_get_scores(&self, entities: &EntitySelection) {
        let Some(user) = self.state.sessions.user_of(self.connection_id) else {
            debug!(connection_id = %self.connection_id, "Ignoring get-scores from unauthenticated session");
            return;
        };

        match self.state.store.get_scores(entities, user.id).await {
            Ok(scores) => self.reply(ServerMessage::Scores(scores)),
            Err(e) => {
                error!(connection_id = %self.connection_id, error = %e, "Score lookup failed");
            }
        }
    }

    async fn handle_vote(&self, request: &VoteRequest) {
        let Some(user) = self.state.sessions.user_of(self.connection_id) else {
            debug!(connection_id = %self.connection_id, "Ignoring vote from unauthenticated session");
            return;
        };

        if !self.state.limiter.try_consume(user.id) {
            let config = self.state.limiter.config();
            self.reply(ServerMessage::RateLimit {
                threshold: config.threshold,
                ttl: config.ttl_secs,
            });
            return;
        }

        let entity = request.entity();
        match self
            .state
            .store
            .cast_vote(user.id, entity, request.direction)
            .await
        {
            Ok(broadcast) => {
                // The voter hears about their spent last token before the
                // broadcast lands, so a client can disable its controls
                // ahead of the score update.
                if !self.state.limiter.has_token(user.id) {
                    self.reply(ServerMessage::VoteLimitReached {
                        allow_voting_in: self.state.limiter.seconds_until_token(user.id),
                    });
                }
                let delivered = self.state.hub.publish(&ServerMessage::VoteCast(broadcast));
                debug!(
                    connection_id = %self.connection_id,
                    user = %user.id,
                    entity = %entity,
                    delivered,
                    "Vote broadcast"
                );
            }
            Err(e) if e.is_no_op() => {
                debug!(connection_id = %self.connection_id, user = %user.id, entity = %entity, "Vote was a no-op: {e}");
            }
            Err(e) => {
                error!(connection_id = %self.connection_id, user = %user.id, entity = %entity, error = %e, "Vote failed");
            }
        }
    }

    /// Queue a direct reply. A `false` from the hub means the connection is
    /// already gone, and its own teardown handles the rest.
    fn reply(&self, message: ServerMessage) {
        let _ = self.state.hub.notify(self.connection_id, message);
    }
}
