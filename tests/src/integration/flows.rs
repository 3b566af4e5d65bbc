//! # Integration Test Flows
//!
//! Tests that tally-gateway, tally-store, and tally-limiter work together
//! correctly across the full message pipeline.
//!
//! ## Flows Tested:
//!
//! 1. **Auth → Session → Vote → Broadcast**: the full happy path
//! 2. **Two-user vote history**: cast, retract, and opposing votes on one post
//! 3. **Rate limiting**: budget exhaustion, denial, and refill on a mock clock
//! 4. **Fan-out lifecycle**: connections joining, leaving, and dying mid-flow
//! 5. **Durability**: scores surviving a store reopen from the journal
//!
//! Everything runs against the real service stack; only the clock, the
//! credential validator, and the socket are stand-ins.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tally_gateway::{GatewayState, MockAuthenticator, WebSocketHandler};
    use tally_limiter::{MockTimeSource, RateLimitConfig, RateLimiter};
    use tally_store::{FileBackedKVStore, InMemoryKVStore, KeyValueStore, VoteStoreService};
    use tally_types::{
        AuthAck, AuthenticatedUser, ClientMessage, EntityKind, EntitySelection, ScoreSet,
        ServerMessage, UserId, VoteAction, VoteRequest,
    };
    use tokio::sync::mpsc;

    const ALICE: UserId = UserId(7);
    const BOB: UserId = UserId(211);
    const ALICE_KEY: &str = "AliceApiKey01";
    const BOB_KEY: &str = "BobApiKey02";

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Wire the full stack over the given key-value store.
    fn make_state<KV>(kv: Arc<KV>, threshold: u32, ttl_secs: u64) -> (Arc<GatewayState>, Arc<MockTimeSource>)
    where
        KV: KeyValueStore + 'static,
    {
        let clock = Arc::new(MockTimeSource::new(5_000_000));
        let limiter = RateLimiter::new(RateLimitConfig { threshold, ttl_secs }, clock.clone());
        let store = Arc::new(VoteStoreService::new(kv));
        let auth = Arc::new(
            MockAuthenticator::new()
                .with_user(ALICE_KEY, AuthenticatedUser::with_name(ALICE, "Alice"))
                .with_user(BOB_KEY, AuthenticatedUser::with_name(BOB, "Bob")),
        );
        let state = Arc::new(GatewayState::new(store, limiter, auth, "0.0.0-test"));
        (state, clock)
    }

    fn make_memory_state(threshold: u32, ttl_secs: u64) -> (Arc<GatewayState>, Arc<MockTimeSource>) {
        make_state(Arc::new(InMemoryKVStore::new()), threshold, ttl_secs)
    }

    /// One connected client: a handler plus the receiving end of its
    /// outbound queue, standing in for the socket.
    struct TestClient {
        handler: WebSocketHandler,
        rx: mpsc::UnboundedReceiver<ServerMessage>,
    }

    impl TestClient {
        fn connect(state: &Arc<GatewayState>) -> Self {
            let handler = WebSocketHandler::new(Arc::clone(state));
            let rx = handler.open();
            Self { handler, rx }
        }

        async fn send(&self, message: ClientMessage) {
            self.handler.handle_message(message).await;
        }

        async fn vote(&self, kind: EntityKind, id: u64, direction: VoteAction) {
            self.send(ClientMessage::Vote(VoteRequest { kind, id, direction }))
                .await;
        }

        async fn login(&mut self, credential: &str) -> AuthAck {
            self.send(ClientMessage::Auth {
                credential: credential.to_string(),
            })
            .await;
            match self.recv().await {
                ServerMessage::Auth(ack) => ack,
                other => panic!("expected auth ack, got {other:?}"),
            }
        }

        async fn fetch_scores(&mut self, posts: &[u64], comments: &[u64]) -> ScoreSet {
            self.send(ClientMessage::GetScores {
                entities: EntitySelection {
                    post: posts.to_vec(),
                    comment: comments.to_vec(),
                },
            })
            .await;
            match self.recv().await {
                ServerMessage::Scores(set) => set,
                other => panic!("expected scores, got {other:?}"),
            }
        }

        async fn recv(&mut self) -> ServerMessage {
            self.rx.recv().await.expect("connection channel closed")
        }

        fn try_recv(&mut self) -> Option<ServerMessage> {
            self.rx.try_recv().ok()
        }

        fn disconnect(&self) {
            self.handler.close();
        }
    }

    fn expect_vote_cast(message: ServerMessage, key: &str, score: i64) {
        match message {
            ServerMessage::VoteCast(broadcast) => {
                assert_eq!(broadcast.scores.get(key), Some(&score), "score for {key}");
            }
            other => panic!("expected vote-cast for {key}, got {other:?}"),
        }
    }

    // =============================================================================
    // FLOW 1: AUTH → SESSION → VOTE → BROADCAST
    // =============================================================================

    #[tokio::test]
    async fn test_full_flow_auth_vote_broadcast() {
        let (state, _) = make_memory_state(10, 50);
        let mut alice = TestClient::connect(&state);
        let mut bob = TestClient::connect(&state);

        // Authenticate both ends.
        let ack = alice.login(ALICE_KEY).await;
        assert!(ack.status);
        assert_eq!(ack.user.as_ref().map(|u| u.id), Some(ALICE));
        assert_eq!(ack.version.as_deref(), Some("0.0.0-test"));

        let ack = bob.login(BOB_KEY).await;
        assert!(ack.status);

        // Alice votes; the broadcast reaches both connections.
        alice.vote(EntityKind::Post, 42, VoteAction::Up).await;
        expect_vote_cast(alice.recv().await, "post_42", 1);
        expect_vote_cast(bob.recv().await, "post_42", 1);

        // The store agrees with the broadcast.
        let set = bob.fetch_scores(&[42], &[]).await;
        assert_eq!(set.scores.get("post_42"), Some(&1));
        assert!(set.user_votes.is_empty(), "Bob has not voted");
    }

    #[tokio::test]
    async fn test_bad_credential_leaves_connection_usable_but_mute() {
        let (state, _) = make_memory_state(10, 50);
        let mut client = TestClient::connect(&state);

        let ack = client.login("TotallyWrongKey").await;
        assert_eq!(ack, AuthAck::failure());

        // Votes from the unauthenticated session go nowhere.
        client.vote(EntityKind::Post, 1, VoteAction::Up).await;
        assert!(client.try_recv().is_none());

        // A later auth with a good key still works on the same connection.
        let ack = client.login(ALICE_KEY).await;
        assert!(ack.status);
        client.vote(EntityKind::Post, 1, VoteAction::Up).await;
        expect_vote_cast(client.recv().await, "post_1", 1);
    }

    // =============================================================================
    // FLOW 2: TWO-USER VOTE HISTORY ON ONE POST
    // =============================================================================

    #[tokio::test]
    async fn test_two_users_on_one_post() {
        let (state, _) = make_memory_state(10, 50);
        let mut alice = TestClient::connect(&state);
        let mut bob = TestClient::connect(&state);
        alice.login(ALICE_KEY).await;
        bob.login(BOB_KEY).await;

        // Alice upvotes post 42.
        alice.vote(EntityKind::Post, 42, VoteAction::Up).await;
        expect_vote_cast(alice.recv().await, "post_42", 1);
        expect_vote_cast(bob.recv().await, "post_42", 1);

        // Alice retracts; the score falls back to zero.
        alice.vote(EntityKind::Post, 42, VoteAction::Retract).await;
        expect_vote_cast(alice.recv().await, "post_42", 0);
        expect_vote_cast(bob.recv().await, "post_42", 0);

        // Bob downvotes.
        bob.vote(EntityKind::Post, 42, VoteAction::Down).await;
        expect_vote_cast(alice.recv().await, "post_42", -1);
        expect_vote_cast(bob.recv().await, "post_42", -1);

        // Bob sees his own vote; Alice sees none of hers.
        let set = bob.fetch_scores(&[42], &[]).await;
        assert_eq!(set.scores.get("post_42"), Some(&-1));
        assert_eq!(
            set.user_votes.get("post_42"),
            Some(&tally_types::VoteDirection::Down)
        );

        let set = alice.fetch_scores(&[42], &[]).await;
        assert_eq!(set.scores.get("post_42"), Some(&-1));
        assert!(set.user_votes.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_is_idempotent_over_the_wire() {
        let (state, _) = make_memory_state(10, 50);
        let mut alice = TestClient::connect(&state);
        alice.login(ALICE_KEY).await;

        alice.vote(EntityKind::Comment, 9, VoteAction::Up).await;
        expect_vote_cast(alice.recv().await, "comment_9", 1);

        // Voting the same way again changes nothing but is still announced.
        alice.vote(EntityKind::Comment, 9, VoteAction::Up).await;
        expect_vote_cast(alice.recv().await, "comment_9", 1);

        // Switching direction replaces the vote instead of stacking it.
        alice.vote(EntityKind::Comment, 9, VoteAction::Down).await;
        expect_vote_cast(alice.recv().await, "comment_9", -1);

        let set = alice.fetch_scores(&[], &[9]).await;
        assert_eq!(set.scores.get("comment_9"), Some(&-1));
        assert_eq!(
            set.user_votes.get("comment_9"),
            Some(&tally_types::VoteDirection::Down)
        );
    }

    #[tokio::test]
    async fn test_retract_without_vote_is_silent() {
        let (state, _) = make_memory_state(10, 50);
        let mut alice = TestClient::connect(&state);
        let mut bob = TestClient::connect(&state);
        alice.login(ALICE_KEY).await;
        bob.login(BOB_KEY).await;

        alice.vote(EntityKind::Post, 3, VoteAction::Retract).await;

        // Nobody hears anything about it.
        assert!(alice.try_recv().is_none());
        assert!(bob.try_recv().is_none());

        let set = alice.fetch_scores(&[3], &[]).await;
        assert!(set.is_empty());
    }

    // =============================================================================
    // FLOW 3: RATE LIMITING OVER THE WIRE
    // =============================================================================

    #[tokio::test]
    async fn test_rate_limit_exhaustion_and_refill() {
        let (state, clock) = make_memory_state(3, 30);
        let mut alice = TestClient::connect(&state);
        alice.login(ALICE_KEY).await;

        // Three tokens: the first two votes pass quietly.
        alice.vote(EntityKind::Post, 1, VoteAction::Up).await;
        expect_vote_cast(alice.recv().await, "post_1", 1);
        alice.vote(EntityKind::Post, 2, VoteAction::Up).await;
        expect_vote_cast(alice.recv().await, "post_2", 1);

        // The third spends the last token: private notice first, then the
        // broadcast.
        alice.vote(EntityKind::Post, 3, VoteAction::Up).await;
        match alice.recv().await {
            ServerMessage::VoteLimitReached { allow_voting_in } => {
                // One token regenerates every 10s at 3 per 30s.
                assert_eq!(allow_voting_in, 10);
            }
            other => panic!("expected vote-limit-reached, got {other:?}"),
        }
        expect_vote_cast(alice.recv().await, "post_3", 1);

        // The fourth is denied outright and never reaches the store.
        alice.vote(EntityKind::Post, 4, VoteAction::Up).await;
        assert_eq!(
            alice.recv().await,
            ServerMessage::RateLimit {
                threshold: 3,
                ttl: 30
            }
        );
        let set = alice.fetch_scores(&[4], &[]).await;
        assert!(set.is_empty(), "denied vote must not be stored");

        // Ten mock seconds buy one token back.
        clock.advance_secs(10);
        alice.vote(EntityKind::Post, 4, VoteAction::Up).await;
        match alice.recv().await {
            ServerMessage::VoteLimitReached { .. } => {}
            other => panic!("expected vote-limit-reached, got {other:?}"),
        }
        expect_vote_cast(alice.recv().await, "post_4", 1);
    }

    #[tokio::test]
    async fn test_rate_limits_are_per_user() {
        let (state, _) = make_memory_state(1, 50);
        let mut alice = TestClient::connect(&state);
        let mut bob = TestClient::connect(&state);
        alice.login(ALICE_KEY).await;
        bob.login(BOB_KEY).await;

        // Alice spends her only token.
        alice.vote(EntityKind::Post, 1, VoteAction::Up).await;
        assert!(matches!(
            alice.recv().await,
            ServerMessage::VoteLimitReached { .. }
        ));
        expect_vote_cast(alice.recv().await, "post_1", 1);
        expect_vote_cast(bob.recv().await, "post_1", 1);

        // Bob's budget is untouched.
        bob.vote(EntityKind::Post, 1, VoteAction::Up).await;
        assert!(matches!(
            bob.recv().await,
            ServerMessage::VoteLimitReached { .. }
        ));
        expect_vote_cast(bob.recv().await, "post_1", 2);
        expect_vote_cast(alice.recv().await, "post_1", 2);
    }

    // =============================================================================
    // FLOW 4: FAN-OUT ACROSS CONNECTION LIFECYCLES
    // =============================================================================

    #[tokio::test]
    async fn test_fanout_tracks_connections_joining_and_leaving() {
        let (state, _) = make_memory_state(10, 50);
        let mut alice = TestClient::connect(&state);
        let mut bob = TestClient::connect(&state);
        let mut carol = TestClient::connect(&state);
        alice.login(ALICE_KEY).await;

        // Carol never authenticates; she still hears broadcasts.
        alice.vote(EntityKind::Post, 8, VoteAction::Up).await;
        expect_vote_cast(alice.recv().await, "post_8", 1);
        expect_vote_cast(bob.recv().await, "post_8", 1);
        expect_vote_cast(carol.recv().await, "post_8", 1);

        // Carol leaves; the next broadcast reaches the remaining two.
        carol.disconnect();
        alice.vote(EntityKind::Post, 8, VoteAction::Down).await;
        expect_vote_cast(alice.recv().await, "post_8", -1);
        expect_vote_cast(bob.recv().await, "post_8", -1);
        assert_eq!(state.hub().len(), 2);
        assert_eq!(state.sessions().len(), 2);
    }

    #[tokio::test]
    async fn test_voter_socket_dying_does_not_block_the_flow() {
        let (state, _) = make_memory_state(1, 50);
        let mut alice = TestClient::connect(&state);
        let mut bob = TestClient::connect(&state);
        alice.login(ALICE_KEY).await;

        // Alice's receiving side dies without a clean close. Her vote still
        // lands, and the limiter notice aimed at her is dropped silently.
        drop(alice.rx);
        alice.handler.handle_message(ClientMessage::Vote(VoteRequest {
            kind: EntityKind::Post,
            id: 5,
            direction: VoteAction::Up,
        }))
        .await;

        expect_vote_cast(bob.recv().await, "post_5", 1);
        // The dead channel was pruned from the hub along the way.
        assert_eq!(state.hub().len(), 1);
    }

    // =============================================================================
    // FLOW 5: DURABILITY ACROSS A STORE REOPEN
    // =============================================================================

    #[tokio::test]
    async fn test_scores_survive_journal_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votes.journal");

        // First life: cast a few votes through the full stack.
        {
            let kv = Arc::new(FileBackedKVStore::open(&path).unwrap());
            let (state, _) = make_state(kv, 10, 50);
            let mut alice = TestClient::connect(&state);
            let mut bob = TestClient::connect(&state);
            alice.login(ALICE_KEY).await;
            bob.login(BOB_KEY).await;

            alice.vote(EntityKind::Post, 7, VoteAction::Up).await;
            alice.recv().await;
            bob.recv().await;
            bob.vote(EntityKind::Post, 7, VoteAction::Up).await;
            alice.recv().await;
            bob.recv().await;
            alice.vote(EntityKind::Comment, 7, VoteAction::Down).await;
            alice.recv().await;
            bob.recv().await;
        }

        // Second life: a fresh stack over the same journal.
        let kv = Arc::new(FileBackedKVStore::open(&path).unwrap());
        let (state, _) = make_state(kv, 10, 50);
        let mut alice = TestClient::connect(&state);
        alice.login(ALICE_KEY).await;

        let set = alice.fetch_scores(&[7], &[7]).await;
        assert_eq!(set.scores.get("post_7"), Some(&2));
        assert_eq!(set.scores.get("comment_7"), Some(&-1));
        assert_eq!(
            set.user_votes.get("post_7"),
            Some(&tally_types::VoteDirection::Up)
        );
        assert_eq!(
            set.user_votes.get("comment_7"),
            Some(&tally_types::VoteDirection::Down)
        );
    }

    // =============================================================================
    // WIRE-LEVEL FRAMES
    // =============================================================================

    #[tokio::test]
    async fn test_raw_json_frames_drive_the_whole_pipeline() {
        let (state, _) = make_memory_state(10, 50);
        let mut alice = TestClient::connect(&state);
        let mut bob = TestClient::connect(&state);

        alice
            .handler
            .handle_frame(&format!(
                r#"{{"event":"auth","data":{{"credential":"{ALICE_KEY}"}}}}"#
            ))
            .await;
        match alice.recv().await {
            ServerMessage::Auth(ack) => assert!(ack.status),
            other => panic!("expected auth ack, got {other:?}"),
        }

        alice
            .handler
            .handle_frame(r#"{"event":"vote","data":{"type":"post","id":42,"direction":"up"}}"#)
            .await;

        let frame = serde_json::to_value(bob.recv().await).unwrap();
        assert_eq!(frame["event"], "vote-cast");
        assert_eq!(frame["data"]["scores"]["post_42"], 1);
        assert_eq!(frame["data"]["userVotes"]["post_42"]["userId"], 7);
        assert_eq!(frame["data"]["userVotes"]["post_42"]["direction"], "up");

        // Alice holds her own copy of the broadcast; drain it.
        expect_vote_cast(alice.recv().await, "post_42", 1);

        // An unknown kind fails to parse and changes nothing.
        alice
            .handler
            .handle_frame(r#"{"event":"vote","data":{"type":"article","id":1,"direction":"up"}}"#)
            .await;
        assert!(alice.try_recv().is_none());
        assert!(bob.try_recv().is_none());
    }
}
