// End-to-end client tests against an in-process server peer
#[cfg(test)]
mod tests {
    use crate::messaging::message_type;
    use crate::messaging::types::{
        PlayerJoinedPayload, RoomListPayload, RoomRefPayload, ServerErrorPayload,
    };
    use crate::messaging::{Envelope, PlayerInfo, PosePacket, RoomSnapshot};
    use crate::pose::rig::testing::RecordingSpawner;
    use crate::transport::welcome_envelope;
    use crate::*;
    use std::time::{Duration, Instant};

    const FRAME: Duration = Duration::from_millis(16);

    fn server_envelope<T: serde::Serialize>(kind: &str, payload: &T) -> Envelope {
        Envelope::wrap(kind, "server", payload).expect("payload should encode")
    }

    fn info(id: &str) -> PlayerInfo {
        PlayerInfo {
            player_id: PlayerId::from(id),
            display_name: format!("name-{id}"),
            is_host: false,
            zone: Zone::Lobby,
        }
    }

    fn test_config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.transport.handshake_timeout = Duration::from_millis(200);
        config.transport.reconnect_delay = Duration::from_millis(50);
        config
    }

    async fn connected_client(id: &str) -> (RoomClient, MemoryPeer) {
        let mut client = create_client_with_config(test_config());
        let (link, peer) = Link::memory();
        peer.push(&welcome_envelope(&PlayerId::from(id)));
        client.connect_link(link).await.expect("handshake should succeed");
        (client, peer)
    }

    fn advertise(peer: &MemoryPeer, code: &str, count: u32) {
        peer.push(&server_envelope(
            message_type::ROOM_LIST,
            &RoomListPayload {
                rooms: vec![RoomDirectoryEntry {
                    room_id: RoomCode::new_unchecked(code),
                    host_id: PlayerId::from("host"),
                    name: "Alpha".to_string(),
                    zone: Zone::Lobby,
                    player_count: count,
                    max_players: 8,
                }],
            },
        ));
    }

    fn confirm_join(peer: &MemoryPeer, code: &str, players: Vec<PlayerInfo>) {
        peer.push(&server_envelope(
            message_type::ROOM_JOINED,
            &RoomSnapshot {
                room_id: RoomCode::new_unchecked(code),
                name: "Alpha".to_string(),
                zone: Zone::Lobby,
                host_id: PlayerId::from("host"),
                max_players: 8,
                players,
            },
        ));
    }

    #[tokio::test]
    async fn test_create_room_sends_exactly_one_request() {
        let (mut client, mut peer) = connected_client("me").await;
        let mut events = client.subscribe();

        let code = client.create_room(Zone::Lobby, "Alpha").unwrap();
        client.tick(FRAME);

        assert_eq!(client.state(), SessionState::Hosting);
        assert!(code.is_well_formed());
        let creates: Vec<_> = peer
            .sent()
            .into_iter()
            .filter(|e| e.message_type == message_type::ROOM_CREATE)
            .collect();
        assert_eq!(creates.len(), 1);
        let body: serde_json::Value = serde_json::from_str(&creates[0].data).unwrap();
        assert_eq!(body["roomId"], code.as_str());
        assert_eq!(body["name"], "Alpha");

        let received = events.drain();
        assert!(received.contains(&ClientEvent::RoomCreated(code)));
        assert!(received.contains(&ClientEvent::LocalParticipantSpawned));
    }

    #[tokio::test]
    async fn test_second_create_fails_and_publishes_error() {
        let (mut client, mut peer) = connected_client("me").await;
        client.create_room(Zone::Lobby, "Alpha").unwrap();
        let mut events = client.subscribe();

        assert_eq!(client.create_room(Zone::AreaA, "Beta"), Err(DomainError::AlreadyInRoom));
        assert_eq!(events.drain(), vec![ClientEvent::RoomError("Already in a room".to_string())]);
        assert_eq!(peer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_join_unknown_code_is_room_not_found() {
        let (mut client, mut peer) = connected_client("me").await;

        assert_eq!(
            client.join_room("ZZZZZZ"),
            Err(DomainError::RoomNotFound("ZZZZZZ".to_string()))
        );
        assert!(peer.sent().is_empty());
        assert_eq!(client.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_join_flow_spawns_existing_participants() {
        let (mut client, mut peer) = connected_client("me").await;
        let spawner = RecordingSpawner::default();
        let spawned = spawner.spawned.clone();
        client.set_rig_spawner(Box::new(spawner));
        let mut events = client.subscribe();

        advertise(&peer, "K7M2QX", 2);
        client.tick(FRAME);
        assert_eq!(client.rooms().len(), 1);

        client.join_room("k7m2qx").unwrap();
        assert_eq!(client.state(), SessionState::Idle);
        confirm_join(&peer, "K7M2QX", vec![info("host"), info("me"), info("p3")]);
        client.tick(FRAME);

        assert_eq!(client.state(), SessionState::Joined);
        assert_eq!(client.players().len(), 3);
        assert_eq!(client.pose().remote_count(), 2);
        let mut names = spawned.borrow().clone();
        names.sort();
        assert_eq!(names, vec!["host".to_string(), "p3".to_string()]);

        let received = events.drain();
        assert!(received.contains(&ClientEvent::RoomJoined(RoomCode::new_unchecked("K7M2QX"))));
        let sent_kinds: Vec<_> = peer.sent().into_iter().map(|e| e.message_type).collect();
        assert!(sent_kinds.contains(&message_type::ROOM_JOIN.to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_player_joined_raises_one_event() {
        let (mut client, peer) = connected_client("me").await;
        client.create_room(Zone::Lobby, "Alpha").unwrap();
        let code = client.current_room_id().cloned().unwrap();
        let mut events = client.subscribe();

        let joined = server_envelope(
            message_type::PLAYER_JOINED,
            &PlayerJoinedPayload { room_id: code, player: info("p2") },
        );
        peer.push(&joined);
        peer.push(&joined);
        client.tick(FRAME);

        let joins = events
            .drain()
            .into_iter()
            .filter(|e| matches!(e, ClientEvent::PlayerJoined(_)))
            .count();
        assert_eq!(joins, 1);
        assert_eq!(client.players().len(), 2);
        assert_eq!(client.pose().remote_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_pose_reaches_anchors() {
        let (mut client, peer) = connected_client("me").await;
        let spawner = RecordingSpawner::default();
        let log = spawner.log.clone();
        client.set_rig_spawner(Box::new(spawner));
        client.create_room(Zone::Lobby, "Alpha").unwrap();
        let code = client.current_room_id().cloned().unwrap();

        peer.push(&server_envelope(
            message_type::PLAYER_JOINED,
            &PlayerJoinedPayload { room_id: code, player: info("p2") },
        ));
        let mut poses = PoseSet::default();
        poses.root.position = Vec3::new(0.0, 0.0, 3.0);
        peer.push(&server_envelope(
            message_type::VR_POSITION,
            &PosePacket { player_id: PlayerId::from("p2"), zone: Zone::Lobby, poses },
        ));
        client.tick(FRAME);

        let remote = client.pose().remote(&PlayerId::from("p2")).unwrap();
        assert!(remote.has_received_data());
        assert!(!log.borrow().applied.is_empty());
    }

    #[tokio::test]
    async fn test_local_pose_streams_once_while_static() {
        let (mut client, mut peer) = connected_client("me").await;
        client.set_pose_source(Box::new(|| Some(PoseSet::default())));

        // outside a room nothing is sampled
        for _ in 0..10 {
            client.tick(Duration::from_millis(40));
        }
        assert!(peer.sent().is_empty());

        client.create_room(Zone::Lobby, "Alpha").unwrap();
        for _ in 0..100 {
            client.tick(Duration::from_millis(40));
        }
        let poses = peer
            .sent()
            .into_iter()
            .filter(|e| e.message_type == message_type::VR_POSITION)
            .count();
        assert_eq!(poses, 1);
    }

    #[tokio::test]
    async fn test_local_pose_jitter_then_drift() {
        let (mut client, mut peer) = connected_client("me").await;
        let mut step = 0u32;
        client.set_pose_source(Box::new(move || {
            step += 1;
            let mut set = PoseSet::default();
            // 60 samples of sub-millimetre noise, then a steady 3 mm per sample walk
            let x = if step <= 60 {
                if step % 2 == 0 { 0.0008 } else { -0.0008 }
            } else {
                f64::from(step - 60) * 0.003
            };
            set.root.position = Vec3::new(x, 0.0, 0.0);
            Some(set)
        }));
        client.create_room(Zone::Lobby, "Alpha").unwrap();

        let pose_count = |peer: &mut MemoryPeer| {
            peer.sent()
                .into_iter()
                .filter(|e| e.message_type == message_type::VR_POSITION)
                .count()
        };

        for _ in 0..60 {
            client.tick(Duration::from_millis(40));
        }
        assert_eq!(pose_count(&mut peer), 1);

        // 3, 6 and 9 mm of drift stay under the threshold, 12 mm does not
        for _ in 0..3 {
            client.tick(Duration::from_millis(40));
        }
        assert_eq!(pose_count(&mut peer), 0);
        client.tick(Duration::from_millis(40));
        assert_eq!(pose_count(&mut peer), 1);
    }

    #[tokio::test]
    async fn test_room_closed_returns_member_to_idle() {
        let (mut client, peer) = connected_client("me").await;
        let mut events = client.subscribe();
        advertise(&peer, "K7M2QX", 1);
        client.tick(FRAME);
        client.join_room("K7M2QX").unwrap();
        confirm_join(&peer, "K7M2QX", vec![info("host"), info("me")]);
        client.tick(FRAME);
        events.drain();

        peer.push(&server_envelope(
            message_type::ROOM_CLOSED,
            &RoomRefPayload { room_id: RoomCode::new_unchecked("K7M2QX"), reason: None },
        ));
        client.tick(FRAME);

        assert_eq!(client.state(), SessionState::Idle);
        assert_eq!(client.pose().remote_count(), 0);
        let received = events.drain();
        assert!(received.contains(&ClientEvent::RoomError("host closed room".to_string())));
        assert!(received.contains(&ClientEvent::RoomLeft));
    }

    #[tokio::test]
    async fn test_server_error_is_published() {
        let (mut client, peer) = connected_client("me").await;
        let mut events = client.subscribe();

        peer.push(&server_envelope(
            message_type::ERROR,
            &ServerErrorPayload {
                code: None,
                message: "maintenance".to_string(),
                room_id: None,
            },
        ));
        client.tick(FRAME);

        assert_eq!(
            events.drain(),
            vec![ClientEvent::RoomError("Server error: maintenance".to_string())]
        );
    }

    #[tokio::test]
    async fn test_disconnect_clears_identity_and_session() {
        let (mut client, mut peer) = connected_client("me").await;
        client.create_room(Zone::Lobby, "Alpha").unwrap();
        peer.sent();
        let mut events = client.subscribe();

        client.disconnect().await;

        assert!(client.local_id().is_none());
        assert_eq!(client.state(), SessionState::Idle);
        assert!(events.drain().contains(&ClientEvent::Disconnected));
        assert_eq!(client.request_room_list(), Err(DomainError::NotConnected));
        assert!(!client.transport().send(&messaging::Outbound::RoomListRequest));
        assert!(!client.transport().reconnect_timer().is_armed());
    }

    #[tokio::test]
    async fn test_server_close_schedules_reconnect() {
        let (mut client, peer) = connected_client("me").await;
        client.create_room(Zone::Lobby, "Alpha").unwrap();
        let mut events = client.subscribe();

        peer.close(Some("restart"));
        client.tick(FRAME);

        let received = events.drain();
        assert!(received.contains(&ClientEvent::Disconnected));
        assert!(received.contains(&ClientEvent::RoomLeft));
        assert!(client.local_id().is_none());
        assert!(client
            .transport()
            .reconnect_due(Instant::now() + Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_shutdown_leaves_and_drops_subscribers() {
        let (mut client, mut peer) = connected_client("me").await;
        client.create_room(Zone::Lobby, "Alpha").unwrap();
        let mut events = client.subscribe();

        client.shutdown().await;

        let kinds: Vec<_> = peer.sent().into_iter().map(|e| e.message_type).collect();
        assert!(kinds.contains(&message_type::ROOM_LEAVE.to_string()));
        let received = events.drain();
        assert!(received.contains(&ClientEvent::RoomLeft));
        assert!(events.next().await.is_none());
    }
}
