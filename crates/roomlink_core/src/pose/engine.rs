//! Local sampling and remote reconstruction for all participants of a room.

use super::dirty::DirtyFilter;
use super::remote::RemoteParticipant;
use super::rig::{AnchorSet, PoseSource, RigSpawner};
use crate::config::PoseSyncConfig;
use crate::events::ClientEvent;
use crate::messaging::PosePacket;
use crate::session::Player;
use crate::types::{PlayerId, Zone};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Spawn progress of the local participant's representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalSpawnState {
    #[default]
    NotSpawned,
    InFlight,
    Spawned,
}

/// Drives pose synchronization once per tick.
pub struct PoseSyncEngine {
    config: PoseSyncConfig,
    send_interval: Duration,
    source: Option<Box<dyn PoseSource>>,
    spawner: Option<Box<dyn RigSpawner>>,
    filter: DirtyFilter,
    since_last_sample: Duration,
    remotes: HashMap<PlayerId, RemoteParticipant>,
    local_zone: Zone,
    local_spawn: LocalSpawnState,
    events: Vec<ClientEvent>,
    samples_taken: u64,
    packets_sent: u64,
}

impl PoseSyncEngine {
    pub fn new(config: PoseSyncConfig) -> Self {
        let filter = DirtyFilter::new(&config);
        let send_interval = config.send_interval();
        Self {
            config,
            send_interval,
            source: None,
            spawner: None,
            filter,
            since_last_sample: Duration::ZERO,
            remotes: HashMap::new(),
            local_zone: Zone::default(),
            local_spawn: LocalSpawnState::NotSpawned,
            events: Vec::new(),
            samples_taken: 0,
            packets_sent: 0,
        }
    }

    pub fn set_pose_source(&mut self, source: Box<dyn PoseSource>) {
        self.source = Some(source);
    }

    pub fn clear_pose_source(&mut self) {
        self.source = None;
    }

    /// Installs the spawner used for participants that join afterwards.
    pub fn set_rig_spawner(&mut self, spawner: Box<dyn RigSpawner>) {
        self.spawner = Some(spawner);
    }

    // ------------------------------------------------------------------
    // Local participant
    // ------------------------------------------------------------------

    /// Asks for the local representation to be spawned.
    ///
    /// Both room entry and application start call this; whichever arrives first
    /// wins and every later request is a no-op.
    pub fn request_local_spawn(&mut self) -> bool {
        if self.local_spawn != LocalSpawnState::NotSpawned {
            trace!("🧍 Local spawn already {:?}", self.local_spawn);
            return false;
        }
        self.local_spawn = LocalSpawnState::InFlight;
        true
    }

    /// Finishes an in-flight local spawn. Runs on the tick after the request.
    pub fn complete_local_spawn(&mut self) -> bool {
        if self.local_spawn != LocalSpawnState::InFlight {
            return false;
        }
        self.local_spawn = LocalSpawnState::Spawned;
        info!("🧍 Local participant spawned");
        self.events.push(ClientEvent::LocalParticipantSpawned);
        true
    }

    pub fn local_spawn_state(&self) -> LocalSpawnState {
        self.local_spawn
    }

    /// Samples the local pose source at the configured rate and hands a packet to
    /// `transmit` when it differs enough from the last transmitted sample.
    ///
    /// The sample only becomes the new reference when `transmit` returns `true`, so a
    /// dropped send is retried on the next sampling period. Returns the packet that
    /// went out.
    pub fn sample<F>(&mut self, dt: Duration, local_id: &PlayerId, transmit: F) -> Option<PosePacket>
    where
        F: FnOnce(&PosePacket) -> bool,
    {
        self.since_last_sample += dt;
        if self.since_last_sample < self.send_interval {
            return None;
        }
        // skip missed periods rather than bursting to catch up
        self.since_last_sample = (self.since_last_sample - self.send_interval).min(self.send_interval);

        let world = self.source.as_mut()?.sample()?;
        self.samples_taken += 1;
        if !world.is_finite() {
            warn!("⚠️ Pose source produced non-finite values, skipping sample");
            return None;
        }

        let wire = world.to_root_relative();
        if !self.filter.is_dirty(&wire) {
            return None;
        }
        let packet = PosePacket {
            player_id: local_id.clone(),
            zone: self.local_zone,
            poses: wire,
        };
        if !transmit(&packet) {
            trace!("📤 Pose packet not sent, keeping previous reference");
            return None;
        }
        self.filter.commit(wire);
        self.packets_sent += 1;
        Some(packet)
    }

    /// Forces the next sample out. Called on room entry.
    pub fn reset_filter(&mut self) {
        self.filter.reset();
        self.since_last_sample = self.send_interval;
    }

    // ------------------------------------------------------------------
    // Remote participants
    // ------------------------------------------------------------------

    pub fn spawn_remote(&mut self, player: &Player) -> bool {
        if self.remotes.contains_key(&player.player_id) {
            return false;
        }
        let anchors = match self.spawner.as_mut() {
            Some(spawner) => spawner.spawn(player),
            None => AnchorSet::new(),
        };
        let mut remote = RemoteParticipant::new(player.player_id.clone(), player.zone, anchors);
        remote.set_visible(player.zone == self.local_zone);
        self.remotes.insert(player.player_id.clone(), remote);
        debug!("🧑‍🤝‍🧑 Spawned remote {}", player.player_id);
        self.events
            .push(ClientEvent::RemoteParticipantSpawned(player.player_id.clone()));
        true
    }

    /// Removes a remote participant and releases its anchors.
    pub fn despawn_remote(&mut self, id: &PlayerId) -> bool {
        let Some(mut remote) = self.remotes.remove(id) else {
            return false;
        };
        let released = remote.release();
        debug!("🗑️ Despawned remote {} ({} anchors released)", id, released);
        self.events.push(ClientEvent::RemoteParticipantDespawned(id.clone()));
        true
    }

    pub fn despawn_all(&mut self) {
        let mut ids: Vec<PlayerId> = self.remotes.keys().cloned().collect();
        ids.sort();
        for id in ids {
            self.despawn_remote(&id);
        }
    }

    /// Applies a received packet. Packets for unknown senders are dropped.
    pub fn apply_packet(&mut self, packet: &PosePacket) -> bool {
        let Some(remote) = self.remotes.get_mut(&packet.player_id) else {
            trace!("📭 Pose for unknown participant {}", packet.player_id);
            return false;
        };
        if !packet.poses.is_finite() {
            warn!("⚠️ Dropping non-finite pose from {}", packet.player_id);
            return false;
        }
        remote.apply_packet(packet.poses, packet.zone);
        remote.set_visible(packet.zone == self.local_zone);
        true
    }

    pub fn set_local_zone(&mut self, zone: Zone) {
        self.local_zone = zone;
        for remote in self.remotes.values_mut() {
            let visible = remote.zone() == zone;
            remote.set_visible(visible);
        }
    }

    pub fn set_remote_zone(&mut self, id: &PlayerId, zone: Zone) {
        if let Some(remote) = self.remotes.get_mut(id) {
            remote.set_zone(zone);
            remote.set_visible(zone == self.local_zone);
        }
    }

    /// Advances every visible remote toward its latest target.
    pub fn interpolate(&mut self, dt: Duration) {
        let dt = dt.as_secs_f64();
        let rate = self.config.interpolation_rate;
        for remote in self.remotes.values_mut() {
            remote.interpolate(dt, rate);
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn remote(&self, id: &PlayerId) -> Option<&RemoteParticipant> {
        self.remotes.get(id)
    }

    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    pub fn visible_count(&self) -> usize {
        self.remotes.values().filter(|r| r.is_visible()).count()
    }

    pub fn local_zone(&self) -> Zone {
        self.local_zone
    }

    pub fn samples_taken(&self) -> u64 {
        self.samples_taken
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.events)
    }
}

impl std::fmt::Debug for PoseSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseSyncEngine")
            .field("local_zone", &self.local_zone)
            .field("local_spawn", &self.local_spawn)
            .field("remotes", &self.remotes.len())
            .field("has_source", &self.source.is_some())
            .field("has_spawner", &self.spawner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::rig::testing::RecordingSpawner;
    use crate::types::{PoseSet, Quat, TrackedElement, Vec3};

    fn engine() -> PoseSyncEngine {
        PoseSyncEngine::new(PoseSyncConfig::default())
    }

    fn me() -> PlayerId {
        PlayerId::from("me")
    }

    fn tick() -> Duration {
        PoseSyncConfig::default().send_interval()
    }

    fn sent(_: &PosePacket) -> bool {
        true
    }

    /// Baseline pose with every element placed, so jitter touches all four.
    fn standing() -> PoseSet {
        let mut set = PoseSet::default();
        set.head.position = Vec3::new(0.0, 1.7, 0.0);
        set.left_hand.position = Vec3::new(-0.3, 1.1, 0.2);
        set.right_hand.position = Vec3::new(0.3, 1.1, 0.2);
        set
    }

    fn offset(set: &PoseSet, shift: Vec3, yaw_deg: f64) -> PoseSet {
        let turn = Quat::from_axis_angle(Vec3::unit_y(), yaw_deg.to_radians());
        let mut moved = *set;
        for element in TrackedElement::ALL {
            let pose = moved.get_mut(element);
            pose.position = pose.position + shift;
            pose.rotation = (turn * pose.rotation).normalize();
        }
        moved
    }

    #[test]
    fn test_static_pose_sends_once() {
        let mut engine = engine();
        engine.set_pose_source(Box::new(|| Some(PoseSet::default())));
        engine.reset_filter();

        let packets = (0..101).filter_map(|_| engine.sample(tick(), &me(), sent)).count();
        assert_eq!(packets, 1);
        assert_eq!(engine.samples_taken(), 101);
    }

    #[test]
    fn test_sub_threshold_jitter_sends_nothing_after_baseline() {
        let mut engine = engine();
        let mut step = 0u32;
        engine.set_pose_source(Box::new(move || {
            step += 1;
            // under 1 mm and 0.5 degrees around the baseline, alternating sign
            let sign = if step % 2 == 0 { 1.0 } else { -1.0 };
            let wobble = f64::from(step % 7) / 7.0;
            Some(offset(
                &standing(),
                Vec3::new(0.0009 * sign * wobble, 0.0004 * sign, -0.0009 * wobble),
                0.45 * sign * wobble,
            ))
        }));
        engine.reset_filter();

        assert!(engine.sample(tick(), &me(), sent).is_some());
        let later = (0..100).filter_map(|_| engine.sample(tick(), &me(), sent)).count();
        assert_eq!(later, 0);
        assert_eq!(engine.samples_taken(), 101);
        assert_eq!(engine.packets_sent(), 1);
    }

    #[test]
    fn test_slow_drift_sends_once_past_threshold() {
        let mut engine = engine();
        let mut step = 0u32;
        engine.set_pose_source(Box::new(move || {
            // 3 mm per sample: each step is below the 1 cm threshold on its own
            let drift = f64::from(step) * 0.003;
            step += 1;
            Some(offset(&standing(), Vec3::new(drift, 0.0, 0.0), 0.0))
        }));
        engine.reset_filter();

        let mut sent_at = Vec::new();
        for i in 0..8 {
            if engine.sample(tick(), &me(), sent).is_some() {
                sent_at.push(i);
            }
        }
        // baseline at 0 mm, then the first sample more than 1 cm away (12 mm),
        // after which the remaining 9 mm of drift stays below the threshold
        assert_eq!(sent_at, vec![0, 4]);
        let reference = engine.filter.last_sent().unwrap();
        assert!((reference.root.position.x - 0.012).abs() < 1e-9);
    }

    #[test]
    fn test_failed_send_keeps_previous_reference() {
        let mut engine = engine();
        let mut x = 0.0;
        engine.set_pose_source(Box::new(move || {
            x += 0.5;
            Some(offset(&standing(), Vec3::new(x, 0.0, 0.0), 0.0))
        }));

        assert!(engine.sample(tick(), &me(), |_| false).is_none());
        assert!(engine.filter.last_sent().is_none());
        assert_eq!(engine.packets_sent(), 0);

        let packet = engine.sample(tick(), &me(), sent).unwrap();
        assert!((packet.poses.root.position.x - 1.0).abs() < 1e-9);
        assert_eq!(engine.packets_sent(), 1);
    }

    #[test]
    fn test_sampling_respects_rate() {
        let config = PoseSyncConfig {
            send_rate_hz: 20.0,
            ..PoseSyncConfig::default()
        };
        let mut engine = PoseSyncEngine::new(config);
        let mut x = 0.0;
        engine.set_pose_source(Box::new(move || {
            x += 1.0;
            let mut set = PoseSet::default();
            set.root.position = Vec3::new(x, 0.0, 0.0);
            Some(set)
        }));

        let half = Duration::from_millis(25);
        let packets = (0..20).filter_map(|_| engine.sample(half, &me(), sent)).count();
        assert_eq!(packets, 10);
    }

    #[test]
    fn test_packet_is_root_relative() {
        let mut engine = engine();
        engine.set_pose_source(Box::new(|| {
            let mut set = PoseSet::default();
            set.root.position = Vec3::new(5.0, 0.0, 0.0);
            set.head.position = Vec3::new(5.0, 1.7, 0.0);
            Some(set)
        }));

        let packet = engine.sample(tick(), &me(), sent).unwrap();
        assert_eq!(packet.poses.root.position, Vec3::new(5.0, 0.0, 0.0));
        assert!(packet.poses.head.position.distance(Vec3::new(0.0, 1.7, 0.0)) < 1e-9);
    }

    #[test]
    fn test_reset_filter_resends_unchanged_pose() {
        let mut engine = engine();
        engine.set_pose_source(Box::new(|| Some(PoseSet::default())));

        assert!(engine.sample(tick(), &me(), sent).is_some());
        assert!(engine.sample(tick(), &me(), sent).is_none());
        engine.reset_filter();
        assert!(engine.sample(Duration::ZERO, &me(), sent).is_some());
    }

    #[test]
    fn test_local_spawn_guard() {
        let mut engine = engine();
        assert!(engine.request_local_spawn());
        assert!(!engine.request_local_spawn());
        assert_eq!(engine.local_spawn_state(), LocalSpawnState::InFlight);

        assert!(engine.complete_local_spawn());
        assert!(!engine.complete_local_spawn());
        assert!(!engine.request_local_spawn());
        assert_eq!(engine.drain_events(), vec![ClientEvent::LocalParticipantSpawned]);
    }

    #[test]
    fn test_zone_mismatch_hides_without_removing() {
        let spawner = RecordingSpawner::default();
        let log = spawner.log.clone();
        let mut engine = engine();
        engine.set_rig_spawner(Box::new(spawner));
        engine.spawn_remote(&Player::new("p-2".into(), "Bo", false, Zone::Lobby));

        engine.set_local_zone(Zone::AreaA);
        assert_eq!(engine.remote_count(), 1);
        assert_eq!(engine.visible_count(), 0);
        assert_eq!(log.borrow().active, Some(false));

        engine.set_local_zone(Zone::Lobby);
        assert_eq!(engine.visible_count(), 1);
        assert_eq!(log.borrow().active, Some(true));
    }

    #[test]
    fn test_despawn_releases_all_anchors() {
        let spawner = RecordingSpawner::default();
        let log = spawner.log.clone();
        let mut engine = engine();
        engine.set_rig_spawner(Box::new(spawner));
        let id = PlayerId::from("p-2");
        engine.spawn_remote(&Player::new(id.clone(), "Bo", false, Zone::Lobby));

        assert!(engine.despawn_remote(&id));
        assert!(!engine.despawn_remote(&id));
        assert_eq!(log.borrow().released, TrackedElement::ALL.len());
        assert!(engine.remote(&id).is_none());
    }

    #[test]
    fn test_unknown_sender_packet_is_dropped() {
        let mut engine = engine();
        let packet = PosePacket {
            player_id: PlayerId::from("ghost"),
            zone: Zone::Lobby,
            poses: PoseSet::default(),
        };
        assert!(!engine.apply_packet(&packet));
        assert_eq!(engine.remote_count(), 0);
    }

    #[test]
    fn test_packets_drive_anchors_in_world_frame() {
        let spawner = RecordingSpawner::default();
        let log = spawner.log.clone();
        let mut engine = engine();
        engine.set_rig_spawner(Box::new(spawner));
        let id = PlayerId::from("p-2");
        engine.spawn_remote(&Player::new(id.clone(), "Bo", false, Zone::Lobby));

        let mut poses = PoseSet::default();
        poses.root.position = Vec3::new(1.0, 0.0, 0.0);
        poses.head.position = Vec3::new(0.0, 1.7, 0.0);
        engine.apply_packet(&PosePacket { player_id: id, zone: Zone::Lobby, poses });
        engine.interpolate(Duration::from_millis(16));

        let log = log.borrow();
        let (_, head) = log
            .applied
            .iter()
            .find(|(element, _)| *element == TrackedElement::Head)
            .unwrap();
        assert!(head.position.distance(Vec3::new(1.0, 1.7, 0.0)) < 1e-9);
    }
}
