//! Stand-ins for real tracking hardware and rendering.
//!
//! [`SimulatedHeadset`] walks the local participant around a circle while bobbing
//! the head and swinging the hands, so the client always has motion to stream.
//! [`LoggingRigSpawner`] "renders" remote participants by logging their poses.

use rand::Rng;
use roomlink_core::{AnchorSet, Player, Pose, PoseAnchor, PoseSet, PoseSource, Quat, RigSpawner, TrackedElement, Vec3};
use std::f64::consts::TAU;
use std::time::Instant;
use tracing::{debug, info, trace};

const HEAD_HEIGHT: f64 = 1.65;
const HAND_HEIGHT: f64 = 1.1;
const HAND_SPREAD: f64 = 0.25;

/// Orbiting pose source driven by wall-clock time.
#[derive(Debug, Clone)]
pub struct SimulatedHeadset {
    center: Vec3,
    radius: f64,
    /// Radians per second along the circle
    angular_speed: f64,
    phase: f64,
    started: Instant,
}

impl SimulatedHeadset {
    pub fn new(center: Vec3, radius: f64, angular_speed: f64) -> Self {
        let phase = rand::thread_rng().gen_range(0.0..TAU);
        Self::with_phase(center, radius, angular_speed, phase)
    }

    pub fn with_phase(center: Vec3, radius: f64, angular_speed: f64, phase: f64) -> Self {
        Self {
            center,
            radius,
            angular_speed,
            phase,
            started: Instant::now(),
        }
    }

    /// World-frame poses `t` seconds into the walk.
    pub fn pose_at(&self, t: f64) -> PoseSet {
        let angle = self.phase + self.angular_speed * t;
        let root_position = self.center + Vec3::new(angle.cos(), 0.0, angle.sin()) * self.radius;

        // Face along the direction of travel
        let heading = Quat::from_axis_angle(Vec3::unit_y(), -angle);
        let root = Pose::new(root_position, heading);

        let bob = (t * 4.0).sin() * 0.03;
        let swing = (t * 2.0).sin() * 0.2;
        let local = |offset: Vec3| Pose::compose(&root, &Pose::new(offset, Quat::IDENTITY));

        PoseSet {
            root,
            head: local(Vec3::new(0.0, HEAD_HEIGHT + bob, 0.0)),
            left_hand: local(Vec3::new(-HAND_SPREAD, HAND_HEIGHT, swing)),
            right_hand: local(Vec3::new(HAND_SPREAD, HAND_HEIGHT, -swing)),
        }
    }
}

impl PoseSource for SimulatedHeadset {
    fn sample(&mut self) -> Option<PoseSet> {
        Some(self.pose_at(self.started.elapsed().as_secs_f64()))
    }
}

/// Anchor that traces the displayed pose of one remote element.
pub struct LoggingAnchor {
    owner: String,
    element: TrackedElement,
    visible: bool,
    updates: u64,
}

impl PoseAnchor for LoggingAnchor {
    fn apply(&mut self, pose: &Pose) {
        self.updates += 1;
        // Roots only; hands and head would flood the log
        if self.element == TrackedElement::Root && self.updates % 120 == 0 {
            debug!(
                "🧍 {} at ({:.2}, {:.2}, {:.2})",
                self.owner, pose.position.x, pose.position.y, pose.position.z
            );
        }
        trace!("🎯 {} {:?} -> {:?}", self.owner, self.element, pose.position);
    }

    fn set_active(&mut self, active: bool) {
        if self.visible != active {
            self.visible = active;
            debug!("👁️ {} {:?} visible: {}", self.owner, self.element, active);
        }
    }

    fn release(&mut self) {
        trace!("🧹 Released {:?} anchor of {}", self.element, self.owner);
    }
}

#[derive(Debug, Default)]
pub struct LoggingRigSpawner {
    spawned: u64,
}

impl LoggingRigSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawned(&self) -> u64 {
        self.spawned
    }
}

impl RigSpawner for LoggingRigSpawner {
    fn spawn(&mut self, player: &Player) -> AnchorSet {
        self.spawned += 1;
        info!("🧍 Spawning avatar for {} ({})", player.display_name, player.player_id);
        TrackedElement::ALL
            .iter()
            .fold(AnchorSet::new(), |set, element| {
                set.with(
                    *element,
                    Box::new(LoggingAnchor {
                        owner: player.display_name.clone(),
                        element: *element,
                        visible: true,
                        updates: 0,
                    }),
                )
            })
    }
}
