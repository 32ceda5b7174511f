//! Per-participant interpolation state.

use super::rig::AnchorSet;
use crate::types::{PlayerId, PoseSet, TrackedElement, Zone};

/// Smoothed pose state of one remote participant.
///
/// Both `target` and `displayed` are kept in wire form: the root in world frame,
/// head and hands relative to the root. World poses handed to anchors are rebuilt
/// from the displayed root, so a turning body carries its hands with it.
#[derive(Debug)]
pub struct RemoteParticipant {
    player_id: PlayerId,
    zone: Zone,
    target: PoseSet,
    displayed: PoseSet,
    has_received_data: bool,
    visible: bool,
    anchors: AnchorSet,
}

impl RemoteParticipant {
    pub fn new(player_id: PlayerId, zone: Zone, anchors: AnchorSet) -> Self {
        Self {
            player_id,
            zone,
            target: PoseSet::default(),
            displayed: PoseSet::default(),
            has_received_data: false,
            visible: true,
            anchors,
        }
    }

    /// Replaces the whole target with the packet contents.
    ///
    /// The first packet snaps the displayed pose so the participant does not glide
    /// in from the spawn point.
    pub fn apply_packet(&mut self, poses: PoseSet, zone: Zone) {
        self.target = poses;
        self.zone = zone;
        if !self.has_received_data {
            self.displayed = poses;
            self.has_received_data = true;
        }
    }

    /// Moves the displayed pose toward the target and pushes it to the anchors.
    ///
    /// Does nothing before the first packet or while hidden.
    pub fn interpolate(&mut self, dt: f64, rate: f64) {
        if !self.has_received_data || !self.visible {
            return;
        }
        let t = (rate * dt).clamp(0.0, 1.0);
        for element in TrackedElement::ALL {
            let blended = self.displayed.get(element).blend(self.target.get(element), t);
            *self.displayed.get_mut(element) = blended;
        }
        self.anchors.apply(&self.displayed.to_world());
    }

    /// Toggles the anchors. Returns `true` if visibility changed.
    pub fn set_visible(&mut self, visible: bool) -> bool {
        if self.visible == visible {
            return false;
        }
        self.visible = visible;
        self.anchors.set_active(visible);
        true
    }

    pub fn release(&mut self) -> usize {
        self.anchors.release_all()
    }

    /// Positional and angular gap between displayed and target for one element.
    pub fn distance_to_target(&self, element: TrackedElement) -> (f64, f64) {
        let shown = self.displayed.get(element);
        let target = self.target.get(element);
        (
            shown.position.distance(target.position),
            shown.rotation.angle_to(target.rotation),
        )
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn set_zone(&mut self, zone: Zone) {
        self.zone = zone;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_received_data(&self) -> bool {
        self.has_received_data
    }

    pub fn target(&self) -> &PoseSet {
        &self.target
    }

    /// Displayed poses in world frame.
    pub fn world_pose(&self) -> PoseSet {
        self.displayed.to_world()
    }
}
