//! Change detection for outgoing pose samples.

use crate::config::PoseSyncConfig;
use crate::types::{PoseSet, TrackedElement};

/// Decides whether a sample differs enough from the last transmitted one.
///
/// Comparison happens in wire form (root in world frame, head and hands relative
/// to the root), so turning in place only dirties the root.
#[derive(Debug, Clone)]
pub struct DirtyFilter {
    position_threshold: f64,
    rotation_threshold: f64,
    last_sent: Option<PoseSet>,
}

impl DirtyFilter {
    pub fn new(config: &PoseSyncConfig) -> Self {
        Self {
            position_threshold: config.position_threshold.max(0.0),
            rotation_threshold: config.rotation_threshold_deg.max(0.0).to_radians(),
            last_sent: None,
        }
    }

    /// `true` if nothing was sent yet or any element moved past a threshold.
    pub fn is_dirty(&self, candidate: &PoseSet) -> bool {
        let Some(last) = self.last_sent.as_ref() else {
            return true;
        };
        TrackedElement::ALL.iter().any(|element| {
            let before = last.get(*element);
            let after = candidate.get(*element);
            before.position.distance(after.position) > self.position_threshold
                || before.rotation.angle_to(after.rotation) > self.rotation_threshold
        })
    }

    pub fn commit(&mut self, sent: PoseSet) {
        self.last_sent = Some(sent);
    }

    /// Forgets the last sample so the next one is always sent.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }

    pub fn last_sent(&self) -> Option<&PoseSet> {
        self.last_sent.as_ref()
    }
}
