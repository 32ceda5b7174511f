//! Seams between the pose engine and the embedding application.
//!
//! The engine never renders anything. It reads local poses from a [`PoseSource`]
//! and writes reconstructed remote poses into [`PoseAnchor`]s created by a
//! [`RigSpawner`].

use crate::session::Player;
use crate::types::{Pose, PoseSet, TrackedElement};
use std::collections::BTreeMap;
use std::fmt;

/// Supplies the current world-frame poses of the local participant.
pub trait PoseSource {
    /// `None` when tracking is unavailable for this frame.
    fn sample(&mut self) -> Option<PoseSet>;
}

impl<F> PoseSource for F
where
    F: FnMut() -> Option<PoseSet>,
{
    fn sample(&mut self) -> Option<PoseSet> {
        self()
    }
}

/// Sink for the displayed pose of one tracked element of a remote participant.
pub trait PoseAnchor {
    /// Receives the world-frame pose to display.
    fn apply(&mut self, pose: &Pose);

    /// Shows or hides the element without discarding it.
    fn set_active(&mut self, active: bool);

    /// Tears the element down. Called exactly once.
    fn release(&mut self);
}

/// Creates the representation of a remote participant.
pub trait RigSpawner {
    fn spawn(&mut self, player: &Player) -> AnchorSet;
}

/// Anchors of one remote participant, keyed by tracked element.
///
/// Every anchor still held when the set is dropped gets released, so a despawned
/// participant can never leak its representation.
#[derive(Default)]
pub struct AnchorSet {
    anchors: BTreeMap<TrackedElement, Box<dyn PoseAnchor>>,
}

impl AnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, element: TrackedElement, anchor: Box<dyn PoseAnchor>) -> Self {
        self.insert(element, anchor);
        self
    }

    /// Adds an anchor, releasing any anchor it replaces.
    pub fn insert(&mut self, element: TrackedElement, anchor: Box<dyn PoseAnchor>) {
        if let Some(mut previous) = self.anchors.insert(element, anchor) {
            previous.release();
        }
    }

    pub fn apply(&mut self, poses: &PoseSet) {
        for (element, anchor) in self.anchors.iter_mut() {
            anchor.apply(poses.get(*element));
        }
    }

    pub fn set_active(&mut self, active: bool) {
        for anchor in self.anchors.values_mut() {
            anchor.set_active(active);
        }
    }

    /// Releases and forgets every anchor. Returns how many were released.
    pub fn release_all(&mut self) -> usize {
        let anchors = std::mem::take(&mut self.anchors);
        let count = anchors.len();
        for (_, mut anchor) in anchors {
            anchor.release();
        }
        count
    }

    pub fn contains(&self, element: TrackedElement) -> bool {
        self.anchors.contains_key(&element)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

impl Drop for AnchorSet {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for AnchorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnchorSet")
            .field("elements", &self.anchors.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording anchors shared by the pose tests.

    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    pub struct AnchorLog {
        pub applied: Vec<(TrackedElement, Pose)>,
        pub active: Option<bool>,
        pub active_changes: usize,
        pub released: usize,
    }

    pub struct RecordingAnchor {
        element: TrackedElement,
        log: Rc<RefCell<AnchorLog>>,
    }

    impl PoseAnchor for RecordingAnchor {
        fn apply(&mut self, pose: &Pose) {
            self.log.borrow_mut().applied.push((self.element, *pose));
        }

        fn set_active(&mut self, active: bool) {
            let mut log = self.log.borrow_mut();
            log.active = Some(active);
            log.active_changes += 1;
        }

        fn release(&mut self) {
            self.log.borrow_mut().released += 1;
        }
    }

    /// Spawner whose anchors all write into one shared log.
    #[derive(Default, Clone)]
    pub struct RecordingSpawner {
        pub log: Rc<RefCell<AnchorLog>>,
        pub spawned: Rc<RefCell<Vec<String>>>,
    }

    impl RigSpawner for RecordingSpawner {
        fn spawn(&mut self, player: &Player) -> AnchorSet {
            self.spawned.borrow_mut().push(player.player_id.to_string());
            TrackedElement::ALL.iter().fold(AnchorSet::new(), |set, element| {
                set.with(
                    *element,
                    Box::new(RecordingAnchor { element: *element, log: self.log.clone() }),
                )
            })
        }
    }
}
