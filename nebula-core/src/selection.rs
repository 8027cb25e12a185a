//! Selected path cursors and the structural events that move them
//!
//! The store publishes a [`StoreEvent`] for every structural change and the
//! [`Selection`] is its only subscriber, so delete/move/demote never touch the
//! cursors directly.

use uuid::Uuid;

/// A structural change to the hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    SystemDeleted {
        system_id: Uuid,
    },
    SubsystemDeleted {
        system_id: Uuid,
        subsystem_id: Uuid,
    },
    FeatureDeleted {
        system_id: Uuid,
        subsystem_id: Uuid,
        feature_id: Uuid,
    },
    SubsystemMoved {
        subsystem_id: Uuid,
        to_system: Uuid,
    },
    FeatureMoved {
        feature_id: Uuid,
        to_system: Uuid,
        to_subsystem: Uuid,
    },
    SystemDemoted {
        source: Uuid,
        target: Uuid,
        new_subsystem: Uuid,
    },
    /// Collections were replaced wholesale (import)
    Replaced,
}

/// The three externally visible cursors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub system: Option<Uuid>,
    pub subsystem: Option<Uuid>,
    pub feature: Option<Uuid>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.system.is_none() && self.subsystem.is_none() && self.feature.is_none()
    }

    pub fn clear(&mut self) {
        *self = Selection::default();
    }

    /// Invalidate or redirect the cursors after a structural change
    pub fn apply(&mut self, event: &StoreEvent) {
        match *event {
            StoreEvent::SystemDeleted { system_id } => {
                if self.system == Some(system_id) {
                    self.clear();
                }
            }
            StoreEvent::SubsystemDeleted { subsystem_id, .. } => {
                if self.subsystem == Some(subsystem_id) {
                    self.subsystem = None;
                    self.feature = None;
                }
            }
            StoreEvent::FeatureDeleted { feature_id, .. } => {
                if self.feature == Some(feature_id) {
                    self.feature = None;
                }
            }
            StoreEvent::SubsystemMoved {
                subsystem_id,
                to_system,
            } => {
                if self.subsystem == Some(subsystem_id) {
                    self.system = Some(to_system);
                }
            }
            StoreEvent::FeatureMoved {
                feature_id,
                to_system,
                to_subsystem,
            } => {
                if self.feature == Some(feature_id) {
                    self.system = Some(to_system);
                    self.subsystem = Some(to_subsystem);
                }
            }
            StoreEvent::SystemDemoted {
                source,
                target,
                new_subsystem,
            } => {
                if self.system == Some(source) {
                    self.system = Some(target);
                    self.subsystem = Some(new_subsystem);
                    self.feature = None;
                }
            }
            StoreEvent::Replaced => self.clear(),
        }
    }
}
