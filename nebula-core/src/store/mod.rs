//! In-memory hierarchy store
//!
//! Owns the System → Subsystem → Feature forest, the flat requirement
//! collection denormalized against it, and the work session log. Every
//! structural mutation updates the forest and the requirement ancestry in the
//! same call, and either completes fully or returns an error with nothing
//! changed.

mod reparent;
mod requirements;

use log::debug;
use std::cmp::Ordering;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Feature, FolderCategory, Requirement, Snapshot, Subsystem, System, SystemFolder, WorkSession,
};
use crate::palette::allocate_color;
use crate::selection::{Selection, StoreEvent};

/// Errors returned by store operations. State is unchanged whenever one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("System not found: {0}")]
    SystemNotFound(Uuid),

    #[error("Subsystem not found: {0}")]
    SubsystemNotFound(Uuid),

    #[error("Feature not found: {0}")]
    FeatureNotFound(Uuid),

    #[error("Folder not found: {0}")]
    FolderNotFound(Uuid),

    #[error("Requirement not found: {0}")]
    RequirementNotFound(Uuid),

    #[error("Work session not found: {0}")]
    WorkSessionNotFound(Uuid),

    #[error("Cannot demote system {0} into itself")]
    DemoteIntoSelf(Uuid),
}

/// Reference to a structural node, for operations that apply to every level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    System(Uuid),
    Subsystem(Uuid),
    Feature(Uuid),
}

/// What a cascading delete took with it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub subsystems: usize,
    pub features: usize,
    pub requirements: usize,
    pub work_sessions: usize,
}

/// Mutable view of the text fields every structural level shares
struct NodeText<'a> {
    name: &'a mut String,
    description: &'a mut String,
    readme: &'a mut Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectStore {
    systems: Vec<System>,
    requirements: Vec<Requirement>,
    work_sessions: Vec<WorkSession>,
    selection: Selection,
}

impl ProjectStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from persisted collections. No referential checks are made.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            systems: snapshot.systems,
            requirements: snapshot.requirements,
            work_sessions: snapshot.work_sessions,
            selection: Selection::default(),
        }
    }

    /// A store holding one example System/Subsystem/Feature, with the system selected
    pub fn seeded() -> Self {
        let mut system = System::new(
            "E-Commerce Platform".to_string(),
            "Main customer facing retail platform".to_string(),
        );
        system.readme = Some(
            "# E-Commerce Platform Architecture\nThis system handles all customer-facing interactions.\n\n## Tech Stack\n- Angular 18\n- Node.js API\n- PostgreSQL"
                .to_string(),
        );

        let mut subsystem = Subsystem::new(
            system.id,
            "Checkout".to_string(),
            "Payment and Order processing".to_string(),
            allocate_color(std::iter::empty()),
        );
        subsystem.readme = Some(
            "## Checkout Flow\n1. Cart validation\n2. User auth check\n3. Shipping address\n4. Payment processing"
                .to_string(),
        );

        let mut feature = Feature::new(
            subsystem.id,
            "Payment Gateway".to_string(),
            "Stripe and PayPal integration".to_string(),
        );
        feature.readme = Some("Integration requirements for Stripe v3 API.".to_string());

        subsystem.features.push(feature);
        system.subsystems.push(subsystem);

        let mut store = Self::new();
        store.selection.system = Some(system.id);
        store.systems.push(system);
        store
    }

    /// Copies the persisted collections out of the store
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            systems: self.systems.clone(),
            requirements: self.requirements.clone(),
            work_sessions: self.work_sessions.clone(),
        }
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn systems(&self) -> &[System] {
        &self.systems
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn work_sessions(&self) -> &[WorkSession] {
        &self.work_sessions
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn system(&self, id: &Uuid) -> Option<&System> {
        self.systems.iter().find(|s| s.id == *id)
    }

    /// Finds a subsystem anywhere in the forest
    pub fn subsystem(&self, id: &Uuid) -> Option<&Subsystem> {
        self.locate_subsystem(id)
            .map(|(si, bi)| &self.systems[si].subsystems[bi])
    }

    /// Finds a feature anywhere in the forest
    pub fn feature(&self, id: &Uuid) -> Option<&Feature> {
        self.locate_feature(id)
            .map(|(si, bi, fi)| &self.systems[si].subsystems[bi].features[fi])
    }

    /// Current `(system_id, subsystem_id)` of a feature, read from the tree
    pub fn feature_ancestry(&self, feature_id: &Uuid) -> Option<(Uuid, Uuid)> {
        self.locate_feature(feature_id).map(|(si, bi, _)| {
            let subsystem = &self.systems[si].subsystems[bi];
            (self.systems[si].id, subsystem.id)
        })
    }

    /// Display name of any structural node or requirement
    pub fn node_name(&self, node: NodeRef) -> Option<&str> {
        match node {
            NodeRef::System(id) => self.system(&id).map(|s| s.name.as_str()),
            NodeRef::Subsystem(id) => self.subsystem(&id).map(|s| s.name.as_str()),
            NodeRef::Feature(id) => self.feature(&id).map(|f| f.name.as_str()),
        }
    }

    /// Name-sorted copy of the forest for display; the stored order is untouched
    pub fn sorted_systems(&self) -> Vec<System> {
        let by_name = |a: &str, b: &str| -> Ordering {
            a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
        };

        let mut systems = self.systems.clone();
        for system in &mut systems {
            for subsystem in &mut system.subsystems {
                subsystem.features.sort_by(|a, b| by_name(&a.name, &b.name));
            }
            system.subsystems.sort_by(|a, b| by_name(&a.name, &b.name));
        }
        systems.sort_by(|a, b| by_name(&a.name, &b.name));
        systems
    }

    /// Requirements whose ancestry does not match the tree.
    /// Always empty unless inconsistent data was imported.
    pub fn inconsistent_requirements(&self) -> Vec<&Requirement> {
        self.requirements
            .iter()
            .filter(|r| !self.ancestry_matches(r))
            .collect()
    }

    fn ancestry_matches(&self, req: &Requirement) -> bool {
        match (req.subsystem_id, req.feature_id) {
            (_, Some(feature_id)) => match self.feature_ancestry(&feature_id) {
                Some((system_id, subsystem_id)) => {
                    req.system_id == system_id && req.subsystem_id == Some(subsystem_id)
                }
                None => false,
            },
            (Some(subsystem_id), None) => self
                .locate_subsystem(&subsystem_id)
                .is_some_and(|(si, _)| self.systems[si].id == req.system_id),
            (None, None) => self.system(&req.system_id).is_some(),
        }
    }

    // =========================================================================
    // Index helpers
    // =========================================================================

    fn system_index(&self, id: &Uuid) -> Result<usize, StoreError> {
        self.systems
            .iter()
            .position(|s| s.id == *id)
            .ok_or(StoreError::SystemNotFound(*id))
    }

    /// Position of a subsystem directly under the system at `si`
    fn subsystem_index(&self, si: usize, id: &Uuid) -> Result<usize, StoreError> {
        self.systems[si]
            .subsystems
            .iter()
            .position(|s| s.id == *id)
            .ok_or(StoreError::SubsystemNotFound(*id))
    }

    fn locate_subsystem(&self, id: &Uuid) -> Option<(usize, usize)> {
        self.systems.iter().enumerate().find_map(|(si, system)| {
            system
                .subsystems
                .iter()
                .position(|s| s.id == *id)
                .map(|bi| (si, bi))
        })
    }

    fn locate_feature(&self, id: &Uuid) -> Option<(usize, usize, usize)> {
        self.systems.iter().enumerate().find_map(|(si, system)| {
            system
                .subsystems
                .iter()
                .enumerate()
                .find_map(|(bi, subsystem)| {
                    subsystem
                        .features
                        .iter()
                        .position(|f| f.id == *id)
                        .map(|fi| (si, bi, fi))
                })
        })
    }

    fn node_text(&mut self, node: NodeRef) -> Result<NodeText<'_>, StoreError> {
        match node {
            NodeRef::System(id) => {
                let si = self.system_index(&id)?;
                let s = &mut self.systems[si];
                Ok(NodeText {
                    name: &mut s.name,
                    description: &mut s.description,
                    readme: &mut s.readme,
                })
            }
            NodeRef::Subsystem(id) => {
                let (si, bi) = self
                    .locate_subsystem(&id)
                    .ok_or(StoreError::SubsystemNotFound(id))?;
                let s = &mut self.systems[si].subsystems[bi];
                Ok(NodeText {
                    name: &mut s.name,
                    description: &mut s.description,
                    readme: &mut s.readme,
                })
            }
            NodeRef::Feature(id) => {
                let (si, bi, fi) = self
                    .locate_feature(&id)
                    .ok_or(StoreError::FeatureNotFound(id))?;
                let f = &mut self.systems[si].subsystems[bi].features[fi];
                Ok(NodeText {
                    name: &mut f.name,
                    description: &mut f.description,
                    readme: &mut f.readme,
                })
            }
        }
    }

    fn publish(&mut self, event: StoreEvent) {
        debug!("store event: {:?}", event);
        self.selection.apply(&event);
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Inserts a new, empty system. Any name is accepted.
    pub fn create_system(&mut self, name: impl Into<String>, description: impl Into<String>) -> Uuid {
        let system = System::new(name.into(), description.into());
        let id = system.id;
        debug!("created system {} ({})", system.name, id);
        self.systems.push(system);
        id
    }

    /// Appends a subsystem with the first free palette color
    pub fn create_subsystem(
        &mut self,
        system_id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Uuid, StoreError> {
        let si = self.system_index(&system_id)?;
        let system = &mut self.systems[si];
        let color = allocate_color(system.used_colors());
        let subsystem = Subsystem::new(system_id, name.into(), description.into(), color);
        let id = subsystem.id;
        debug!(
            "created subsystem {} ({}) in {} with color {}",
            subsystem.name, id, system_id, subsystem.color
        );
        system.subsystems.push(subsystem);
        Ok(id)
    }

    pub fn create_feature(
        &mut self,
        system_id: Uuid,
        subsystem_id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Uuid, StoreError> {
        let si = self.system_index(&system_id)?;
        let bi = self.subsystem_index(si, &subsystem_id)?;
        let feature = Feature::new(subsystem_id, name.into(), description.into());
        let id = feature.id;
        debug!("created feature {} ({}) in {}", feature.name, id, subsystem_id);
        self.systems[si].subsystems[bi].features.push(feature);
        Ok(id)
    }

    // =========================================================================
    // In-place edits (no cascading effects)
    // =========================================================================

    /// Replaces a node's name. Work session `parent_name` labels are left as they were.
    pub fn rename(&mut self, node: NodeRef, name: impl Into<String>) -> Result<(), StoreError> {
        *self.node_text(node)?.name = name.into();
        Ok(())
    }

    pub fn rename_system(&mut self, id: Uuid, name: impl Into<String>) -> Result<(), StoreError> {
        self.rename(NodeRef::System(id), name)
    }

    pub fn rename_subsystem(&mut self, id: Uuid, name: impl Into<String>) -> Result<(), StoreError> {
        self.rename(NodeRef::Subsystem(id), name)
    }

    pub fn rename_feature(&mut self, id: Uuid, name: impl Into<String>) -> Result<(), StoreError> {
        self.rename(NodeRef::Feature(id), name)
    }

    pub fn set_description(
        &mut self,
        node: NodeRef,
        description: impl Into<String>,
    ) -> Result<(), StoreError> {
        *self.node_text(node)?.description = description.into();
        Ok(())
    }

    /// Sets or clears the long-form documentation of a node
    pub fn set_readme(&mut self, node: NodeRef, readme: Option<String>) -> Result<(), StoreError> {
        *self.node_text(node)?.readme = readme.filter(|r| !r.trim().is_empty());
        Ok(())
    }

    // =========================================================================
    // Folders (annotation only)
    // =========================================================================

    pub fn add_system_folder(
        &mut self,
        system_id: Uuid,
        name: impl Into<String>,
        category: FolderCategory,
        note: impl Into<String>,
    ) -> Result<Uuid, StoreError> {
        let si = self.system_index(&system_id)?;
        let folder = SystemFolder::new(name.into(), category, note.into());
        let id = folder.id;
        self.systems[si].folders.push(folder);
        Ok(id)
    }

    pub fn delete_system_folder(&mut self, system_id: Uuid, folder_id: Uuid) -> Result<(), StoreError> {
        let si = self.system_index(&system_id)?;
        let folders = &mut self.systems[si].folders;
        let pos = folders
            .iter()
            .position(|f| f.id == folder_id)
            .ok_or(StoreError::FolderNotFound(folder_id))?;
        folders.remove(pos);
        Ok(())
    }

    // =========================================================================
    // Cascading deletes
    // =========================================================================

    /// Removes a system, everything under it, its requirements and every work
    /// session anchored to any removed node
    pub fn delete_system(&mut self, id: Uuid) -> Result<CascadeSummary, StoreError> {
        let si = self.system_index(&id)?;
        let system = self.systems.remove(si);

        let mut gone: HashSet<Uuid> = HashSet::from([id]);
        let mut summary = CascadeSummary::default();
        for subsystem in &system.subsystems {
            gone.insert(subsystem.id);
            summary.subsystems += 1;
            for feature in &subsystem.features {
                gone.insert(feature.id);
                summary.features += 1;
            }
        }

        self.cascade(&mut gone, &mut summary, |r| r.system_id == id);
        debug!("deleted system {} ({:?})", id, summary);
        self.publish(StoreEvent::SystemDeleted { system_id: id });
        Ok(summary)
    }

    pub fn delete_subsystem(
        &mut self,
        system_id: Uuid,
        subsystem_id: Uuid,
    ) -> Result<CascadeSummary, StoreError> {
        let si = self.system_index(&system_id)?;
        let bi = self.subsystem_index(si, &subsystem_id)?;
        let subsystem = self.systems[si].subsystems.remove(bi);

        let mut gone: HashSet<Uuid> = HashSet::from([subsystem_id]);
        let mut summary = CascadeSummary {
            subsystems: 1,
            ..Default::default()
        };
        for feature in &subsystem.features {
            gone.insert(feature.id);
            summary.features += 1;
        }

        let features: HashSet<Uuid> = subsystem.features.iter().map(|f| f.id).collect();
        self.cascade(&mut gone, &mut summary, |r| {
            r.subsystem_id == Some(subsystem_id)
                || r.feature_id.is_some_and(|f| features.contains(&f))
        });
        debug!("deleted subsystem {} ({:?})", subsystem_id, summary);
        self.publish(StoreEvent::SubsystemDeleted {
            system_id,
            subsystem_id,
        });
        Ok(summary)
    }

    pub fn delete_feature(
        &mut self,
        system_id: Uuid,
        subsystem_id: Uuid,
        feature_id: Uuid,
    ) -> Result<CascadeSummary, StoreError> {
        let si = self.system_index(&system_id)?;
        let bi = self.subsystem_index(si, &subsystem_id)?;
        let features = &mut self.systems[si].subsystems[bi].features;
        let fi = features
            .iter()
            .position(|f| f.id == feature_id)
            .ok_or(StoreError::FeatureNotFound(feature_id))?;
        features.remove(fi);

        let mut gone: HashSet<Uuid> = HashSet::from([feature_id]);
        let mut summary = CascadeSummary {
            features: 1,
            ..Default::default()
        };
        self.cascade(&mut gone, &mut summary, |r| r.feature_id == Some(feature_id));
        debug!("deleted feature {} ({:?})", feature_id, summary);
        self.publish(StoreEvent::FeatureDeleted {
            system_id,
            subsystem_id,
            feature_id,
        });
        Ok(summary)
    }

    /// Drops matching requirements, then every work session whose parent is in `gone`
    /// (removed requirements included)
    fn cascade<F>(&mut self, gone: &mut HashSet<Uuid>, summary: &mut CascadeSummary, doomed: F)
    where
        F: Fn(&Requirement) -> bool,
    {
        let before = self.requirements.len();
        self.requirements.retain(|r| {
            if doomed(r) {
                gone.insert(r.id);
                false
            } else {
                true
            }
        });
        summary.requirements = before - self.requirements.len();

        let before = self.work_sessions.len();
        self.work_sessions.retain(|s| !gone.contains(&s.parent_id));
        summary.work_sessions = before - self.work_sessions.len();
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn select_system(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.system_index(&id)?;
        self.selection = Selection {
            system: Some(id),
            subsystem: None,
            feature: None,
        };
        Ok(())
    }

    pub fn select_subsystem(&mut self, id: Uuid) -> Result<(), StoreError> {
        let (si, _) = self
            .locate_subsystem(&id)
            .ok_or(StoreError::SubsystemNotFound(id))?;
        self.selection = Selection {
            system: Some(self.systems[si].id),
            subsystem: Some(id),
            feature: None,
        };
        Ok(())
    }

    pub fn select_feature(&mut self, id: Uuid) -> Result<(), StoreError> {
        let (system_id, subsystem_id) = self
            .feature_ancestry(&id)
            .ok_or(StoreError::FeatureNotFound(id))?;
        self.selection = Selection {
            system: Some(system_id),
            subsystem: Some(subsystem_id),
            feature: Some(id),
        };
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // =========================================================================
    // Wholesale replacement (import)
    // =========================================================================

    /// Replaces each collection that is `Some`, leaving the others untouched
    pub fn replace_collections(
        &mut self,
        systems: Option<Vec<System>>,
        requirements: Option<Vec<Requirement>>,
        work_sessions: Option<Vec<WorkSession>>,
    ) {
        if let Some(systems) = systems {
            self.systems = systems;
        }
        if let Some(requirements) = requirements {
            self.requirements = requirements;
        }
        if let Some(work_sessions) = work_sessions {
            self.work_sessions = work_sessions;
        }
        self.publish(StoreEvent::Replaced);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewRequirement, ParentType};
    use crate::palette::PALETTE;

    /// System with one subsystem and one feature
    fn store_with_feature() -> (ProjectStore, Uuid, Uuid, Uuid) {
        let mut store = ProjectStore::new();
        let sys = store.create_system("Shop", "Retail");
        let sub = store.create_subsystem(sys, "Checkout", "").unwrap();
        let feat = store.create_feature(sys, sub, "Payments", "").unwrap();
        (store, sys, sub, feat)
    }

    #[test]
    fn test_create_sets_back_references() {
        let (store, sys, sub, feat) = store_with_feature();

        assert_eq!(store.subsystem(&sub).unwrap().system_id, sys);
        assert_eq!(store.feature(&feat).unwrap().subsystem_id, sub);
        assert_eq!(store.feature_ancestry(&feat), Some((sys, sub)));
    }

    #[test]
    fn test_create_system_accepts_empty_name() {
        let mut store = ProjectStore::new();
        let id = store.create_system("", "");
        assert_eq!(store.system(&id).unwrap().name, "");
    }

    #[test]
    fn test_create_under_unknown_parent_changes_nothing() {
        let (mut store, sys, _, _) = store_with_feature();
        let before = store.snapshot();

        let missing = Uuid::new_v4();
        assert_eq!(
            store.create_subsystem(missing, "X", ""),
            Err(StoreError::SystemNotFound(missing))
        );
        assert_eq!(
            store.create_feature(sys, missing, "X", ""),
            Err(StoreError::SubsystemNotFound(missing))
        );
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_create_feature_requires_subsystem_under_named_system() {
        let (mut store, _, sub, _) = store_with_feature();
        let other = store.create_system("Other", "");

        assert_eq!(
            store.create_feature(other, sub, "X", ""),
            Err(StoreError::SubsystemNotFound(sub))
        );
    }

    #[test]
    fn test_sequential_subsystems_get_distinct_colors() {
        let mut store = ProjectStore::new();
        let sys = store.create_system("S", "");
        let a = store.create_subsystem(sys, "A", "").unwrap();
        let b = store.create_subsystem(sys, "B", "").unwrap();

        let color_a = &store.subsystem(&a).unwrap().color;
        let color_b = &store.subsystem(&b).unwrap().color;
        assert_ne!(color_a, color_b);
        assert_eq!(color_a, PALETTE[0]);
        assert_eq!(color_b, PALETTE[1]);
    }

    #[test]
    fn test_colors_are_allocated_per_system() {
        let mut store = ProjectStore::new();
        let s1 = store.create_system("S1", "");
        let s2 = store.create_system("S2", "");
        let a = store.create_subsystem(s1, "A", "").unwrap();
        let b = store.create_subsystem(s2, "B", "").unwrap();

        assert_eq!(store.subsystem(&a).unwrap().color, PALETTE[0]);
        assert_eq!(store.subsystem(&b).unwrap().color, PALETTE[0]);
    }

    #[test]
    fn test_freed_color_is_reused_first() {
        let mut store = ProjectStore::new();
        let sys = store.create_system("S", "");
        let a = store.create_subsystem(sys, "A", "").unwrap();
        store.create_subsystem(sys, "B", "").unwrap();
        store.delete_subsystem(sys, a).unwrap();

        let c = store.create_subsystem(sys, "C", "").unwrap();
        assert_eq!(store.subsystem(&c).unwrap().color, PALETTE[0]);
    }

    #[test]
    fn test_rename_does_not_refresh_session_labels() {
        let (mut store, _, _, feat) = store_with_feature();
        let session = store
            .add_work_session(ParentType::Feature, feat, "ctx", "claude", "opus")
            .unwrap();

        store.rename_feature(feat, "Billing").unwrap();

        assert_eq!(store.feature(&feat).unwrap().name, "Billing");
        let session = store.work_session(&session).unwrap();
        assert_eq!(session.parent_name, "Payments");
    }

    #[test]
    fn test_rename_unknown_node() {
        let mut store = ProjectStore::new();
        let missing = Uuid::new_v4();
        assert_eq!(
            store.rename_subsystem(missing, "X"),
            Err(StoreError::SubsystemNotFound(missing))
        );
    }

    #[test]
    fn test_set_readme_and_description() {
        let (mut store, sys, sub, _) = store_with_feature();

        store
            .set_readme(NodeRef::System(sys), Some("# Shop".to_string()))
            .unwrap();
        store
            .set_description(NodeRef::Subsystem(sub), "Pay for things")
            .unwrap();

        assert_eq!(store.system(&sys).unwrap().readme.as_deref(), Some("# Shop"));
        assert_eq!(store.subsystem(&sub).unwrap().description, "Pay for things");

        store.set_readme(NodeRef::System(sys), Some("  ".to_string())).unwrap();
        assert!(store.system(&sys).unwrap().readme.is_none());
    }

    #[test]
    fn test_folders_are_annotation_only() {
        let (mut store, sys, _, _) = store_with_feature();
        let reqs_before = store.requirements().len();

        let folder = store
            .add_system_folder(sys, "web", FolderCategory::Ui, "Angular app")
            .unwrap();
        assert_eq!(store.system(&sys).unwrap().folders.len(), 1);

        store.delete_system_folder(sys, folder).unwrap();
        assert!(store.system(&sys).unwrap().folders.is_empty());
        assert_eq!(store.requirements().len(), reqs_before);

        assert_eq!(
            store.delete_system_folder(sys, folder),
            Err(StoreError::FolderNotFound(folder))
        );
    }

    #[test]
    fn test_delete_system_cascades_everything_below() {
        let (mut store, sys, sub, feat) = store_with_feature();
        let keep_sys = store.create_system("Keep", "");
        let keep_sub = store.create_subsystem(keep_sys, "K", "").unwrap();
        let keep_feat = store.create_feature(keep_sys, keep_sub, "KF", "").unwrap();

        let req = store
            .add_requirement(feat, NewRequirement::new("Pay", ""))
            .unwrap();
        let kept_req = store
            .add_requirement(keep_feat, NewRequirement::new("Stay", ""))
            .unwrap();
        store
            .add_work_session(ParentType::System, sys, "", "", "")
            .unwrap();
        store
            .add_work_session(ParentType::Subsystem, sub, "", "", "")
            .unwrap();
        store
            .add_work_session(ParentType::Requirement, req, "", "", "")
            .unwrap();
        let kept_session = store
            .add_work_session(ParentType::Requirement, kept_req, "", "", "")
            .unwrap();

        let summary = store.delete_system(sys).unwrap();

        assert_eq!(summary.subsystems, 1);
        assert_eq!(summary.features, 1);
        assert_eq!(summary.requirements, 1);
        assert_eq!(summary.work_sessions, 3);
        assert!(store.system(&sys).is_none());
        assert!(store.subsystem(&sub).is_none());
        assert!(store.feature(&feat).is_none());
        assert!(store.requirements().iter().all(|r| r.system_id != sys));
        assert_eq!(store.requirements().len(), 1);
        assert_eq!(store.work_sessions().len(), 1);
        assert_eq!(store.work_sessions()[0].id, kept_session);
    }

    #[test]
    fn test_delete_subsystem_cascades_scoped() {
        let (mut store, sys, sub, feat) = store_with_feature();
        let other_sub = store.create_subsystem(sys, "Catalog", "").unwrap();
        let other_feat = store.create_feature(sys, other_sub, "Search", "").unwrap();
        store
            .add_requirement(feat, NewRequirement::new("Pay", ""))
            .unwrap();
        store
            .add_requirement(other_feat, NewRequirement::new("Find", ""))
            .unwrap();

        let summary = store.delete_subsystem(sys, sub).unwrap();

        assert_eq!(summary.requirements, 1);
        assert!(store.subsystem(&sub).is_none());
        assert!(store.subsystem(&other_sub).is_some());
        assert_eq!(store.requirements().len(), 1);
        assert_eq!(store.requirements()[0].title, "Find");
    }

    #[test]
    fn test_delete_feature_cascades_scoped() {
        let (mut store, sys, sub, feat) = store_with_feature();
        let sibling = store.create_feature(sys, sub, "Refunds", "").unwrap();
        store
            .add_requirement(feat, NewRequirement::new("Pay", ""))
            .unwrap();
        store
            .add_requirement(sibling, NewRequirement::new("Refund", ""))
            .unwrap();
        store
            .add_work_session(ParentType::Feature, feat, "", "", "")
            .unwrap();

        let summary = store.delete_feature(sys, sub, feat).unwrap();

        assert_eq!(summary.requirements, 1);
        assert_eq!(summary.work_sessions, 1);
        assert!(store.feature(&feat).is_none());
        assert_eq!(store.requirements()[0].title, "Refund");
    }

    #[test]
    fn test_delete_with_wrong_parent_changes_nothing() {
        let (mut store, _, sub, feat) = store_with_feature();
        let other = store.create_system("Other", "");
        let before = store.snapshot();

        assert_eq!(
            store.delete_feature(other, sub, feat),
            Err(StoreError::SubsystemNotFound(sub))
        );
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_deletes_clear_selection() {
        let (mut store, sys, sub, feat) = store_with_feature();

        store.select_feature(feat).unwrap();
        store.delete_feature(sys, sub, feat).unwrap();
        assert_eq!(store.selection().subsystem, Some(sub));
        assert_eq!(store.selection().feature, None);

        store.delete_subsystem(sys, sub).unwrap();
        assert_eq!(store.selection().system, Some(sys));
        assert_eq!(store.selection().subsystem, None);

        store.delete_system(sys).unwrap();
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_select_feature_sets_full_path() {
        let (mut store, sys, sub, feat) = store_with_feature();
        store.select_feature(feat).unwrap();

        let sel = store.selection();
        assert_eq!(sel.system, Some(sys));
        assert_eq!(sel.subsystem, Some(sub));
        assert_eq!(sel.feature, Some(feat));
    }

    #[test]
    fn test_seeded_store_selects_example_system() {
        let store = ProjectStore::seeded();

        assert_eq!(store.systems().len(), 1);
        let system = &store.systems()[0];
        assert_eq!(system.name, "E-Commerce Platform");
        assert_eq!(system.subsystems[0].name, "Checkout");
        assert_eq!(system.subsystems[0].features[0].name, "Payment Gateway");
        assert_eq!(system.subsystems[0].system_id, system.id);
        assert_eq!(store.selection().system, Some(system.id));
    }

    #[test]
    fn test_sorted_systems_leaves_storage_order() {
        let mut store = ProjectStore::new();
        let zeta = store.create_system("zeta", "");
        store.create_system("Alpha", "");
        store.create_subsystem(zeta, "b", "").unwrap();
        store.create_subsystem(zeta, "A", "").unwrap();

        let sorted = store.sorted_systems();
        assert_eq!(sorted[0].name, "Alpha");
        assert_eq!(sorted[1].subsystems[0].name, "A");
        assert_eq!(store.systems()[0].name, "zeta");
        assert_eq!(store.systems()[0].subsystems[0].name, "b");
    }

    #[test]
    fn test_replace_collections_leaves_missing_keys() {
        let (mut store, _, _, feat) = store_with_feature();
        store
            .add_requirement(feat, NewRequirement::new("Pay", ""))
            .unwrap();
        store.select_feature(feat).unwrap();

        store.replace_collections(Some(Vec::new()), None, None);

        assert!(store.systems().is_empty());
        assert_eq!(store.requirements().len(), 1);
        assert!(store.selection().is_empty());
        // Import performs no referential checks
        assert_eq!(store.inconsistent_requirements().len(), 1);
    }
}
