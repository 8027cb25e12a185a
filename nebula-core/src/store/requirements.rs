//! Requirement and work session operations on [`ProjectStore`]

use chrono::Utc;
use log::debug;
use std::collections::HashSet;
use uuid::Uuid;

use super::{NodeRef, ProjectStore, StoreError};
use crate::ai::RequirementDraft;
use crate::models::{
    NewRequirement, ParentType, Requirement, RequirementStatus, RequirementUpdate, SessionStatus,
    WorkSession,
};
use crate::selection::Selection;

impl ProjectStore {
    pub fn requirement(&self, id: &Uuid) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == *id)
    }

    pub fn work_session(&self, id: &Uuid) -> Option<&WorkSession> {
        self.work_sessions.iter().find(|s| s.id == *id)
    }

    fn requirement_index(&self, id: &Uuid) -> Result<usize, StoreError> {
        self.requirements
            .iter()
            .position(|r| r.id == *id)
            .ok_or(StoreError::RequirementNotFound(*id))
    }

    fn work_session_index(&self, id: &Uuid) -> Result<usize, StoreError> {
        self.work_sessions
            .iter()
            .position(|s| s.id == *id)
            .ok_or(StoreError::WorkSessionNotFound(*id))
    }

    /// Adds a requirement under a feature. Ancestry is read from the tree,
    /// never from the caller.
    pub fn add_requirement(&mut self, feature_id: Uuid, new: NewRequirement) -> Result<Uuid, StoreError> {
        let (system_id, subsystem_id) = self
            .feature_ancestry(&feature_id)
            .ok_or(StoreError::FeatureNotFound(feature_id))?;

        let now = Utc::now();
        let mut requirement = Requirement {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            status: RequirementStatus::Backlog,
            priority: new.priority,
            system_id,
            subsystem_id: Some(subsystem_id),
            feature_id: Some(feature_id),
            start_date: None,
            completion_date: None,
            created_at: now,
            updated_at: now,
        };
        apply_status(&mut requirement, new.status);

        let id = requirement.id;
        debug!("added requirement {} ({}) to feature {}", requirement.title, id, feature_id);
        self.requirements.push(requirement);
        Ok(id)
    }

    /// Adds generated drafts as Backlog requirements, in order
    pub fn add_drafts<I>(&mut self, feature_id: Uuid, drafts: I) -> Result<Vec<Uuid>, StoreError>
    where
        I: IntoIterator<Item = RequirementDraft>,
    {
        if self.feature(&feature_id).is_none() {
            return Err(StoreError::FeatureNotFound(feature_id));
        }
        drafts
            .into_iter()
            .map(|draft| {
                let new = NewRequirement::new(draft.title, draft.description)
                    .with_priority(draft.priority);
                self.add_requirement(feature_id, new)
            })
            .collect()
    }

    pub fn update_requirement_status(
        &mut self,
        id: Uuid,
        status: RequirementStatus,
    ) -> Result<(), StoreError> {
        let idx = self.requirement_index(&id)?;
        let req = &mut self.requirements[idx];
        if req.status != status {
            debug!("requirement {}: {} -> {}", id, req.status, status);
            apply_status(req, status);
            req.updated_at = Utc::now();
        }
        Ok(())
    }

    /// Moves a requirement one column to the right; stays put in Done
    pub fn advance_requirement(&mut self, id: Uuid) -> Result<RequirementStatus, StoreError> {
        self.step_requirement(id, RequirementStatus::next)
    }

    /// Moves a requirement one column to the left; stays put in Backlog
    pub fn retreat_requirement(&mut self, id: Uuid) -> Result<RequirementStatus, StoreError> {
        self.step_requirement(id, RequirementStatus::previous)
    }

    fn step_requirement<F>(&mut self, id: Uuid, step: F) -> Result<RequirementStatus, StoreError>
    where
        F: Fn(RequirementStatus) -> Option<RequirementStatus>,
    {
        let idx = self.requirement_index(&id)?;
        let current = self.requirements[idx].status;
        match step(current) {
            Some(status) => {
                self.update_requirement_status(id, status)?;
                Ok(status)
            }
            None => Ok(current),
        }
    }

    /// Edits title, description or priority. Ancestry cannot be edited here.
    pub fn update_requirement(&mut self, id: Uuid, update: RequirementUpdate) -> Result<(), StoreError> {
        let idx = self.requirement_index(&id)?;
        if update.is_empty() {
            return Ok(());
        }

        let req = &mut self.requirements[idx];
        if let Some(title) = update.title {
            req.title = title;
        }
        if let Some(description) = update.description {
            req.description = description;
        }
        if let Some(priority) = update.priority {
            req.priority = priority;
        }
        req.updated_at = Utc::now();
        Ok(())
    }

    /// Removes a requirement and the work sessions attached to it.
    /// Returns the number of sessions removed.
    pub fn delete_requirement(&mut self, id: Uuid) -> Result<usize, StoreError> {
        let idx = self.requirement_index(&id)?;
        self.requirements.remove(idx);

        let before = self.work_sessions.len();
        self.work_sessions.retain(|s| s.parent_id != id);
        let removed = before - self.work_sessions.len();
        debug!("deleted requirement {} and {} session(s)", id, removed);
        Ok(removed)
    }

    /// Requirements under the innermost selected node: feature, then
    /// subsystem, then system; everything when nothing is selected
    pub fn requirements_in(&self, scope: &Selection) -> Vec<&Requirement> {
        self.requirements
            .iter()
            .filter(|r| match (scope.feature, scope.subsystem, scope.system) {
                (Some(feature), _, _) => r.feature_id == Some(feature),
                (None, Some(subsystem), _) => r.subsystem_id == Some(subsystem),
                (None, None, Some(system)) => r.system_id == system,
                (None, None, None) => true,
            })
            .collect()
    }

    pub fn requirements_in_scope(&self) -> Vec<&Requirement> {
        self.requirements_in(&self.selection)
    }

    // =========================================================================
    // Work sessions
    // =========================================================================

    /// Records a session against a live node, snapshotting its current name
    pub fn add_work_session(
        &mut self,
        parent_type: ParentType,
        parent_id: Uuid,
        context: impl Into<String>,
        platform: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Uuid, StoreError> {
        let parent_name = self.parent_name(parent_type, parent_id)?;
        let now = Utc::now();
        let session = WorkSession {
            id: Uuid::new_v4(),
            parent_id,
            parent_type,
            parent_name,
            context: context.into(),
            platform: platform.into(),
            model: model.into(),
            status: SessionStatus::Pending,
            outcome: None,
            created_at: now,
            updated_at: now,
        };
        let id = session.id;
        debug!("added work session {} on {} {}", id, parent_type, parent_id);
        self.work_sessions.push(session);
        Ok(id)
    }

    fn parent_name(&self, parent_type: ParentType, parent_id: Uuid) -> Result<String, StoreError> {
        let name = match parent_type {
            ParentType::System => self
                .node_name(NodeRef::System(parent_id))
                .ok_or(StoreError::SystemNotFound(parent_id))?,
            ParentType::Subsystem => self
                .node_name(NodeRef::Subsystem(parent_id))
                .ok_or(StoreError::SubsystemNotFound(parent_id))?,
            ParentType::Feature => self
                .node_name(NodeRef::Feature(parent_id))
                .ok_or(StoreError::FeatureNotFound(parent_id))?,
            ParentType::Requirement => self
                .requirement(&parent_id)
                .map(|r| r.title.as_str())
                .ok_or(StoreError::RequirementNotFound(parent_id))?,
        };
        Ok(name.to_string())
    }

    /// Marks a session completed with its outcome text
    pub fn complete_work_session(&mut self, id: Uuid, outcome: impl Into<String>) -> Result<(), StoreError> {
        let idx = self.work_session_index(&id)?;
        let session = &mut self.work_sessions[idx];
        session.status = SessionStatus::Completed;
        session.outcome = Some(outcome.into());
        session.updated_at = Utc::now();
        Ok(())
    }

    pub fn delete_work_session(&mut self, id: Uuid) -> Result<(), StoreError> {
        let idx = self.work_session_index(&id)?;
        self.work_sessions.remove(idx);
        Ok(())
    }

    /// Sessions attached to the innermost selected node. At feature level the
    /// sessions of that feature's requirements are included.
    pub fn work_sessions_in(&self, scope: &Selection) -> Vec<&WorkSession> {
        let anchors: Option<HashSet<Uuid>> = match (scope.feature, scope.subsystem, scope.system) {
            (Some(feature), _, _) => {
                let mut ids: HashSet<Uuid> = self
                    .requirements
                    .iter()
                    .filter(|r| r.feature_id == Some(feature))
                    .map(|r| r.id)
                    .collect();
                ids.insert(feature);
                Some(ids)
            }
            (None, Some(subsystem), _) => Some(HashSet::from([subsystem])),
            (None, None, Some(system)) => Some(HashSet::from([system])),
            (None, None, None) => None,
        };

        self.work_sessions
            .iter()
            .filter(|s| anchors.as_ref().map_or(true, |ids| ids.contains(&s.parent_id)))
            .collect()
    }

    pub fn work_sessions_in_scope(&self) -> Vec<&WorkSession> {
        self.work_sessions_in(&self.selection)
    }
}

/// Sets the status and keeps the start/completion dates in step with it
fn apply_status(req: &mut Requirement, status: RequirementStatus) {
    let now = Utc::now();
    if status >= RequirementStatus::InProgress && req.start_date.is_none() {
        req.start_date = Some(now);
    }
    match status {
        RequirementStatus::Done => req.completion_date = Some(now),
        _ => req.completion_date = None,
    }
    req.status = status;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequirementPriority;

    fn store_with_feature() -> (ProjectStore, Uuid, Uuid, Uuid) {
        let mut store = ProjectStore::new();
        let sys = store.create_system("Shop", "");
        let sub = store.create_subsystem(sys, "Checkout", "").unwrap();
        let feat = store.create_feature(sys, sub, "Payments", "").unwrap();
        (store, sys, sub, feat)
    }

    #[test]
    fn test_add_requirement_derives_ancestry() {
        let (mut store, sys, sub, feat) = store_with_feature();
        let id = store
            .add_requirement(feat, NewRequirement::new("Accept cards", "Visa and MC"))
            .unwrap();

        let req = store.requirement(&id).unwrap();
        assert_eq!(req.system_id, sys);
        assert_eq!(req.subsystem_id, Some(sub));
        assert_eq!(req.feature_id, Some(feat));
        assert_eq!(req.status, RequirementStatus::Backlog);
        assert_eq!(req.priority, RequirementPriority::Medium);
        assert!(req.start_date.is_none());
    }

    #[test]
    fn test_add_requirement_unknown_feature() {
        let mut store = ProjectStore::new();
        let missing = Uuid::new_v4();
        assert_eq!(
            store.add_requirement(missing, NewRequirement::new("X", "")),
            Err(StoreError::FeatureNotFound(missing))
        );
        assert!(store.requirements().is_empty());
    }

    #[test]
    fn test_add_requirement_in_progress_gets_start_date() {
        let (mut store, _, _, feat) = store_with_feature();
        let id = store
            .add_requirement(
                feat,
                NewRequirement::new("X", "").with_status(RequirementStatus::InProgress),
            )
            .unwrap();
        assert!(store.requirement(&id).unwrap().start_date.is_some());
    }

    #[test]
    fn test_add_drafts_become_backlog_requirements() {
        let (mut store, _, _, feat) = store_with_feature();
        let drafts = vec![
            RequirementDraft {
                title: "Refunds".into(),
                description: "Partial refunds".into(),
                priority: RequirementPriority::High,
            },
            RequirementDraft {
                title: "Receipts".into(),
                description: String::new(),
                priority: RequirementPriority::Low,
            },
        ];

        let ids = store.add_drafts(feat, drafts).unwrap();

        assert_eq!(ids.len(), 2);
        let first = store.requirement(&ids[0]).unwrap();
        assert_eq!(first.title, "Refunds");
        assert_eq!(first.priority, RequirementPriority::High);
        assert_eq!(first.status, RequirementStatus::Backlog);
        assert!(store.inconsistent_requirements().is_empty());
    }

    #[test]
    fn test_status_dates_follow_workflow() {
        let (mut store, _, _, feat) = store_with_feature();
        let id = store.add_requirement(feat, NewRequirement::new("X", "")).unwrap();

        store
            .update_requirement_status(id, RequirementStatus::InProgress)
            .unwrap();
        let started = store.requirement(&id).unwrap().start_date;
        assert!(started.is_some());

        store.update_requirement_status(id, RequirementStatus::Done).unwrap();
        let req = store.requirement(&id).unwrap();
        assert!(req.completion_date.is_some());
        assert_eq!(req.start_date, started);

        store.update_requirement_status(id, RequirementStatus::ToDo).unwrap();
        let req = store.requirement(&id).unwrap();
        assert!(req.completion_date.is_none());
        assert_eq!(req.start_date, started);
    }

    #[test]
    fn test_advance_and_retreat_stop_at_ends() {
        let (mut store, _, _, feat) = store_with_feature();
        let id = store.add_requirement(feat, NewRequirement::new("X", "")).unwrap();

        assert_eq!(store.retreat_requirement(id), Ok(RequirementStatus::Backlog));
        assert_eq!(store.advance_requirement(id), Ok(RequirementStatus::ToDo));
        assert_eq!(store.advance_requirement(id), Ok(RequirementStatus::InProgress));
        assert_eq!(store.advance_requirement(id), Ok(RequirementStatus::Done));
        assert_eq!(store.advance_requirement(id), Ok(RequirementStatus::Done));
        assert_eq!(store.retreat_requirement(id), Ok(RequirementStatus::InProgress));
    }

    #[test]
    fn test_update_requirement_fields() {
        let (mut store, _, _, feat) = store_with_feature();
        let id = store.add_requirement(feat, NewRequirement::new("X", "old")).unwrap();

        store
            .update_requirement(
                id,
                RequirementUpdate {
                    title: Some("Y".into()),
                    priority: Some(RequirementPriority::High),
                    ..Default::default()
                },
            )
            .unwrap();

        let req = store.requirement(&id).unwrap();
        assert_eq!(req.title, "Y");
        assert_eq!(req.description, "old");
        assert_eq!(req.priority, RequirementPriority::High);
    }

    #[test]
    fn test_delete_requirement_removes_its_sessions() {
        let (mut store, _, _, feat) = store_with_feature();
        let id = store.add_requirement(feat, NewRequirement::new("X", "")).unwrap();
        store
            .add_work_session(ParentType::Requirement, id, "draft", "claude", "opus")
            .unwrap();
        store
            .add_work_session(ParentType::Feature, feat, "", "", "")
            .unwrap();

        assert_eq!(store.delete_requirement(id), Ok(1));
        assert!(store.requirement(&id).is_none());
        assert_eq!(store.work_sessions().len(), 1);
    }

    #[test]
    fn test_requirements_in_scope_narrows_with_selection() {
        let (mut store, sys, sub, feat) = store_with_feature();
        let other_feat = store.create_feature(sys, sub, "Refunds", "").unwrap();
        let other_sys = store.create_system("Other", "");
        let other_sub = store.create_subsystem(other_sys, "O", "").unwrap();
        let far_feat = store.create_feature(other_sys, other_sub, "F", "").unwrap();
        store.add_requirement(feat, NewRequirement::new("A", "")).unwrap();
        store.add_requirement(other_feat, NewRequirement::new("B", "")).unwrap();
        store.add_requirement(far_feat, NewRequirement::new("C", "")).unwrap();

        assert_eq!(store.requirements_in_scope().len(), 3);

        store.select_system(sys).unwrap();
        assert_eq!(store.requirements_in_scope().len(), 2);

        store.select_feature(feat).unwrap();
        let titles: Vec<&str> = store
            .requirements_in_scope()
            .iter()
            .map(|r| r.title.as_str())
            .collect();
        assert_eq!(titles, vec!["A"]);
    }

    #[test]
    fn test_work_session_scope_includes_feature_requirements() {
        let (mut store, sys, sub, feat) = store_with_feature();
        let req = store.add_requirement(feat, NewRequirement::new("X", "")).unwrap();
        store.add_work_session(ParentType::Feature, feat, "", "", "").unwrap();
        store
            .add_work_session(ParentType::Requirement, req, "", "", "")
            .unwrap();
        store.add_work_session(ParentType::Subsystem, sub, "", "", "").unwrap();
        store.add_work_session(ParentType::System, sys, "", "", "").unwrap();

        store.select_feature(feat).unwrap();
        assert_eq!(store.work_sessions_in_scope().len(), 2);

        store.select_subsystem(sub).unwrap();
        assert_eq!(store.work_sessions_in_scope().len(), 1);

        store.clear_selection();
        assert_eq!(store.work_sessions_in_scope().len(), 4);
    }

    #[test]
    fn test_work_session_snapshot_and_completion() {
        let (mut store, _, sub, _) = store_with_feature();
        let id = store
            .add_work_session(ParentType::Subsystem, sub, "Plan API", "claude", "sonnet")
            .unwrap();

        let session = store.work_session(&id).unwrap();
        assert_eq!(session.parent_name, "Checkout");
        assert_eq!(session.status, SessionStatus::Pending);

        store.complete_work_session(id, "Drafted 5 requirements").unwrap();
        let session = store.work_session(&id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.outcome.as_deref(), Some("Drafted 5 requirements"));

        store.delete_work_session(id).unwrap();
        assert_eq!(
            store.delete_work_session(id),
            Err(StoreError::WorkSessionNotFound(id))
        );
    }

    #[test]
    fn test_work_session_on_unknown_parent() {
        let mut store = ProjectStore::new();
        let missing = Uuid::new_v4();
        assert_eq!(
            store.add_work_session(ParentType::Requirement, missing, "", "", ""),
            Err(StoreError::RequirementNotFound(missing))
        );
    }
}
