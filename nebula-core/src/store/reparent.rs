//! Cross-branch moves and the demote operation.
//!
//! Each operation validates every id before touching the forest, then moves
//! the nodes and rewrites requirement ancestry in the same call.

use log::debug;
use std::collections::HashMap;
use uuid::Uuid;

use super::{ProjectStore, StoreError};
use crate::models::{Feature, Subsystem};
use crate::palette::allocate_color;
use crate::selection::StoreEvent;

impl ProjectStore {
    /// Moves a feature under another subsystem, possibly in another system.
    /// Moving to its current parent is a no-op.
    pub fn move_feature(
        &mut self,
        feature_id: Uuid,
        target_system_id: Uuid,
        target_subsystem_id: Uuid,
    ) -> Result<(), StoreError> {
        let (si, bi, fi) = self
            .locate_feature(&feature_id)
            .ok_or(StoreError::FeatureNotFound(feature_id))?;
        let tsi = self.system_index(&target_system_id)?;
        let tbi = self.subsystem_index(tsi, &target_subsystem_id)?;
        if (si, bi) == (tsi, tbi) {
            return Ok(());
        }

        let mut feature = self.systems[si].subsystems[bi].features.remove(fi);
        feature.subsystem_id = target_subsystem_id;
        self.systems[tsi].subsystems[tbi].features.push(feature);

        let mut rewritten = 0;
        for req in self
            .requirements
            .iter_mut()
            .filter(|r| r.feature_id == Some(feature_id))
        {
            req.system_id = target_system_id;
            req.subsystem_id = Some(target_subsystem_id);
            rewritten += 1;
        }
        debug!(
            "moved feature {} to {}/{} ({} requirement(s))",
            feature_id, target_system_id, target_subsystem_id, rewritten
        );

        self.publish(StoreEvent::FeatureMoved {
            feature_id,
            to_system: target_system_id,
            to_subsystem: target_subsystem_id,
        });
        Ok(())
    }

    /// Moves a subsystem and its features to another system. The subsystem
    /// keeps its color.
    pub fn move_subsystem(&mut self, subsystem_id: Uuid, target_system_id: Uuid) -> Result<(), StoreError> {
        let (si, bi) = self
            .locate_subsystem(&subsystem_id)
            .ok_or(StoreError::SubsystemNotFound(subsystem_id))?;
        let tsi = self.system_index(&target_system_id)?;
        if si == tsi {
            return Ok(());
        }

        let mut subsystem = self.systems[si].subsystems.remove(bi);
        subsystem.system_id = target_system_id;
        self.systems[tsi].subsystems.push(subsystem);

        let mut rewritten = 0;
        for req in self
            .requirements
            .iter_mut()
            .filter(|r| r.subsystem_id == Some(subsystem_id))
        {
            req.system_id = target_system_id;
            rewritten += 1;
        }
        debug!(
            "moved subsystem {} to {} ({} requirement(s))",
            subsystem_id, target_system_id, rewritten
        );

        self.publish(StoreEvent::SubsystemMoved {
            subsystem_id,
            to_system: target_system_id,
        });
        Ok(())
    }

    /// Collapses the source system into one new subsystem of the target.
    ///
    /// Each former subsystem becomes a feature of the new subsystem and its
    /// own features are flattened into that one feature, so requirements of
    /// sibling features end up sharing a feature. Requirements attached to the
    /// source system alone land on the new subsystem without a feature. The
    /// source system and its folders are removed. Returns the new subsystem id.
    pub fn demote_system(&mut self, source_id: Uuid, target_id: Uuid) -> Result<Uuid, StoreError> {
        if source_id == target_id {
            return Err(StoreError::DemoteIntoSelf(source_id));
        }
        let si = self.system_index(&source_id)?;
        let mut tsi = self.system_index(&target_id)?;

        let source = self.systems.remove(si);
        if tsi > si {
            tsi -= 1;
        }

        let color = allocate_color(self.systems[tsi].used_colors());
        let mut merged = Subsystem::new(target_id, source.name, source.description, color);
        merged.readme = source.readme;
        let merged_id = merged.id;

        // old subsystem or feature id -> synthesized feature id
        let mut by_subsystem: HashMap<Uuid, Uuid> = HashMap::new();
        let mut by_feature: HashMap<Uuid, Uuid> = HashMap::new();
        for old in source.subsystems {
            let mut feature = Feature::new(merged_id, old.name, old.description);
            feature.readme = old.readme;
            by_subsystem.insert(old.id, feature.id);
            for old_feature in &old.features {
                by_feature.insert(old_feature.id, feature.id);
            }
            merged.features.push(feature);
        }

        let mut rewritten = 0;
        for req in self.requirements.iter_mut() {
            let new_feature = req
                .feature_id
                .and_then(|f| by_feature.get(&f))
                .or_else(|| req.subsystem_id.and_then(|s| by_subsystem.get(&s)))
                .copied();

            match new_feature {
                Some(feature_id) => req.feature_id = Some(feature_id),
                None if req.system_id == source_id => req.feature_id = None,
                None => continue,
            }
            req.system_id = target_id;
            req.subsystem_id = Some(merged_id);
            rewritten += 1;
        }

        debug!(
            "demoted system {} into {} as subsystem {} ({} feature(s), {} requirement(s))",
            source_id,
            target_id,
            merged_id,
            merged.features.len(),
            rewritten
        );
        self.systems[tsi].subsystems.push(merged);

        self.publish(StoreEvent::SystemDemoted {
            source: source_id,
            target: target_id,
            new_subsystem: merged_id,
        });
        Ok(merged_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewRequirement, Requirement, RequirementStatus, Snapshot, System};
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    /// Ancestry matches the tree and every back-reference matches its parent
    fn assert_consistent(store: &ProjectStore) {
        assert!(
            store.inconsistent_requirements().is_empty(),
            "requirements out of step with the tree: {:?}",
            store.inconsistent_requirements()
        );
        for system in store.systems() {
            for subsystem in &system.subsystems {
                assert_eq!(subsystem.system_id, system.id);
                for feature in &subsystem.features {
                    assert_eq!(feature.subsystem_id, subsystem.id);
                }
            }
        }
    }

    fn triples(store: &ProjectStore) -> Vec<(Uuid, Uuid, Option<Uuid>, Option<Uuid>)> {
        let mut out: Vec<_> = store
            .requirements()
            .iter()
            .map(|r| (r.id, r.system_id, r.subsystem_id, r.feature_id))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_move_feature_scenario() {
        let mut store = ProjectStore::new();
        let s1 = store.create_system("S1", "");
        let sb1 = store.create_subsystem(s1, "SB1", "").unwrap();
        let f1 = store.create_feature(s1, sb1, "F1", "").unwrap();
        let r1 = store.add_requirement(f1, NewRequirement::new("R1", "")).unwrap();
        let s2 = store.create_system("S2", "");
        let sb3 = store.create_subsystem(s2, "SB3", "").unwrap();

        store.move_feature(f1, s2, sb3).unwrap();

        let req = store.requirement(&r1).unwrap();
        assert_eq!(req.subsystem_id, Some(sb3));
        assert_eq!(req.system_id, s2);
        assert_eq!(req.feature_id, Some(f1));
        assert!(store.subsystem(&sb1).unwrap().features.is_empty());
        assert_eq!(store.feature(&f1).unwrap().subsystem_id, sb3);
        assert_consistent(&store);
    }

    #[test]
    fn test_move_feature_invalid_target_moves_nothing() {
        let mut store = ProjectStore::new();
        let s1 = store.create_system("S1", "");
        let sb1 = store.create_subsystem(s1, "SB1", "").unwrap();
        let f1 = store.create_feature(s1, sb1, "F1", "").unwrap();
        let s2 = store.create_system("S2", "");
        let before = store.snapshot();

        // Subsystem exists but not under the named system
        assert_eq!(
            store.move_feature(f1, s2, sb1),
            Err(StoreError::SubsystemNotFound(sb1))
        );
        let missing = Uuid::new_v4();
        assert_eq!(
            store.move_feature(f1, missing, sb1),
            Err(StoreError::SystemNotFound(missing))
        );
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_move_feature_drags_selection() {
        let mut store = ProjectStore::new();
        let s1 = store.create_system("S1", "");
        let sb1 = store.create_subsystem(s1, "SB1", "").unwrap();
        let f1 = store.create_feature(s1, sb1, "F1", "").unwrap();
        let s2 = store.create_system("S2", "");
        let sb2 = store.create_subsystem(s2, "SB2", "").unwrap();
        store.select_feature(f1).unwrap();

        store.move_feature(f1, s2, sb2).unwrap();

        let sel = store.selection();
        assert_eq!(sel.system, Some(s2));
        assert_eq!(sel.subsystem, Some(sb2));
        assert_eq!(sel.feature, Some(f1));
    }

    #[test]
    fn test_move_subsystem_there_and_back() {
        let mut store = ProjectStore::new();
        let s1 = store.create_system("S1", "");
        let s2 = store.create_system("S2", "");
        let sb1 = store.create_subsystem(s1, "SB1", "").unwrap();
        let fa = store.create_feature(s1, sb1, "A", "").unwrap();
        let fb = store.create_feature(s1, sb1, "B", "").unwrap();
        store.add_requirement(fa, NewRequirement::new("R1", "")).unwrap();
        store.add_requirement(fb, NewRequirement::new("R2", "")).unwrap();
        let original = triples(&store);
        let features = store.subsystem(&sb1).unwrap().features.clone();
        let color = store.subsystem(&sb1).unwrap().color.clone();

        store.move_subsystem(sb1, s2).unwrap();
        assert_consistent(&store);
        assert!(store.requirements().iter().all(|r| r.system_id == s2));
        assert_eq!(store.subsystem(&sb1).unwrap().color, color);

        store.move_subsystem(sb1, s1).unwrap();
        assert_consistent(&store);
        assert_eq!(triples(&store), original);
        assert_eq!(store.subsystem(&sb1).unwrap().features, features);
    }

    #[test]
    fn test_move_subsystem_to_current_parent_is_noop() {
        let mut store = ProjectStore::new();
        let s1 = store.create_system("S1", "");
        let a = store.create_subsystem(s1, "A", "").unwrap();
        store.create_subsystem(s1, "B", "").unwrap();
        let before = store.snapshot();

        store.move_subsystem(a, s1).unwrap();
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_demote_scenario() {
        let mut store = ProjectStore::new();
        let s1 = store.create_system("S1", "first");
        let sb1 = store.create_subsystem(s1, "SB1", "").unwrap();
        let f1 = store.create_feature(s1, sb1, "F1", "").unwrap();
        let r1 = store.add_requirement(f1, NewRequirement::new("R1", "")).unwrap();
        store.create_subsystem(s1, "SB2", "").unwrap();
        let s2 = store.create_system("S2", "");

        let merged = store.demote_system(s1, s2).unwrap();

        assert!(store.system(&s1).is_none());
        let s2_sys = store.system(&s2).unwrap();
        assert_eq!(s2_sys.subsystems.len(), 1);
        let sub = &s2_sys.subsystems[0];
        assert_eq!(sub.id, merged);
        assert_eq!(sub.name, "S1");
        assert_eq!(sub.description, "first");
        let names: Vec<&str> = sub.features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["SB1", "SB2"]);

        let req = store.requirement(&r1).unwrap();
        assert_eq!(req.feature_id, Some(sub.features[0].id));
        assert_eq!(req.status, RequirementStatus::Backlog);
        assert_consistent(&store);
    }

    #[test]
    fn test_demote_moves_every_requirement_under_source() {
        let mut store = ProjectStore::new();
        let a = store.create_system("A", "");
        let b = store.create_system("B", "");
        let existing = store.create_subsystem(b, "Existing", "").unwrap();
        let mut subsystem_count = 0;
        for i in 0..3 {
            let sub = store.create_subsystem(a, format!("Sub{}", i), "").unwrap();
            subsystem_count += 1;
            for j in 0..2 {
                let feat = store.create_feature(a, sub, format!("F{}{}", i, j), "").unwrap();
                store
                    .add_requirement(feat, NewRequirement::new(format!("R{}{}", i, j), ""))
                    .unwrap();
            }
        }
        let moved: Vec<Uuid> = store
            .requirements()
            .iter()
            .filter(|r| r.system_id == a)
            .map(|r| r.id)
            .collect();

        let merged = store.demote_system(a, b).unwrap();

        assert!(store.system(&a).is_none());
        let b_sys = store.system(&b).unwrap();
        assert_eq!(b_sys.subsystems.len(), 2);
        assert_eq!(b_sys.subsystems[0].id, existing);
        assert_eq!(b_sys.subsystem(&merged).unwrap().features.len(), subsystem_count);
        assert_ne!(b_sys.subsystems[0].color, b_sys.subsystems[1].color);
        for id in moved {
            let req = store.requirement(&id).unwrap();
            assert_eq!(req.system_id, b);
            assert_eq!(req.subsystem_id, Some(merged));
        }
        assert_consistent(&store);
    }

    #[test]
    fn test_demote_flattens_sibling_features() {
        let mut store = ProjectStore::new();
        let a = store.create_system("A", "");
        let sub = store.create_subsystem(a, "Sub", "").unwrap();
        let f1 = store.create_feature(a, sub, "F1", "").unwrap();
        let f2 = store.create_feature(a, sub, "F2", "").unwrap();
        let r1 = store.add_requirement(f1, NewRequirement::new("R1", "")).unwrap();
        let r2 = store.add_requirement(f2, NewRequirement::new("R2", "")).unwrap();
        let b = store.create_system("B", "");

        store.demote_system(a, b).unwrap();

        // Lossy: requirements of sibling features now share one feature
        let req1 = store.requirement(&r1).unwrap();
        let req2 = store.requirement(&r2).unwrap();
        assert_eq!(req1.feature_id, req2.feature_id);
        assert!(store.feature(&f1).is_none());
    }

    #[test]
    fn test_demote_keeps_system_level_requirements_without_feature() {
        let mut store = ProjectStore::new();
        let a = store.create_system("A", "");
        let b = store.create_system("B", "");
        let now = Utc::now();
        let loose = Requirement {
            id: Uuid::new_v4(),
            title: "Loose".into(),
            description: String::new(),
            status: RequirementStatus::ToDo,
            priority: Default::default(),
            system_id: a,
            subsystem_id: None,
            feature_id: None,
            start_date: None,
            completion_date: None,
            created_at: now,
            updated_at: now,
        };
        store.replace_collections(None, Some(vec![loose.clone()]), None);
        assert_consistent(&store);

        let merged = store.demote_system(a, b).unwrap();

        let req = store.requirement(&loose.id).unwrap();
        assert_eq!(req.system_id, b);
        assert_eq!(req.subsystem_id, Some(merged));
        assert_eq!(req.feature_id, None);
        assert_consistent(&store);
    }

    #[test]
    fn test_demote_errors_leave_state() {
        let mut store = ProjectStore::new();
        let a = store.create_system("A", "");
        let before = store.snapshot();
        let missing = Uuid::new_v4();

        assert_eq!(store.demote_system(a, a), Err(StoreError::DemoteIntoSelf(a)));
        assert_eq!(
            store.demote_system(a, missing),
            Err(StoreError::SystemNotFound(missing))
        );
        assert_eq!(
            store.demote_system(missing, a),
            Err(StoreError::SystemNotFound(missing))
        );
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_demote_redirects_selection() {
        let mut store = ProjectStore::new();
        let a = store.create_system("A", "");
        let sub = store.create_subsystem(a, "Sub", "").unwrap();
        let b = store.create_system("B", "");
        store.select_subsystem(sub).unwrap();

        let merged = store.demote_system(a, b).unwrap();

        let sel = store.selection();
        assert_eq!(sel.system, Some(b));
        assert_eq!(sel.subsystem, Some(merged));
        assert_eq!(sel.feature, None);
    }

    #[test]
    fn test_demote_when_target_precedes_source() {
        let mut store = ProjectStore::from_snapshot(Snapshot {
            systems: vec![System::new("B".into(), String::new())],
            ..Default::default()
        });
        let b = store.systems()[0].id;
        let a = store.create_system("A", "");

        let merged = store.demote_system(a, b).unwrap();
        assert_eq!(store.systems().len(), 1);
        assert!(store.system(&b).unwrap().subsystem(&merged).is_some());
    }

    /// Random sequences of structural operations never break ancestry
    #[test]
    fn test_random_operations_keep_ancestry_consistent() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut store = ProjectStore::new();
        for i in 0..4 {
            store.create_system(format!("S{}", i), "");
        }

        for step in 0..300 {
            let systems: Vec<Uuid> = store.systems().iter().map(|s| s.id).collect();
            let subsystems: Vec<(Uuid, Uuid)> = store
                .systems()
                .iter()
                .flat_map(|s| s.subsystems.iter().map(move |b| (s.id, b.id)))
                .collect();
            let features: Vec<Uuid> = store
                .systems()
                .iter()
                .flat_map(|s| s.subsystems.iter())
                .flat_map(|b| b.features.iter().map(|f| f.id))
                .collect();

            match rng.gen_range(0..7) {
                0 => {
                    store.create_system(format!("S{}", step), "");
                }
                1 => {
                    if let Some(sys) = systems.choose(&mut rng) {
                        store.create_subsystem(*sys, format!("B{}", step), "").unwrap();
                    }
                }
                2 => {
                    if let Some((sys, sub)) = subsystems.choose(&mut rng) {
                        store
                            .create_feature(*sys, *sub, format!("F{}", step), "")
                            .unwrap();
                    }
                }
                3 => {
                    if let Some(feat) = features.choose(&mut rng) {
                        store
                            .add_requirement(*feat, NewRequirement::new(format!("R{}", step), ""))
                            .unwrap();
                    }
                }
                4 => {
                    if let (Some(feat), Some((sys, sub))) =
                        (features.choose(&mut rng), subsystems.choose(&mut rng))
                    {
                        store.move_feature(*feat, *sys, *sub).unwrap();
                    }
                }
                5 => {
                    if let (Some((_, sub)), Some(sys)) =
                        (subsystems.choose(&mut rng), systems.choose(&mut rng))
                    {
                        store.move_subsystem(*sub, *sys).unwrap();
                    }
                }
                _ => {
                    if systems.len() > 2 {
                        let pair: Vec<&Uuid> = systems.choose_multiple(&mut rng, 2).collect();
                        store.demote_system(*pair[0], *pair[1]).unwrap();
                    }
                }
            }
            assert_consistent(&store);
        }
    }
}
