use crate::models::{Requirement, Snapshot, System, WorkSession};
use crate::store::ProjectStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Format version written into export metadata
pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportMeta {
    pub exported_at: DateTime<Utc>,
    pub version: String,
}

/// Full JSON export: the three collections plus metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub systems: Vec<System>,
    pub requirements: Vec<Requirement>,
    pub work_sessions: Vec<WorkSession>,
    pub meta: ExportMeta,
}

/// Errors that abort an import before anything is replaced
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Import is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Import must be a JSON object with systems, requirements or workSessions")]
    NotAnObject,
}

/// What happened to one top-level key during import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Collection replaced with this many entries
    Replaced(usize),
    /// Key absent; collection left untouched
    Missing,
    /// Key present but not an array of well-formed entries; collection left untouched
    Malformed(String),
}

impl fmt::Display for KeyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyOutcome::Replaced(n) => write!(f, "replaced ({} entries)", n),
            KeyOutcome::Missing => write!(f, "not present, kept"),
            KeyOutcome::Malformed(reason) => write!(f, "malformed, kept ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub systems: KeyOutcome,
    pub requirements: KeyOutcome,
    pub work_sessions: KeyOutcome,
}

impl ImportReport {
    pub fn replaced_any(&self) -> bool {
        [&self.systems, &self.requirements, &self.work_sessions]
            .iter()
            .any(|o| matches!(o, KeyOutcome::Replaced(_)))
    }
}

pub fn export_snapshot(store: &ProjectStore) -> ExportSnapshot {
    let Snapshot {
        systems,
        requirements,
        work_sessions,
    } = store.snapshot();
    ExportSnapshot {
        systems,
        requirements,
        work_sessions,
        meta: ExportMeta {
            exported_at: Utc::now(),
            version: EXPORT_VERSION.to_string(),
        },
    }
}

/// Export the store to a pretty-printed JSON file
pub fn export_json(store: &ProjectStore, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&export_snapshot(store))?;
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!("Exported to JSON: {}", output_path.display());
    println!("  Systems: {}", store.systems().len());
    println!("  Requirements: {}", store.requirements().len());
    println!("  Work sessions: {}", store.work_sessions().len());

    Ok(())
}

/// Parses one collection; `Missing` and `Malformed` leave it out of the replacement
fn take_collection<T: DeserializeOwned>(
    object: &mut serde_json::Map<String, Value>,
    key: &str,
) -> (KeyOutcome, Option<Vec<T>>) {
    match object.remove(key) {
        None => (KeyOutcome::Missing, None),
        Some(value @ Value::Array(_)) => match serde_json::from_value::<Vec<T>>(value) {
            Ok(items) => (KeyOutcome::Replaced(items.len()), Some(items)),
            Err(e) => {
                warn!("import: skipping malformed '{}': {}", key, e);
                (KeyOutcome::Malformed(e.to_string()), None)
            }
        },
        Some(_) => {
            warn!("import: skipping '{}', not an array", key);
            (KeyOutcome::Malformed("not an array".to_string()), None)
        }
    }
}

/// Every id in the forest: systems, folders, subsystems and features
fn tree_ids(systems: &[System]) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for system in systems {
        ids.push(system.id);
        ids.extend(system.folders.iter().map(|f| f.id));
        for subsystem in &system.subsystems {
            ids.push(subsystem.id);
            ids.extend(subsystem.features.iter().map(|f| f.id));
        }
    }
    ids
}

fn first_duplicate(ids: Vec<Uuid>) -> Option<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}

/// Turns a parsed collection holding a repeated id into `Malformed`; the
/// SQLite backend could never save it
fn reject_duplicates<T>(
    key: &str,
    (outcome, items): (KeyOutcome, Option<Vec<T>>),
    ids: impl Fn(&[T]) -> Vec<Uuid>,
) -> (KeyOutcome, Option<Vec<T>>) {
    if let Some(dup) = items.as_deref().and_then(|list| first_duplicate(ids(list))) {
        warn!("import: skipping '{}', duplicate id {}", key, dup);
        return (KeyOutcome::Malformed(format!("duplicate id {}", dup)), None);
    }
    (outcome, items)
}

/// Replaces each collection whose key holds a well-formed array with no
/// repeated ids.
///
/// No referential checks are made between collections; other keys
/// (including `meta`) are ignored.
pub fn import_json(store: &mut ProjectStore, text: &str) -> Result<ImportReport, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut object) = value else {
        return Err(ImportError::NotAnObject);
    };

    let (systems_outcome, systems) = reject_duplicates(
        "systems",
        take_collection::<System>(&mut object, "systems"),
        tree_ids,
    );
    let (requirements_outcome, requirements) = reject_duplicates(
        "requirements",
        take_collection::<Requirement>(&mut object, "requirements"),
        |rs| rs.iter().map(|r| r.id).collect(),
    );
    let (sessions_outcome, work_sessions) = reject_duplicates(
        "workSessions",
        take_collection::<WorkSession>(&mut object, "workSessions"),
        |ws| ws.iter().map(|w| w.id).collect(),
    );

    let report = ImportReport {
        systems: systems_outcome,
        requirements: requirements_outcome,
        work_sessions: sessions_outcome,
    };
    if report.replaced_any() {
        store.replace_collections(systems, requirements, work_sessions);
    }
    info!("import finished: {:?}", report);
    Ok(report)
}

/// Renders the hierarchy and its requirements as a Markdown document
pub fn render_markdown(store: &ProjectStore) -> String {
    let mut output = String::new();
    output.push_str("# Nebula Project Plan\n\n");
    output.push_str(&format!(
        "_Exported {}: {} systems, {} requirements_\n\n",
        Utc::now().format("%Y-%m-%d %H:%M UTC"),
        store.systems().len(),
        store.requirements().len()
    ));

    for system in store.sorted_systems() {
        output.push_str(&format!("## {}\n\n", system.name));
        push_text(&mut output, &system.description);
        if let Some(readme) = &system.readme {
            push_text(&mut output, readme);
        }

        if !system.folders.is_empty() {
            output.push_str("**Folders:**\n\n");
            for folder in &system.folders {
                if folder.note.is_empty() {
                    output.push_str(&format!("- `{}` ({})\n", folder.name, folder.category));
                } else {
                    output.push_str(&format!(
                        "- `{}` ({}): {}\n",
                        folder.name, folder.category, folder.note
                    ));
                }
            }
            output.push('\n');
        }

        for subsystem in &system.subsystems {
            output.push_str(&format!("### {} `{}`\n\n", subsystem.name, subsystem.color));
            push_text(&mut output, &subsystem.description);
            if let Some(readme) = &subsystem.readme {
                push_text(&mut output, readme);
            }

            for feature in &subsystem.features {
                output.push_str(&format!("#### {}\n\n", feature.name));
                push_text(&mut output, &feature.description);
                if let Some(readme) = &feature.readme {
                    push_text(&mut output, readme);
                }

                let reqs: Vec<&Requirement> = store
                    .requirements()
                    .iter()
                    .filter(|r| r.feature_id == Some(feature.id))
                    .collect();
                push_requirement_list(&mut output, &reqs);
            }
        }
    }

    let unattached: Vec<&Requirement> = store
        .requirements()
        .iter()
        .filter(|r| {
            r.feature_id
                .map_or(true, |f| store.feature(&f).is_none())
        })
        .collect();
    if !unattached.is_empty() {
        output.push_str("## Requirements without a feature\n\n");
        push_requirement_list(&mut output, &unattached);
    }

    output
}

fn push_text(output: &mut String, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        output.push_str(text);
        output.push_str("\n\n");
    }
}

fn push_requirement_list(output: &mut String, reqs: &[&Requirement]) {
    if reqs.is_empty() {
        output.push_str("_No requirements._\n\n");
        return;
    }
    for req in reqs {
        output.push_str(&format!(
            "- **{}** [{} | {}]\n",
            req.title, req.status, req.priority
        ));
        let description = req.description.trim();
        if !description.is_empty() {
            output.push_str(&format!("  {}\n", description.replace('\n', "\n  ")));
        }
    }
    output.push('\n');
}

/// Export the store as a Markdown document
pub fn export_markdown(store: &ProjectStore, output_path: &Path) -> Result<()> {
    fs::write(output_path, render_markdown(store))
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!("Exported to Markdown: {}", output_path.display());
    println!("  Total requirements: {}", store.requirements().len());

    Ok(())
}
