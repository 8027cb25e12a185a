//! Prompt Templates for AI Operations
//!
//! Builds the prompts for requirement drafting and subsystem suggestion,
//! pulling hierarchy context and readmes out of the store.

use crate::store::ProjectStore;
use uuid::Uuid;

/// Inputs to a requirement drafting request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftRequest {
    /// Where in the hierarchy the drafts will land
    pub context: String,
    /// Readmes along the feature's ancestry
    pub documentation: String,
    /// What the user asked for
    pub prompt: String,
}

/// Collects context and documentation for drafting requirements under a feature.
/// Returns `None` if the feature is unknown.
pub fn build_feature_request(
    store: &ProjectStore,
    feature_id: &Uuid,
    user_prompt: &str,
) -> Option<DraftRequest> {
    let (system_id, subsystem_id) = store.feature_ancestry(feature_id)?;
    let system = store.system(&system_id)?;
    let subsystem = system.subsystem(&subsystem_id)?;
    let feature = subsystem.feature(feature_id)?;

    let existing: Vec<String> = store
        .requirements()
        .iter()
        .filter(|r| r.feature_id == Some(*feature_id))
        .map(|r| format!("- {} [{}]", r.title, r.status))
        .collect();

    let mut context = format!(
        "- System: {} ({})\n- Subsystem: {} ({})\n- Feature: {} ({})",
        system.name,
        system.description,
        subsystem.name,
        subsystem.description,
        feature.name,
        feature.description
    );
    if !existing.is_empty() {
        context.push_str("\n\nExisting requirements for this feature:\n");
        context.push_str(&existing.join("\n"));
    }

    let documentation = [
        ("System", &system.readme),
        ("Subsystem", &subsystem.readme),
        ("Feature", &feature.readme),
    ]
    .iter()
    .filter_map(|(level, readme)| {
        readme
            .as_deref()
            .map(|text| format!("### {} readme\n{}", level, text.trim()))
    })
    .collect::<Vec<_>>()
    .join("\n\n");

    Some(DraftRequest {
        context,
        documentation,
        prompt: user_prompt.trim().to_string(),
    })
}

/// Prompt asking for a JSON array of `{title, description, priority}` drafts
pub fn build_requirements_prompt(request: &DraftRequest) -> String {
    let documentation_section = if request.documentation.trim().is_empty() {
        String::new()
    } else {
        format!("\n## Documentation\n{}\n", request.documentation)
    };

    let focus = if request.prompt.is_empty() {
        "Cover the most important behavior of this feature.".to_string()
    } else {
        request.prompt.clone()
    };

    format!(
        r#"Act as a Senior Business Analyst writing software requirements.

## Context
{context}
{documentation_section}
## Request
{focus}

## Task
Generate 3 detailed software requirements for this feature. Do not repeat
existing requirements.

## Response Format
Respond ONLY with a JSON array in this exact format:
```json
[
  {{
    "title": "<short summary, max 10 words>",
    "description": "<detailed description including acceptance criteria>",
    "priority": "Low" | "Medium" | "High"
  }}
]
```"#,
        context = request.context,
        documentation_section = documentation_section,
        focus = focus,
    )
}

/// Prompt asking for a JSON array of `{name, description}` subsystems
pub fn build_subsystem_prompt(system_name: &str, description: &str) -> String {
    format!(
        r#"You are a software architect.

Analyze the system "{system_name}": {description}

Suggest 3 logical subsystems that would be part of this architecture.

## Response Format
Respond ONLY with a JSON array in this exact format:
```json
[
  {{
    "name": "<subsystem name>",
    "description": "<brief description>"
  }}
]
```"#
    )
}
