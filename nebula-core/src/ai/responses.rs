//! Response Parsing Module
//!
//! Parses JSON responses from AI into structured data types.

use crate::ai::client::AiError;
use crate::models::RequirementPriority;
use serde::{Deserialize, Deserializer, Serialize};

/// A candidate requirement produced by the AI, not yet in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: RequirementPriority,
}

/// A suggested subsystem for a system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemSuggestion {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Unknown or missing priorities become Medium
fn lenient_priority<'de, D>(deserializer: D) -> Result<RequirementPriority, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|p| p.parse::<RequirementPriority>().ok())
        .unwrap_or_default())
}

/// Extract JSON from a response that may contain markdown code blocks
fn extract_json(response: &str) -> &str {
    // Look for JSON in markdown code block
    if let Some(start) = response.find("```json") {
        let json_start = start + 7; // Skip "```json"
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim();
        }
    }

    // Look for generic code block
    if let Some(start) = response.find("```") {
        let code_start = start + 3;
        // Skip language identifier if present
        let json_start = if let Some(newline) = response[code_start..].find('\n') {
            code_start + newline + 1
        } else {
            code_start
        };
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim();
        }
    }

    // Bare array or object, whichever opens first
    let open = response
        .char_indices()
        .find(|(_, c)| *c == '[' || *c == '{');
    if let Some((start, c)) = open {
        let close = if c == '[' { ']' } else { '}' };
        if let Some(end) = response.rfind(close) {
            if end > start {
                return &response[start..=end];
            }
        }
    }

    response.trim()
}

/// At most `max_chars` characters of `text`, cut on a char boundary
fn preview(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(i, _)| &text[..i])
}

/// Parses a list of items that may be bare or wrapped in a single-key object
fn parse_list<T>(response: &str, wrapper_key: &str, what: &str) -> Result<Vec<T>, AiError>
where
    T: for<'de> Deserialize<'de>,
{
    let json_str = extract_json(response);
    let value: serde_json::Value = serde_json::from_str(json_str).map_err(|e| {
        AiError::InvalidResponse(format!(
            "Failed to parse {} response: {}. JSON: {}",
            what,
            e,
            preview(json_str, 200)
        ))
    })?;

    let list = match value {
        serde_json::Value::Object(mut map) => map
            .remove(wrapper_key)
            .ok_or_else(|| AiError::InvalidResponse(format!("Missing '{}' in response", wrapper_key)))?,
        other => other,
    };

    serde_json::from_value(list)
        .map_err(|e| AiError::InvalidResponse(format!("Failed to parse {} response: {}", what, e)))
}

/// Parse requirement drafts. Entries without a title are dropped.
pub fn parse_requirement_drafts(response: &str) -> Result<Vec<RequirementDraft>, AiError> {
    let drafts: Vec<RequirementDraft> = parse_list(response, "requirements", "requirements")?;
    Ok(drafts
        .into_iter()
        .filter(|d| !d.title.trim().is_empty())
        .collect())
}

/// Parse subsystem suggestions. Entries without a name are dropped.
pub fn parse_subsystem_suggestions(response: &str) -> Result<Vec<SubsystemSuggestion>, AiError> {
    let suggestions: Vec<SubsystemSuggestion> = parse_list(response, "subsystems", "subsystems")?;
    Ok(suggestions
        .into_iter()
        .filter(|s| !s.name.trim().is_empty())
        .collect())
}
