use anyhow::Result;
use inquire::{Confirm, Editor, MultiSelect, Select, Text};
use std::path::PathBuf;

use nebula_core::{NewRequirement, RequirementPriority, RequirementStatus};

/// Prompts the user for a new requirement
pub fn prompt_new_requirement() -> Result<NewRequirement> {
    let title = Text::new("Title:").prompt()?;

    // Use the Editor type for multiline input
    let description = Editor::new("Description:").prompt()?;

    let priority_options = vec![
        RequirementPriority::High,
        RequirementPriority::Medium,
        RequirementPriority::Low,
    ];
    let priority = Select::new("Priority:", priority_options)
        .with_starting_cursor(1)
        .prompt()?;

    let status = Select::new("Status:", RequirementStatus::ALL.to_vec()).prompt()?;

    Ok(NewRequirement::new(title, description)
        .with_priority(priority)
        .with_status(status))
}

/// Opens an editor on the current readme; an empty result clears it
pub fn prompt_readme(node_name: &str, current: Option<&str>) -> Result<Option<String>> {
    let message = format!("Readme for {}:", node_name);
    let text = Editor::new(&message)
        .with_predefined_text(current.unwrap_or(""))
        .with_file_extension(".md")
        .prompt()?;
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

/// Asks for confirmation, defaulting to no
pub fn confirm(message: &str) -> Result<bool> {
    Ok(Confirm::new(message).with_default(false).prompt()?)
}

/// Lets the user pick which candidates to keep; all are preselected
pub fn prompt_pick(message: &str, labels: Vec<String>) -> Result<Vec<usize>> {
    let all: Vec<usize> = (0..labels.len()).collect();
    let chosen = MultiSelect::new(message, labels.clone())
        .with_default(&all)
        .prompt()?;
    Ok(chosen
        .iter()
        .filter_map(|c| labels.iter().position(|l| l == c))
        .collect())
}

/// Prompts for the drafting request when none was given on the command line
pub fn prompt_generation_request(feature_name: &str) -> Result<String> {
    let message = format!("What should the requirements for '{}' cover?", feature_name);
    Ok(Text::new(&message).prompt()?)
}

/// Prompts for project registration details
pub fn prompt_register_project() -> Result<(String, PathBuf, String, bool)> {
    let name = Text::new("Project name:").prompt()?;

    let path_input = Text::new("Path to store file (.yaml or .db):").prompt()?;
    let path = PathBuf::from(path_input);

    let description = Text::new("Project description:").prompt()?;

    let default = Confirm::new("Set as default project?").prompt()?;

    Ok((name, path, description, default))
}
