mod cli;
mod prompts;

use anyhow::{Context, Result};
use clap::Parser;
use colored::{ColoredString, Colorize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use nebula_core::ai::build_feature_request;
use nebula_core::{
    determine_store_path, export_json, export_markdown, get_registry_path, import_json, AiClient,
    CascadeSummary, DraftGenerator, FolderCategory, NewRequirement, NodeRef, ParentType,
    ProjectStore, Registry, Requirement, RequirementPriority, RequirementStatus,
    RequirementUpdate, SessionStatus, Selection, Workspace,
};

use crate::cli::{
    Cli, Command, DbCommand, FeatureCommand, FolderCommand, ReqCommand, SessionCommand,
    SubsystemCommand, SystemCommand,
};

/// Shortest accepted id prefix
const MIN_PREFIX_LEN: usize = 4;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // Registry commands work without opening a store
    if let Command::Db(db_cmd) = &cli.command {
        return handle_db_command(db_cmd, &cli);
    }

    let store_path = determine_store_path(cli.file.as_deref(), cli.project.as_deref())?;
    let mut ws = Workspace::open(&store_path)
        .with_context(|| format!("Failed to open store {}", store_path.display()))?;

    match &cli.command {
        Command::System(cmd) => handle_system_command(cmd, &mut ws, cli.yes)?,
        Command::Subsystem(cmd) => handle_subsystem_command(cmd, &mut ws, cli.yes)?,
        Command::Feature(cmd) => handle_feature_command(cmd, &mut ws, cli.yes)?,
        Command::Folder(cmd) => handle_folder_command(cmd, &mut ws)?,
        Command::Req(cmd) => handle_req_command(cmd, &mut ws, cli.yes)?,
        Command::Session(cmd) => handle_session_command(cmd, &mut ws, cli.yes)?,
        Command::Tree => print_tree(ws.store()),
        Command::Board { scope } => {
            let scope = parse_scope(ws.store(), scope.as_deref())?;
            print_board(ws.store(), &scope);
        }
        Command::Export { format, output } => {
            handle_export_command(ws.store(), format, output.as_deref())?
        }
        Command::Import { input } => handle_import_command(&mut ws, input, cli.yes)?,
        Command::Db(_) => unreachable!("handled above"),
    }

    Ok(())
}

// ============================================================================
// Identifier resolution
// ============================================================================

/// Resolves a full UUID or a unique prefix among `candidates`
fn resolve<T: Copy>(
    input: &str,
    kind: &str,
    candidates: impl IntoIterator<Item = (Uuid, T)>,
) -> Result<T> {
    let needle = input.trim().to_lowercase();
    let candidates: Vec<(Uuid, T)> = candidates.into_iter().collect();

    if let Ok(id) = Uuid::parse_str(&needle) {
        return candidates
            .iter()
            .find(|(c, _)| *c == id)
            .map(|(_, v)| *v)
            .with_context(|| format!("{} not found: {}", kind, id));
    }

    if needle.len() < MIN_PREFIX_LEN {
        anyhow::bail!(
            "{} id '{}' is too short, give at least {} characters",
            kind,
            input,
            MIN_PREFIX_LEN
        );
    }

    let matches: Vec<&(Uuid, T)> = candidates
        .iter()
        .filter(|(id, _)| id.to_string().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [] => anyhow::bail!("{} not found: {}", kind, input),
        [(_, value)] => Ok(*value),
        _ => anyhow::bail!("{} id '{}' is ambiguous ({} matches)", kind, input, matches.len()),
    }
}

fn resolve_system(store: &ProjectStore, input: &str) -> Result<Uuid> {
    resolve(input, "System", store.systems().iter().map(|s| (s.id, s.id)))
}

/// Returns (system, subsystem)
fn resolve_subsystem(store: &ProjectStore, input: &str) -> Result<(Uuid, Uuid)> {
    let candidates = store
        .systems()
        .iter()
        .flat_map(|s| s.subsystems.iter().map(move |b| (b.id, (s.id, b.id))));
    resolve(input, "Subsystem", candidates)
}

/// Returns (system, subsystem, feature)
fn resolve_feature(store: &ProjectStore, input: &str) -> Result<(Uuid, Uuid, Uuid)> {
    let candidates = store.systems().iter().flat_map(|s| {
        s.subsystems.iter().flat_map(move |b| {
            b.features.iter().map(move |f| (f.id, (s.id, b.id, f.id)))
        })
    });
    resolve(input, "Feature", candidates)
}

fn resolve_requirement(store: &ProjectStore, input: &str) -> Result<Uuid> {
    resolve(input, "Requirement", store.requirements().iter().map(|r| (r.id, r.id)))
}

fn resolve_session(store: &ProjectStore, input: &str) -> Result<Uuid> {
    resolve(input, "Work session", store.work_sessions().iter().map(|s| (s.id, s.id)))
}

/// Resolves an id at any structural level into the selection that scopes to it
fn parse_scope(store: &ProjectStore, input: Option<&str>) -> Result<Selection> {
    let Some(input) = input else {
        return Ok(Selection::default());
    };

    let mut candidates: Vec<(Uuid, Selection)> = Vec::new();
    for system in store.systems() {
        candidates.push((
            system.id,
            Selection {
                system: Some(system.id),
                ..Default::default()
            },
        ));
        for subsystem in &system.subsystems {
            candidates.push((
                subsystem.id,
                Selection {
                    system: Some(system.id),
                    subsystem: Some(subsystem.id),
                    feature: None,
                },
            ));
            for feature in &subsystem.features {
                candidates.push((
                    feature.id,
                    Selection {
                        system: Some(system.id),
                        subsystem: Some(subsystem.id),
                        feature: Some(feature.id),
                    },
                ));
            }
        }
    }

    resolve(input, "Node", candidates)
}

fn require_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        anyhow::bail!("Name must not be empty");
    }
    Ok(trimmed)
}

fn short(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn confirmed(skip_confirm: bool, message: &str) -> Result<bool> {
    if skip_confirm || prompts::confirm(message)? {
        return Ok(true);
    }
    println!("{}", "Deletion cancelled.".yellow());
    Ok(false)
}

fn print_cascade(summary: &CascadeSummary) {
    println!(
        "  Removed {} subsystem(s), {} feature(s), {} requirement(s), {} work session(s)",
        summary.subsystems, summary.features, summary.requirements, summary.work_sessions
    );
}

fn edit_readme(ws: &mut Workspace, node: NodeRef, clear: bool) -> Result<()> {
    let name = ws.store().node_name(node).unwrap_or_default().to_string();
    let readme = if clear {
        None
    } else {
        let current = node_readme(ws.store(), node);
        prompts::prompt_readme(&name, current.as_deref())?
    };

    let had_text = readme.is_some();
    ws.apply(|s| s.set_readme(node, readme))?;
    if had_text {
        println!("{}", format!("Readme for '{}' saved.", name).green());
    } else {
        println!("{}", format!("Readme for '{}' cleared.", name).green());
    }
    Ok(())
}

fn node_readme(store: &ProjectStore, node: NodeRef) -> Option<String> {
    match node {
        NodeRef::System(id) => store.system(&id)?.readme.clone(),
        NodeRef::Subsystem(id) => store.subsystem(&id)?.readme.clone(),
        NodeRef::Feature(id) => store.feature(&id)?.readme.clone(),
    }
}

// ============================================================================
// Structure commands
// ============================================================================

fn handle_system_command(cmd: &SystemCommand, ws: &mut Workspace, yes: bool) -> Result<()> {
    match cmd {
        SystemCommand::Add { name, description } => {
            let name = require_name(name)?;
            let id = ws.apply(|s| Ok::<_, anyhow::Error>(s.create_system(name, description.as_str())))?;
            println!("{} {}", "System added:".green(), id);
        }
        SystemCommand::List => {
            let systems = ws.store().sorted_systems();
            if systems.is_empty() {
                println!("{}", "No systems found.".yellow());
                return Ok(());
            }
            println!("{:<8} | {:<30} | {:<10} | {:<8}", "ID", "Name", "Subsystems", "Folders");
            println!("{}", "-".repeat(66));
            for system in systems {
                println!(
                    "{:<8} | {:<30} | {:<10} | {:<8}",
                    short(&system.id),
                    system.name,
                    system.subsystems.len(),
                    system.folders.len()
                );
            }
        }
        SystemCommand::Rename { id, name } => {
            let id = resolve_system(ws.store(), id)?;
            let name = require_name(name)?;
            ws.apply(|s| s.rename_system(id, name))?;
            println!("{}", "System renamed.".green());
        }
        SystemCommand::Delete { id } => {
            let id = resolve_system(ws.store(), id)?;
            let name = ws.store().node_name(NodeRef::System(id)).unwrap_or_default();
            let message = format!("Delete system '{}' and everything under it?", name);
            if !confirmed(yes, &message)? {
                return Ok(());
            }
            let summary = ws.apply(|s| s.delete_system(id))?;
            println!("{}", "System deleted.".green());
            print_cascade(&summary);
        }
        SystemCommand::Describe { id, description } => {
            let id = resolve_system(ws.store(), id)?;
            ws.apply(|s| s.set_description(NodeRef::System(id), description.as_str()))?;
            println!("{}", "Description updated.".green());
        }
        SystemCommand::Readme { id, clear } => {
            let id = resolve_system(ws.store(), id)?;
            edit_readme(ws, NodeRef::System(id), *clear)?;
        }
        SystemCommand::Demote { source, target } => {
            let source = resolve_system(ws.store(), source)?;
            let target = resolve_system(ws.store(), target)?;
            let store = ws.store();
            let message = format!(
                "Fold system '{}' into '{}' as a subsystem? Its folders are dropped.",
                store.node_name(NodeRef::System(source)).unwrap_or_default(),
                store.node_name(NodeRef::System(target)).unwrap_or_default()
            );
            if !yes && !prompts::confirm(&message)? {
                println!("{}", "Demote cancelled.".yellow());
                return Ok(());
            }
            let subsystem = ws.apply(|s| s.demote_system(source, target))?;
            println!("{} {}", "System demoted into subsystem".green(), subsystem);
        }
        SystemCommand::Suggest { id, accept } => {
            let id = resolve_system(ws.store(), id)?;
            suggest_subsystems(ws, id, *accept || yes)?;
        }
    }

    Ok(())
}

fn handle_subsystem_command(cmd: &SubsystemCommand, ws: &mut Workspace, yes: bool) -> Result<()> {
    match cmd {
        SubsystemCommand::Add {
            system,
            name,
            description,
        } => {
            let system = resolve_system(ws.store(), system)?;
            let name = require_name(name)?;
            let id = ws.apply(|s| s.create_subsystem(system, name, description.as_str()))?;
            let color = ws
                .store()
                .subsystem(&id)
                .map(|b| b.color.clone())
                .unwrap_or_default();
            println!("{} {} ({})", "Subsystem added:".green(), id, color);
        }
        SubsystemCommand::Rename { id, name } => {
            let (_, id) = resolve_subsystem(ws.store(), id)?;
            let name = require_name(name)?;
            ws.apply(|s| s.rename_subsystem(id, name))?;
            println!("{}", "Subsystem renamed.".green());
        }
        SubsystemCommand::Delete { id } => {
            let (system, id) = resolve_subsystem(ws.store(), id)?;
            let name = ws.store().node_name(NodeRef::Subsystem(id)).unwrap_or_default();
            let message = format!("Delete subsystem '{}' with its features and requirements?", name);
            if !confirmed(yes, &message)? {
                return Ok(());
            }
            let summary = ws.apply(|s| s.delete_subsystem(system, id))?;
            println!("{}", "Subsystem deleted.".green());
            print_cascade(&summary);
        }
        SubsystemCommand::Move { id, system } => {
            let (_, id) = resolve_subsystem(ws.store(), id)?;
            let target = resolve_system(ws.store(), system)?;
            ws.apply(|s| s.move_subsystem(id, target))?;
            println!("{}", "Subsystem moved.".green());
        }
        SubsystemCommand::Readme { id, clear } => {
            let (_, id) = resolve_subsystem(ws.store(), id)?;
            edit_readme(ws, NodeRef::Subsystem(id), *clear)?;
        }
    }

    Ok(())
}

fn handle_feature_command(cmd: &FeatureCommand, ws: &mut Workspace, yes: bool) -> Result<()> {
    match cmd {
        FeatureCommand::Add {
            subsystem,
            name,
            description,
        } => {
            let (system, subsystem) = resolve_subsystem(ws.store(), subsystem)?;
            let name = require_name(name)?;
            let id = ws.apply(|s| s.create_feature(system, subsystem, name, description.as_str()))?;
            println!("{} {}", "Feature added:".green(), id);
        }
        FeatureCommand::Rename { id, name } => {
            let (_, _, id) = resolve_feature(ws.store(), id)?;
            let name = require_name(name)?;
            ws.apply(|s| s.rename_feature(id, name))?;
            println!("{}", "Feature renamed.".green());
        }
        FeatureCommand::Delete { id } => {
            let (system, subsystem, id) = resolve_feature(ws.store(), id)?;
            let name = ws.store().node_name(NodeRef::Feature(id)).unwrap_or_default();
            let message = format!("Delete feature '{}' with its requirements?", name);
            if !confirmed(yes, &message)? {
                return Ok(());
            }
            let summary = ws.apply(|s| s.delete_feature(system, subsystem, id))?;
            println!("{}", "Feature deleted.".green());
            print_cascade(&summary);
        }
        FeatureCommand::Move { id, subsystem } => {
            let (_, _, id) = resolve_feature(ws.store(), id)?;
            let (target_system, target_subsystem) = resolve_subsystem(ws.store(), subsystem)?;
            ws.apply(|s| s.move_feature(id, target_system, target_subsystem))?;
            println!("{}", "Feature moved.".green());
        }
        FeatureCommand::Readme { id, clear } => {
            let (_, _, id) = resolve_feature(ws.store(), id)?;
            edit_readme(ws, NodeRef::Feature(id), *clear)?;
        }
    }

    Ok(())
}

fn handle_folder_command(cmd: &FolderCommand, ws: &mut Workspace) -> Result<()> {
    match cmd {
        FolderCommand::Add {
            system,
            name,
            category,
            note,
        } => {
            let system = resolve_system(ws.store(), system)?;
            let name = require_name(name)?;
            let category: FolderCategory = category.parse().map_err(anyhow::Error::msg)?;
            let id = ws.apply(|s| s.add_system_folder(system, name, category, note.as_str()))?;
            println!("{} {}", "Folder added:".green(), id);
        }
        FolderCommand::Delete { system, id } => {
            let system = resolve_system(ws.store(), system)?;
            let folders = ws
                .store()
                .system(&system)
                .map(|s| s.folders.iter().map(|f| (f.id, f.id)).collect::<Vec<_>>())
                .unwrap_or_default();
            let id = resolve(id, "Folder", folders)?;
            ws.apply(|s| s.delete_system_folder(system, id))?;
            println!("{}", "Folder removed.".green());
        }
    }

    Ok(())
}

// ============================================================================
// Requirement commands
// ============================================================================

fn parse_status(status_str: &str) -> Result<RequirementStatus> {
    status_str.parse().map_err(anyhow::Error::msg)
}

fn parse_priority(priority_str: &str) -> Result<RequirementPriority> {
    priority_str.parse().map_err(anyhow::Error::msg)
}

fn status_label(status: RequirementStatus) -> ColoredString {
    match status {
        RequirementStatus::Backlog => status.label().dimmed(),
        RequirementStatus::ToDo => status.label().yellow(),
        RequirementStatus::InProgress => status.label().blue(),
        RequirementStatus::Done => status.label().green(),
    }
}

fn priority_label(priority: RequirementPriority) -> ColoredString {
    match priority {
        RequirementPriority::High => "High".red(),
        RequirementPriority::Medium => "Medium".yellow(),
        RequirementPriority::Low => "Low".green(),
    }
}

fn handle_req_command(cmd: &ReqCommand, ws: &mut Workspace, yes: bool) -> Result<()> {
    match cmd {
        ReqCommand::Add {
            feature,
            title,
            description,
            priority,
            status,
            interactive,
        } => {
            let (_, _, feature) = resolve_feature(ws.store(), feature)?;

            // Default to interactive mode if no title is provided
            let new = if *interactive || title.is_none() {
                prompts::prompt_new_requirement()?
            } else {
                let mut new = NewRequirement::new(
                    title.clone().unwrap_or_default(),
                    description.clone().unwrap_or_default(),
                );
                if let Some(p) = priority {
                    new = new.with_priority(parse_priority(p)?);
                }
                if let Some(s) = status {
                    new = new.with_status(parse_status(s)?);
                }
                new
            };

            if new.title.trim().is_empty() {
                anyhow::bail!("Title must not be empty");
            }

            let id = ws.apply(|s| s.add_requirement(feature, new))?;
            println!("{} {}", "Requirement added:".green(), id);
        }
        ReqCommand::List {
            scope,
            status,
            priority,
        } => {
            let scope = parse_scope(ws.store(), scope.as_deref())?;
            let mut requirements = ws.store().requirements_in(&scope);

            if let Some(status_str) = status {
                let status_filter = parse_status(status_str)?;
                requirements.retain(|r| r.status == status_filter);
            }
            if let Some(priority_str) = priority {
                let priority_filter = parse_priority(priority_str)?;
                requirements.retain(|r| r.priority == priority_filter);
            }

            list_requirements(ws.store(), &requirements);
        }
        ReqCommand::Show { id } => {
            let id = resolve_requirement(ws.store(), id)?;
            show_requirement(ws.store(), id)?;
        }
        ReqCommand::Status { id, status } => {
            let id = resolve_requirement(ws.store(), id)?;
            let status = parse_status(status)?;
            ws.apply(|s| s.update_requirement_status(id, status))?;
            println!("{} {}", "Status set to".green(), status_label(status));
        }
        ReqCommand::Advance { id } => {
            let id = resolve_requirement(ws.store(), id)?;
            let status = ws.apply(|s| s.advance_requirement(id))?;
            println!("{} {}", "Requirement now in".green(), status_label(status));
        }
        ReqCommand::Retreat { id } => {
            let id = resolve_requirement(ws.store(), id)?;
            let status = ws.apply(|s| s.retreat_requirement(id))?;
            println!("{} {}", "Requirement now in".green(), status_label(status));
        }
        ReqCommand::Edit {
            id,
            title,
            description,
            priority,
        } => {
            let id = resolve_requirement(ws.store(), id)?;
            let update = RequirementUpdate {
                title: title.as_deref().map(require_name).transpose()?.map(String::from),
                description: description.clone(),
                priority: priority.as_deref().map(parse_priority).transpose()?,
            };
            if update.is_empty() {
                println!("{}", "Nothing to change.".yellow());
                return Ok(());
            }
            ws.apply(|s| s.update_requirement(id, update))?;
            println!("{}", "Requirement updated.".green());
        }
        ReqCommand::Delete { id } => {
            let id = resolve_requirement(ws.store(), id)?;
            let req = ws.store().requirement(&id).context("Requirement not found")?;

            println!("{}", "Requirement to delete:".yellow());
            println!("  ID: {}", req.id);
            println!("  Title: {}", req.title);

            if !confirmed(yes, "Are you sure you want to delete this requirement?")? {
                return Ok(());
            }

            let sessions = ws.apply(|s| s.delete_requirement(id))?;
            println!("{}", "Requirement deleted successfully!".green());
            if sessions > 0 {
                println!("  Removed {} work session(s)", sessions);
            }
        }
        ReqCommand::Generate {
            feature,
            prompt,
            accept,
        } => {
            let (_, _, feature) = resolve_feature(ws.store(), feature)?;
            generate_requirements(ws, feature, prompt.as_deref(), *accept || yes)?;
        }
    }

    Ok(())
}

fn list_requirements(store: &ProjectStore, requirements: &[&Requirement]) {
    if requirements.is_empty() {
        println!("{}", "No requirements found.".yellow());
        return;
    }

    println!(
        "{:<8} | {:<40} | {:<11} | {:<8} | {:<20}",
        "ID", "Title", "Status", "Priority", "Feature"
    );
    println!("{}", "-".repeat(100));

    for req in requirements {
        let feature = req
            .feature_id
            .and_then(|f| store.node_name(NodeRef::Feature(f)))
            .unwrap_or("-");
        println!(
            "{:<8} | {:<40} | {:<11} | {:<8} | {:<20}",
            short(&req.id),
            req.title,
            status_label(req.status),
            priority_label(req.priority),
            feature
        );
    }
}

fn show_requirement(store: &ProjectStore, id: Uuid) -> Result<()> {
    let req = store.requirement(&id).context("Requirement not found")?;

    println!("{}: {}", "ID".blue(), req.id);
    println!("{}: {}", "Title".blue(), req.title);
    println!("{}: {}", "Description".blue(), req.description);
    println!("{}: {}", "Status".blue(), status_label(req.status));
    println!("{}: {}", "Priority".blue(), priority_label(req.priority));

    let system = store.node_name(NodeRef::System(req.system_id)).unwrap_or("?");
    let subsystem = req
        .subsystem_id
        .and_then(|id| store.node_name(NodeRef::Subsystem(id)))
        .unwrap_or("-");
    let feature = req
        .feature_id
        .and_then(|id| store.node_name(NodeRef::Feature(id)))
        .unwrap_or("-");
    println!(
        "{}: {} / {} / {}",
        "Location".blue(),
        system,
        subsystem,
        feature
    );

    println!("{}: {}", "Created".blue(), req.created_at.format("%Y-%m-%d %H:%M"));
    println!("{}: {}", "Updated".blue(), req.updated_at.format("%Y-%m-%d %H:%M"));
    if let Some(start) = req.start_date {
        println!("{}: {}", "Started".blue(), start.format("%Y-%m-%d %H:%M"));
    }
    if let Some(done) = req.completion_date {
        println!("{}: {}", "Completed".blue(), done.format("%Y-%m-%d %H:%M"));
    }

    let sessions: Vec<_> = store
        .work_sessions()
        .iter()
        .filter(|s| s.parent_id == req.id)
        .collect();
    if !sessions.is_empty() {
        println!("\n{}:", "Work sessions".green());
        for session in sessions {
            println!(
                "  {} {} {}",
                short(&session.id).yellow(),
                session.status,
                session.context
            );
        }
    }

    Ok(())
}

// ============================================================================
// AI drafting
// ============================================================================

fn ai_client() -> Result<AiClient> {
    let client = AiClient::new();
    if !client.is_available() {
        anyhow::bail!(
            "AI integration not available: install the claude CLI (or unset {})",
            nebula_core::ai::client::AI_DISABLED_ENV
        );
    }
    println!("{} {}", "Using".dimmed(), client.mode_description().dimmed());
    Ok(client)
}

fn generate_requirements(
    ws: &mut Workspace,
    feature_id: Uuid,
    prompt: Option<&str>,
    accept: bool,
) -> Result<()> {
    let feature_name = ws
        .store()
        .node_name(NodeRef::Feature(feature_id))
        .unwrap_or_default()
        .to_string();
    let prompt = match prompt {
        Some(p) => p.to_string(),
        None => prompts::prompt_generation_request(&feature_name)?,
    };

    let request = build_feature_request(ws.store(), &feature_id, &prompt)
        .context("Feature not found")?;
    let client = ai_client()?;
    let mut drafts = client.generate(&request);

    if drafts.is_empty() {
        println!("{}", "No requirements drafted.".yellow());
        return Ok(());
    }

    if !accept {
        let labels = drafts
            .iter()
            .map(|d| format!("[{}] {}", d.priority, d.title))
            .collect();
        let keep = prompts::prompt_pick("Requirements to add:", labels)?;
        drafts = keep.into_iter().map(|i| drafts[i].clone()).collect();
    }

    let ids = ws.apply(|s| s.add_drafts(feature_id, drafts))?;
    println!(
        "{}",
        format!("Added {} requirement(s) to '{}'.", ids.len(), feature_name).green()
    );
    Ok(())
}

fn suggest_subsystems(ws: &mut Workspace, system_id: Uuid, accept: bool) -> Result<()> {
    let system = ws.store().system(&system_id).context("System not found")?;
    let (name, description) = (system.name.clone(), system.description.clone());

    let client = ai_client()?;
    let mut suggestions = client.suggest_subsystems(&name, &description);
    if suggestions.is_empty() {
        println!("{}", "No subsystems suggested.".yellow());
        return Ok(());
    }

    if !accept {
        let labels = suggestions
            .iter()
            .map(|s| format!("{}: {}", s.name, s.description))
            .collect();
        let keep = prompts::prompt_pick("Subsystems to create:", labels)?;
        suggestions = keep.into_iter().map(|i| suggestions[i].clone()).collect();
    }

    let created = ws.apply(|s| {
        suggestions
            .iter()
            .map(|sg| s.create_subsystem(system_id, sg.name.as_str(), sg.description.as_str()))
            .collect::<Result<Vec<_>, _>>()
    })?;
    println!(
        "{}",
        format!("Created {} subsystem(s) in '{}'.", created.len(), name).green()
    );
    Ok(())
}

// ============================================================================
// Work sessions
// ============================================================================

fn handle_session_command(cmd: &SessionCommand, ws: &mut Workspace, yes: bool) -> Result<()> {
    match cmd {
        SessionCommand::Add {
            parent_type,
            parent,
            context,
            platform,
            model,
        } => {
            let parent_type: ParentType = parent_type.parse().map_err(anyhow::Error::msg)?;
            let store = ws.store();
            let parent_id = match parent_type {
                ParentType::System => resolve_system(store, parent)?,
                ParentType::Subsystem => resolve_subsystem(store, parent)?.1,
                ParentType::Feature => resolve_feature(store, parent)?.2,
                ParentType::Requirement => resolve_requirement(store, parent)?,
            };
            let id = ws.apply(|s| {
                s.add_work_session(
                    parent_type,
                    parent_id,
                    context.as_str(),
                    platform.as_str(),
                    model.as_str(),
                )
            })?;
            println!("{} {}", "Work session recorded:".green(), id);
        }
        SessionCommand::List { scope } => {
            let scope = parse_scope(ws.store(), scope.as_deref())?;
            let sessions = ws.store().work_sessions_in(&scope);
            if sessions.is_empty() {
                println!("{}", "No work sessions found.".yellow());
                return Ok(());
            }

            println!(
                "{:<8} | {:<9} | {:<11} | {:<24} | {:<16} | {}",
                "ID", "Status", "Parent", "Name", "Created", "Context"
            );
            println!("{}", "-".repeat(100));
            for session in sessions {
                let status = match session.status {
                    SessionStatus::Pending => "Pending".yellow(),
                    SessionStatus::Completed => "Completed".green(),
                };
                println!(
                    "{:<8} | {:<9} | {:<11} | {:<24} | {:<16} | {}",
                    short(&session.id),
                    status,
                    session.parent_type.to_string(),
                    session.parent_name,
                    session.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    session.context
                );
                if let Some(outcome) = &session.outcome {
                    println!("{:>10} {}", "→".dimmed(), outcome.dimmed());
                }
            }
        }
        SessionCommand::Complete { id, outcome } => {
            let id = resolve_session(ws.store(), id)?;
            ws.apply(|s| s.complete_work_session(id, outcome.as_str()))?;
            println!("{}", "Work session completed.".green());
        }
        SessionCommand::Delete { id } => {
            let id = resolve_session(ws.store(), id)?;
            if !confirmed(yes, "Delete this work session?")? {
                return Ok(());
            }
            ws.apply(|s| s.delete_work_session(id))?;
            println!("{}", "Work session deleted.".green());
        }
    }

    Ok(())
}

// ============================================================================
// Views
// ============================================================================

/// Parses "#RRGGBB"
fn hex_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn swatch(color: &str) -> ColoredString {
    match hex_rgb(color) {
        Some((r, g, b)) => "●".truecolor(r, g, b),
        None => "●".normal(),
    }
}

fn count_requirements(store: &ProjectStore, pred: impl Fn(&Requirement) -> bool) -> usize {
    store.requirements().iter().filter(|r| pred(r)).count()
}

fn print_tree(store: &ProjectStore) {
    let systems = store.sorted_systems();
    if systems.is_empty() {
        println!("{}", "No systems found.".yellow());
        return;
    }

    for system in &systems {
        println!(
            "{} {}",
            system.name.bold(),
            format!("[{}]", short(&system.id)).dimmed()
        );
        for folder in &system.folders {
            println!("  {} {} ({})", "▸".dimmed(), folder.name.cyan(), folder.category);
        }
        for subsystem in &system.subsystems {
            println!(
                "  {} {} {}",
                swatch(&subsystem.color),
                subsystem.name,
                format!("[{}]", short(&subsystem.id)).dimmed()
            );
            for feature in &subsystem.features {
                let reqs = count_requirements(store, |r| r.feature_id == Some(feature.id));
                println!(
                    "      {} {} {}",
                    feature.name,
                    format!("[{}]", short(&feature.id)).dimmed(),
                    format!("({} req)", reqs).dimmed()
                );
            }
            let loose = count_requirements(store, |r| {
                r.subsystem_id == Some(subsystem.id) && r.feature_id.is_none()
            });
            if loose > 0 {
                println!("      {}", format!("({} req without a feature)", loose).dimmed());
            }
        }
        let loose = count_requirements(store, |r| r.system_id == system.id && r.subsystem_id.is_none());
        if loose > 0 {
            println!("  {}", format!("({} req without a subsystem)", loose).dimmed());
        }
    }
}

fn print_board(store: &ProjectStore, scope: &Selection) {
    let requirements = store.requirements_in(scope);

    for status in RequirementStatus::ALL {
        let column: Vec<_> = requirements.iter().filter(|r| r.status == status).collect();
        println!(
            "{} {}",
            status_label(status).bold(),
            format!("({})", column.len()).dimmed()
        );
        for req in column {
            let color = req
                .subsystem_id
                .and_then(|id| store.subsystem(&id))
                .map(|b| swatch(&b.color))
                .unwrap_or_else(|| " ".normal());
            println!(
                "  {} {} {} {}",
                color,
                short(&req.id).dimmed(),
                req.title,
                priority_label(req.priority)
            );
        }
        println!();
    }
}

// ============================================================================
// Export / import
// ============================================================================

fn handle_export_command(store: &ProjectStore, format: &str, output: Option<&Path>) -> Result<()> {
    match format.to_lowercase().as_str() {
        "json" => export_json(store, output.unwrap_or(Path::new("nebula-export.json"))),
        "markdown" | "md" => export_markdown(store, output.unwrap_or(Path::new("nebula.md"))),
        other => anyhow::bail!("Unknown export format: {} (expected json or markdown)", other),
    }
}

fn handle_import_command(ws: &mut Workspace, input: &Path, yes: bool) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    if !yes && !yes_to_import(ws.store(), input)? {
        return Ok(());
    }

    let report = ws.apply(|s| import_json(s, &text))?;
    println!("Imported from {}", input.display());
    println!("  Systems: {}", report.systems);
    println!("  Requirements: {}", report.requirements);
    println!("  Work sessions: {}", report.work_sessions);

    if !report.replaced_any() {
        println!("{}", "Nothing was imported.".yellow());
    }

    let inconsistent = ws.store().inconsistent_requirements();
    if !inconsistent.is_empty() {
        println!(
            "{}",
            format!(
                "{} requirement(s) reference nodes that do not match the tree.",
                inconsistent.len()
            )
            .yellow()
        );
    }
    Ok(())
}

/// Imports replace whole collections; only ask when there is something to lose
fn yes_to_import(store: &ProjectStore, input: &Path) -> Result<bool> {
    if store.snapshot().is_empty() {
        return Ok(true);
    }
    let message = format!("Replace current data with the contents of {}?", input.display());
    if prompts::confirm(&message)? {
        return Ok(true);
    }
    println!("{}", "Import cancelled.".yellow());
    Ok(false)
}

// ============================================================================
// Registry
// ============================================================================

fn handle_db_command(cmd: &DbCommand, cli: &Cli) -> Result<()> {
    let registry_path = get_registry_path()?;

    match cmd {
        DbCommand::Register {
            name,
            path,
            description,
            default,
            interactive,
        } => {
            let mut registry = Registry::load_or_default(&registry_path)?;

            let should_be_interactive =
                *interactive || (name.is_none() && path.is_none() && description.is_none());

            let (project_name, project_path, project_description, is_default) =
                if should_be_interactive {
                    prompts::prompt_register_project()?
                } else {
                    let project_name = name
                        .clone()
                        .ok_or_else(|| anyhow::anyhow!("Project name is required"))?;
                    let project_path = path
                        .clone()
                        .ok_or_else(|| anyhow::anyhow!("Project path is required"))?;
                    let project_description = description.clone().unwrap_or_default();
                    (project_name, project_path, project_description, *default)
                };

            let project_name = require_name(&project_name)?.to_string();
            registry.register_project(
                project_name.clone(),
                project_path.to_string_lossy().to_string(),
                project_description,
            );
            if is_default {
                registry.set_default_project(&project_name)?;
            }
            registry.save(&registry_path)?;

            println!(
                "{}",
                format!("Project '{}' registered successfully!", project_name).green()
            );
            if is_default {
                println!("{}", "Set as default project.".green());
            }
        }
        DbCommand::Path { name } => {
            if let Some(name) = name {
                let registry = Registry::load_or_default(&registry_path)?;
                let project = registry
                    .get_project(name)
                    .with_context(|| format!("Project '{}' not found in registry", name))?;
                println!("{}", project.path);
            } else {
                let path = determine_store_path(cli.file.as_deref(), cli.project.as_deref())?;
                println!("{}", path.display());
            }
        }
        DbCommand::List => {
            let registry = Registry::load_or_default(&registry_path)?;
            let names = registry.list_projects();
            if names.is_empty() {
                println!("{}", "No projects registered.".yellow());
                return Ok(());
            }
            let default = registry.default_project.as_deref();
            for name in names {
                if let Some(project) = registry.get_project(name) {
                    let marker = if Some(name) == default { "*" } else { " " };
                    println!(
                        "{} {:<20} {} {}",
                        marker.green(),
                        name.bold(),
                        project.path,
                        project.description.dimmed()
                    );
                }
            }
        }
    }

    Ok(())
}
