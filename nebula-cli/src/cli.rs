use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Plan systems, subsystems, features and requirements")]
pub struct Cli {
    /// Path to the store file (.yaml or .db)
    #[clap(long, global = true)]
    pub file: Option<PathBuf>,

    /// Project name to use from central registry
    #[clap(long, short = 'p', global = true)]
    pub project: Option<String>,

    /// Skip confirmation prompts
    #[clap(long, short = 'y', global = true)]
    pub yes: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// System management commands
    #[clap(subcommand)]
    System(SystemCommand),

    /// Subsystem management commands
    #[clap(subcommand)]
    Subsystem(SubsystemCommand),

    /// Feature management commands
    #[clap(subcommand)]
    Feature(FeatureCommand),

    /// Code folders annotated on a system
    #[clap(subcommand)]
    Folder(FolderCommand),

    /// Requirement commands
    #[clap(subcommand)]
    Req(ReqCommand),

    /// Work session log
    #[clap(subcommand)]
    Session(SessionCommand),

    /// Print the hierarchy
    Tree,

    /// Print requirements as Kanban columns
    Board {
        /// Limit to a system, subsystem or feature (ID or prefix)
        #[clap(long)]
        scope: Option<String>,
    },

    /// Export the store
    Export {
        /// Output format (json, markdown)
        #[clap(long, short = 'f', default_value = "json")]
        format: String,

        /// Output file path
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Replace collections from a JSON export
    Import {
        /// JSON file to read
        #[clap(long, short = 'i')]
        input: PathBuf,
    },

    /// Database registry commands
    #[clap(subcommand)]
    Db(DbCommand),
}

#[derive(Subcommand, Debug)]
pub enum SystemCommand {
    /// Add a new system
    Add {
        /// Name of the system
        name: String,

        #[clap(long, short = 'd', default_value = "")]
        description: String,
    },

    /// List all systems, sorted by name
    List,

    /// Rename a system
    Rename {
        /// The ID (or prefix) of the system
        id: String,

        /// New name
        name: String,
    },

    /// Delete a system with everything under it
    Delete {
        /// The ID (or prefix) of the system
        id: String,
    },

    /// Set the description of a system
    Describe {
        /// The ID (or prefix) of the system
        id: String,

        /// New description
        description: String,
    },

    /// Edit or clear the readme of a system
    Readme {
        /// The ID (or prefix) of the system
        id: String,

        /// Remove the readme
        #[clap(long)]
        clear: bool,
    },

    /// Fold a system into another as a single subsystem
    Demote {
        /// The system to demote
        source: String,

        /// The system that receives it
        target: String,
    },

    /// Ask the AI for subsystem ideas
    Suggest {
        /// The ID (or prefix) of the system
        id: String,

        /// Create every suggestion without asking
        #[clap(long)]
        accept: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SubsystemCommand {
    /// Add a subsystem to a system
    Add {
        /// The parent system ID (or prefix)
        #[clap(long, short = 's')]
        system: String,

        /// Name of the subsystem
        name: String,

        #[clap(long, short = 'd', default_value = "")]
        description: String,
    },

    /// Rename a subsystem
    Rename { id: String, name: String },

    /// Delete a subsystem with its features and requirements
    Delete { id: String },

    /// Move a subsystem to another system
    Move {
        id: String,

        /// Target system ID (or prefix)
        #[clap(long, short = 's')]
        system: String,
    },

    /// Edit or clear the readme of a subsystem
    Readme {
        id: String,

        #[clap(long)]
        clear: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum FeatureCommand {
    /// Add a feature to a subsystem
    Add {
        /// The parent subsystem ID (or prefix)
        #[clap(long)]
        subsystem: String,

        /// Name of the feature
        name: String,

        #[clap(long, short = 'd', default_value = "")]
        description: String,
    },

    /// Rename a feature
    Rename { id: String, name: String },

    /// Delete a feature with its requirements
    Delete { id: String },

    /// Move a feature to another subsystem
    Move {
        id: String,

        /// Target subsystem ID (or prefix)
        #[clap(long)]
        subsystem: String,
    },

    /// Edit or clear the readme of a feature
    Readme {
        id: String,

        #[clap(long)]
        clear: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum FolderCommand {
    /// Annotate a system with a code folder
    Add {
        /// The system ID (or prefix)
        #[clap(long, short = 's')]
        system: String,

        /// Folder name or path
        name: String,

        /// Category (ui, service, library)
        #[clap(long, short = 'c', default_value = "service")]
        category: String,

        #[clap(long, default_value = "")]
        note: String,
    },

    /// Remove a folder from a system
    Delete {
        #[clap(long, short = 's')]
        system: String,

        /// The folder ID (or prefix)
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReqCommand {
    /// Add a new requirement to a feature
    Add {
        /// The feature ID (or prefix)
        #[clap(long)]
        feature: String,

        #[clap(long, short = 't')]
        title: Option<String>,

        #[clap(long, short = 'd')]
        description: Option<String>,

        /// Priority (high, medium, low)
        #[clap(long)]
        priority: Option<String>,

        /// Status (backlog, todo, inprogress, done)
        #[clap(long)]
        status: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List requirements, optionally scoped and filtered
    List {
        /// Limit to a system, subsystem or feature (ID or prefix)
        #[clap(long)]
        scope: Option<String>,

        #[clap(long)]
        status: Option<String>,

        #[clap(long)]
        priority: Option<String>,
    },

    /// Show details for a requirement
    Show { id: String },

    /// Set the status of a requirement
    Status { id: String, status: String },

    /// Move a requirement one column right
    Advance { id: String },

    /// Move a requirement one column left
    Retreat { id: String },

    /// Edit a requirement
    Edit {
        id: String,

        #[clap(long, short = 't')]
        title: Option<String>,

        #[clap(long, short = 'd')]
        description: Option<String>,

        #[clap(long)]
        priority: Option<String>,
    },

    /// Delete a requirement
    Delete { id: String },

    /// Draft requirements for a feature with the AI
    Generate {
        /// The feature ID (or prefix)
        #[clap(long)]
        feature: String,

        /// What to ask for
        prompt: Option<String>,

        /// Add every draft without asking
        #[clap(long)]
        accept: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Record a work session against a node
    Add {
        /// Parent type (system, subsystem, feature, requirement)
        #[clap(long = "type")]
        parent_type: String,

        /// Parent ID (or prefix)
        #[clap(long)]
        parent: String,

        #[clap(long, default_value = "")]
        context: String,

        #[clap(long, default_value = "")]
        platform: String,

        #[clap(long, default_value = "")]
        model: String,
    },

    /// List work sessions, optionally scoped
    List {
        #[clap(long)]
        scope: Option<String>,
    },

    /// Mark a session completed
    Complete { id: String, outcome: String },

    /// Delete a session
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Register a project in the registry
    Register {
        /// Name of the project
        #[clap(long)]
        name: Option<String>,

        /// Path to the store file
        #[clap(long)]
        path: Option<PathBuf>,

        /// Description of the project
        #[clap(long)]
        description: Option<String>,

        /// Set this project as the default
        #[clap(long)]
        default: bool,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// Print the path to the store file
    Path {
        /// The name of the project to lookup
        #[clap(long)]
        name: Option<String>,
    },

    /// List registered projects
    List,
}
