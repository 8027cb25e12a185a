pub mod ai;
pub mod db;
pub mod export;
pub mod models;
pub mod palette;
pub mod project;
pub mod registry;
pub mod selection;
pub mod storage;
pub mod store;
pub mod workspace;

// Re-export commonly used types
pub use ai::{AiClient, AiError, AiMode, DraftGenerator, DraftRequest, RequirementDraft};
pub use db::{create_backend, BackendType, DatabaseBackend, DatabaseStats};
pub use export::{
    export_json, export_markdown, export_snapshot, import_json, render_markdown, ImportError,
    ImportReport, KeyOutcome,
};
pub use models::{
    Feature, FolderCategory, NewRequirement, ParentType, Requirement, RequirementPriority,
    RequirementStatus, RequirementUpdate, SessionStatus, Snapshot, Subsystem, System,
    SystemFolder, WorkSession,
};
pub use project::determine_store_path;
pub use registry::{get_registry_path, Registry};
pub use selection::{Selection, StoreEvent};
pub use storage::Storage;
pub use store::{CascadeSummary, NodeRef, ProjectStore, StoreError};
pub use workspace::Workspace;
