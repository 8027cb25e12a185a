use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kanban column a requirement sits in, ordered left to right
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RequirementStatus {
    #[default]
    Backlog,
    ToDo,
    InProgress,
    Done,
}

impl RequirementStatus {
    /// All columns in board order
    pub const ALL: [RequirementStatus; 4] = [
        RequirementStatus::Backlog,
        RequirementStatus::ToDo,
        RequirementStatus::InProgress,
        RequirementStatus::Done,
    ];

    /// The column to the right, if any
    pub fn next(self) -> Option<Self> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// The column to the left, if any
    pub fn previous(self) -> Option<Self> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        idx.checked_sub(1).map(|i| Self::ALL[i])
    }

    /// Human readable column header ("In Progress" rather than "InProgress")
    pub fn label(self) -> &'static str {
        match self {
            RequirementStatus::Backlog => "Backlog",
            RequirementStatus::ToDo => "To Do",
            RequirementStatus::InProgress => "In Progress",
            RequirementStatus::Done => "Done",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequirementStatus::Backlog => "Backlog",
            RequirementStatus::ToDo => "ToDo",
            RequirementStatus::InProgress => "InProgress",
            RequirementStatus::Done => "Done",
        }
    }
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for RequirementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-', '_'], "").as_str() {
            "backlog" => Ok(RequirementStatus::Backlog),
            "todo" => Ok(RequirementStatus::ToDo),
            "inprogress" => Ok(RequirementStatus::InProgress),
            "done" => Ok(RequirementStatus::Done),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

/// Represents the priority of a requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RequirementPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl RequirementPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            RequirementPriority::Low => "Low",
            RequirementPriority::Medium => "Medium",
            RequirementPriority::High => "High",
        }
    }
}

impl fmt::Display for RequirementPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RequirementPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RequirementPriority::Low),
            "medium" => Ok(RequirementPriority::Medium),
            "high" => Ok(RequirementPriority::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Kind of code unit a system folder annotates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FolderCategory {
    #[serde(rename = "UI")]
    Ui,
    Service,
    Library,
}

impl fmt::Display for FolderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderCategory::Ui => write!(f, "UI"),
            FolderCategory::Service => write!(f, "Service"),
            FolderCategory::Library => write!(f, "Library"),
        }
    }
}

impl FromStr for FolderCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ui" => Ok(FolderCategory::Ui),
            "service" => Ok(FolderCategory::Service),
            "library" | "lib" => Ok(FolderCategory::Library),
            _ => Err(format!("Invalid folder category: {}", s)),
        }
    }
}

/// Annotation on a system pointing at a folder of source code.
/// Never referenced by requirements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SystemFolder {
    pub id: Uuid,
    pub name: String,
    pub category: FolderCategory,
    #[serde(default)]
    pub note: String,
}

impl SystemFolder {
    pub fn new(name: String, category: FolderCategory, note: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            category,
            note,
        }
    }
}

/// Leaf grouping under a subsystem. Has no children by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    /// Parent reference
    pub subsystem_id: Uuid,
}

impl Feature {
    pub fn new(subsystem_id: Uuid, name: String, description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            readme: None,
            subsystem_id,
        }
    }
}

/// A named subdivision of a system, carrying a display color
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subsystem {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    /// Hex code, e.g. "#3B82F6"
    pub color: String,
    /// Parent reference
    pub system_id: Uuid,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl Subsystem {
    pub fn new(system_id: Uuid, name: String, description: String, color: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            readme: None,
            color,
            system_id,
            features: Vec::new(),
        }
    }

    pub fn feature(&self, id: &Uuid) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == *id)
    }
}

/// Top-level project/product grouping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<SystemFolder>,
    #[serde(default)]
    pub subsystems: Vec<Subsystem>,
}

impl System {
    pub fn new(name: String, description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            readme: None,
            folders: Vec::new(),
            subsystems: Vec::new(),
        }
    }

    pub fn subsystem(&self, id: &Uuid) -> Option<&Subsystem> {
        self.subsystems.iter().find(|s| s.id == *id)
    }

    /// Colors already taken by direct subsystems
    pub fn used_colors(&self) -> impl Iterator<Item = &str> {
        self.subsystems.iter().map(|s| s.color.as_str())
    }
}

/// A trackable unit of work.
///
/// `system_id`, `subsystem_id` and `feature_id` are a denormalized copy of the
/// ancestry of the feature the requirement belongs to. They are maintained by
/// the store and must not be edited independently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: RequirementStatus,
    pub priority: RequirementPriority,
    pub system_id: Uuid,
    /// `None` only for requirements left attached to a whole system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsystem_id: Option<Uuid>,
    /// `None` for requirements attached directly to a subsystem (after a demote)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied part of a requirement; identity, timestamps and ancestry
/// are assigned by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequirement {
    pub title: String,
    pub description: String,
    pub priority: RequirementPriority,
    pub status: RequirementStatus,
}

impl NewRequirement {
    /// A Backlog requirement with Medium priority
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            priority: RequirementPriority::default(),
            status: RequirementStatus::default(),
        }
    }

    pub fn with_priority(mut self, priority: RequirementPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: RequirementStatus) -> Self {
        self.status = status;
        self
    }
}

/// Partial edit of a requirement's user-editable fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<RequirementPriority>,
}

impl RequirementUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.priority.is_none()
    }
}

/// Kind of hierarchy node a work session is attached to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ParentType {
    System,
    Subsystem,
    Feature,
    Requirement,
}

impl fmt::Display for ParentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentType::System => write!(f, "System"),
            ParentType::Subsystem => write!(f, "Subsystem"),
            ParentType::Feature => write!(f, "Feature"),
            ParentType::Requirement => write!(f, "Requirement"),
        }
    }
}

impl FromStr for ParentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "system" => Ok(ParentType::System),
            "subsystem" => Ok(ParentType::Subsystem),
            "feature" => Ok(ParentType::Feature),
            "requirement" | "req" => Ok(ParentType::Requirement),
            _ => Err(format!("Invalid parent type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Pending,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Pending => write!(f, "Pending"),
            SessionStatus::Completed => write!(f, "Completed"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(SessionStatus::Pending),
            "completed" => Ok(SessionStatus::Completed),
            _ => Err(format!("Invalid session status: {}", s)),
        }
    }
}

/// Historical record of an external AI drafting/assistance session.
///
/// `parent_id` is a loose reference: the store does not keep it pointing at a
/// live node, and `parent_name` is a point-in-time label that renames do not
/// refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkSession {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub parent_type: ParentType,
    pub parent_name: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub model: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The three persisted collections, as handed to and from a backend
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub systems: Vec<System>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub work_sessions: Vec<WorkSession>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty() && self.requirements.is_empty() && self.work_sessions.is_empty()
    }
}
