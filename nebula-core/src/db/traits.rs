//! Database abstraction traits
//!
//! This module defines the core trait that all storage backends must implement.

use anyhow::Result;
use std::path::Path;

use crate::models::Snapshot;

/// Types of database backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// YAML file storage (single file)
    Yaml,
    /// SQLite database storage
    Sqlite,
}

impl BackendType {
    /// Infers the backend from a file extension, defaulting to YAML
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("db") | Some("sqlite") | Some("sqlite3") => BackendType::Sqlite,
            _ => BackendType::Yaml,
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Yaml => write!(f, "YAML"),
            BackendType::Sqlite => write!(f, "SQLite"),
        }
    }
}

/// Core trait for storage backends.
///
/// Backends move whole snapshots: the store is always loaded and saved as a
/// unit, so there are no per-entity operations here.
pub trait DatabaseBackend: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    /// Returns the path to the database file
    fn path(&self) -> &Path;

    /// Loads the full snapshot; `None` when nothing has been saved yet
    fn load(&self) -> Result<Option<Snapshot>>;

    /// Replaces the persisted snapshot
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Returns true if the database file exists
    fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Returns statistics about the database
    fn stats(&self) -> Result<DatabaseStats> {
        let snapshot = self.load()?.unwrap_or_default();
        Ok(DatabaseStats::of(&snapshot, self.backend_type()))
    }
}

/// Statistics about a database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub system_count: usize,
    pub subsystem_count: usize,
    pub feature_count: usize,
    pub requirement_count: usize,
    pub work_session_count: usize,
    pub backend_type: BackendType,
}

impl DatabaseStats {
    pub fn of(snapshot: &Snapshot, backend_type: BackendType) -> Self {
        let subsystems = snapshot.systems.iter().flat_map(|s| s.subsystems.iter());
        Self {
            system_count: snapshot.systems.len(),
            subsystem_count: subsystems.clone().count(),
            feature_count: subsystems.map(|b| b.features.len()).sum(),
            requirement_count: snapshot.requirements.len(),
            work_session_count: snapshot.work_sessions.len(),
            backend_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProjectStore;
    use std::path::PathBuf;

    #[test]
    fn test_backend_from_extension() {
        assert_eq!(BackendType::from_path(&PathBuf::from("a.yaml")), BackendType::Yaml);
        assert_eq!(BackendType::from_path(&PathBuf::from("a.yml")), BackendType::Yaml);
        assert_eq!(BackendType::from_path(&PathBuf::from("a.DB")), BackendType::Sqlite);
        assert_eq!(BackendType::from_path(&PathBuf::from("a.sqlite3")), BackendType::Sqlite);
        assert_eq!(BackendType::from_path(&PathBuf::from("plans")), BackendType::Yaml);
    }

    #[test]
    fn test_stats_counts_every_level() {
        let stats = DatabaseStats::of(&ProjectStore::seeded().snapshot(), BackendType::Yaml);
        assert_eq!(stats.system_count, 1);
        assert_eq!(stats.subsystem_count, 1);
        assert_eq!(stats.feature_count, 1);
        assert_eq!(stats.requirement_count, 0);
    }
}
