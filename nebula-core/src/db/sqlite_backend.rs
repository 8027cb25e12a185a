//! SQLite database storage backend
//!
//! Stores the forest in one table per level, plus flat requirement and work
//! session tables. Every save rewrites the whole snapshot inside a single
//! transaction.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{
    Feature, FolderCategory, ParentType, Requirement, RequirementPriority, RequirementStatus,
    SessionStatus, Snapshot, Subsystem, System, SystemFolder, WorkSession,
};

use super::traits::{BackendType, DatabaseBackend};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite backend implementation
pub struct SqliteBackend {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (or creates) the database and its schema
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open SQLite database {:?}", path))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        let backend = Self {
            path,
            conn: Mutex::new(conn),
        };

        backend.init_schema()?;
        Ok(backend)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.connection()?;

        let current_version: i32 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        if current_version == 0 {
            debug!("creating schema v{} in {:?}", SCHEMA_VERSION, self.path);
            conn.execute_batch(include_str!("schema.sql"))?;
        } else if current_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Database schema version {} is not supported, expected {}",
                current_version,
                SCHEMA_VERSION
            );
        }

        Ok(())
    }

    fn load_systems(conn: &Connection) -> Result<Vec<System>> {
        let mut folders = Self::load_folders(conn)?;
        let mut subsystems = Self::load_subsystems(conn)?;

        let mut stmt =
            conn.prepare("SELECT id, name, description, readme FROM systems ORDER BY position")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut systems = Vec::new();
        for row in rows {
            let (id_str, name, description, readme) = row?;
            let id = parse_uuid(&id_str)?;
            systems.push(System {
                id,
                name,
                description,
                readme,
                folders: folders.remove(&id).unwrap_or_default(),
                subsystems: subsystems.remove(&id).unwrap_or_default(),
            });
        }
        Ok(systems)
    }

    /// Folders grouped by owning system, in sibling order
    fn load_folders(conn: &Connection) -> Result<HashMap<Uuid, Vec<SystemFolder>>> {
        let mut stmt = conn.prepare(
            "SELECT id, system_id, name, category, note FROM system_folders ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut grouped: HashMap<Uuid, Vec<SystemFolder>> = HashMap::new();
        for row in rows {
            let (id, system_id, name, category, note) = row?;
            grouped
                .entry(parse_uuid(&system_id)?)
                .or_default()
                .push(SystemFolder {
                    id: parse_uuid(&id)?,
                    name,
                    category: parse_enum::<FolderCategory>(&category)?,
                    note,
                });
        }
        Ok(grouped)
    }

    /// Subsystems (with their features) grouped by owning system
    fn load_subsystems(conn: &Connection) -> Result<HashMap<Uuid, Vec<Subsystem>>> {
        let mut features = Self::load_features(conn)?;

        let mut stmt = conn.prepare(
            "SELECT id, system_id, name, description, readme, color
             FROM subsystems ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut grouped: HashMap<Uuid, Vec<Subsystem>> = HashMap::new();
        for row in rows {
            let (id_str, system_id, name, description, readme, color) = row?;
            let id = parse_uuid(&id_str)?;
            let system_id = parse_uuid(&system_id)?;
            grouped.entry(system_id).or_default().push(Subsystem {
                id,
                name,
                description,
                readme,
                color,
                system_id,
                features: features.remove(&id).unwrap_or_default(),
            });
        }
        Ok(grouped)
    }

    fn load_features(conn: &Connection) -> Result<HashMap<Uuid, Vec<Feature>>> {
        let mut stmt = conn.prepare(
            "SELECT id, subsystem_id, name, description, readme FROM features ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut grouped: HashMap<Uuid, Vec<Feature>> = HashMap::new();
        for row in rows {
            let (id, subsystem_id, name, description, readme) = row?;
            let subsystem_id = parse_uuid(&subsystem_id)?;
            grouped.entry(subsystem_id).or_default().push(Feature {
                id: parse_uuid(&id)?,
                name,
                description,
                readme,
                subsystem_id,
            });
        }
        Ok(grouped)
    }

    fn load_requirements(conn: &Connection) -> Result<Vec<Requirement>> {
        let mut stmt = conn.prepare(
            "SELECT id, title, description, status, priority, system_id, subsystem_id,
                    feature_id, start_date, completion_date, created_at, updated_at
             FROM requirements ORDER BY position",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, Option<String>>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, String>(11)?,
            ))
        })?;

        let mut requirements = Vec::new();
        for row in rows {
            let (
                id,
                title,
                description,
                status,
                priority,
                system_id,
                subsystem_id,
                feature_id,
                start_date,
                completion_date,
                created_at,
                updated_at,
            ) = row?;

            requirements.push(Requirement {
                id: parse_uuid(&id)?,
                title,
                description,
                status: parse_enum::<RequirementStatus>(&status)?,
                priority: parse_enum::<RequirementPriority>(&priority)?,
                system_id: parse_uuid(&system_id)?,
                subsystem_id: subsystem_id.as_deref().map(parse_uuid).transpose()?,
                feature_id: feature_id.as_deref().map(parse_uuid).transpose()?,
                start_date: start_date.as_deref().map(parse_time).transpose()?,
                completion_date: completion_date.as_deref().map(parse_time).transpose()?,
                created_at: parse_time(&created_at)?,
                updated_at: parse_time(&updated_at)?,
            });
        }
        Ok(requirements)
    }

    fn load_work_sessions(conn: &Connection) -> Result<Vec<WorkSession>> {
        let mut stmt = conn.prepare(
            "SELECT id, parent_id, parent_type, parent_name, context, platform, model,
                    status, outcome, created_at, updated_at
             FROM work_sessions ORDER BY position",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, Option<String>>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (
                id,
                parent_id,
                parent_type,
                parent_name,
                context,
                platform,
                model,
                status,
                outcome,
                created_at,
                updated_at,
            ) = row?;

            sessions.push(WorkSession {
                id: parse_uuid(&id)?,
                parent_id: parse_uuid(&parent_id)?,
                parent_type: parse_enum::<ParentType>(&parent_type)?,
                parent_name,
                context,
                platform,
                model,
                status: parse_enum::<SessionStatus>(&status)?,
                outcome,
                created_at: parse_time(&created_at)?,
                updated_at: parse_time(&updated_at)?,
            });
        }
        Ok(sessions)
    }

    /// Writes the forest. Parent columns come from tree position, so a
    /// subsystem is stored under the system that holds it.
    fn save_systems(conn: &Connection, systems: &[System]) -> Result<()> {
        for (si, system) in systems.iter().enumerate() {
            conn.execute(
                "INSERT INTO systems (id, position, name, description, readme)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    system.id.to_string(),
                    si as i64,
                    system.name,
                    system.description,
                    system.readme,
                ],
            )?;

            for (pos, folder) in system.folders.iter().enumerate() {
                conn.execute(
                    "INSERT INTO system_folders (id, system_id, position, name, category, note)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        folder.id.to_string(),
                        system.id.to_string(),
                        pos as i64,
                        folder.name,
                        folder.category.to_string(),
                        folder.note,
                    ],
                )?;
            }

            for (bi, subsystem) in system.subsystems.iter().enumerate() {
                conn.execute(
                    "INSERT INTO subsystems (id, system_id, position, name, description, readme, color)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        subsystem.id.to_string(),
                        system.id.to_string(),
                        bi as i64,
                        subsystem.name,
                        subsystem.description,
                        subsystem.readme,
                        subsystem.color,
                    ],
                )?;

                for (fi, feature) in subsystem.features.iter().enumerate() {
                    conn.execute(
                        "INSERT INTO features (id, subsystem_id, position, name, description, readme)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            feature.id.to_string(),
                            subsystem.id.to_string(),
                            fi as i64,
                            feature.name,
                            feature.description,
                            feature.readme,
                        ],
                    )?;
                }
            }
        }
        Ok(())
    }

    fn save_requirement(conn: &Connection, position: usize, req: &Requirement) -> Result<()> {
        conn.execute(
            "INSERT INTO requirements
             (id, position, title, description, status, priority, system_id, subsystem_id,
              feature_id, start_date, completion_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                req.id.to_string(),
                position as i64,
                req.title,
                req.description,
                req.status.as_str(),
                req.priority.as_str(),
                req.system_id.to_string(),
                req.subsystem_id.map(|id| id.to_string()),
                req.feature_id.map(|id| id.to_string()),
                req.start_date.map(|d| d.to_rfc3339()),
                req.completion_date.map(|d| d.to_rfc3339()),
                req.created_at.to_rfc3339(),
                req.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn save_work_session(conn: &Connection, position: usize, session: &WorkSession) -> Result<()> {
        conn.execute(
            "INSERT INTO work_sessions
             (id, position, parent_id, parent_type, parent_name, context, platform, model,
              status, outcome, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                session.id.to_string(),
                position as i64,
                session.parent_id.to_string(),
                session.parent_type.to_string(),
                session.parent_name,
                session.context,
                session.platform,
                session.model,
                session.status.to_string(),
                session.outcome,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl DatabaseBackend for SqliteBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Option<Snapshot>> {
        let conn = self.connection()?;

        let saved_at: Option<String> = conn
            .query_row("SELECT saved_at FROM metadata WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        if saved_at.is_none() {
            return Ok(None);
        }

        Ok(Some(Snapshot {
            systems: Self::load_systems(&conn)?,
            requirements: Self::load_requirements(&conn)?,
            work_sessions: Self::load_work_sessions(&conn)?,
        }))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut conn = self.connection()?;

        // Rolled back on drop if any step fails
        let tx = conn.transaction()?;

        tx.execute_batch(
            "DELETE FROM work_sessions;
             DELETE FROM requirements;
             DELETE FROM features;
             DELETE FROM subsystems;
             DELETE FROM system_folders;
             DELETE FROM systems;",
        )?;

        Self::save_systems(&tx, &snapshot.systems)?;
        for (pos, req) in snapshot.requirements.iter().enumerate() {
            Self::save_requirement(&tx, pos, req)?;
        }
        for (pos, session) in snapshot.work_sessions.iter().enumerate() {
            Self::save_work_session(&tx, pos, session)?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO metadata (id, saved_at) VALUES (1, ?1)",
            [Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;
        debug!(
            "saved {} system(s), {} requirement(s) to {:?}",
            snapshot.systems.len(),
            snapshot.requirements.len(),
            self.path
        );
        Ok(())
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("Invalid id in database: {}", s))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in database: {}", s))
}

fn parse_enum<T>(s: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    s.parse::<T>().map_err(|e| anyhow!(e))
}
