use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Env var overriding the registry location
pub const REGISTRY_PATH_ENV: &str = "NEBULA_REGISTRY_PATH";

/// Represents a project in the registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    /// Path to the store file (.yaml or .db)
    pub path: String,
    #[serde(default)]
    pub description: String,
}

/// Registry of named projects
#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registry {
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
    /// Optional default project name
    #[serde(default)]
    pub default_project: Option<String>,
}

impl Registry {
    /// Loads the registry from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read registry file: {:?}", path.as_ref()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse registry file: {:?}", path.as_ref()))
    }

    /// Loads the registry, or an empty one if the file does not exist yet
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn get_project(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    /// Lists all project names, sorted
    pub fn list_projects(&self) -> Vec<&str> {
        self.projects.keys().map(|k| k.as_str()).collect()
    }

    /// Registers a new project or updates an existing one
    pub fn register_project(&mut self, name: String, path: String, description: String) {
        self.projects.insert(name, Project { path, description });
    }

    /// Sets a project as the default
    pub fn set_default_project(&mut self, name: &str) -> Result<()> {
        if !self.projects.contains_key(name) {
            anyhow::bail!("Project '{}' not found in registry", name);
        }
        self.default_project = Some(name.to_string());
        Ok(())
    }

    /// Gets the default project if set
    pub fn get_default_project(&self) -> Option<(&str, &Project)> {
        let name = self.default_project.as_deref()?;
        self.projects.get(name).map(|project| (name, project))
    }

    /// The only registered project, if exactly one exists
    pub fn sole_project(&self) -> Option<(&str, &Project)> {
        let mut iter = self.projects.iter();
        match (iter.next(), iter.next()) {
            (Some((name, project)), None) => Some((name.as_str(), project)),
            _ => None,
        }
    }

    /// Save the registry to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write registry to {:?}", path.as_ref()))?;

        Ok(())
    }
}

/// Gets the path to the registry file: `$NEBULA_REGISTRY_PATH` or `~/.nebula.config`
pub fn get_registry_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(REGISTRY_PATH_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

    Ok(home_dir.join(".nebula.config"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_registry_is_empty() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::load_or_default(dir.path().join("none.config")).unwrap();
        assert!(registry.projects.is_empty());
    }

    #[test]
    fn test_register_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.config");
        let mut registry = Registry::default();
        registry.register_project("shop".into(), "/tmp/shop.yaml".into(), "Retail".into());
        registry.register_project("api".into(), "/tmp/api.db".into(), String::new());
        registry.set_default_project("shop").unwrap();
        registry.save(&path).unwrap();

        let loaded = Registry::load(&path).unwrap();
        assert_eq!(loaded, registry);
        assert_eq!(loaded.list_projects(), vec!["api", "shop"]);
        assert_eq!(loaded.get_default_project().unwrap().0, "shop");
    }

    #[test]
    fn test_default_must_exist() {
        let mut registry = Registry::default();
        assert!(registry.set_default_project("ghost").is_err());
    }

    #[test]
    fn test_sole_project() {
        let mut registry = Registry::default();
        assert!(registry.sole_project().is_none());
        registry.register_project("one".into(), "one.yaml".into(), String::new());
        assert_eq!(registry.sole_project().unwrap().0, "one");
        registry.register_project("two".into(), "two.yaml".into(), String::new());
        assert!(registry.sole_project().is_none());
    }
}
