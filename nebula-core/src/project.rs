use anyhow::Result;
use log::debug;
use std::env;
use std::path::{Path, PathBuf};

use crate::registry::{get_registry_path, Registry};

/// Env var naming the registered project to open
pub const PROJECT_ENV: &str = "NEBULA_PROJECT";

/// Store file looked for in the current directory, and the final fallback
pub const DEFAULT_STORE_FILE: &str = "nebula.yaml";

/// Determines the store file to open from command line options, the
/// environment, the current directory and the project registry
pub fn determine_store_path(file: Option<&Path>, project: Option<&str>) -> Result<PathBuf> {
    if let Some(file) = file {
        return Ok(file.to_path_buf());
    }

    let registry = Registry::load_or_default(get_registry_path()?)?;
    let env_project = env::var(PROJECT_ENV).ok().filter(|p| !p.is_empty());
    let local = PathBuf::from(DEFAULT_STORE_FILE);

    let path = resolve_store_path(project, env_project.as_deref(), local.exists(), &registry)?;
    debug!("using store {:?}", path);
    Ok(path)
}

/// Resolution order: `--project`, `$NEBULA_PROJECT`, `./nebula.yaml`, the
/// sole registered project, the default project, then `nebula.yaml`
pub fn resolve_store_path(
    project: Option<&str>,
    env_project: Option<&str>,
    local_file_exists: bool,
    registry: &Registry,
) -> Result<PathBuf> {
    if let Some(name) = project {
        return match registry.get_project(name) {
            Some(p) => Ok(PathBuf::from(&p.path)),
            None => anyhow::bail!("Project '{}' not found in registry", name),
        };
    }

    if let Some(name) = env_project {
        return match registry.get_project(name) {
            Some(p) => Ok(PathBuf::from(&p.path)),
            None => anyhow::bail!(
                "Project '{}' from {} not found in registry",
                name,
                PROJECT_ENV
            ),
        };
    }

    if local_file_exists {
        return Ok(PathBuf::from(DEFAULT_STORE_FILE));
    }

    if let Some((_, p)) = registry.sole_project() {
        return Ok(PathBuf::from(&p.path));
    }

    if let Some((_, p)) = registry.get_default_project() {
        return Ok(PathBuf::from(&p.path));
    }

    Ok(PathBuf::from(DEFAULT_STORE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let mut registry = Registry::default();
        registry.register_project("shop".into(), "/data/shop.yaml".into(), String::new());
        registry.register_project("api".into(), "/data/api.db".into(), String::new());
        registry
    }

    #[test]
    fn test_project_option_wins() {
        let path = resolve_store_path(Some("api"), Some("shop"), true, &registry()).unwrap();
        assert_eq!(path, PathBuf::from("/data/api.db"));
    }

    #[test]
    fn test_unknown_project_is_an_error() {
        assert!(resolve_store_path(Some("ghost"), None, false, &registry()).is_err());
        assert!(resolve_store_path(None, Some("ghost"), false, &registry()).is_err());
    }

    #[test]
    fn test_env_project_before_local_file() {
        let path = resolve_store_path(None, Some("shop"), true, &registry()).unwrap();
        assert_eq!(path, PathBuf::from("/data/shop.yaml"));
    }

    #[test]
    fn test_local_file_before_registry() {
        let path = resolve_store_path(None, None, true, &registry()).unwrap();
        assert_eq!(path, PathBuf::from(DEFAULT_STORE_FILE));
    }

    #[test]
    fn test_default_project_when_several() {
        let mut registry = registry();
        assert_eq!(
            resolve_store_path(None, None, false, &registry).unwrap(),
            PathBuf::from(DEFAULT_STORE_FILE)
        );

        registry.set_default_project("api").unwrap();
        assert_eq!(
            resolve_store_path(None, None, false, &registry).unwrap(),
            PathBuf::from("/data/api.db")
        );
    }

    #[test]
    fn test_sole_project_used() {
        let mut registry = Registry::default();
        registry.register_project("only".into(), "/data/only.yaml".into(), String::new());
        assert_eq!(
            resolve_store_path(None, None, false, &registry).unwrap(),
            PathBuf::from("/data/only.yaml")
        );
    }

    #[test]
    fn test_explicit_file() {
        let path = determine_store_path(Some(Path::new("plans/x.db")), Some("ignored")).unwrap();
        assert_eq!(path, PathBuf::from("plans/x.db"));
    }
}
