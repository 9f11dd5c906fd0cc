use crate::env;
use crate::error::{MobyError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = ".moby.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub docker: DockerSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DockerSettings {
    /// First entry is the default port.
    #[serde(default)]
    pub ports: Vec<u16>,
    pub container_name: Option<String>,
    pub image_name: Option<String>,
    /// Parsed but not used by any command.
    pub health_check: Option<String>,
}

/// A project entry together with the name it was resolved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub config: ProjectConfig,
}

impl Project {
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn container_name(&self) -> &str {
        self.config.docker.container_name.as_deref().unwrap_or(&self.name)
    }

    pub fn image_name(&self) -> &str {
        self.config.docker.image_name.as_deref().unwrap_or(&self.name)
    }

    pub fn port(&self, requested: Option<u16>) -> Result<u16> {
        requested
            .or_else(|| self.config.docker.ports.first().copied())
            .ok_or_else(|| MobyError::NoPort {
                name: self.name.clone(),
            })
    }
}

/// Program names used as argv[0].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub docker: String,
    pub git: String,
    pub aws: String,
}

impl Default for Tools {
    fn default() -> Self {
        Tools {
            docker: "docker".to_string(),
            git: "git".to_string(),
            aws: "aws".to_string(),
        }
    }
}

impl Tools {
    pub fn from_env() -> Self {
        let var = |key: &str, default: String| std::env::var(key).unwrap_or(default);
        let d = Tools::default();
        Tools {
            docker: var("DOCKER_BIN", d.docker),
            git: var("GIT_BIN", d.git),
            aws: var("AWS_BIN", d.aws),
        }
    }
}

/// Walk up from `start_dir` looking for `.moby.yaml`.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = start_dir.to_path_buf();
    for _ in 0..12 {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        match dir.parent() {
            Some(parent) if parent != dir => dir = parent.to_path_buf(),
            _ => break,
        }
    }
    None
}

/// Config next to the installation, then in the home directory.
pub fn default_config_path() -> PathBuf {
    let install_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    if let Some(found) = find_config(&install_dir) {
        return found;
    }
    if let Some(home) = dirs::home_dir() {
        let candidate = home.join(CONFIG_FILE);
        if candidate.is_file() {
            return candidate;
        }
    }
    install_dir.join(CONFIG_FILE)
}

fn expand_project_path(raw: &Path, config_dir: &Path) -> PathBuf {
    if let Ok(rest) = raw.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if raw.is_relative() {
        config_dir.join(raw)
    } else {
        raw.to_path_buf()
    }
}

pub fn load(path: &Path) -> Result<GlobalConfig> {
    let raw = fs::read_to_string(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            MobyError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            MobyError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    // An empty document has no projects rather than being malformed.
    let mut cfg: GlobalConfig = if raw.trim().is_empty() {
        GlobalConfig::default()
    } else {
        serde_yaml_ng::from_str(&raw).map_err(|source| MobyError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?
    };

    let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
    for project in cfg.projects.values_mut() {
        project.path = expand_project_path(&project.path, config_dir);
    }
    debug!(path = %path.display(), projects = cfg.projects.len(), "loaded config");
    Ok(cfg)
}

/// Lazily loaded configuration plus the most recently resolved project.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    loaded: Option<GlobalConfig>,
    current: Option<Project>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfigStore {
            path: path.into(),
            loaded: None,
            current: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn global(&mut self) -> Result<&GlobalConfig> {
        if self.loaded.is_none() {
            self.loaded = Some(load(&self.path)?);
        }
        Ok(self.loaded.get_or_insert_with(GlobalConfig::default))
    }

    pub fn resolve(&mut self, name: &str) -> Result<Project> {
        let config = self
            .global()?
            .projects
            .get(name)
            .cloned()
            .ok_or_else(|| MobyError::ProjectNotFound {
                name: name.to_string(),
            })?;
        let project = Project {
            name: name.to_string(),
            config,
        };
        self.current = Some(project.clone());
        Ok(project)
    }

    pub fn current_project(&self) -> Result<&Project> {
        self.current.as_ref().ok_or(MobyError::NoProjectSelected)
    }

    pub fn current_project_path(&self) -> Result<&Path> {
        self.current_project().map(Project::path)
    }

    pub fn load_ecr_config(&self) -> Result<BTreeMap<String, String>> {
        env::load_ecr_config(self.current_project_path()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
projects:
  api:
    path: /srv/api
    docker:
      ports: [8080, 9090]
      image_name: api-svc
      container_name: api-dev
      health_check: /healthz
  web:
    path: ./web
    docker:
      ports: [3000]
  bare:
    path: /srv/bare
"#;

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn resolve_returns_entry_and_sets_current() {
        let (_dir, path) = write_config(SAMPLE);
        let mut store = ConfigStore::new(&path);

        let api = store.resolve("api").unwrap();
        assert_eq!(api.path(), Path::new("/srv/api"));
        assert_eq!(api.image_name(), "api-svc");
        assert_eq!(api.container_name(), "api-dev");
        assert_eq!(api.config.docker.ports, vec![8080, 9090]);
        assert_eq!(api.config.docker.health_check.as_deref(), Some("/healthz"));
        assert_eq!(store.current_project_path().unwrap(), Path::new("/srv/api"));
    }

    #[test]
    fn last_resolution_wins() {
        let (_dir, path) = write_config(SAMPLE);
        let mut store = ConfigStore::new(&path);
        store.resolve("api").unwrap();
        store.resolve("bare").unwrap();
        assert_eq!(store.current_project().unwrap().name, "bare");
    }

    #[test]
    fn unknown_project_leaves_current_untouched() {
        let (_dir, path) = write_config(SAMPLE);
        let mut store = ConfigStore::new(&path);
        store.resolve("api").unwrap();

        let err = store.resolve("nope").unwrap_err();
        assert!(matches!(err, MobyError::ProjectNotFound { ref name } if name == "nope"));
        assert_eq!(store.current_project().unwrap().name, "api");
    }

    #[test]
    fn current_path_before_resolve_is_an_error() {
        let store = ConfigStore::new("/nonexistent/.moby.yaml");
        assert!(matches!(
            store.current_project_path(),
            Err(MobyError::NoProjectSelected)
        ));
        assert!(matches!(store.load_ecr_config(), Err(MobyError::NoProjectSelected)));
    }

    #[test]
    fn names_default_to_project_name() {
        let (_dir, path) = write_config(SAMPLE);
        let mut store = ConfigStore::new(&path);
        let bare = store.resolve("bare").unwrap();
        assert_eq!(bare.image_name(), "bare");
        assert_eq!(bare.container_name(), "bare");
        assert!(matches!(bare.port(None), Err(MobyError::NoPort { .. })));
        assert_eq!(bare.port(Some(4000)).unwrap(), 4000);
    }

    #[test]
    fn port_prefers_override_then_first_configured() {
        let (_dir, path) = write_config(SAMPLE);
        let mut store = ConfigStore::new(&path);
        let api = store.resolve("api").unwrap();
        assert_eq!(api.port(None).unwrap(), 8080);
        assert_eq!(api.port(Some(1234)).unwrap(), 1234);
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let (dir, path) = write_config(SAMPLE);
        let mut store = ConfigStore::new(&path);
        let web = store.resolve("web").unwrap();
        assert_eq!(web.path(), dir.path().join("./web"));
    }

    #[test]
    fn missing_file_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::new(dir.path().join(CONFIG_FILE));
        assert!(matches!(
            store.resolve("api"),
            Err(MobyError::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let (_dir, path) = write_config("projects: [unclosed\n");
        let mut store = ConfigStore::new(&path);
        assert!(matches!(
            store.resolve("api"),
            Err(MobyError::ConfigParse { .. })
        ));
    }

    #[test]
    fn config_is_cached_after_first_load() {
        let (_dir, path) = write_config(SAMPLE);
        let mut store = ConfigStore::new(&path);
        store.resolve("api").unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(store.resolve("bare").unwrap().name, "bare");
    }

    #[test]
    fn find_config_walks_up() {
        let (dir, path) = write_config(SAMPLE);
        let nested = dir.path().join("target").join("release");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_config(&nested), Some(path));
    }

    #[test]
    fn ecr_config_reads_from_current_project() {
        let project_dir = tempfile::tempdir().unwrap();
        fs::write(project_dir.path().join(env::ECR_ENV_FILE), "REPO=api\n").unwrap();
        let yaml = format!(
            "projects:\n  api:\n    path: {}\n",
            project_dir.path().display()
        );
        let (_dir, path) = write_config(&yaml);
        let mut store = ConfigStore::new(&path);
        store.resolve("api").unwrap();
        assert_eq!(store.load_ecr_config().unwrap()["REPO"], "api");
    }
}
