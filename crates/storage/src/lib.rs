use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use takeoff_core::{Calibration, ConfigError, EditorConfig, Scene, Shape};
use tracing::debug;

const CONFIG_SCHEMA_VERSION: u32 = 1;
const PROJECT_SCHEMA_VERSION: u32 = 1;
const PROJECT_EXTENSION: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("unsupported {kind} schema version {found}")]
    UnsupportedVersion { kind: &'static str, found: u32 },
    #[error("invalid project name: {0:?}")]
    InvalidProjectName(String),
    #[error("project not found: {0}")]
    ProjectNotFound(String),
}

/// A saved page annotation set with the scale it was measured at
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub scene: Scene,
    pub scale_factor: f64,
    pub unit: String,
}

impl Project {
    pub fn new(scene: &Scene, calibration: &Calibration) -> Self {
        Self {
            scene: scene.clone(),
            scale_factor: calibration.scale_factor(),
            unit: calibration.unit().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u32,
    config: EditorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProjectEnvelope {
    version: u32,
    scale_factor: f64,
    unit: String,
    shapes: Vec<Shape>,
}

/// Local data directory holding the editor config and saved projects
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "Takeoff", "Takeoff").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stored configuration, or the defaults when nothing was saved yet
    pub fn load_config(&self) -> Result<EditorConfig, StorageError> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(EditorConfig::default());
        }

        let bytes = fs::read(path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != CONFIG_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                kind: "config",
                found: envelope.version,
            });
        }
        envelope.config.validate()?;

        Ok(envelope.config)
    }

    pub fn save_config(&self, config: &EditorConfig) -> Result<(), StorageError> {
        config.validate()?;
        fs::create_dir_all(&self.root)?;

        let envelope = ConfigEnvelope { version: CONFIG_SCHEMA_VERSION, config: config.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.config_path(), bytes)?;
        debug!(path = %self.config_path().display(), "saved config");
        Ok(())
    }

    pub fn save_project(&self, name: &str, project: &Project) -> Result<PathBuf, StorageError> {
        let path = self.project_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let envelope = ProjectEnvelope {
            version: PROJECT_SCHEMA_VERSION,
            scale_factor: project.scale_factor,
            unit: project.unit.clone(),
            shapes: project.scene.shapes().to_vec(),
        };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(&path, bytes)?;
        debug!(name, shapes = envelope.shapes.len(), "saved project");
        Ok(path)
    }

    pub fn load_project(&self, name: &str) -> Result<Project, StorageError> {
        let path = self.project_path(name)?;
        if !path.exists() {
            return Err(StorageError::ProjectNotFound(name.to_string()));
        }

        let bytes = fs::read(path)?;
        let envelope: ProjectEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != PROJECT_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                kind: "project",
                found: envelope.version,
            });
        }

        Ok(Project {
            scene: Scene::from_shapes(envelope.shapes),
            scale_factor: envelope.scale_factor,
            unit: envelope.unit,
        })
    }

    /// Names of saved projects, sorted
    pub fn list_projects(&self) -> Result<Vec<String>, StorageError> {
        let dir = self.projects_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PROJECT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    fn project_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
            && name.trim() == name;
        if !valid {
            return Err(StorageError::InvalidProjectName(name.to_string()));
        }
        Ok(self.projects_dir().join(format!("{name}.{PROJECT_EXTENSION}")))
    }
}
