//! Projects file loading and validation.
//!
//! A multi-tenant deployment lists its tenants in a projects file, either TOML
//!
//! ```toml
//! [[projects]]
//! name = "web"
//! token = "s3cret"
//! data_file = "/var/lib/beads/web.json"
//! ```
//!
//! or JSON (`.json` extension), as `{"projects": [...]}` or a bare array.
//! Relative `data_file` paths resolve against the projects file's directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// One tenant as written in the projects file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    pub token: String,
    pub data_file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ProjectsFile {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonProjects {
    Wrapped(ProjectsFile),
    Bare(Vec<ProjectEntry>),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("{0}")]
    Invalid(String),
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } | Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::Invalid(_) => ErrorCode::ConfigInvalid,
        }
    }
}

/// Read, parse and validate a projects file.
pub fn load_projects(path: &Path) -> Result<Vec<ProjectEntry>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let mut projects = parse_projects(&content, is_json).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for project in &mut projects {
        if project.data_file.is_relative() && !project.data_file.as_os_str().is_empty() {
            project.data_file = base.join(&project.data_file);
        }
    }
    validate_projects(&projects)?;
    tracing::debug!(path = %path.display(), projects = projects.len(), "loaded projects file");
    Ok(projects)
}

fn parse_projects(content: &str, is_json: bool) -> Result<Vec<ProjectEntry>, String> {
    if is_json {
        return match serde_json::from_str::<JsonProjects>(content).map_err(|e| e.to_string())? {
            JsonProjects::Wrapped(file) => Ok(file.projects),
            JsonProjects::Bare(projects) => Ok(projects),
        };
    }
    toml::from_str::<ProjectsFile>(content)
        .map(|file| file.projects)
        .map_err(|e| e.to_string())
}

/// Every field non-empty; names and tokens unique.
pub fn validate_projects(projects: &[ProjectEntry]) -> Result<(), ConfigError> {
    if projects.is_empty() {
        return Err(ConfigError::Invalid("projects file lists no projects".into()));
    }
    let mut names = HashSet::new();
    let mut tokens = HashSet::new();
    for (index, project) in projects.iter().enumerate() {
        let label = if project.name.trim().is_empty() {
            format!("project #{}", index + 1)
        } else {
            format!("project '{}'", project.name)
        };
        if project.name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{label}: name is empty")));
        }
        if project.token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{label}: token is empty")));
        }
        if project.data_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(format!("{label}: data_file is empty")));
        }
        if !names.insert(project.name.as_str()) {
            return Err(ConfigError::Invalid(format!("{label}: duplicate name")));
        }
        if !tokens.insert(project.token.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "{label}: token already used by another project"
            )));
        }
    }
    Ok(())
}

/// `<data dir>/beads/beads.json`, or `./beads.json` without a data dir.
#[must_use]
pub fn default_data_file() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from("beads.json"),
        |dir| dir.join("beads").join("beads.json"),
    )
}
