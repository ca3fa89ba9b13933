//! Saved projects
//!
//! A project snapshot lives in its own directory:
//!
//! ```text
//! <projects_dir>/<name>/
//!     project.json   metadata: model, open file paths, save time
//!     history.json   conversation history
//!     files/<path>   copy of every open file
//! ```
//!
//! Loading restores the history and the open files; the files on disk in
//! the project root are never touched.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::session::context::{OpenFile, SessionContext};
use crate::tools::PathPolicy;
use crate::types::ChatMessage;

const METADATA_FILE: &str = "project.json";
const HISTORY_FILE: &str = "history.json";
const FILES_DIR: &str = "files";

/// Contents of `project.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    pub model: String,
    /// Open file paths in their original order
    pub files: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

/// A project read back from disk
#[derive(Debug, Clone)]
pub struct SavedProject {
    pub metadata: ProjectMetadata,
    pub history: Vec<ChatMessage>,
    pub files: Vec<OpenFile>,
    /// Paths listed in the metadata whose copy is gone
    pub missing_files: Vec<String>,
}

impl SavedProject {
    /// Replace history and open files of `ctx` with this snapshot
    pub fn restore_into(&self, ctx: &mut SessionContext) {
        ctx.reset();
        ctx.replace_history(self.history.clone());
        for file in &self.files {
            ctx.open_file(file.path.clone(), file.content.clone());
        }
    }
}

/// Directory of saved projects
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.root.join(name).join(METADATA_FILE).is_file()
    }

    /// Snapshot `ctx` under `name`, replacing an earlier save
    pub fn save(&self, name: &str, model: &str, ctx: &SessionContext) -> Result<PathBuf> {
        validate_name(name)?;
        let project_dir = self.root.join(name);
        let files_dir = project_dir.join(FILES_DIR);

        if files_dir.exists() {
            fs::remove_dir_all(&files_dir).context("Failed to clear previous file copies")?;
        }
        fs::create_dir_all(&files_dir)
            .with_context(|| format!("Failed to create project directory {}", project_dir.display()))?;

        let policy = PathPolicy::new(&files_dir);
        for file in ctx.open_files() {
            let target = policy
                .resolve(&file.path)
                .with_context(|| format!("Cannot store {} inside the project", file.path))?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &file.content)
                .with_context(|| format!("Failed to write copy of {}", file.path))?;
        }

        let history: Vec<&ChatMessage> = ctx.history().iter().collect();
        fs::write(
            project_dir.join(HISTORY_FILE),
            serde_json::to_string_pretty(&history).context("Failed to serialize history")?,
        )
        .context("Failed to write history file")?;

        let metadata = ProjectMetadata {
            name: name.to_string(),
            model: model.to_string(),
            files: ctx.open_paths(),
            saved_at: Utc::now(),
        };
        fs::write(
            project_dir.join(METADATA_FILE),
            serde_json::to_string_pretty(&metadata).context("Failed to serialize metadata")?,
        )
        .context("Failed to write project metadata")?;

        tracing::info!(project = name, files = metadata.files.len(), "project saved");
        Ok(project_dir)
    }

    pub fn load(&self, name: &str) -> Result<SavedProject> {
        validate_name(name)?;
        let project_dir = self.root.join(name);
        if !project_dir.is_dir() {
            bail!("Project '{}' not found", name);
        }

        let metadata: ProjectMetadata = serde_json::from_str(
            &fs::read_to_string(project_dir.join(METADATA_FILE)).context("Failed to read project metadata")?,
        )
        .context("Failed to parse project metadata")?;

        let history_path = project_dir.join(HISTORY_FILE);
        let history: Vec<ChatMessage> = if history_path.exists() {
            serde_json::from_str(&fs::read_to_string(&history_path).context("Failed to read history file")?)
                .context("Failed to parse history file")?
        } else {
            Vec::new()
        };

        let policy = PathPolicy::new(project_dir.join(FILES_DIR));
        let mut files = Vec::new();
        let mut missing_files = Vec::new();
        for path in &metadata.files {
            match policy.resolve(path).ok().and_then(|p| fs::read_to_string(p).ok()) {
                Some(content) => files.push(OpenFile {
                    path: path.clone(),
                    content,
                }),
                None => missing_files.push(path.clone()),
            }
        }

        if !missing_files.is_empty() {
            tracing::warn!(project = name, missing = ?missing_files, "saved file copies missing");
        }

        Ok(SavedProject {
            metadata,
            history,
            files,
            missing_files,
        })
    }

    /// Saved projects sorted by name; unreadable entries are skipped
    pub fn list(&self) -> Result<Vec<ProjectMetadata>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut projects = Vec::new();
        for entry in fs::read_dir(&self.root).context("Failed to read projects directory")? {
            let path = entry?.path();
            let metadata = fs::read_to_string(path.join(METADATA_FILE))
                .ok()
                .and_then(|raw| serde_json::from_str::<ProjectMetadata>(&raw).ok());
            match metadata {
                Some(metadata) => projects.push(metadata),
                None => tracing::debug!(path = %path.display(), "skipping non-project entry"),
            }
        }

        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let project_dir = self.root.join(name);
        if !project_dir.is_dir() {
            bail!("Project '{}' not found", name);
        }
        fs::remove_dir_all(&project_dir).context("Failed to delete project")?;
        Ok(())
    }
}

/// Project names become directory names
fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("Project name must not be empty");
    }
    if trimmed != name || trimmed == "." || trimmed == ".." {
        bail!("Invalid project name '{}'", name);
    }
    if name.chars().any(|c| matches!(c, '/' | '\\' | '\0')) {
        bail!("Project name '{}' must not contain path separators", name);
    }
    Ok(())
}
