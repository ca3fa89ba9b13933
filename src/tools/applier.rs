//! Mutation applier
//!
//! Writes file modifications and project scaffolds below the project root.
//! Every target passes the [`PathPolicy`] first. Scaffold entries are
//! applied in the given order and a failing entry never stops the rest.
//! The open-file map is updated only for files that were written.

use crate::collaborators::Filesystem;
use crate::directives::{Directive, FileModification, ScaffoldEntry, WriteMode};
use crate::errors::{AgentError, Result};
use crate::session::SessionContext;
use crate::tools::patch::{apply_patch, unified_diff};
use crate::tools::security::PathPolicy;
use crate::tools::types::{MutationKind, MutationOutcome};
use std::path::Path;

/// Target label used when a modification has no path
const UNRESOLVED_TARGET: &str = "<unresolved>";

/// Applies mutation directives to disk and session state
#[derive(Debug, Clone, Default)]
pub struct MutationApplier;

impl MutationApplier {
    pub fn new() -> Self {
        Self
    }

    /// Current text of `path`: the open-file copy first, else disk
    pub fn current_content(
        &self,
        path: &str,
        ctx: &SessionContext,
        fs: &dyn Filesystem,
    ) -> Option<String> {
        if let Some(content) = ctx.file(path) {
            return Some(content.to_string());
        }
        let resolved = PathPolicy::new(ctx.project_root()).resolve(path).ok()?;
        if fs.exists(&resolved) && !fs.is_dir(&resolved) {
            fs.read(&resolved).ok()
        } else {
            None
        }
    }

    /// Turn a patch into the full text it produces
    ///
    /// Non-patch modifications are returned unchanged. The result is what
    /// gets validated and written.
    pub fn materialize(
        &self,
        fm: &FileModification,
        ctx: &SessionContext,
        fs: &dyn Filesystem,
    ) -> Result<FileModification> {
        let path = fm.path.as_deref().ok_or_else(|| AgentError::AmbiguityUnresolved {
            reason: "modification has no target path".to_string(),
        })?;
        if fm.mode != WriteMode::Patch {
            return Ok(fm.clone());
        }

        PathPolicy::new(ctx.project_root()).resolve(path)?;
        let original = self.current_content(path, ctx, fs).unwrap_or_default();
        let patched = apply_patch(&original, &fm.content)?;
        Ok(FileModification {
            path: Some(path.to_string()),
            content: patched,
            mode: WriteMode::Overwrite,
        })
    }

    /// Unified diff of what applying `directive` would change
    pub fn preview(&self, directive: &Directive, ctx: &SessionContext, fs: &dyn Filesystem) -> String {
        match directive {
            Directive::FileModification(fm) => {
                let Some(path) = fm.path.as_deref() else {
                    return String::new();
                };
                let old = self.current_content(path, ctx, fs).unwrap_or_default();
                match self.materialize(fm, ctx, fs) {
                    Ok(materialized) => unified_diff(path, &old, &materialized.content),
                    Err(err) => format!("cannot preview {}: {}", path, err),
                }
            }
            Directive::ProjectScaffold { entries } => entries
                .iter()
                .map(|entry| match &entry.content {
                    _ if entry.is_directory => format!("mkdir {}/\n", entry.path),
                    Some(content) => {
                        let old = self.current_content(&entry.path, ctx, fs).unwrap_or_default();
                        unified_diff(&entry.path, &old, content)
                    }
                    None => format!("touch {}\n", entry.path),
                })
                .collect(),
            _ => String::new(),
        }
    }

    /// Apply one mutation directive; one outcome per target
    pub fn apply(
        &self,
        directive: &Directive,
        ctx: &mut SessionContext,
        fs: &dyn Filesystem,
    ) -> Vec<MutationOutcome> {
        match directive {
            Directive::FileModification(fm) => vec![self.apply_file(fm, ctx, fs)],
            Directive::ProjectScaffold { entries } => entries
                .iter()
                .map(|entry| self.apply_entry(entry, ctx, fs))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn apply_file(
        &self,
        fm: &FileModification,
        ctx: &mut SessionContext,
        fs: &dyn Filesystem,
    ) -> MutationOutcome {
        let Some(path) = fm.path.as_deref() else {
            return MutationOutcome::failure(UNRESOLVED_TARGET, "modification has no target path");
        };

        let content = match self.materialize(fm, ctx, fs) {
            Ok(materialized) => materialized.content,
            Err(err) => return MutationOutcome::failure(path, err.to_string()),
        };
        self.write_file(path, &content, ctx, fs)
    }

    fn apply_entry(
        &self,
        entry: &ScaffoldEntry,
        ctx: &mut SessionContext,
        fs: &dyn Filesystem,
    ) -> MutationOutcome {
        if !entry.is_directory {
            let content = entry.content.as_deref().unwrap_or("");
            return self.write_file(&entry.path, content, ctx, fs);
        }

        let policy = PathPolicy::new(ctx.project_root());
        let resolved = match policy.resolve(&entry.path) {
            Ok(resolved) => resolved,
            Err(err) => return self.reject(&entry.path, err),
        };
        match fs.create_dir_all(&resolved) {
            Ok(()) => {
                tracing::info!(target_path = %entry.path, "directory created");
                MutationOutcome::success(&entry.path, MutationKind::DirectoryCreated)
            }
            Err(err) => self.reject(
                &entry.path,
                AgentError::Mutation {
                    target: entry.path.clone(),
                    reason: err.to_string(),
                },
            ),
        }
    }

    fn write_file(
        &self,
        path: &str,
        content: &str,
        ctx: &mut SessionContext,
        fs: &dyn Filesystem,
    ) -> MutationOutcome {
        let policy = PathPolicy::new(ctx.project_root());
        let resolved = match policy.resolve(path) {
            Ok(resolved) => resolved,
            Err(err) => return self.reject(path, err),
        };

        if fs.is_dir(&resolved) {
            return self.reject(
                path,
                AgentError::Mutation {
                    target: path.to_string(),
                    reason: "target is a directory".to_string(),
                },
            );
        }

        let existed = fs.exists(&resolved);
        if let Err(err) = ensure_parent(fs, &resolved).and_then(|_| fs.write(&resolved, content)) {
            return self.reject(
                path,
                AgentError::Mutation {
                    target: path.to_string(),
                    reason: err.to_string(),
                },
            );
        }

        ctx.open_file(policy.relative(&resolved), content);
        let kind = if existed {
            MutationKind::Overwritten
        } else {
            MutationKind::Created
        };
        tracing::info!(target_path = %path, ?kind, bytes = content.len(), "file written");
        MutationOutcome::success(path, kind)
    }

    fn reject(&self, target: &str, err: AgentError) -> MutationOutcome {
        tracing::warn!(target_path = %target, error = %err, "mutation failed");
        MutationOutcome::failure(target, err.to_string())
    }
}

fn ensure_parent(fs: &dyn Filesystem, path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !fs.exists(parent) => fs.create_dir_all(parent),
        _ => Ok(()),
    }
}
