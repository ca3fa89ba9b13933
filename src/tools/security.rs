//! Path policy for model-proposed write targets
//!
//! Every target is resolved against the project root before it is touched:
//!
//! ```text
//! resolve(p):
//!   reject if p is empty or contains NUL
//!   full ← p if absolute else root / p
//!   norm ← lexical normalization of full ('.' dropped, '..' pops)
//!   reject unless norm ∈ Subtree(root) and norm ≠ root
//!   reject if any component of norm below root is ".git"
//!   for each existing ancestor a of norm below root:
//!     reject if a is a symlink whose target leaves root
//!   return norm
//! ```
//!
//! Targets usually do not exist yet, so normalization is lexical and only
//! existing ancestors are canonicalized.

use crate::errors::{AgentError, Result};
use std::path::{Component, Path, PathBuf};

/// Directory name that is never written into
const VCS_DIR: &str = ".git";

/// Path policy rooted at the project directory
#[derive(Debug, Clone)]
pub struct PathPolicy {
    root: PathBuf,
}

impl PathPolicy {
    /// Policy for `root`; the root is canonicalized when it exists
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexically(root));
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative target to an absolute path inside the root
    pub fn resolve(&self, target: &str) -> Result<PathBuf> {
        let reject = |reason: &str| AgentError::PathRejected {
            path: target.to_string(),
            reason: reason.to_string(),
        };

        if target.trim().is_empty() {
            return Err(reject("empty path"));
        }
        if target.contains('\0') {
            return Err(reject("contains NUL byte"));
        }

        let requested = Path::new(target);
        let full = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };
        let normalized = normalize_lexically(&full);

        let relative = match normalized.strip_prefix(&self.root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) if requested.is_absolute() => {
                return Err(reject("absolute path outside project root"))
            }
            Err(_) => return Err(reject("escapes project root")),
        };

        if relative.as_os_str().is_empty() {
            return Err(reject("refers to the project root itself"));
        }
        if relative
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name == VCS_DIR))
        {
            return Err(reject("inside version control directory"));
        }

        self.check_symlinks(&relative)
            .map_err(|_| reject("symlink leads outside project root"))?;

        Ok(normalized)
    }

    /// Path relative to the root, for display and the open-file map
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn check_symlinks(&self, relative: &Path) -> std::result::Result<(), ()> {
        let mut current = self.root.clone();
        for component in relative.components() {
            current.push(component);
            let Ok(meta) = std::fs::symlink_metadata(&current) else {
                // Nothing below a missing component can be a link yet
                return Ok(());
            };
            if meta.file_type().is_symlink() {
                match current.canonicalize() {
                    Ok(target) if target.starts_with(&self.root) => {}
                    // Dangling links are refused as well
                    _ => return Err(()),
                }
            }
        }
        Ok(())
    }
}

/// Resolve `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup_policy() -> (PathPolicy, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let policy = PathPolicy::new(temp_dir.path());
        (policy, temp_dir)
    }

    #[test]
    fn test_relative_target_inside_root() {
        let (policy, _temp) = setup_policy();
        let resolved = policy.resolve("src/app.py").unwrap();
        assert!(resolved.starts_with(policy.root()));
        assert_eq!(policy.relative(&resolved), "src/app.py");
    }

    #[test]
    fn test_dot_segments_inside_root_are_allowed() {
        let (policy, _temp) = setup_policy();
        let resolved = policy.resolve("./a/../b/./c.txt").unwrap();
        assert_eq!(policy.relative(&resolved), "b/c.txt");
    }

    #[test]
    fn test_absolute_inside_root_allowed() {
        let (policy, _temp) = setup_policy();
        let inside = policy.root().join("notes.md");
        assert!(policy.resolve(inside.to_str().unwrap()).is_ok());
    }

    #[test]
    fn test_escape_attempts_rejected() {
        let (policy, _temp) = setup_policy();

        for attempt in [
            "",
            "   ",
            "../outside.py",
            "a/../../outside.py",
            "/etc/passwd",
            ".git/config",
            "sub/.git/hooks/pre-commit",
            ".",
            "bad\0name",
        ] {
            assert!(policy.resolve(attempt).is_err(), "should reject {:?}", attempt);
        }
    }

    #[test]
    fn test_rejection_carries_reason() {
        let (policy, _temp) = setup_policy();
        match policy.resolve("/etc/passwd") {
            Err(AgentError::PathRejected { path, reason }) => {
                assert_eq!(path, "/etc/passwd");
                assert!(reason.contains("absolute"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (policy, temp) = setup_policy();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();

        assert!(policy.resolve("link/file.txt").is_err());

        fs::create_dir(temp.path().join("real")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("inner")).unwrap();
        assert!(policy.resolve("inner/file.txt").is_ok());
    }
}
