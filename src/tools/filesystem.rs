//! Local disk implementation of the `Filesystem` collaborator

use crate::collaborators::Filesystem;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Largest file `/load` reads into context (bytes)
pub const MAX_LOAD_FILE_SIZE: u64 = 1_048_576;

/// Directories skipped when loading a directory tree
const SKIPPED_DIRS: [&str; 6] = [".git", "target", "node_modules", "__pycache__", ".venv", "venv"];

/// `std::fs` backed filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        fs::write(path, content)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Files loaded by a user request
#[derive(Debug, Default)]
pub struct LoadedFiles {
    /// (path relative to root, content)
    pub files: Vec<(String, String)>,
    /// Paths that could not be read as text
    pub skipped: Vec<String>,
}

/// Read a file, or every text file below a directory, relative to `root`
///
/// Binary and oversized files are reported in `skipped`.
pub fn load_text_files(root: &Path, target: &str) -> io::Result<LoadedFiles> {
    let start = root.join(target);
    if !start.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", start.display()),
        ));
    }

    let mut paths = Vec::new();
    if start.is_dir() {
        collect_files(&start, &mut paths)?;
        paths.sort();
    } else {
        paths.push(start);
    }

    let mut loaded = LoadedFiles::default();
    for path in paths {
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        let too_large = fs::metadata(&path)
            .map(|m| m.len() > MAX_LOAD_FILE_SIZE)
            .unwrap_or(true);
        if too_large {
            loaded.skipped.push(relative);
            continue;
        }

        match fs::read_to_string(&path) {
            Ok(content) => loaded.files.push((relative, content)),
            Err(_) => loaded.skipped.push(relative),
        }
    }
    Ok(loaded)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            let name = entry.file_name();
            if SKIPPED_DIRS.iter().any(|skip| name == *skip) {
                continue;
            }
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}
