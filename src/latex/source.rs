use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::warn;
use walkdir::WalkDir;

/// Read-only view of a directory of TeX sources.
///
/// The resolver only needs existence checks, whole-file reads and a recursive
/// listing, so both the real filesystem and an in-memory tree can back it.
pub trait SourceTree {
    /// Whether `path` names an existing regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Full text of the file at `path`. Invalid UTF-8 is replaced, not rejected.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Every file under `root`, recursively, in a stable order.
    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>>;

    /// Identity of a file for cycle detection.
    fn canonical(&self, path: &Path) -> PathBuf {
        normalize_path(path)
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// The local filesystem. Entries the walk cannot read are skipped with a warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTree;

impl SourceTree for FsTree {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn canonical(&self, path: &Path) -> PathBuf {
        fs::canonicalize(path).unwrap_or_else(|_| normalize_path(path))
    }
}

/// An in-memory tree, files kept in insertion order.
#[derive(Debug, Default, Clone)]
pub struct MemoryTree {
    files: Vec<(PathBuf, String)>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        let path = normalize_path(path.as_ref());
        let text = text.into();
        match self.files.iter_mut().find(|(p, _)| *p == path) {
            Some(existing) => existing.1 = text,
            None => self.files.push((path, text)),
        }
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    fn lookup(&self, path: &Path) -> Option<&str> {
        let path = normalize_path(path);
        self.files
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, text)| text.as_str())
    }
}

impl SourceTree for MemoryTree {
    fn is_file(&self, path: &Path) -> bool {
        self.lookup(path).is_some()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.lookup(path)
            .map(str::to_string)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display())))
    }

    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let root = normalize_path(root);
        Ok(self
            .files
            .iter()
            .filter(|(p, _)| p.starts_with(&root))
            .map(|(p, _)| p.clone())
            .collect())
    }
}
