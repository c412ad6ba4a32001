//! Cached access to files and directories on disk

use log::trace;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A file read from disk
#[derive(Debug)]
pub struct FileEntry {
    path: PathBuf,
    contents: String,
}

impl FileEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Directory containing the file
    pub fn dir(&self) -> Option<&Path> {
        self.path.parent()
    }
}

/// File system access for one session
///
/// Lookups are cached, including misses, so a header probed in several search
/// directories only touches the disk once per directory.
#[derive(Debug, Default)]
pub struct FileManager {
    files: HashMap<PathBuf, Option<Arc<FileEntry>>>,
    directories: HashMap<PathBuf, bool>,
}

impl FileManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a regular file, reading it on first access
    ///
    /// Non-UTF-8 bytes are replaced, matching how the parser consumes text.
    pub fn get_file(&mut self, path: &Path) -> Option<Arc<FileEntry>> {
        if let Some(cached) = self.files.get(path) {
            return cached.clone();
        }

        let entry = match fs::read(path) {
            Ok(bytes) if path.is_file() => {
                trace!("Read {} bytes from {}", bytes.len(), path.display());
                Some(Arc::new(FileEntry {
                    path: path.to_path_buf(),
                    contents: String::from_utf8_lossy(&bytes).into_owned(),
                }))
            }
            _ => None,
        };

        self.files.insert(path.to_path_buf(), entry.clone());
        entry
    }

    /// Whether `path` names an existing directory
    pub fn directory_exists(&mut self, path: &Path) -> bool {
        if let Some(exists) = self.directories.get(path) {
            return *exists;
        }

        let exists = path.is_dir();
        self.directories.insert(path.to_path_buf(), exists);
        exists
    }

    /// Number of file lookups performed, hits and misses
    pub fn cached_file_count(&self) -> usize {
        self.files.len()
    }
}
