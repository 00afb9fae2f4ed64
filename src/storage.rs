//! Storage capability for moat
//!
//! The task store and markdown generator never touch paths directly; they
//! read and write named entries through a [`StorageDir`] bound at runtime.
//!
//! # Directory Structure
//!
//! ```text
//! <project>/
//!   .moat.toml                    # Optional configuration
//!   .moat/                        # Bound storage directory
//!     moat-tasks-detail.json      # Task snapshot (source of truth on disk)
//!     moat-tasks.md               # Generated task list
//!     screenshots/                # Screenshot assets
//!       <task-id>.png
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS, LOCK_FILE};

/// Name of the project-local storage directory
pub const MOAT_DIR: &str = ".moat";

/// Name of the screenshots subdirectory inside [`MOAT_DIR`]
pub const SCREENSHOTS_DIR: &str = "screenshots";

/// A directory-like handle the store persists through.
///
/// Entry names are single path components. Implementations must make
/// `write` a full replacement of the previous contents.
pub trait StorageDir: Send + Sync + fmt::Debug {
    /// Get or create an empty file.
    fn file(&self, name: &str) -> Result<()>;

    /// Get or create a subdirectory.
    fn dir(&self, name: &str) -> Result<Box<dyn StorageDir>>;

    /// Replace the full contents of a file, creating it if needed.
    fn write(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Read the full contents of a file; `None` if it does not exist.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a named entry; `false` if nothing was there.
    fn remove(&self, name: &str) -> Result<bool>;

    /// Sorted names of the files (not subdirectories) in this directory.
    fn files(&self) -> Result<Vec<String>>;

    /// Human-readable label for logs and error messages.
    fn describe(&self) -> String;
}

/// Reject names that would escape the directory or address nested paths.
pub fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidArgument(format!(
            "invalid entry name '{name}'"
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidArgument(format!(
            "entry name must be a single path component: '{name}'"
        )));
    }
    Ok(())
}

// =========================================================================
// Filesystem backend
// =========================================================================

/// A real directory on disk.
#[derive(Debug, Clone)]
pub struct FsDir {
    root: PathBuf,
}

impl FsDir {
    /// Wrap a path without touching the filesystem
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory (and parents) if missing
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Open an existing directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::NotConnected(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf> {
        validate_entry_name(name)?;
        Ok(self.root.join(name))
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

impl StorageDir for FsDir {
    fn file(&self, name: &str) -> Result<()> {
        let path = self.entry_path(name)?;
        OpenOptions::new().create(true).append(true).open(path)?;
        Ok(())
    }

    fn dir(&self, name: &str) -> Result<Box<dyn StorageDir>> {
        let path = self.entry_path(name)?;
        fs::create_dir_all(&path)?;
        Ok(Box::new(FsDir::new(path)))
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.entry_path(name)?;
        lock::write_atomic_locked(&path, data, self.lock_path(), DEFAULT_LOCK_TIMEOUT_MS)
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(name)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&self, name: &str) -> Result<bool> {
        let path = self.entry_path(name)?;
        let _lock = FileLock::acquire(self.lock_path(), DEFAULT_LOCK_TIMEOUT_MS)?;
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        if metadata.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(true)
    }

    fn files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            // lock file and in-flight temp files from atomic writes
            if name == LOCK_FILE || name.starts_with(".tmp") {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

// =========================================================================
// In-memory backend
// =========================================================================

#[derive(Debug, Default)]
struct MemoryNode {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeMap<String, Arc<Mutex<MemoryNode>>>,
    read_only: bool,
}

/// An in-memory directory tree.
///
/// Clones share the same tree, so a second store bound to a clone sees
/// what the first one wrote.
#[derive(Debug, Clone)]
pub struct MemoryDir {
    node: Arc<Mutex<MemoryNode>>,
    label: String,
}

impl Default for MemoryDir {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDir {
    pub fn new() -> Self {
        Self {
            node: Arc::new(Mutex::new(MemoryNode::default())),
            label: "memory:".to_string(),
        }
    }

    /// Make writes and removals in this directory fail with
    /// `PermissionDenied`, the way a revoked directory grant does.
    pub fn set_read_only(&self, read_only: bool) {
        self.node().read_only = read_only;
    }

    fn node(&self) -> MutexGuard<'_, MemoryNode> {
        self.node
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn writable(&self, node: &MemoryNode) -> Result<()> {
        if node.read_only {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is read-only", self.label),
            )));
        }
        Ok(())
    }
}

impl StorageDir for MemoryDir {
    fn file(&self, name: &str) -> Result<()> {
        validate_entry_name(name)?;
        let mut node = self.node();
        if node.files.contains_key(name) {
            return Ok(());
        }
        self.writable(&node)?;
        if node.dirs.contains_key(name) {
            return Err(Error::InvalidArgument(format!(
                "'{name}' is a directory"
            )));
        }
        node.files.insert(name.to_string(), Vec::new());
        Ok(())
    }

    fn dir(&self, name: &str) -> Result<Box<dyn StorageDir>> {
        validate_entry_name(name)?;
        let mut node = self.node();
        if node.files.contains_key(name) {
            return Err(Error::InvalidArgument(format!("'{name}' is a file")));
        }
        let child = match node.dirs.get(name) {
            Some(child) => Arc::clone(child),
            None => {
                self.writable(&node)?;
                let child = Arc::new(Mutex::new(MemoryNode::default()));
                node.dirs.insert(name.to_string(), Arc::clone(&child));
                child
            }
        };
        Ok(Box::new(MemoryDir {
            node: child,
            label: format!("{}{}/", self.label, name),
        }))
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        validate_entry_name(name)?;
        let mut node = self.node();
        self.writable(&node)?;
        if node.dirs.contains_key(name) {
            return Err(Error::InvalidArgument(format!(
                "'{name}' is a directory"
            )));
        }
        node.files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        validate_entry_name(name)?;
        Ok(self.node().files.get(name).cloned())
    }

    fn remove(&self, name: &str) -> Result<bool> {
        validate_entry_name(name)?;
        let mut node = self.node();
        self.writable(&node)?;
        let removed_file = node.files.remove(name).is_some();
        let removed_dir = node.dirs.remove(name).is_some();
        Ok(removed_file || removed_dir)
    }

    fn files(&self) -> Result<Vec<String>> {
        Ok(self.node().files.keys().cloned().collect())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
