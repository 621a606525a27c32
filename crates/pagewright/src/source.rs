//! Filesystem abstraction for template lookup.
//!
//! Path resolution only needs two primitives: "is this path a regular file?"
//! and "give me its contents". [`ViewSource`] captures exactly that, so the
//! candidate cascade can be exercised against an in-memory tree in tests and
//! against the real filesystem in production.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// What a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// Abstraction over template storage.
pub trait ViewSource: Send + Sync {
    /// Returns what `path` points at, or `None` if nothing exists there.
    fn stat(&self, path: &Path) -> Option<FileKind>;

    /// Reads the full contents of `path`.
    fn read(&self, path: &Path) -> io::Result<String>;

    /// Whether `path` names an existing regular file.
    fn is_file(&self, path: &Path) -> bool {
        self.stat(path) == Some(FileKind::File)
    }
}

// === Real implementation ===

/// Template storage backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSource;

impl ViewSource for FsSource {
    fn stat(&self, path: &Path) -> Option<FileKind> {
        let meta = std::fs::metadata(path).ok()?;
        if meta.is_dir() {
            Some(FileKind::Directory)
        } else {
            Some(FileKind::File)
        }
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

// === In-memory implementation ===

/// In-memory template tree.
///
/// Directories exist implicitly as prefixes of registered files. Every
/// [`read`](ViewSource::read) is counted per path, which lets tests assert
/// how often a template was loaded.
///
/// ```
/// use pagewright::source::{MemorySource, ViewSource};
/// use std::path::Path;
///
/// let source = MemorySource::new().with_file("views/en/home.html", "Hello");
/// assert!(source.is_file(Path::new("views/en/home.html")));
/// assert!(!source.is_file(Path::new("views/en")));
/// assert_eq!(source.read(Path::new("views/en/home.html")).unwrap(), "Hello");
/// assert_eq!(source.read_count("views/en/home.html"), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemorySource {
    files: HashMap<PathBuf, String>,
    reads: Mutex<HashMap<PathBuf, usize>>,
}

impl MemorySource {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file.
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Adds or replaces a file in place.
    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    /// Number of times `path` has been read.
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        self.reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path.as_ref())
            .copied()
            .unwrap_or(0)
    }

    /// Number of reads across all paths.
    pub fn total_reads(&self) -> usize {
        self.reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

impl ViewSource for MemorySource {
    fn stat(&self, path: &Path) -> Option<FileKind> {
        if self.files.contains_key(path) {
            return Some(FileKind::File);
        }
        self.files
            .keys()
            .any(|file| file.starts_with(path))
            .then_some(FileKind::Directory)
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        *self
            .reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_path_buf())
            .or_insert(0) += 1;

        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such template: {}", path.display()),
            )
        })
    }
}
