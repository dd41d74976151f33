//! Temporary data directories paired with in-memory grids.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use geogrid::{MemoryGrid, MemorySource};
use tempfile::TempDir;

/// A real directory of placeholder files whose grid contents are served by a
/// [`MemorySource`]. File size and mtime come from the filesystem, so the
/// indexer sees genuine staleness changes.
pub struct DataDirFixture {
    dir: TempDir,
    source: Arc<MemorySource>,
}

impl DataDirFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {}", e)),
            source: Arc::new(MemorySource::new()),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source(&self) -> Arc<MemorySource> {
        self.source.clone()
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create `name` on disk and serve `grid` for it.
    pub fn add(&self, name: &str, grid: MemoryGrid) -> PathBuf {
        let path = self.file_path(name);
        let mut file = File::create(&path).unwrap_or_else(|e| panic!("create {}: {}", name, e));
        file.write_all(name.as_bytes())
            .unwrap_or_else(|e| panic!("write {}: {}", name, e));
        self.source.insert(path.clone(), grid);
        path
    }

    /// Create `name` on disk without a grid, so opening it fails.
    pub fn add_unreadable(&self, name: &str) -> PathBuf {
        let path = self.file_path(name);
        std::fs::write(&path, b"not a grid").unwrap_or_else(|e| panic!("write {}: {}", name, e));
        path
    }

    /// Replace the grid for `name` and push its mtime `secs` seconds forward.
    pub fn modify(&self, name: &str, grid: MemoryGrid, secs: u64) -> PathBuf {
        let path = self.file_path(name);
        self.source.insert(path.clone(), grid);
        self.shift_mtime(name, secs);
        path
    }

    pub fn shift_mtime(&self, name: &str, secs: u64) {
        let path = self.file_path(name);
        let file = File::options()
            .write(true)
            .open(&path)
            .unwrap_or_else(|e| panic!("open {}: {}", name, e));
        let current = file
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        file.set_modified(current + Duration::from_secs(secs))
            .unwrap_or_else(|e| panic!("set mtime {}: {}", name, e));
    }

    pub fn remove(&self, name: &str) {
        let path = self.file_path(name);
        std::fs::remove_file(&path).unwrap_or_else(|e| panic!("remove {}: {}", name, e));
        self.source.remove(&path);
    }
}

impl Default for DataDirFixture {
    fn default() -> Self {
        Self::new()
    }
}
