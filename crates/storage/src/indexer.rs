//! Directory sweep that keeps the catalog in step with the data directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use geogrid::GridSource;
use tile_common::{TileError, TileResult};

use crate::catalog::Catalog;
use crate::extract::{extract_metadata, FileStat};

/// File extensions treated as grid files.
pub const GRID_EXTENSIONS: &[&str] = &["nc", "nc4", "netcdf"];

/// Summary of one indexing sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReindexReport {
    pub scanned: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub removed: usize,
    /// Paths whose record was (re)written in this sweep.
    pub updated_paths: Vec<PathBuf>,
    /// Paths whose record was purged because the file disappeared.
    pub removed_paths: Vec<PathBuf>,
    pub duration_ms: u64,
}

/// Indexes grid files under one directory into a catalog.
#[derive(Clone)]
pub struct Indexer {
    catalog: Catalog,
    source: Arc<dyn GridSource>,
    data_dir: PathBuf,
    max_depth: usize,
}

impl Indexer {
    pub fn new(catalog: Catalog, source: Arc<dyn GridSource>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            source,
            data_dir: data_dir.into(),
            max_depth: 1,
        }
    }

    /// How many directory levels below `data_dir` to scan (1 = flat).
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Scan the data directory and re-extract every new or modified file.
    ///
    /// A file is stale when the catalog has no record for it or the stored
    /// modification time differs by at least one second. Files that cannot
    /// be read are logged and skipped; they are retried on the next sweep.
    /// Catalog store failures abort the sweep.
    pub async fn reindex(&self) -> TileResult<ReindexReport> {
        let start = Instant::now();
        let files = self.scan().await?;
        let indexed: HashMap<PathBuf, i64> = self
            .catalog
            .indexed_mtimes()
            .await?
            .into_iter()
            .map(|(p, t)| (p, t.timestamp()))
            .collect();

        let mut report = ReindexReport {
            scanned: files.len(),
            ..Default::default()
        };

        for file in files {
            let stale = indexed
                .get(&file.path)
                .map_or(true, |stored| (file.modified.timestamp() - stored).abs() >= 1);
            if !stale {
                report.unchanged += 1;
                continue;
            }

            let source = self.source.clone();
            let candidate = file.clone();
            let extracted =
                tokio::task::spawn_blocking(move || extract_metadata(source.as_ref(), &candidate))
                    .await
                    .map_err(|e| TileError::Internal(format!("Extraction task failed: {}", e)))?;

            match extracted {
                Ok(meta) => {
                    self.catalog.upsert(&file, &meta).await.map_err(|e| {
                        error!(path = %file.path.display(), error = %e, "Catalog write failed");
                        e
                    })?;
                    debug!(
                        path = %file.path.display(),
                        dataset_type = %meta.dataset_type,
                        time_source = meta.time_source.as_str(),
                        times = meta.times.len(),
                        "Indexed grid file"
                    );
                    report.updated += 1;
                    report.updated_paths.push(file.path);
                }
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Skipping unreadable grid file");
                    report.failed += 1;
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            scanned = report.scanned,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Reindex complete"
        );
        Ok(report)
    }

    /// Sweep, then purge records for files that disappeared.
    pub async fn reindex_and_reconcile(&self) -> TileResult<ReindexReport> {
        let mut report = self.reindex().await?;
        report.removed_paths = self.catalog.reconcile().await?;
        report.removed = report.removed_paths.len();
        Ok(report)
    }

    async fn scan(&self) -> TileResult<Vec<FileStat>> {
        let dir = self.data_dir.clone();
        let max_depth = self.max_depth;
        tokio::task::spawn_blocking(move || scan_directory(&dir, max_depth))
            .await
            .map_err(|e| TileError::Internal(format!("Scan task failed: {}", e)))?
    }
}

/// List grid files under `dir`, sorted by path.
pub fn scan_directory(dir: &Path, max_depth: usize) -> TileResult<Vec<FileStat>> {
    if !dir.is_dir() {
        return Err(TileError::Internal(format!(
            "Data directory {} does not exist",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_grid_file(entry.path()) {
            continue;
        }
        match entry.metadata() {
            Ok(meta) => files.push(FileStat::from_metadata(entry.path(), &meta)),
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Cannot stat file"),
        }
    }
    Ok(files)
}

fn is_grid_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| GRID_EXTENSIONS.iter().any(|g| e.eq_ignore_ascii_case(g)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_extensions() {
        assert!(is_grid_file(Path::new("/d/era5.nc")));
        assert!(is_grid_file(Path::new("/d/era5.NC4")));
        assert!(!is_grid_file(Path::new("/d/era5.grib2")));
        assert!(!is_grid_file(Path::new("/d/README")));
    }

    #[test]
    fn test_scan_directory_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_era5.nc"), b"b").unwrap();
        std::fs::write(dir.path().join("a_era5.nc"), b"a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"n").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/c_era5.nc"), b"c").unwrap();

        let files = scan_directory(dir.path(), 1).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a_era5.nc", "b_era5.nc"]);
        assert_eq!(files[0].size, 1);

        assert_eq!(scan_directory(dir.path(), 2).unwrap().len(), 3);
        assert!(scan_directory(&dir.path().join("missing"), 1).is_err());
    }
}
