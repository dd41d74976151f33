//! Dataset catalog backed by SQLite.
//!
//! One row per indexed file plus one row per valid time inside it. Times are
//! stored as Unix seconds.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use tile_common::{DatasetType, TileError, TileResult};

use crate::extract::{ExtractedMetadata, FileStat, TimeSource};

/// Database connection pool and catalog operations.
#[derive(Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    /// Open (creating if needed) the catalog at `database_url`,
    /// e.g. `sqlite://catalog.db`.
    pub async fn connect(database_url: &str) -> TileResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| TileError::Store(format!("Invalid catalog URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| TileError::Store(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// A private in-memory catalog. Lives as long as the returned value.
    pub async fn connect_in_memory() -> TileResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| TileError::Store(format!("Invalid catalog URL: {}", e)))?
            .foreign_keys(true);

        // Every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| TileError::Store(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> TileResult<()> {
        // Split SQL statements and execute them individually
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| TileError::Store(format!("Migration failed: {}", e)))?;
            }
        }

        Ok(())
    }

    /// Insert or replace the record for `file` and all of its time entries.
    ///
    /// The dataset id is stable across updates of the same path.
    pub async fn upsert(&self, file: &FileStat, meta: &ExtractedMetadata) -> TileResult<i64> {
        let representative = meta
            .representative_time()
            .ok_or_else(|| TileError::Internal(format!("{} has no valid times", file.path.display())))?;
        let variables = serde_json::to_string(&meta.variables)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TileError::Store(format!("Begin failed: {}", e)))?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO datasets (
                path, dataset_type, representative_time,
                file_size, last_modified, variables, time_source, indexed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (path) DO UPDATE SET
                dataset_type = excluded.dataset_type,
                representative_time = excluded.representative_time,
                file_size = excluded.file_size,
                last_modified = excluded.last_modified,
                variables = excluded.variables,
                time_source = excluded.time_source,
                indexed_at = excluded.indexed_at
            RETURNING id
            "#,
        )
        .bind(path_key(&file.path))
        .bind(meta.dataset_type.as_str())
        .bind(representative.timestamp())
        .bind(file.size as i64)
        .bind(file.modified.timestamp())
        .bind(&variables)
        .bind(meta.time_source.as_str())
        .bind(Utc::now().timestamp())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| TileError::Store(format!("Upsert failed: {}", e)))?;

        sqlx::query("DELETE FROM time_entries WHERE dataset_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| TileError::Store(format!("Delete failed: {}", e)))?;

        for (ordinal, time) in meta.times.iter().enumerate() {
            sqlx::query("INSERT INTO time_entries (dataset_id, time_value, ordinal) VALUES (?, ?, ?)")
                .bind(id)
                .bind(time.timestamp())
                .bind(ordinal as i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| TileError::Store(format!("Insert failed: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| TileError::Store(format!("Commit failed: {}", e)))?;

        debug!(
            path = %file.path.display(),
            dataset_id = id,
            times = meta.times.len(),
            "Catalog record upserted"
        );
        Ok(id)
    }

    /// Stored modification time of every indexed path.
    pub async fn indexed_mtimes(&self) -> TileResult<Vec<(PathBuf, DateTime<Utc>)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT path, last_modified FROM datasets")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TileError::Store(format!("Query failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(path, mtime)| (PathBuf::from(path), from_epoch(mtime)))
            .collect())
    }

    /// Find the file and time slice nearest to `requested` for one dataset
    /// type, within `tolerance_hours` (inclusive).
    ///
    /// Representative times are checked first. When none is within
    /// tolerance, every time entry of the type is considered. Equal
    /// distances go to the lowest dataset id, then the lowest ordinal.
    pub async fn resolve_nearest(
        &self,
        dataset_type: DatasetType,
        requested: DateTime<Utc>,
        tolerance_hours: f64,
    ) -> TileResult<Option<ResolvedDataset>> {
        let target = requested.timestamp();

        let representative: Option<MatchRow> = sqlx::query_as(
            r#"
            SELECT d.id AS dataset_id, d.path AS path,
                   d.representative_time AS time_value,
                   COALESCE(
                       (SELECT MIN(e.ordinal) FROM time_entries e
                        WHERE e.dataset_id = d.id AND e.time_value = d.representative_time),
                       0
                   ) AS ordinal,
                   ABS(d.representative_time - ?) AS diff_seconds
            FROM datasets d
            WHERE d.dataset_type = ?
            ORDER BY diff_seconds ASC, d.id ASC
            LIMIT 1
            "#,
        )
        .bind(target)
        .bind(dataset_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TileError::Store(format!("Query failed: {}", e)))?;

        if let Some(row) = representative.filter(|r| within(r, tolerance_hours)) {
            return Ok(Some(row.into()));
        }

        let entry: Option<MatchRow> = sqlx::query_as(
            r#"
            SELECT d.id AS dataset_id, d.path AS path, e.time_value AS time_value,
                   e.ordinal AS ordinal, ABS(e.time_value - ?) AS diff_seconds
            FROM time_entries e
            JOIN datasets d ON d.id = e.dataset_id
            WHERE d.dataset_type = ?
            ORDER BY diff_seconds ASC, d.id ASC, e.ordinal ASC
            LIMIT 1
            "#,
        )
        .bind(target)
        .bind(dataset_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TileError::Store(format!("Query failed: {}", e)))?;

        Ok(entry
            .filter(|r| within(r, tolerance_hours))
            .map(ResolvedDataset::from))
    }

    /// All records, optionally restricted to one dataset type.
    pub async fn list_records(&self, dataset_type: Option<DatasetType>) -> TileResult<Vec<DatasetRecord>> {
        let rows: Vec<DatasetRow> = match dataset_type {
            Some(ty) => {
                let sql = format!(
                    "{} WHERE dataset_type = ? ORDER BY representative_time, id",
                    SELECT_RECORD
                );
                sqlx::query_as(&sql)
                    .bind(ty.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("{} ORDER BY representative_time, id", SELECT_RECORD);
                sqlx::query_as(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(|e| TileError::Store(format!("Query failed: {}", e)))?;

        Ok(rows.into_iter().map(DatasetRecord::from).collect())
    }

    /// The record for one path, if indexed.
    pub async fn record(&self, path: &Path) -> TileResult<Option<DatasetRecord>> {
        let sql = format!("{} WHERE path = ?", SELECT_RECORD);
        let row: Option<DatasetRow> = sqlx::query_as(&sql)
            .bind(path_key(path))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TileError::Store(format!("Query failed: {}", e)))?;

        Ok(row.map(DatasetRecord::from))
    }

    /// Valid times of one file in ordinal order.
    pub async fn times_for(&self, path: &Path) -> TileResult<Vec<DateTime<Utc>>> {
        let times: Vec<i64> = sqlx::query_scalar(
            "SELECT e.time_value FROM time_entries e \
             JOIN datasets d ON d.id = e.dataset_id \
             WHERE d.path = ? ORDER BY e.ordinal",
        )
        .bind(path_key(path))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TileError::Store(format!("Query failed: {}", e)))?;

        Ok(times.into_iter().map(from_epoch).collect())
    }

    /// Distinct valid times available for a dataset type, ascending.
    pub async fn available_times(&self, dataset_type: DatasetType) -> TileResult<Vec<DateTime<Utc>>> {
        let times: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT e.time_value FROM time_entries e \
             JOIN datasets d ON d.id = e.dataset_id \
             WHERE d.dataset_type = ? ORDER BY e.time_value",
        )
        .bind(dataset_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TileError::Store(format!("Query failed: {}", e)))?;

        Ok(times.into_iter().map(from_epoch).collect())
    }

    /// Remove one path and its time entries. Returns whether a record existed.
    pub async fn remove(&self, path: &Path) -> TileResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TileError::Store(format!("Begin failed: {}", e)))?;

        sqlx::query(
            "DELETE FROM time_entries WHERE dataset_id IN (SELECT id FROM datasets WHERE path = ?)",
        )
        .bind(path_key(path))
        .execute(&mut *tx)
        .await
        .map_err(|e| TileError::Store(format!("Delete failed: {}", e)))?;

        let result = sqlx::query("DELETE FROM datasets WHERE path = ?")
            .bind(path_key(path))
            .execute(&mut *tx)
            .await
            .map_err(|e| TileError::Store(format!("Delete failed: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| TileError::Store(format!("Commit failed: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete records whose backing file no longer exists.
    ///
    /// Returns the removed paths.
    pub async fn reconcile(&self) -> TileResult<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for (path, _) in self.indexed_mtimes().await? {
            let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
            if !exists && self.remove(&path).await? {
                removed.push(path);
            }
        }

        if !removed.is_empty() {
            info!(removed = removed.len(), "Purged catalog records for deleted files");
        }
        Ok(removed)
    }

    /// Count of indexed files.
    pub async fn count(&self) -> TileResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM datasets")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TileError::Store(format!("Query failed: {}", e)))
    }
}

/// Outcome of a successful nearest-time lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDataset {
    pub dataset_id: i64,
    pub path: PathBuf,
    pub matched_time: DateTime<Utc>,
    pub diff_hours: f64,
    /// Index of the matched time along the file's time axis.
    pub time_ordinal: usize,
}

/// One indexed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: i64,
    pub path: PathBuf,
    pub dataset_type: DatasetType,
    pub representative_time: DateTime<Utc>,
    pub file_size: u64,
    pub last_modified: DateTime<Utc>,
    pub variables: Vec<String>,
    pub time_source: TimeSource,
    pub indexed_at: DateTime<Utc>,
}

const SELECT_RECORD: &str = "SELECT id, path, dataset_type, representative_time, file_size, \
     last_modified, variables, time_source, indexed_at FROM datasets";

#[derive(FromRow)]
struct DatasetRow {
    id: i64,
    path: String,
    dataset_type: String,
    representative_time: i64,
    file_size: i64,
    last_modified: i64,
    variables: String,
    time_source: String,
    indexed_at: i64,
}

impl From<DatasetRow> for DatasetRecord {
    fn from(row: DatasetRow) -> Self {
        Self {
            id: row.id,
            path: PathBuf::from(row.path),
            dataset_type: row.dataset_type.parse().unwrap_or(DatasetType::Unknown),
            representative_time: from_epoch(row.representative_time),
            file_size: row.file_size.max(0) as u64,
            last_modified: from_epoch(row.last_modified),
            variables: serde_json::from_str(&row.variables).unwrap_or_default(),
            time_source: TimeSource::parse(&row.time_source).unwrap_or(TimeSource::Modified),
            indexed_at: from_epoch(row.indexed_at),
        }
    }
}

#[derive(FromRow)]
struct MatchRow {
    dataset_id: i64,
    path: String,
    time_value: i64,
    ordinal: i64,
    diff_seconds: i64,
}

fn within(row: &MatchRow, tolerance_hours: f64) -> bool {
    row.diff_seconds as f64 / 3600.0 <= tolerance_hours
}

impl From<MatchRow> for ResolvedDataset {
    fn from(row: MatchRow) -> Self {
        Self {
            dataset_id: row.dataset_id,
            path: PathBuf::from(row.path),
            matched_time: from_epoch(row.time_value),
            diff_hours: row.diff_seconds as f64 / 3600.0,
            time_ordinal: row.ordinal.max(0) as usize,
        }
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn from_epoch(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

/// SQL schema for the catalog.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS datasets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    dataset_type TEXT NOT NULL,
    representative_time INTEGER NOT NULL,
    file_size INTEGER NOT NULL,
    last_modified INTEGER NOT NULL,
    variables TEXT NOT NULL,
    time_source TEXT NOT NULL,
    indexed_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_datasets_type_time
    ON datasets (dataset_type, representative_time);

CREATE TABLE IF NOT EXISTS time_entries (
    dataset_id INTEGER NOT NULL REFERENCES datasets (id) ON DELETE CASCADE,
    time_value INTEGER NOT NULL,
    ordinal INTEGER NOT NULL,
    PRIMARY KEY (dataset_id, ordinal)
);

CREATE INDEX IF NOT EXISTS idx_time_entries_time
    ON time_entries (time_value)
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn file(name: &str) -> FileStat {
        FileStat {
            path: PathBuf::from(format!("/data/{}", name)),
            file_name: name.to_string(),
            size: 1024,
            modified: t(12, 0),
        }
    }

    fn meta(ty: DatasetType, times: Vec<DateTime<Utc>>) -> ExtractedMetadata {
        ExtractedMetadata {
            dataset_type: ty,
            times,
            time_source: TimeSource::Coordinate,
            variables: vec!["z".to_string()],
        }
    }

    async fn catalog() -> Catalog {
        let catalog = Catalog::connect_in_memory().await.unwrap();
        catalog.migrate().await.unwrap();
        catalog
    }

    #[tokio::test]
    async fn test_exact_match_with_zero_tolerance() {
        let catalog = catalog().await;
        catalog
            .upsert(&file("era5_a.nc"), &meta(DatasetType::Era5, vec![t(6, 0)]))
            .await
            .unwrap();

        let hit = catalog
            .resolve_nearest(DatasetType::Era5, t(6, 0), 0.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.path, PathBuf::from("/data/era5_a.nc"));
        assert_eq!(hit.diff_hours, 0.0);
        assert_eq!(hit.time_ordinal, 0);
    }

    #[tokio::test]
    async fn test_tolerance_window() {
        let catalog = catalog().await;
        catalog
            .upsert(&file("era5_a.nc"), &meta(DatasetType::Era5, vec![t(0, 0)]))
            .await
            .unwrap();

        let hit = catalog
            .resolve_nearest(DatasetType::Era5, t(0, 30), 1.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.diff_hours, 0.5);
        assert_eq!(hit.matched_time, t(0, 0));

        assert!(catalog
            .resolve_nearest(DatasetType::Era5, t(3, 0), 1.0)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_falls_back_to_inner_time_steps() {
        let catalog = catalog().await;
        // Representative time 00:00 is 5h away; the 05:00 step is exact
        let times = (0..6).map(|h| t(h, 0)).collect();
        catalog
            .upsert(&file("era5_multi.nc"), &meta(DatasetType::Era5, times))
            .await
            .unwrap();

        let hit = catalog
            .resolve_nearest(DatasetType::Era5, t(5, 0), 1.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.time_ordinal, 5);
        assert_eq!(hit.matched_time, t(5, 0));
    }

    #[tokio::test]
    async fn test_type_isolation_and_equal_tie() {
        let catalog = catalog().await;
        catalog
            .upsert(&file("era5_first.nc"), &meta(DatasetType::Era5, vec![t(1, 0)]))
            .await
            .unwrap();
        catalog
            .upsert(&file("era5_second.nc"), &meta(DatasetType::Era5, vec![t(3, 0)]))
            .await
            .unwrap();
        catalog
            .upsert(
                &file("era5_single_x.nc"),
                &meta(DatasetType::Era5Single, vec![t(2, 0)]),
            )
            .await
            .unwrap();

        let hit = catalog
            .resolve_nearest(DatasetType::Era5, t(2, 0), 1.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.path, PathBuf::from("/data/era5_first.nc"));

        let single = catalog
            .resolve_nearest(DatasetType::Era5Single, t(2, 0), 0.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(single.path, PathBuf::from("/data/era5_single_x.nc"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_entries_and_keeps_id() {
        let catalog = catalog().await;
        let f = file("era5_a.nc");
        let id1 = catalog
            .upsert(&f, &meta(DatasetType::Era5, vec![t(0, 0), t(1, 0)]))
            .await
            .unwrap();
        let id2 = catalog
            .upsert(&f, &meta(DatasetType::Era5, vec![t(6, 0)]))
            .await
            .unwrap();

        assert_eq!(id1, id2);
        assert_eq!(catalog.times_for(&f.path).await.unwrap(), vec![t(6, 0)]);
        assert_eq!(catalog.count().await.unwrap(), 1);

        let record = catalog.record(&f.path).await.unwrap().unwrap();
        assert_eq!(record.representative_time, t(6, 0));
        assert_eq!(record.variables, vec!["z".to_string()]);
        assert_eq!(record.file_size, 1024);
    }

    #[tokio::test]
    async fn test_reconcile_purges_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("era5_kept.nc");
        std::fs::write(&kept, b"x").unwrap();

        let catalog = catalog().await;
        let mut kept_stat = file("era5_kept.nc");
        kept_stat.path = kept.clone();
        catalog
            .upsert(&kept_stat, &meta(DatasetType::Era5, vec![t(0, 0)]))
            .await
            .unwrap();
        catalog
            .upsert(&file("era5_gone.nc"), &meta(DatasetType::Era5, vec![t(1, 0)]))
            .await
            .unwrap();

        let removed = catalog.reconcile().await.unwrap();
        assert_eq!(removed, vec![PathBuf::from("/data/era5_gone.nc")]);
        assert_eq!(catalog.count().await.unwrap(), 1);
        assert_eq!(
            catalog.available_times(DatasetType::Era5).await.unwrap(),
            vec![t(0, 0)]
        );
    }

    #[tokio::test]
    async fn test_list_records_by_type() {
        let catalog = catalog().await;
        catalog
            .upsert(&file("era5_a.nc"), &meta(DatasetType::Era5, vec![t(0, 0)]))
            .await
            .unwrap();
        catalog
            .upsert(&file("carra_a.nc"), &meta(DatasetType::Carra, vec![t(0, 0)]))
            .await
            .unwrap();

        assert_eq!(catalog.list_records(None).await.unwrap().len(), 2);
        let carra = catalog.list_records(Some(DatasetType::Carra)).await.unwrap();
        assert_eq!(carra.len(), 1);
        assert_eq!(carra[0].dataset_type, DatasetType::Carra);
    }
}
