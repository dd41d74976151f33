//! Service configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables (a `.env` file is loaded by the binary beforehand).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use grid_processor::Interpolation;
use renderer::DEFAULT_PALETTE;
use storage::ResourceCacheConfig;
use tile_common::DatasetType;

/// Runtime configuration of the tile service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory scanned for grid files.
    pub data_dir: PathBuf,
    /// sqlx connection string of the catalog store.
    pub catalog_url: String,
    /// Maximum distance between requested and matched valid time.
    pub time_tolerance_hours: f64,
    /// Dataset type used when a request names none.
    pub default_dataset_type: DatasetType,
    pub cache_max_entries: usize,
    pub cache_ttl_secs: u64,
    /// Seconds between indexing sweeps; 0 disables the periodic sweep.
    pub reindex_interval_secs: u64,
    pub reconcile_on_reindex: bool,
    /// Optional palette document merged over the built-in palettes.
    pub palette_file: Option<PathBuf>,
    pub default_palette: String,
    pub interpolation: Interpolation,
    pub request_timeout_secs: u64,
    /// Directory depth of the indexing scan (1 = data_dir only).
    pub max_scan_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            catalog_url: "sqlite://catalog.db".to_string(),
            time_tolerance_hours: 1.0,
            default_dataset_type: DatasetType::Era5,
            cache_max_entries: 8,
            cache_ttl_secs: 3600,
            reindex_interval_secs: 300,
            reconcile_on_reindex: true,
            palette_file: None,
            default_palette: DEFAULT_PALETTE.to_string(),
            interpolation: Interpolation::Linear,
            request_timeout_secs: 30,
            max_scan_depth: 1,
        }
    }
}

impl ServiceConfig {
    /// Defaults, overlaid by `file` when given, overlaid by the process
    /// environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                Self::from_yaml_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Override fields from environment variables, read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CATALOG_URL") {
            self.catalog_url = v;
        }
        if let Some(v) = lookup("PALETTE_FILE") {
            self.palette_file = (!v.trim().is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup("DEFAULT_PALETTE") {
            self.default_palette = v;
        }
        parse_env(&lookup, "TIME_TOLERANCE_HOURS", &mut self.time_tolerance_hours)?;
        parse_env(&lookup, "DEFAULT_DATASET_TYPE", &mut self.default_dataset_type)?;
        parse_env(&lookup, "CACHE_MAX_ENTRIES", &mut self.cache_max_entries)?;
        parse_env(&lookup, "CACHE_TTL_SECS", &mut self.cache_ttl_secs)?;
        parse_env(&lookup, "REINDEX_INTERVAL_SECS", &mut self.reindex_interval_secs)?;
        parse_env(&lookup, "RECONCILE_ON_REINDEX", &mut self.reconcile_on_reindex)?;
        parse_env(&lookup, "GRID_INTERPOLATION", &mut self.interpolation)?;
        parse_env(&lookup, "REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs)?;
        Ok(())
    }

    /// Reject settings the service cannot run with. The default palette is
    /// checked later against the loaded palette registry.
    pub fn validate(&self) -> Result<()> {
        if self.cache_max_entries == 0 {
            bail!("cache_max_entries must be at least 1");
        }
        if !self.time_tolerance_hours.is_finite() || self.time_tolerance_hours < 0.0 {
            bail!(
                "time_tolerance_hours must be a non-negative number, got {}",
                self.time_tolerance_hours
            );
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        if self.max_scan_depth == 0 {
            bail!("max_scan_depth must be at least 1");
        }
        if self.default_palette.trim().is_empty() {
            bail!("default_palette must not be empty");
        }
        Ok(())
    }

    pub fn cache_config(&self) -> ResourceCacheConfig {
        ResourceCacheConfig {
            max_entries: self.cache_max_entries,
            ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Interval of the periodic sweep, `None` when disabled.
    pub fn reindex_interval(&self) -> Option<Duration> {
        (self.reindex_interval_secs > 0).then(|| Duration::from_secs(self.reindex_interval_secs))
    }
}

fn parse_env<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}='{}': {}", key, raw, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        config.validate().unwrap();
        assert_eq!(config.time_tolerance_hours, 1.0);
        assert_eq!(config.cache_max_entries, 3);
        assert_eq!(config.reindex_interval(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let config = ServiceConfig::from_yaml_str(
            "data_dir: /srv/grids\ntime_tolerance_hours: 3\ndefault_dataset_type: carra\ninterpolation: nearest\n",
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/grids"));
        assert_eq!(config.time_tolerance_hours, 3.0);
        assert_eq!(config.default_dataset_type, DatasetType::Carra);
        assert_eq!(config.interpolation, Interpolation::Nearest);
        // Untouched fields keep defaults
        assert_eq!(config.cache_ttl_secs, 3600);
    }

    #[test]
    fn test_env_overrides_yaml() {
        let mut config = ServiceConfig::from_yaml_str("cache_max_entries: 4\n").unwrap();
        config
            .apply_env(env(&[
                ("CACHE_MAX_ENTRIES", "2"),
                ("RECONCILE_ON_REINDEX", "false"),
                ("REINDEX_INTERVAL_SECS", "0"),
                ("GRID_INTERPOLATION", "bilinear"),
                ("PALETTE_FILE", "/etc/palettes.json"),
            ]))
            .unwrap();
        assert_eq!(config.cache_max_entries, 2);
        assert!(!config.reconcile_on_reindex);
        assert_eq!(config.reindex_interval(), None);
        assert_eq!(config.interpolation, Interpolation::Linear);
        assert_eq!(config.palette_file, Some(PathBuf::from("/etc/palettes.json")));
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_env(env(&[("TIME_TOLERANCE_HOURS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("TIME_TOLERANCE_HOURS"));
    }

    #[test]
    fn test_validate_rejects() {
        let config = ServiceConfig {
            cache_max_entries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServiceConfig {
            time_tolerance_hours: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(ServiceConfig::from_yaml_str("").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile-api.yaml");
        std::fs::write(&path, "cache_max_entries: 3\nreconcile_on_reindex: false\n").unwrap();

        let config = ServiceConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.cache_max_entries, 3);
        assert!(!config.reconcile_on_reindex);

        let err = ServiceConfig::from_yaml_file(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }
}
