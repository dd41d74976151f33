//! Application state and shared resources.
//!
//! Everything shared between requests is built once here and passed to the
//! router explicitly.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::Mutex;
use tracing::{debug, info};

use geogrid::GridSource;
use renderer::PaletteRegistry;
use storage::{Catalog, Indexer, ResourceCache};

use crate::config::ServiceConfig;
use crate::service::{TileService, TileSettings};

/// Shared application state.
pub struct AppState {
    pub config: ServiceConfig,
    pub catalog: Catalog,
    pub cache: Arc<ResourceCache>,
    pub indexer: Indexer,
    pub tiles: TileService,
    pub palettes: Arc<PaletteRegistry>,
    /// Set when a Prometheus recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
    /// Serialises indexing sweeps (periodic and manual).
    pub sweep_lock: Mutex<()>,
}

impl AppState {
    /// Connect the catalog named in `config` and assemble the state.
    pub async fn new(config: ServiceConfig, source: Arc<dyn GridSource>) -> Result<Self> {
        let catalog = Catalog::connect(&config.catalog_url)
            .await
            .with_context(|| format!("Failed to open catalog {}", config.catalog_url))?;
        catalog.migrate().await?;
        let palettes = load_palettes(&config)?;
        info!(
            catalog = %config.catalog_url,
            data_dir = %config.data_dir.display(),
            palettes = palettes.names().len(),
            "Application state initialised"
        );
        Ok(Self::from_parts(config, catalog, source, palettes))
    }

    /// Assemble the state from already-built parts.
    pub fn from_parts(
        config: ServiceConfig,
        catalog: Catalog,
        source: Arc<dyn GridSource>,
        palettes: PaletteRegistry,
    ) -> Self {
        let cache = Arc::new(ResourceCache::new(source.clone(), config.cache_config()));
        let indexer = Indexer::new(catalog.clone(), source, config.data_dir.clone())
            .with_max_depth(config.max_scan_depth);
        let palettes = Arc::new(palettes);
        let tiles = TileService::new(
            catalog.clone(),
            cache.clone(),
            palettes.clone(),
            TileSettings {
                tolerance_hours: config.time_tolerance_hours,
                default_dataset_type: config.default_dataset_type,
                interpolation: config.interpolation,
                timeout: config.request_timeout(),
            },
        );

        Self {
            config,
            catalog,
            cache,
            indexer,
            tiles,
            palettes,
            prometheus: None,
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

/// Built-in palettes, the optional override file, and the configured default.
pub fn load_palettes(config: &ServiceConfig) -> Result<PaletteRegistry> {
    let mut registry = PaletteRegistry::builtin()?;
    if let Some(path) = &config.palette_file {
        registry
            .load_file(path)
            .with_context(|| format!("Failed to load palettes from {}", path.display()))?;
        info!(path = %path.display(), "Loaded palette overrides");
    }
    registry
        .set_default(&config.default_palette)
        .with_context(|| format!("Unknown default palette '{}'", config.default_palette))?;
    debug!(default = registry.default_name(), "Palettes ready");
    Ok(registry)
}
