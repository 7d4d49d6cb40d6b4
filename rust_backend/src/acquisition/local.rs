//! In-memory local cache source.
//!
//! Holds previously downloaded grids keyed by dataset name. It is the last real tier
//! before synthetic data, and doubles as a deterministic stand-in for upstream
//! providers in tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::source::{DatasetSource, FetchRequest, SourceResult};
use crate::core::{Provenance, RawObservationGrid, SourceTier};

/// Cached grids served from memory.
#[derive(Debug, Clone)]
pub struct LocalCacheSource {
    name: String,
    grids: Arc<RwLock<HashMap<String, Vec<RawObservationGrid>>>>,
}

impl LocalCacheSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grids: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a grid to the cache under its own dataset name.
    pub fn insert(&self, grid: RawObservationGrid) {
        self.grids
            .write()
            .entry(grid.dataset.clone())
            .or_default()
            .push(grid);
    }

    pub fn with_grid(self, grid: RawObservationGrid) -> Self {
        self.insert(grid);
        self
    }

    /// Number of cached grids for `dataset`.
    pub fn cached(&self, dataset: &str) -> usize {
        self.grids.read().get(dataset).map(Vec::len).unwrap_or(0)
    }

    /// Load every `*.json` grid in `dir` into a new cache.
    pub fn load_dir(name: impl Into<String>, dir: &Path) -> Result<Self> {
        let cache = Self::new(name);
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read cache directory {}", dir.display()))?;
        for entry in entries {
            let path = entry.context("Failed to read cache directory entry")?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let deserializer = &mut serde_json::Deserializer::from_str(&content);
            let grid: RawObservationGrid = serde_path_to_error::deserialize(deserializer)
                .with_context(|| format!("Failed to parse cached grid {}", path.display()))?;
            cache.insert(grid);
        }
        log::info!(
            "Loaded {} cached grids from {}",
            cache.grids.read().values().map(Vec::len).sum::<usize>(),
            dir.display()
        );
        Ok(cache)
    }
}

#[async_trait]
impl DatasetSource for LocalCacheSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn tier(&self) -> SourceTier {
        SourceTier::LocalCache
    }

    /// The most recent cached grid captured inside the window.
    async fn fetch(&self, request: &FetchRequest) -> SourceResult<Option<RawObservationGrid>> {
        let grids = self.grids.read();
        let latest = grids
            .get(&request.dataset)
            .into_iter()
            .flatten()
            .filter(|g| request.window.contains(g.captured_at))
            .max_by_key(|g| g.captured_at)
            .cloned();
        Ok(latest.map(|mut grid| {
            grid.provenance = Provenance::real(SourceTier::LocalCache, self.name.clone());
            grid
        }))
    }
}
