//! Urban resilience analysis CLI.
//!
//! Loads zones from GeoJSON, runs the full pipeline and prints the analysis run as JSON.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin resilience-analysis -- data/zones.sample.geojson [output.json]
//! ```
//!
//! # Environment Variables
//!
//! - `RESILIENCE_CONFIG`: Path to a TOML config (default: `resilience.toml` search, then built-in defaults)
//! - `RESILIENCE_CACHE_DIR`: Directory of cached JSON grids served as the local-cache tier
//! - `RESILIENCE_MAX_CONCURRENCY`, `RESILIENCE_FETCH_TIMEOUT_SECS`, `RESILIENCE_SYNTHETIC_SEED`: overrides
//! - `RUST_LOG`: Log filter (default: info)

use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use urban_resilience::acquisition::{DatasetSource, LocalCacheSource};
use urban_resilience::io::load_zones_geojson;
use urban_resilience::{AnalysisConfig, AnalysisEngine, DatasetRequest};

fn load_config() -> Result<AnalysisConfig> {
    let mut config = match env::var("RESILIENCE_CONFIG") {
        Ok(path) => AnalysisConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => match AnalysisConfig::find_default_location() {
            Some(path) => AnalysisConfig::from_file(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => {
                warn!("No resilience.toml found, using built-in defaults");
                AnalysisConfig::default()
            }
        },
    };
    config
        .apply_env_overrides()
        .context("Invalid RESILIENCE_* override")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let zones_path = args
        .get(1)
        .context("usage: resilience-analysis <zones.geojson> [output.json]")?;
    let output_path = args.get(2);

    let config = load_config()?;
    let zones = load_zones_geojson(Path::new(zones_path))?;
    info!(
        "Analysing {} zones in {} ({} rules)",
        zones.len(),
        config.region.name,
        config.rules.len()
    );

    let mut sources: Vec<Arc<dyn DatasetSource>> = Vec::new();
    if let Ok(dir) = env::var("RESILIENCE_CACHE_DIR") {
        let cache = LocalCacheSource::load_dir("local-cache", Path::new(&dir))?;
        sources.push(Arc::new(cache));
    }
    let engine = AnalysisEngine::new(config)?.with_sources(sources);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    let run = engine
        .run_async(&DatasetRequest::defaults(), &zones, cancel)
        .await?;

    info!(
        "City resilience {:.1} ({}), {} recommendations, checksum {}",
        run.city.score,
        run.city.status,
        run.recommendations.len(),
        run.input_checksum
    );
    for report in &run.datasets {
        info!(
            "  {:<26} {:<40} coverage {:>5.1}%",
            report.dataset,
            report.provenance.to_string(),
            report.coverage_fraction * 100.0
        );
    }

    let json = serde_json::to_string_pretty(&run).context("Failed to serialize analysis run")?;
    match output_path {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;
            info!("Wrote analysis run to {}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}
