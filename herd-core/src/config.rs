//! # Herd Configuration
//!
//! Settings live in a single YAML file, `herd_config.yaml`, at the root of the
//! data directory. A default file is written the first time the directory is
//! opened.
//!
//! ```yaml
//! rate_limit:
//!   max_calls: 15
//!   window_ms: 60000
//! growth:
//!   poor_below_kg_day: 0.5
//!   good_from_kg_day: 0.8
//!   arroba_kg: 15.0
//!   confidence_horizon_days: 365
//!   full_confidence_samples: 6
//! lineage:
//!   ancestor_depth: 3
//!   descendant_depth: 3
//! ```

use anyhow::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::domain::lineage_service::MAX_GENERATIONS;

pub const CONFIG_FILE_NAME: &str = "herd_config.yaml";
pub const DATA_DIR_ENV: &str = "HERD_DATA_DIR";

/// Quota for the external AI API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_calls: usize,
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 15,
            window_ms: 60_000,
        }
    }
}

/// Thresholds used by growth-rate classification and weight projections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    /// Daily gains below this are classified as poor
    pub poor_below_kg_day: f64,
    /// Daily gains at or above this are classified as good
    pub good_from_kg_day: f64,
    /// Kilograms per arroba used for slaughter targets
    pub arroba_kg: f64,
    /// Projection horizon at which confidence bottoms out
    pub confidence_horizon_days: i64,
    /// Number of weighings needed for full sample confidence
    pub full_confidence_samples: usize,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            poor_below_kg_day: 0.5,
            good_from_kg_day: 0.8,
            arroba_kg: 15.0,
            confidence_horizon_days: 365,
            full_confidence_samples: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    pub ancestor_depth: u8,
    pub descendant_depth: u8,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            ancestor_depth: 3,
            descendant_depth: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HerdConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub growth: GrowthConfig,
    #[serde(default)]
    pub lineage: LineageConfig,
}

impl HerdConfig {
    /// Load the config from `data_dir`, writing a default file if none exists
    pub fn load_or_create(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let yaml_content = fs::read_to_string(&config_path)?;
            let config: HerdConfig = serde_yaml::from_str(&yaml_content)?;
            debug!("Loaded herd config from {:?}", config_path);
            config.validate()?;
            Ok(config)
        } else {
            let config = HerdConfig::default();
            config.save(data_dir)?;
            info!("Created default herd config at {:?}", config_path);
            Ok(config)
        }
    }

    /// Write the config atomically through a temp file
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        if !data_dir.exists() {
            fs::create_dir_all(data_dir)?;
        }
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_path.with_extension("yaml.tmp");

        let yaml_content = serde_yaml::to_string(self)?;
        fs::write(&temp_path, yaml_content)?;
        fs::rename(&temp_path, &config_path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_calls == 0 {
            return Err(anyhow::anyhow!("rate_limit.max_calls must be at least 1"));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(anyhow::anyhow!("rate_limit.window_ms must be positive"));
        }
        if self.growth.arroba_kg <= 0.0 {
            return Err(anyhow::anyhow!("growth.arroba_kg must be positive"));
        }
        if self.growth.poor_below_kg_day > self.growth.good_from_kg_day {
            return Err(anyhow::anyhow!(
                "growth.poor_below_kg_day ({}) cannot exceed growth.good_from_kg_day ({})",
                self.growth.poor_below_kg_day,
                self.growth.good_from_kg_day
            ));
        }
        for (field, depth) in [
            ("lineage.ancestor_depth", self.lineage.ancestor_depth),
            ("lineage.descendant_depth", self.lineage.descendant_depth),
        ] {
            if depth > MAX_GENERATIONS {
                return Err(anyhow::anyhow!("{} must be at most {}, got {}", field, MAX_GENERATIONS, depth));
            }
        }
        Ok(())
    }
}

/// Resolve the data directory: `HERD_DATA_DIR` first, then `~/Documents/Herd Manager`
pub fn resolve_data_directory() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        let dir = dir.trim();
        if !dir.is_empty() {
            info!("Using data directory from {}: {}", DATA_DIR_ENV, dir);
            return Ok(PathBuf::from(dir));
        }
        warn!("{} is set but empty, falling back to default", DATA_DIR_ENV);
    }

    let documents_dir = dirs::document_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(documents_dir.join("Herd Manager"))
}
