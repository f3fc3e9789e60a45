//! # Backend Module
//!
//! Non-UI logic for the herd manager.
//!
//! - **Domain**: genealogy, derived metrics, growth projections and quota admission
//! - **Storage**: CSV persistence behind the `HerdStorage` trait
//!
//! [`Backend`] wires the services together from one data directory and its
//! `herd_config.yaml`.

pub mod domain;
pub mod storage;

use anyhow::Result;
use log::info;
use std::path::{Path, PathBuf};

use crate::config::{resolve_data_directory, HerdConfig, CONFIG_FILE_NAME};
use domain::{
    AdmissionMode, AssistantGateway, AssistantProvider, GrowthService, HerdService, LineageService, RateLimiter,
};
use storage::CsvConnection;

/// All services, sharing one data directory and configuration
#[derive(Clone)]
pub struct Backend {
    pub data_directory: PathBuf,
    pub config: HerdConfig,
    pub herd_service: HerdService<CsvConnection>,
    pub lineage_service: LineageService,
    pub growth_service: GrowthService,
    pub rate_limiter: RateLimiter,
}

impl Backend {
    /// Build the backend for `data_directory`, creating the config file if missing
    pub fn new<P: AsRef<Path>>(data_directory: P) -> Result<Self> {
        let data_directory = data_directory.as_ref().to_path_buf();
        info!("Setting up storage in {}", data_directory.display());
        let connection = CsvConnection::new(&data_directory)?;

        let config = HerdConfig::load_or_create(&data_directory)?;

        info!("Setting up domain services");
        let herd_service = HerdService::new(connection, config.growth.clone());
        let lineage_service = LineageService::new(config.lineage.clone());
        let growth_service = GrowthService::new(config.growth.clone());
        let rate_limiter = RateLimiter::from_config(&config.rate_limit);

        Ok(Self {
            data_directory,
            config,
            herd_service,
            lineage_service,
            growth_service,
            rate_limiter,
        })
    }

    /// Backend over the default data directory
    pub fn new_default() -> Result<Self> {
        Self::new(resolve_data_directory()?)
    }

    /// Gateway to an assistant provider, admitted through this backend's quota.
    ///
    /// Every gateway built from the same backend shares one call window.
    pub fn assistant_gateway<P: AssistantProvider>(&self, provider: P, mode: AdmissionMode) -> AssistantGateway<P> {
        AssistantGateway::new(provider, self.rate_limiter.clone(), mode)
    }
}
