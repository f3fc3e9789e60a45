//! Herd service: loads records from storage into an immutable
//! [`HerdSnapshot`] and builds the derived metrics for it.
//!
//! Every write goes through here so callers know a new snapshot is needed
//! afterwards; nothing is updated incrementally.

use anyhow::Result;
use chrono::NaiveDate;
use log::info;
use shared::{Animal, BreedingSeason};

use crate::backend::domain::derived_metrics_service::DerivedMetricsService;
use crate::backend::domain::identity_resolver;
use crate::backend::domain::models::herd::HerdSnapshot;
use crate::backend::domain::models::lineage::AncestorRef;
use crate::backend::storage::{Connection, HerdStorage};
use crate::config::GrowthConfig;

#[derive(Clone)]
pub struct HerdService<C: Connection> {
    repository: C::HerdRepository,
    growth_config: GrowthConfig,
}

impl<C: Connection> HerdService<C> {
    pub fn new(connection: C, growth_config: GrowthConfig) -> Self {
        Self {
            repository: connection.create_herd_repository(),
            growth_config,
        }
    }

    /// Read every animal and breeding season into a fresh snapshot
    pub async fn load_snapshot(&self) -> Result<HerdSnapshot> {
        let animals = self.repository.list_animals().await?;
        let seasons = self.repository.list_breeding_seasons().await?;
        let snapshot = HerdSnapshot::new(animals, seasons);
        info!(
            "Loaded herd snapshot {} ({} animals, {} breeding seasons)",
            snapshot.version(),
            snapshot.len(),
            snapshot.breeding_seasons().len()
        );
        Ok(snapshot)
    }

    /// Load a snapshot and build its derived metrics as of `today`
    pub async fn build_metrics(&self, today: NaiveDate) -> Result<DerivedMetricsService> {
        let snapshot = self.load_snapshot().await?;
        Ok(DerivedMetricsService::new(snapshot, self.growth_config.clone(), today))
    }

    pub async fn get_animal(&self, animal_id: &str) -> Result<Option<Animal>> {
        self.repository.get_animal(animal_id).await
    }

    pub async fn store_animal(&self, animal: &Animal) -> Result<()> {
        self.repository.store_animal(animal).await
    }

    pub async fn store_breeding_season(&self, season: &BreedingSeason) -> Result<()> {
        self.repository.store_breeding_season(season).await
    }
}

/// Find the animal a user typed: record id, ear tag or name
pub fn find_animal<'a>(snapshot: &'a HerdSnapshot, reference: &str) -> Result<&'a Animal> {
    match identity_resolver::resolve(snapshot.animals(), Some(reference), Some(reference)) {
        AncestorRef::Resolved(animal) => Ok(animal),
        _ => Err(anyhow::anyhow!("No animal matches '{}'", reference.trim())),
    }
}
