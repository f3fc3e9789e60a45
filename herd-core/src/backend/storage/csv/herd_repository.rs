//! # CSV Herd Repository
//!
//! [`HerdStorage`] over the animal and breeding season CSV repositories.
//! File access is synchronous, so each call runs on the blocking pool.

use anyhow::Result;
use async_trait::async_trait;
use shared::{Animal, BreedingSeason};

use super::animal_repository::AnimalRepository;
use super::breeding_season_repository::BreedingSeasonRepository;
use super::connection::CsvConnection;
use crate::backend::storage::traits::HerdStorage;

#[derive(Debug, Clone)]
pub struct HerdRepository {
    animals: AnimalRepository,
    seasons: BreedingSeasonRepository,
}

impl HerdRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self {
            animals: AnimalRepository::new(connection.clone()),
            seasons: BreedingSeasonRepository::new(connection),
        }
    }
}

async fn blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task).await?
}

#[async_trait]
impl HerdStorage for HerdRepository {
    async fn list_animals(&self) -> Result<Vec<Animal>> {
        let repo = self.animals.clone();
        blocking(move || repo.read_animals()).await
    }

    async fn get_animal(&self, animal_id: &str) -> Result<Option<Animal>> {
        let repo = self.animals.clone();
        let animal_id = animal_id.to_string();
        blocking(move || repo.get_animal(&animal_id)).await
    }

    async fn store_animal(&self, animal: &Animal) -> Result<()> {
        let repo = self.animals.clone();
        let animal = animal.clone();
        blocking(move || repo.store_animal(&animal)).await
    }

    async fn list_breeding_seasons(&self) -> Result<Vec<BreedingSeason>> {
        let repo = self.seasons.clone();
        blocking(move || repo.read_seasons()).await
    }

    async fn store_breeding_season(&self, season: &BreedingSeason) -> Result<()> {
        let repo = self.seasons.clone();
        let season = season.clone();
        blocking(move || repo.store_season(&season)).await
    }
}
