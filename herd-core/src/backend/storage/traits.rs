//! # Storage Traits
//!
//! Storage abstraction used by the herd service, so the domain layer does not
//! depend on the file format the records live in.

use anyhow::Result;
use async_trait::async_trait;
use shared::{Animal, BreedingSeason};

/// Persistence for animals (with their histories) and breeding seasons
#[async_trait]
pub trait HerdStorage: Send + Sync {
    /// List every animal, histories included, in storage order
    async fn list_animals(&self) -> Result<Vec<Animal>>;

    async fn get_animal(&self, animal_id: &str) -> Result<Option<Animal>>;

    /// Insert or replace an animal and all of its history rows
    async fn store_animal(&self, animal: &Animal) -> Result<()>;

    async fn list_breeding_seasons(&self) -> Result<Vec<BreedingSeason>>;

    /// Insert or replace a breeding season and its coverages
    async fn store_breeding_season(&self, season: &BreedingSeason) -> Result<()>;
}

/// A connection hands out repositories bound to one data location
pub trait Connection: Send + Sync + Clone {
    type HerdRepository: HerdStorage + Clone;

    fn create_herd_repository(&self) -> Self::HerdRepository;
}
