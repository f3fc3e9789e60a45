//! Domain model for an immutable herd snapshot.
use chrono::NaiveDate;
use shared::{Animal, BreedingSeason};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SNAPSHOT_VERSION: AtomicU64 = AtomicU64::new(1);

/// The full animal and breeding-season collections at one point in time.
///
/// Every snapshot gets a fresh version number. Anything derived from a
/// snapshot (indices, lineage views) is tagged with that version, so a
/// mutated herd always means a new snapshot and a rebuild.
#[derive(Debug, Clone)]
pub struct HerdSnapshot {
    version: u64,
    animals: Arc<Vec<Animal>>,
    breeding_seasons: Arc<Vec<BreedingSeason>>,
}

impl HerdSnapshot {
    pub fn new(animals: Vec<Animal>, breeding_seasons: Vec<BreedingSeason>) -> Self {
        Self {
            version: NEXT_SNAPSHOT_VERSION.fetch_add(1, Ordering::Relaxed),
            animals: Arc::new(animals),
            breeding_seasons: Arc::new(breeding_seasons),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn animals(&self) -> &[Animal] {
        &self.animals
    }

    pub fn breeding_seasons(&self) -> &[BreedingSeason] {
        &self.breeding_seasons
    }

    pub fn find_by_id(&self, animal_id: &str) -> Option<&Animal> {
        self.animals.iter().find(|a| a.id == animal_id)
    }

    pub fn len(&self) -> usize {
        self.animals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animals.is_empty()
    }
}

/// Parse a stored date (YYYY-MM-DD, optionally followed by a time part).
///
/// Returns `None` for anything unparseable; callers treat that as missing data.
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%d/%m/%Y"))
        .ok()
}
