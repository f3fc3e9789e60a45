//! # CSV Breeding Season Repository
//!
//! `breeding_seasons.csv` holds one row per season; `coverages.csv` holds
//! one row per female exposure, keyed by `season_id`.
//!
//! ```csv
//! season_id,female_id,date,sire,method,diagnosis
//! bs-2024,a1,2024-01-12,T1,ai,pregnant
//! ```

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use shared::{BreedingSeason, Coverage, CoverageMethod, PregnancyDiagnosis};
use std::collections::HashMap;

use super::connection::CsvConnection;

pub const BREEDING_SEASONS_FILE: &str = "breeding_seasons.csv";
pub const COVERAGES_FILE: &str = "coverages.csv";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BreedingSeasonRecord {
    id: String,
    name: String,
    start_date: String,
    end_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CoverageRecord {
    season_id: String,
    female_id: String,
    date: String,
    sire: Option<String>,
    method: String,
    diagnosis: Option<String>,
}

impl CoverageRecord {
    fn new(season_id: &str, coverage: &Coverage) -> Self {
        CoverageRecord {
            season_id: season_id.to_string(),
            female_id: coverage.female_id.clone(),
            date: coverage.date.clone(),
            sire: coverage.sire.clone(),
            method: coverage.method.to_string(),
            diagnosis: Some(coverage.diagnosis.to_string()),
        }
    }
}

impl TryFrom<CoverageRecord> for Coverage {
    type Error = anyhow::Error;

    fn try_from(record: CoverageRecord) -> Result<Self> {
        let method = CoverageMethod::from_string(&record.method)
            .map_err(|e| anyhow::anyhow!("Failed to parse coverage method: {}", e))?;
        let diagnosis = PregnancyDiagnosis::from_string(record.diagnosis.as_deref().unwrap_or(""))
            .map_err(|e| anyhow::anyhow!("Failed to parse diagnosis: {}", e))?;

        Ok(Coverage {
            female_id: record.female_id,
            date: record.date,
            sire: record.sire,
            method,
            diagnosis,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BreedingSeasonRepository {
    connection: CsvConnection,
}

impl BreedingSeasonRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    pub fn read_seasons(&self) -> Result<Vec<BreedingSeason>> {
        let mut seasons: Vec<BreedingSeason> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in self.connection.read_records::<BreedingSeasonRecord>(BREEDING_SEASONS_FILE)? {
            if record.id.trim().is_empty() || positions.contains_key(&record.id) {
                warn!("Skipping breeding season row with missing or duplicate id '{}'", record.id);
                continue;
            }
            positions.insert(record.id.clone(), seasons.len());
            seasons.push(BreedingSeason {
                id: record.id,
                name: record.name,
                start_date: record.start_date,
                end_date: record.end_date,
                coverages: Vec::new(),
            });
        }

        for record in self.connection.read_records::<CoverageRecord>(COVERAGES_FILE)? {
            let Some(&pos) = positions.get(&record.season_id) else {
                warn!("Coverage references unknown breeding season {}", record.season_id);
                continue;
            };
            match Coverage::try_from(record) {
                Ok(coverage) => seasons[pos].coverages.push(coverage),
                Err(e) => warn!("Failed to parse coverage record: {}. Skipping.", e),
            }
        }

        Ok(seasons)
    }

    pub fn write_seasons(&self, seasons: &[BreedingSeason]) -> Result<()> {
        let records: Vec<BreedingSeasonRecord> = seasons
            .iter()
            .map(|s| BreedingSeasonRecord {
                id: s.id.clone(),
                name: s.name.clone(),
                start_date: s.start_date.clone(),
                end_date: s.end_date.clone(),
            })
            .collect();
        let coverages: Vec<CoverageRecord> = seasons
            .iter()
            .flat_map(|s| s.coverages.iter().map(|c| CoverageRecord::new(&s.id, c)))
            .collect();

        self.connection.write_records(BREEDING_SEASONS_FILE, &records)?;
        self.connection.write_records(COVERAGES_FILE, &coverages)?;
        Ok(())
    }

    pub fn store_season(&self, season: &BreedingSeason) -> Result<()> {
        let mut seasons = self.read_seasons()?;
        match seasons.iter_mut().find(|s| s.id == season.id) {
            Some(existing) => *existing = season.clone(),
            None => seasons.push(season.clone()),
        }
        self.write_seasons(&seasons)?;
        info!(
            "Stored breeding season {} with {} coverages",
            season.id,
            season.coverages.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn season(id: &str) -> BreedingSeason {
        BreedingSeason {
            id: id.to_string(),
            name: format!("Estação {}", id),
            start_date: "2024-01-01".to_string(),
            end_date: "2024-03-31".to_string(),
            coverages: vec![
                Coverage {
                    female_id: "a1".to_string(),
                    date: "2024-01-12".to_string(),
                    sire: Some("T1".to_string()),
                    method: CoverageMethod::ArtificialInsemination,
                    diagnosis: PregnancyDiagnosis::Pregnant,
                },
                Coverage {
                    female_id: "a2".to_string(),
                    date: "2024-01-15".to_string(),
                    sire: None,
                    method: CoverageMethod::Natural,
                    diagnosis: PregnancyDiagnosis::Pending,
                },
            ],
        }
    }

    #[test]
    fn test_store_and_read_seasons() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let repo = BreedingSeasonRepository::new(CsvConnection::new(temp_dir.path())?);

        repo.store_season(&season("bs1"))?;
        repo.store_season(&season("bs2"))?;

        let mut updated = season("bs1");
        updated.coverages[1].diagnosis = PregnancyDiagnosis::Empty;
        repo.store_season(&updated)?;

        let seasons = repo.read_seasons()?;
        assert_eq!(seasons.len(), 2);
        assert_eq!(seasons[0], updated);
        assert_eq!(seasons[1], season("bs2"));
        Ok(())
    }

    #[test]
    fn test_blank_diagnosis_is_pending_and_orphans_skipped() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let connection = CsvConnection::new(temp_dir.path())?;
        fs::write(
            connection.file_path(BREEDING_SEASONS_FILE),
            "id,name,start_date,end_date\nbs1,Verão,2024-01-01,2024-03-31\n",
        )?;
        fs::write(
            connection.file_path(COVERAGES_FILE),
            "season_id,female_id,date,sire,method,diagnosis\n\
             bs1,a1,2024-01-10,,natural,\n\
             bs1,a2,2024-01-11,,telepathy,pregnant\n\
             nope,a3,2024-01-12,,natural,empty\n",
        )?;

        let seasons = BreedingSeasonRepository::new(connection).read_seasons()?;
        assert_eq!(seasons.len(), 1);
        assert_eq!(seasons[0].coverages.len(), 1);
        assert_eq!(seasons[0].coverages[0].diagnosis, PregnancyDiagnosis::Pending);
        Ok(())
    }
}
