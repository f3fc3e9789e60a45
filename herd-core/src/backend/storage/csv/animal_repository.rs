//! # CSV Animal Repository
//!
//! Animals are stored flat in `animals.csv`; their histories live in
//! separate files keyed by `animal_id`:
//!
//! ```csv
//! # weighings.csv
//! animal_id,date,weight,kind
//! a1,2024-01-10,32.5,birth
//! # medications.csv
//! animal_id,date,product,dose,notes
//! # reproductive_events.csv
//! animal_id,event_type,date,expected_calving_date,sire,notes,calf_id,calf_ear_tag
//! a2,pregnancy,2024-03-01,2024-12-08,T1,,,
//! ```
//!
//! History rows keep file order. Storing an animal rewrites every file with
//! that animal's rows replaced.

use anyhow::Result;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use shared::{
    AbortionEvent, Animal, AnimalStatus, MedicationEvent, OffspringBirthEvent, PregnancyEvent, Sex, WeighingEvent,
    WeighingKind,
};
use std::collections::HashMap;

use super::connection::CsvConnection;

pub const ANIMALS_FILE: &str = "animals.csv";
pub const WEIGHINGS_FILE: &str = "weighings.csv";
pub const MEDICATIONS_FILE: &str = "medications.csv";
pub const REPRODUCTIVE_EVENTS_FILE: &str = "reproductive_events.csv";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnimalRecord {
    id: String,
    ear_tag: String,
    name: Option<String>,
    breed: String,
    sex: String,
    birth_date: Option<String>,
    current_weight: Option<f64>,
    status: String,
    father_id: Option<String>,
    father_name: Option<String>,
    mother_id: Option<String>,
    mother_name: Option<String>,
    is_fiv: bool,
    biological_mother_id: Option<String>,
    biological_mother_name: Option<String>,
    receptor_mother_id: Option<String>,
    receptor_mother_name: Option<String>,
}

impl From<&Animal> for AnimalRecord {
    fn from(animal: &Animal) -> Self {
        AnimalRecord {
            id: animal.id.clone(),
            ear_tag: animal.ear_tag.clone(),
            name: animal.name.clone(),
            breed: animal.breed.clone(),
            sex: animal.sex.to_string(),
            birth_date: animal.birth_date.clone(),
            current_weight: animal.current_weight,
            status: animal.status.to_string(),
            father_id: animal.father_id.clone(),
            father_name: animal.father_name.clone(),
            mother_id: animal.mother_id.clone(),
            mother_name: animal.mother_name.clone(),
            is_fiv: animal.is_fiv,
            biological_mother_id: animal.biological_mother_id.clone(),
            biological_mother_name: animal.biological_mother_name.clone(),
            receptor_mother_id: animal.receptor_mother_id.clone(),
            receptor_mother_name: animal.receptor_mother_name.clone(),
        }
    }
}

impl TryFrom<AnimalRecord> for Animal {
    type Error = anyhow::Error;

    fn try_from(record: AnimalRecord) -> Result<Self> {
        if record.id.trim().is_empty() {
            return Err(anyhow::anyhow!("Animal record without id (ear tag {})", record.ear_tag));
        }
        let sex = Sex::from_string(&record.sex).map_err(|e| anyhow::anyhow!("Failed to parse sex: {}", e))?;
        let status = AnimalStatus::from_string(&record.status)
            .map_err(|e| anyhow::anyhow!("Failed to parse status: {}", e))?;

        Ok(Animal {
            id: record.id,
            ear_tag: record.ear_tag,
            name: record.name,
            breed: record.breed,
            sex,
            birth_date: record.birth_date,
            current_weight: record.current_weight,
            status,
            father_id: record.father_id,
            father_name: record.father_name,
            mother_id: record.mother_id,
            mother_name: record.mother_name,
            is_fiv: record.is_fiv,
            biological_mother_id: record.biological_mother_id,
            biological_mother_name: record.biological_mother_name,
            receptor_mother_id: record.receptor_mother_id,
            receptor_mother_name: record.receptor_mother_name,
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WeighingRecord {
    animal_id: String,
    date: String,
    weight: f64,
    kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MedicationRecord {
    animal_id: String,
    date: String,
    product: String,
    dose: Option<String>,
    notes: Option<String>,
}

/// One row per pregnancy, abortion or offspring birth
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ReproductiveEventRecord {
    animal_id: String,
    event_type: String,
    date: String,
    expected_calving_date: Option<String>,
    sire: Option<String>,
    notes: Option<String>,
    calf_id: Option<String>,
    calf_ear_tag: Option<String>,
}

enum ReproductiveEvent {
    Pregnancy(PregnancyEvent),
    Abortion(AbortionEvent),
    Birth(OffspringBirthEvent),
}

impl TryFrom<ReproductiveEventRecord> for ReproductiveEvent {
    type Error = anyhow::Error;

    fn try_from(record: ReproductiveEventRecord) -> Result<Self> {
        match record.event_type.trim().to_lowercase().as_str() {
            "pregnancy" => Ok(ReproductiveEvent::Pregnancy(PregnancyEvent {
                date: record.date,
                expected_calving_date: record.expected_calving_date,
                sire: record.sire,
            })),
            "abortion" => Ok(ReproductiveEvent::Abortion(AbortionEvent {
                date: record.date,
                notes: record.notes,
            })),
            "birth" => Ok(ReproductiveEvent::Birth(OffspringBirthEvent {
                date: record.date,
                calf_id: record.calf_id,
                calf_ear_tag: record.calf_ear_tag,
            })),
            other => Err(anyhow::anyhow!("Unknown reproductive event type: {}", other)),
        }
    }
}

fn reproductive_records(animal: &Animal) -> Vec<ReproductiveEventRecord> {
    let base = || ReproductiveEventRecord {
        animal_id: animal.id.clone(),
        ..Default::default()
    };

    let pregnancies = animal.pregnancies.iter().map(|p| ReproductiveEventRecord {
        event_type: "pregnancy".to_string(),
        date: p.date.clone(),
        expected_calving_date: p.expected_calving_date.clone(),
        sire: p.sire.clone(),
        ..base()
    });
    let abortions = animal.abortions.iter().map(|a| ReproductiveEventRecord {
        event_type: "abortion".to_string(),
        date: a.date.clone(),
        notes: a.notes.clone(),
        ..base()
    });
    let births = animal.births.iter().map(|b| ReproductiveEventRecord {
        event_type: "birth".to_string(),
        date: b.date.clone(),
        calf_id: b.calf_id.clone(),
        calf_ear_tag: b.calf_ear_tag.clone(),
        ..base()
    });

    pregnancies.chain(abortions).chain(births).collect()
}

/// CSV-backed animal storage
#[derive(Debug, Clone)]
pub struct AnimalRepository {
    connection: CsvConnection,
}

impl AnimalRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    /// Load all animals and attach their histories
    pub fn read_animals(&self) -> Result<Vec<Animal>> {
        let mut animals = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in self.connection.read_records::<AnimalRecord>(ANIMALS_FILE)? {
            match Animal::try_from(record) {
                Ok(animal) => {
                    if positions.contains_key(&animal.id) {
                        warn!("Duplicate animal id {} in {}, keeping the first row", animal.id, ANIMALS_FILE);
                        continue;
                    }
                    positions.insert(animal.id.clone(), animals.len());
                    animals.push(animal);
                }
                Err(e) => warn!("Failed to parse animal record: {}. Skipping.", e),
            }
        }

        let mut orphans = 0usize;
        let mut owner = |animal_id: &str| -> Option<usize> {
            let found = positions.get(animal_id).copied();
            if found.is_none() {
                orphans += 1;
            }
            found
        };

        for record in self.connection.read_records::<WeighingRecord>(WEIGHINGS_FILE)? {
            if let Some(pos) = owner(&record.animal_id) {
                animals[pos].weighings.push(WeighingEvent {
                    date: record.date,
                    weight: record.weight,
                    kind: WeighingKind::from_string(&record.kind),
                });
            }
        }

        for record in self.connection.read_records::<MedicationRecord>(MEDICATIONS_FILE)? {
            if let Some(pos) = owner(&record.animal_id) {
                animals[pos].medications.push(MedicationEvent {
                    date: record.date,
                    product: record.product,
                    dose: record.dose,
                    notes: record.notes,
                });
            }
        }

        for record in self.connection.read_records::<ReproductiveEventRecord>(REPRODUCTIVE_EVENTS_FILE)? {
            let Some(pos) = owner(&record.animal_id) else {
                continue;
            };
            match ReproductiveEvent::try_from(record) {
                Ok(ReproductiveEvent::Pregnancy(event)) => animals[pos].pregnancies.push(event),
                Ok(ReproductiveEvent::Abortion(event)) => animals[pos].abortions.push(event),
                Ok(ReproductiveEvent::Birth(event)) => animals[pos].births.push(event),
                Err(e) => warn!("Failed to parse reproductive event: {}. Skipping.", e),
            }
        }

        if orphans > 0 {
            warn!("Ignored {} history rows that reference unknown animals", orphans);
        }
        debug!("Loaded {} animals", animals.len());
        Ok(animals)
    }

    /// Write `animals` and all their histories, replacing every file
    pub fn write_animals(&self, animals: &[Animal]) -> Result<()> {
        let records: Vec<AnimalRecord> = animals.iter().map(AnimalRecord::from).collect();

        let weighings: Vec<WeighingRecord> = animals
            .iter()
            .flat_map(|a| {
                a.weighings.iter().map(|w| WeighingRecord {
                    animal_id: a.id.clone(),
                    date: w.date.clone(),
                    weight: w.weight,
                    kind: w.kind.to_string(),
                })
            })
            .collect();

        let medications: Vec<MedicationRecord> = animals
            .iter()
            .flat_map(|a| {
                a.medications.iter().map(|m| MedicationRecord {
                    animal_id: a.id.clone(),
                    date: m.date.clone(),
                    product: m.product.clone(),
                    dose: m.dose.clone(),
                    notes: m.notes.clone(),
                })
            })
            .collect();

        let events: Vec<ReproductiveEventRecord> = animals.iter().flat_map(reproductive_records).collect();

        self.connection.write_records(ANIMALS_FILE, &records)?;
        self.connection.write_records(WEIGHINGS_FILE, &weighings)?;
        self.connection.write_records(MEDICATIONS_FILE, &medications)?;
        self.connection.write_records(REPRODUCTIVE_EVENTS_FILE, &events)?;
        Ok(())
    }

    pub fn get_animal(&self, animal_id: &str) -> Result<Option<Animal>> {
        Ok(self.read_animals()?.into_iter().find(|a| a.id == animal_id))
    }

    /// Insert or replace one animal, keeping the others in place
    pub fn store_animal(&self, animal: &Animal) -> Result<()> {
        let mut animals = self.read_animals()?;
        match animals.iter_mut().find(|a| a.id == animal.id) {
            Some(existing) => {
                *existing = animal.clone();
                info!("Updated animal {} ({})", animal.id, animal.ear_tag);
            }
            None => {
                animals.push(animal.clone());
                info!("Added animal {} ({})", animal.id, animal.ear_tag);
            }
        }
        self.write_animals(&animals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> Result<(AnimalRepository, TempDir)> {
        let temp_dir = TempDir::new()?;
        let connection = CsvConnection::new(temp_dir.path())?;
        Ok((AnimalRepository::new(connection), temp_dir))
    }

    fn cow_with_history() -> Animal {
        Animal {
            id: "a1".to_string(),
            ear_tag: "V-001".to_string(),
            name: Some("Mimosa, a Bela".to_string()),
            breed: "Nelore".to_string(),
            sex: Sex::Female,
            birth_date: Some("2021-09-01".to_string()),
            current_weight: Some(420.0),
            status: AnimalStatus::Active,
            father_name: Some("Touro Rex".to_string()),
            is_fiv: true,
            biological_mother_id: Some("d1".to_string()),
            receptor_mother_name: Some("Receptora 7".to_string()),
            weighings: vec![
                WeighingEvent {
                    date: "2021-09-01".to_string(),
                    weight: 31.0,
                    kind: WeighingKind::Birth,
                },
                WeighingEvent {
                    date: "2022-03-25".to_string(),
                    weight: 190.5,
                    kind: WeighingKind::Weaning,
                },
            ],
            medications: vec![MedicationEvent {
                date: "2022-05-01".to_string(),
                product: "Ivermectina".to_string(),
                dose: Some("10 ml".to_string()),
                notes: None,
            }],
            pregnancies: vec![PregnancyEvent {
                date: "2023-12-01".to_string(),
                expected_calving_date: Some("2024-09-09".to_string()),
                sire: Some("T1".to_string()),
            }],
            abortions: vec![AbortionEvent {
                date: "2023-06-01".to_string(),
                notes: Some("early loss".to_string()),
            }],
            births: vec![OffspringBirthEvent {
                date: "2023-02-01".to_string(),
                calf_id: Some("c9".to_string()),
                calf_ear_tag: Some("B-009".to_string()),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_animal_with_history_survives_storage() -> Result<()> {
        let (repo, _temp_dir) = setup()?;
        let cow = cow_with_history();

        repo.store_animal(&cow)?;
        let loaded = repo.get_animal("a1")?.expect("animal should exist");
        assert_eq!(loaded, cow);
        assert!(repo.get_animal("missing")?.is_none());
        Ok(())
    }

    #[test]
    fn test_store_replaces_existing_rows() -> Result<()> {
        let (repo, _temp_dir) = setup()?;
        let mut cow = cow_with_history();
        repo.store_animal(&cow)?;
        repo.store_animal(&Animal {
            id: "a2".to_string(),
            ear_tag: "T-002".to_string(),
            sex: Sex::Male,
            ..Default::default()
        })?;

        cow.status = AnimalStatus::Sold;
        cow.weighings.truncate(1);
        repo.store_animal(&cow)?;

        let animals = repo.read_animals()?;
        assert_eq!(animals.len(), 2);
        assert_eq!(animals[0].id, "a1");
        assert_eq!(animals[0].status, AnimalStatus::Sold);
        assert_eq!(animals[0].weighings.len(), 1);
        assert_eq!(animals[1].sex, Sex::Male);
        Ok(())
    }

    #[test]
    fn test_malformed_rows_are_skipped() -> Result<()> {
        let (repo, temp_dir) = setup()?;
        repo.store_animal(&cow_with_history())?;

        let animals_path = temp_dir.path().join(ANIMALS_FILE);
        let mut content = fs::read_to_string(&animals_path)?;
        content.push_str("a3,X-3,,Angus,unknown,,,active,,,,,false,,,,\n");
        fs::write(&animals_path, content)?;

        let weighings_path = temp_dir.path().join(WEIGHINGS_FILE);
        let mut content = fs::read_to_string(&weighings_path)?;
        content.push_str("a1,2022-09-01,heavy,none\n");
        content.push_str("ghost,2022-09-01,100.0,none\n");
        fs::write(&weighings_path, content)?;

        let animals = repo.read_animals()?;
        assert_eq!(animals.len(), 1);
        assert_eq!(animals[0].weighings.len(), 2);
        Ok(())
    }

    #[test]
    fn test_empty_directory_has_no_animals() -> Result<()> {
        let (repo, _temp_dir) = setup()?;
        assert!(repo.read_animals()?.is_empty());
        Ok(())
    }
}
