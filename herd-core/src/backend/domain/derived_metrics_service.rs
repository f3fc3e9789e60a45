//! Derived metrics for a herd snapshot.
//!
//! The service is built once per [`HerdSnapshot`]. Construction builds the
//! lookup indices, then every animal's derived data (GMD, DEP report, progeny
//! and sibling ids, pregnancy flag). KPIs and DEP listings are folds over
//! that precomputed data; nothing is recomputed from raw histories.
//!
//! The snapshot is never mutated. After any change to the herd, build a new
//! snapshot and call [`DerivedMetricsService::rebuild`].
//!
//! ## DEP model
//!
//! Traits: birth weight, weaning weight adjusted to 205 days and yearling
//! weight adjusted to 365 days. For each trait with herd mean `m`:
//!
//! `dep = b * (progeny_mean - m) + (1 - b) * 0.5 * (own - m)`, `b = n / (n + 4)`
//!
//! where `n` is the number of progeny with that trait recorded. Missing terms
//! are dropped. The performance index weighs weaning and yearling DEPs at 0.4
//! each and birth-weight DEP at -0.2.

use chrono::NaiveDate;
use log::{debug, info};
use shared::{Animal, AnimalStatus, BreedingSeason, Coverage, PregnancyDiagnosis, Sex, WeighingKind};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::backend::domain::growth_service::{usable_weighings, GrowthService};
use crate::backend::domain::identity_resolver::{identity_keys, normalize_key, resolve_indexed};
use crate::backend::domain::models::herd::{parse_record_date, HerdSnapshot};
use crate::backend::domain::models::lineage::AncestorRef;
use crate::backend::domain::models::metrics::{
    AnimalDerivedData, AnimalIndices, BreedingSeasonSummary, DepReport, GmdBand, HerdKpis,
};
use crate::config::GrowthConfig;

/// Pregnancies older than this without a recorded outcome are treated as stale
const MAX_GESTATION_DAYS: i64 = 300;
/// Prior weight of the own record against progeny records
const PROGENY_PRIOR: f64 = 4.0;
const OWN_RECORD_ACCURACY: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default)]
struct TraitValues {
    birth: Option<f64>,
    weaning_205: Option<f64>,
    yearling_365: Option<f64>,
}

/// Build the lookup indices for a snapshot
pub fn build_indices(snapshot: &HerdSnapshot) -> AnimalIndices {
    let mut indices = AnimalIndices {
        snapshot_version: snapshot.version(),
        ..Default::default()
    };

    for (pos, animal) in snapshot.animals().iter().enumerate() {
        indices.by_id.entry(animal.id.clone()).or_insert(pos);

        let tag = normalize_key(&animal.ear_tag);
        if !tag.is_empty() {
            indices.by_ear_tag_key.entry(tag).or_default().push(pos);
        }
        if let Some(name) = animal.name.as_deref().map(normalize_key).filter(|n| !n.is_empty()) {
            indices.by_name_key.entry(name).or_default().push(pos);
        }

        let recorded_mother = animal.mother_id_ref();
        if let Some(mother_id) = recorded_mother {
            indices.children_by_mother_id.entry(mother_id.to_string()).or_default().push(pos);
        }
        if let Some(mother_id) = animal.lineage_mother_id().filter(|id| Some(*id) != recorded_mother) {
            indices.children_by_mother_id.entry(mother_id.to_string()).or_default().push(pos);
        }
        if let Some(father_id) = animal.father_id_ref() {
            indices.children_by_father_id.entry(father_id.to_string()).or_default().push(pos);
        }
        if let Some(mother_name) = animal.lineage_mother_name() {
            indices.children_by_mother_key.entry(normalize_key(mother_name)).or_default().push(pos);
        }
        if let Some(father_name) = animal.father_name_ref() {
            indices.children_by_father_key.entry(normalize_key(father_name)).or_default().push(pos);
        }
    }

    indices
}

impl AnimalIndices {
    /// True if these indices were built from exactly this snapshot
    pub fn is_built_from(&self, snapshot: &HerdSnapshot) -> bool {
        self.snapshot_version == snapshot.version()
    }

    /// Positions of the offspring of the animal at `parent_pos`, in herd order.
    ///
    /// Same predicate as `lineage_service::find_offspring_of`.
    pub fn offspring_positions(&self, animals: &[Animal], parent_pos: usize) -> BTreeSet<usize> {
        let parent = &animals[parent_pos];
        let mut positions = BTreeSet::new();

        let mut extend = |found: Option<&Vec<usize>>| {
            if let Some(found) = found {
                positions.extend(found.iter().copied());
            }
        };
        extend(self.children_by_mother_id.get(&parent.id));
        extend(self.children_by_father_id.get(&parent.id));
        for key in identity_keys(parent) {
            extend(self.children_by_mother_key.get(&key));
            extend(self.children_by_father_key.get(&key));
        }

        positions.retain(|&pos| animals[pos].id != parent.id);
        positions
    }
}

/// Derived data and KPIs for one herd snapshot
#[derive(Debug, Clone)]
pub struct DerivedMetricsService {
    snapshot: HerdSnapshot,
    indices: AnimalIndices,
    derived: HashMap<String, AnimalDerivedData>,
    growth_service: GrowthService,
    reference_date: NaiveDate,
}

impl DerivedMetricsService {
    /// Build indices and all derived data for `snapshot`.
    ///
    /// `reference_date` is "today" for time-dependent flags such as pregnancy.
    pub fn new(snapshot: HerdSnapshot, growth_config: GrowthConfig, reference_date: NaiveDate) -> Self {
        let growth_service = GrowthService::new(growth_config);
        let indices = build_indices(&snapshot);
        let derived = compute_derived_data(&snapshot, &indices, &growth_service, reference_date);

        info!(
            "Built derived data for {} animals and {} breeding seasons (snapshot {})",
            snapshot.len(),
            snapshot.breeding_seasons().len(),
            snapshot.version()
        );

        Self {
            snapshot,
            indices,
            derived,
            growth_service,
            reference_date,
        }
    }

    /// Build a fresh service for a new snapshot with the same settings
    pub fn rebuild(&self, snapshot: HerdSnapshot) -> Self {
        Self::new(snapshot, self.growth_service.config().clone(), self.reference_date)
    }

    pub fn snapshot(&self) -> &HerdSnapshot {
        &self.snapshot
    }

    pub fn growth_service(&self) -> &GrowthService {
        &self.growth_service
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn get_indices(&self) -> &AnimalIndices {
        &self.indices
    }

    pub fn get_all_derived_data(&self) -> &HashMap<String, AnimalDerivedData> {
        &self.derived
    }

    pub fn get_derived_data(&self, animal_id: &str) -> Option<&AnimalDerivedData> {
        self.derived.get(animal_id)
    }

    /// Resolve a free-text or id reference through the indices
    pub fn resolve(&self, name_or_tag: Option<&str>, id: Option<&str>) -> AncestorRef<'_> {
        resolve_indexed(&self.snapshot, &self.indices, name_or_tag, id)
    }

    /// DEP reports, best performance index first; animals without an index last
    pub fn get_all_deps(&self) -> Vec<DepReport> {
        let mut reports: Vec<DepReport> = self
            .snapshot
            .animals()
            .iter()
            .filter_map(|a| self.derived.get(&a.id))
            .map(|d| d.dep.clone())
            .collect();

        reports.sort_by(|a, b| match (a.performance_index, b.performance_index) {
            (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.ear_tag.cmp(&b.ear_tag)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.ear_tag.cmp(&b.ear_tag),
        });
        reports
    }

    /// Herd-wide indicators, folded once over every animal
    pub fn calculate_kpis(&self) -> HerdKpis {
        let mut kpis = HerdKpis::default();
        let mut gmd = Mean::default();
        let mut current_weight = Mean::default();
        let mut birth_weight = Mean::default();
        let mut weaning_weight = Mean::default();

        for animal in self.snapshot.animals() {
            let Some(derived) = self.derived.get(&animal.id) else {
                continue;
            };

            kpis.total_animals += 1;
            match animal.status {
                AnimalStatus::Active => kpis.active += 1,
                AnimalStatus::Sold => kpis.sold += 1,
                AnimalStatus::Deceased => kpis.deceased += 1,
            }
            match animal.sex {
                Sex::Male => kpis.males += 1,
                Sex::Female => kpis.females += 1,
            }
            if animal.is_fiv {
                kpis.fiv_count += 1;
            }
            if derived.is_pregnant {
                kpis.pregnant_count += 1;
            }

            match &derived.growth {
                Some(growth) => {
                    gmd.add(growth.daily_gain_kg);
                    match growth.band {
                        GmdBand::Poor => kpis.gmd_distribution.poor += 1,
                        GmdBand::Average => kpis.gmd_distribution.average += 1,
                        GmdBand::Good => kpis.gmd_distribution.good += 1,
                    }
                }
                None => kpis.gmd_distribution.no_data += 1,
            }

            if let Some(weight) = derived.current_weight_kg {
                current_weight.add(weight);
            }
            if let Some(weight) = derived.dep.birth_weight_kg {
                birth_weight.add(weight);
            }
            if let Some(weight) = derived.dep.weaning_weight_205_kg {
                weaning_weight.add(weight);
            }

            kpis.abortion_events += animal.abortions.len();
            kpis.offspring_born_events += animal.births.len();
            kpis.medication_events += animal.medications.len();
        }

        kpis.average_gmd_kg_day = gmd.value();
        kpis.average_current_weight_kg = current_weight.value();
        kpis.average_birth_weight_kg = birth_weight.value();
        kpis.average_weaning_weight_205_kg = weaning_weight.value();

        kpis.breeding_seasons = self
            .snapshot
            .breeding_seasons()
            .iter()
            .map(summarize_season)
            .collect();
        let (pregnant, diagnosed) = kpis
            .breeding_seasons
            .iter()
            .fold((0, 0), |(p, d), s| (p + s.pregnant, d + s.diagnosed));
        kpis.overall_pregnancy_rate = ratio(pregnant, diagnosed);

        kpis
    }
}

#[derive(Debug, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

fn mean_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut mean = Mean::default();
    values.for_each(|v| mean.add(v));
    mean.value()
}

fn compute_derived_data(
    snapshot: &HerdSnapshot,
    indices: &AnimalIndices,
    growth_service: &GrowthService,
    reference_date: NaiveDate,
) -> HashMap<String, AnimalDerivedData> {
    let animals = snapshot.animals();

    let progeny: Vec<BTreeSet<usize>> = (0..animals.len())
        .map(|pos| indices.offspring_positions(animals, pos))
        .collect();
    let traits: Vec<TraitValues> = animals.iter().map(trait_values).collect();
    let herd_means = TraitValues {
        birth: mean_of(traits.iter().filter_map(|t| t.birth)),
        weaning_205: mean_of(traits.iter().filter_map(|t| t.weaning_205)),
        yearling_365: mean_of(traits.iter().filter_map(|t| t.yearling_365)),
    };
    let coverages = coverages_by_female(snapshot.breeding_seasons());

    let mut derived = HashMap::with_capacity(animals.len());
    for (pos, animal) in animals.iter().enumerate() {
        if derived.contains_key(&animal.id) {
            debug!("Duplicate animal id {} ignored in derived data", animal.id);
            continue;
        }

        let progeny_ids: BTreeSet<String> = progeny[pos].iter().map(|&p| animals[p].id.clone()).collect();
        let sibling_ids = sibling_ids(snapshot, indices, &progeny, pos);
        let dep = dep_report(animal, &traits[pos], &progeny[pos], &traits, &herd_means);
        let is_pregnant = is_pregnant(animal, coverages.get(animal.id.as_str()), reference_date);

        derived.insert(
            animal.id.clone(),
            AnimalDerivedData {
                animal_id: animal.id.clone(),
                growth: growth_service.growth_rate(animal),
                current_weight_kg: growth_service.current_weight(animal),
                dep,
                progeny_ids,
                sibling_ids,
                is_pregnant,
            },
        );
    }
    derived
}

fn sibling_ids(
    snapshot: &HerdSnapshot,
    indices: &AnimalIndices,
    progeny: &[BTreeSet<usize>],
    pos: usize,
) -> BTreeSet<String> {
    let animals = snapshot.animals();
    let animal = &animals[pos];
    let mut positions: HashSet<usize> = HashSet::new();

    let mother = resolve_indexed(snapshot, indices, animal.lineage_mother_name(), animal.lineage_mother_id());
    let father = resolve_indexed(snapshot, indices, animal.father_name_ref(), animal.father_id_ref());

    for (parent, by_key) in [
        (mother, &indices.children_by_mother_key),
        (father, &indices.children_by_father_key),
    ] {
        match parent {
            AncestorRef::Resolved(parent) => {
                if let Some(&parent_pos) = indices.by_id.get(&parent.id) {
                    positions.extend(progeny[parent_pos].iter().copied());
                }
            }
            AncestorRef::External(name) => {
                if let Some(found) = by_key.get(&normalize_key(&name)) {
                    positions.extend(found.iter().copied());
                }
            }
            AncestorRef::Absent => {}
        }
    }

    positions
        .into_iter()
        .map(|p| &animals[p])
        .filter(|a| a.id != animal.id)
        .map(|a| a.id.clone())
        .collect()
}

fn trait_values(animal: &Animal) -> TraitValues {
    let weighings = usable_weighings(animal);
    let first_of = |kind: WeighingKind| weighings.iter().find(|w| w.kind == kind);

    let birth = first_of(WeighingKind::Birth).map(|w| w.weight);
    let birth_date = animal.birth_date.as_deref().and_then(parse_record_date);

    let weaning = first_of(WeighingKind::Weaning);
    let weaning_205 = match (birth_date, weaning) {
        (Some(born), Some(w)) => {
            let age = (w.date - born).num_days();
            (age > 0).then(|| match birth {
                Some(bw) => (w.weight - bw) / age as f64 * 205.0 + bw,
                None => w.weight / age as f64 * 205.0,
            })
        }
        _ => None,
    };

    let yearling = first_of(WeighingKind::Yearling);
    let yearling_365 = match (birth_date, yearling) {
        (Some(born), Some(y)) => match (weaning, weaning_205) {
            (Some(w), Some(adj_weaning)) if y.date > w.date => {
                let days = (y.date - w.date).num_days() as f64;
                Some(adj_weaning + (y.weight - w.weight) / days * 160.0)
            }
            _ => {
                let age = (y.date - born).num_days();
                (age > 0).then(|| y.weight / age as f64 * 365.0)
            }
        },
        _ => None,
    };

    TraitValues {
        birth,
        weaning_205,
        yearling_365,
    }
}

fn trait_dep(own: Option<f64>, progeny: &[f64], herd_mean: Option<f64>) -> Option<f64> {
    let mean = herd_mean?;
    let n = progeny.len() as f64;
    let b = n / (n + PROGENY_PRIOR);
    let own_term = own.map(|v| 0.5 * (v - mean));
    let progeny_term = mean_of(progeny.iter().copied()).map(|p| p - mean);

    match (own_term, progeny_term) {
        (Some(o), Some(p)) => Some(b * p + (1.0 - b) * o),
        (Some(o), None) => Some(o),
        (None, Some(p)) => Some(b * p),
        (None, None) => None,
    }
}

fn dep_report(
    animal: &Animal,
    own: &TraitValues,
    progeny: &BTreeSet<usize>,
    traits: &[TraitValues],
    herd_means: &TraitValues,
) -> DepReport {
    let collect = |pick: fn(&TraitValues) -> Option<f64>| -> Vec<f64> {
        progeny.iter().filter_map(|&p| pick(&traits[p])).collect()
    };
    let progeny_birth = collect(|t| t.birth);
    let progeny_weaning = collect(|t| t.weaning_205);
    let progeny_yearling = collect(|t| t.yearling_365);

    let dep_birth_weight = trait_dep(own.birth, &progeny_birth, herd_means.birth);
    let dep_weaning_weight = trait_dep(own.weaning_205, &progeny_weaning, herd_means.weaning_205);
    let dep_yearling_weight = trait_dep(own.yearling_365, &progeny_yearling, herd_means.yearling_365);

    let recorded_progeny = progeny
        .iter()
        .filter(|&&p| {
            let t = &traits[p];
            t.birth.is_some() || t.weaning_205.is_some() || t.yearling_365.is_some()
        })
        .count();
    let has_own = own.birth.is_some() || own.weaning_205.is_some() || own.yearling_365.is_some();
    let accuracy = if recorded_progeny > 0 {
        recorded_progeny as f64 / (recorded_progeny as f64 + PROGENY_PRIOR)
    } else if has_own {
        OWN_RECORD_ACCURACY
    } else {
        0.0
    };

    let weighted = [
        (dep_weaning_weight, 0.4),
        (dep_yearling_weight, 0.4),
        (dep_birth_weight, -0.2),
    ];
    let performance_index = weighted
        .iter()
        .filter_map(|(dep, weight)| dep.map(|d| d * weight))
        .fold(None, |acc: Option<f64>, term| Some(acc.unwrap_or(0.0) + term));

    DepReport {
        animal_id: animal.id.clone(),
        ear_tag: animal.ear_tag.clone(),
        birth_weight_kg: own.birth,
        weaning_weight_205_kg: own.weaning_205,
        yearling_weight_365_kg: own.yearling_365,
        dep_birth_weight,
        dep_weaning_weight,
        dep_yearling_weight,
        progeny_count: progeny.len(),
        accuracy,
        performance_index,
    }
}

fn coverages_by_female(seasons: &[BreedingSeason]) -> HashMap<&str, Vec<&Coverage>> {
    let mut by_female: HashMap<&str, Vec<&Coverage>> = HashMap::new();
    for coverage in seasons.iter().flat_map(|s| s.coverages.iter()) {
        by_female.entry(coverage.female_id.as_str()).or_default().push(coverage);
    }
    by_female
}

fn is_pregnant(animal: &Animal, coverages: Option<&Vec<&Coverage>>, reference_date: NaiveDate) -> bool {
    if animal.sex != Sex::Female || animal.status != AnimalStatus::Active {
        return false;
    }

    let confirmed_coverages = coverages
        .into_iter()
        .flatten()
        .filter(|c| c.diagnosis == PregnancyDiagnosis::Pregnant)
        .filter_map(|c| parse_record_date(&c.date));
    let last_pregnancy = animal
        .pregnancies
        .iter()
        .filter_map(|p| parse_record_date(&p.date))
        .chain(confirmed_coverages)
        .max();

    let last_outcome = animal
        .abortions
        .iter()
        .map(|a| a.date.as_str())
        .chain(animal.births.iter().map(|b| b.date.as_str()))
        .filter_map(parse_record_date)
        .max();

    match last_pregnancy {
        Some(conceived) => {
            let resolved = last_outcome.map(|outcome| outcome >= conceived).unwrap_or(false);
            let stale = (reference_date - conceived).num_days() > MAX_GESTATION_DAYS;
            !resolved && !stale
        }
        None => false,
    }
}

fn summarize_season(season: &BreedingSeason) -> BreedingSeasonSummary {
    // Latest coverage per female decides her diagnosis for the season
    let mut latest: HashMap<&str, &Coverage> = HashMap::new();
    for coverage in &season.coverages {
        let replace = match latest.get(coverage.female_id.as_str()) {
            Some(existing) => parse_record_date(&coverage.date) >= parse_record_date(&existing.date),
            None => true,
        };
        if replace {
            latest.insert(coverage.female_id.as_str(), coverage);
        }
    }

    let diagnosed = latest
        .values()
        .filter(|c| c.diagnosis != PregnancyDiagnosis::Pending)
        .count();
    let pregnant = latest
        .values()
        .filter(|c| c.diagnosis == PregnancyDiagnosis::Pregnant)
        .count();

    BreedingSeasonSummary {
        season_id: season.id.clone(),
        name: season.name.clone(),
        exposed_females: latest.len(),
        diagnosed,
        pregnant,
        pregnancy_rate: ratio(pregnant, diagnosed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::lineage_service::find_offspring_of;
    use shared::{AbortionEvent, CoverageMethod, OffspringBirthEvent, PregnancyEvent, WeighingEvent};

    fn animal(id: &str, tag: &str, sex: Sex) -> Animal {
        Animal {
            id: id.to_string(),
            ear_tag: tag.to_string(),
            sex,
            ..Default::default()
        }
    }

    fn weighing(date: &str, weight: f64, kind: WeighingKind) -> WeighingEvent {
        WeighingEvent {
            date: date.to_string(),
            weight,
            kind,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn calf(id: &str, father: &str, mother: &str, weaning_kg: f64) -> Animal {
        let mut a = animal(id, &id.to_uppercase(), Sex::Male);
        a.father_id = Some(father.to_string());
        a.mother_name = Some(mother.to_string());
        a.birth_date = Some("2023-01-01".to_string());
        a.weighings = vec![
            weighing("2023-01-01", 30.0, WeighingKind::Birth),
            weighing("2023-07-25", weaning_kg, WeighingKind::Weaning),
        ];
        a
    }

    fn herd() -> HerdSnapshot {
        let bull = animal("bull", "T1", Sex::Male);
        let mut cow = animal("cow", "V1", Sex::Female);
        cow.name = Some("Mimosa".to_string());
        let other_bull = animal("bull2", "T2", Sex::Male);

        HerdSnapshot::new(
            vec![
                bull,
                cow,
                other_bull,
                calf("c1", "bull", "mimosa", 210.0),
                calf("c2", "bull", "V1", 190.0),
                calf("c3", "bull2", "Vaca de Fora", 170.0),
                calf("c4", "bull2", "vaca de fora ", 150.0),
            ],
            Vec::new(),
        )
    }

    fn service(snapshot: HerdSnapshot) -> DerivedMetricsService {
        DerivedMetricsService::new(snapshot, GrowthConfig::default(), date("2024-01-01"))
    }

    #[test]
    fn test_indices_match_linear_offspring_scan() {
        let snapshot = herd();
        let indices = build_indices(&snapshot);
        assert!(indices.is_built_from(&snapshot));
        assert!(!indices.is_built_from(&herd()));

        for (pos, animal) in snapshot.animals().iter().enumerate() {
            let indexed: Vec<&str> = indices
                .offspring_positions(snapshot.animals(), pos)
                .into_iter()
                .map(|p| snapshot.animals()[p].id.as_str())
                .collect();
            let scanned: Vec<&str> = find_offspring_of(animal, snapshot.animals())
                .into_iter()
                .map(|a| a.id.as_str())
                .collect();
            assert_eq!(indexed, scanned, "offspring mismatch for {}", animal.id);
        }
    }

    #[test]
    fn test_fiv_calf_is_progeny_of_receptor_and_donor() {
        let donor = animal("donor", "D1", Sex::Female);
        let receptor = animal("rec", "R1", Sex::Female);
        let mut fiv = animal("fiv", "F1", Sex::Male);
        fiv.is_fiv = true;
        fiv.mother_id = Some("rec".to_string());
        fiv.receptor_mother_id = Some("rec".to_string());
        fiv.biological_mother_id = Some("donor".to_string());
        let mut full_sister = animal("full", "F2", Sex::Female);
        full_sister.mother_id = Some("donor".to_string());

        let snapshot = HerdSnapshot::new(vec![donor, receptor, fiv, full_sister], Vec::new());
        let indices = build_indices(&snapshot);
        for (pos, animal) in snapshot.animals().iter().enumerate() {
            let indexed: Vec<&str> = indices
                .offspring_positions(snapshot.animals(), pos)
                .into_iter()
                .map(|p| snapshot.animals()[p].id.as_str())
                .collect();
            let scanned: Vec<&str> = find_offspring_of(animal, snapshot.animals())
                .into_iter()
                .map(|a| a.id.as_str())
                .collect();
            assert_eq!(indexed, scanned, "offspring mismatch for {}", animal.id);
        }

        let service = service(snapshot);
        let progeny = |id: &str| service.get_derived_data(id).unwrap().progeny_ids.iter().cloned().collect::<Vec<_>>();
        assert_eq!(progeny("rec"), vec!["fiv"]);
        assert_eq!(progeny("donor"), vec!["fiv", "full"]);
        // Siblings follow the biological mother only
        let siblings: Vec<&String> = service.get_derived_data("fiv").unwrap().sibling_ids.iter().collect();
        assert_eq!(siblings, vec!["full"]);
    }

    #[test]
    fn test_progeny_and_siblings() {
        let service = service(herd());

        let bull = service.get_derived_data("bull").unwrap();
        assert_eq!(bull.progeny_ids.iter().collect::<Vec<_>>(), vec!["c1", "c2"]);

        let cow = service.get_derived_data("cow").unwrap();
        assert_eq!(cow.progeny_ids.len(), 2);

        let c1 = service.get_derived_data("c1").unwrap();
        assert_eq!(c1.sibling_ids.iter().collect::<Vec<_>>(), vec!["c2"]);

        // External mother known only by name still groups siblings
        let c3 = service.get_derived_data("c3").unwrap();
        assert_eq!(c3.sibling_ids.iter().collect::<Vec<_>>(), vec!["c4"]);
    }

    #[test]
    fn test_growth_absent_is_not_zero() {
        let service = service(herd());
        let bull = service.get_derived_data("bull").unwrap();
        assert!(bull.growth.is_none());

        let c1 = service.get_derived_data("c1").unwrap();
        let growth = c1.growth.as_ref().unwrap();
        assert!(growth.daily_gain_kg > 0.0);
    }

    #[test]
    fn test_dep_reports_rank_by_index() {
        let service = service(herd());
        let deps = service.get_all_deps();
        assert_eq!(deps.len(), 7);

        // Weaned at 205 days: adjusted weight equals the recorded weight
        let c1 = deps.iter().find(|d| d.animal_id == "c1").unwrap();
        assert!((c1.weaning_weight_205_kg.unwrap() - 210.0).abs() < 1e-9);
        // Herd mean is 180, so the own-record DEP is half the deviation
        assert!((c1.dep_weaning_weight.unwrap() - 15.0).abs() < 1e-9);
        assert_eq!(c1.accuracy, OWN_RECORD_ACCURACY);

        // Heaviest calf at weaning with an average birth weight ranks first
        assert_eq!(deps[0].animal_id, "c1");

        let bull = deps.iter().find(|d| d.animal_id == "bull").unwrap();
        let bull2 = deps.iter().find(|d| d.animal_id == "bull2").unwrap();
        assert_eq!(bull.progeny_count, 2);
        assert!((bull.accuracy - 2.0 / 6.0).abs() < 1e-9);
        assert!((bull.dep_weaning_weight.unwrap() - 20.0 / 3.0).abs() < 1e-9);
        assert!(bull.performance_index.unwrap() > bull2.performance_index.unwrap());

        let ranked: Vec<Option<f64>> = deps.iter().map(|d| d.performance_index).collect();
        let first_none = ranked.iter().position(Option::is_none).unwrap_or(ranked.len());
        assert!(ranked[first_none..].iter().all(Option::is_none));
        assert!(ranked[..first_none]
            .windows(2)
            .all(|w| w[0].unwrap() >= w[1].unwrap()));
    }

    #[test]
    fn test_pregnancy_flag() {
        let reference = date("2024-06-01");
        let mut pregnant = animal("p", "P", Sex::Female);
        pregnant.pregnancies = vec![PregnancyEvent {
            date: "2024-03-01".to_string(),
            expected_calving_date: None,
            sire: None,
        }];
        pregnant.births = vec![OffspringBirthEvent {
            date: "2023-12-01".to_string(),
            calf_id: None,
            calf_ear_tag: None,
        }];

        let mut aborted = pregnant.clone();
        aborted.id = "a".to_string();
        aborted.abortions = vec![AbortionEvent {
            date: "2024-04-15".to_string(),
            notes: None,
        }];

        let mut stale = animal("s", "S", Sex::Female);
        stale.pregnancies = vec![PregnancyEvent {
            date: "2023-01-01".to_string(),
            expected_calving_date: None,
            sire: None,
        }];

        let covered = animal("cov", "COV", Sex::Female);
        let season = BreedingSeason {
            id: "bs1".to_string(),
            name: "2024".to_string(),
            start_date: "2024-01-01".to_string(),
            end_date: "2024-04-30".to_string(),
            coverages: vec![Coverage {
                female_id: "cov".to_string(),
                date: "2024-02-10".to_string(),
                sire: Some("T1".to_string()),
                method: CoverageMethod::ArtificialInsemination,
                diagnosis: PregnancyDiagnosis::Pregnant,
            }],
        };

        let snapshot = HerdSnapshot::new(vec![pregnant, aborted, stale, covered], vec![season]);
        let service = DerivedMetricsService::new(snapshot, GrowthConfig::default(), reference);

        assert!(service.get_derived_data("p").unwrap().is_pregnant);
        assert!(!service.get_derived_data("a").unwrap().is_pregnant);
        assert!(!service.get_derived_data("s").unwrap().is_pregnant);
        assert!(service.get_derived_data("cov").unwrap().is_pregnant);
        assert_eq!(service.calculate_kpis().pregnant_count, 2);
    }

    #[test]
    fn test_kpis_add_up() {
        let mut snapshot_animals = herd().animals().to_vec();
        snapshot_animals[0].status = AnimalStatus::Sold;
        snapshot_animals[1].is_fiv = true;
        snapshot_animals[2].status = AnimalStatus::Deceased;

        let coverage = |female: &str, day: &str, diagnosis| Coverage {
            female_id: female.to_string(),
            date: day.to_string(),
            sire: None,
            method: CoverageMethod::Natural,
            diagnosis,
        };
        let season = BreedingSeason {
            id: "bs".to_string(),
            name: "Season".to_string(),
            start_date: "2023-11-01".to_string(),
            end_date: "2024-02-28".to_string(),
            coverages: vec![
                coverage("cow", "2023-11-10", PregnancyDiagnosis::Empty),
                coverage("cow", "2023-12-10", PregnancyDiagnosis::Pregnant),
                coverage("x", "2023-12-01", PregnancyDiagnosis::Empty),
                coverage("y", "2023-12-01", PregnancyDiagnosis::Pending),
            ],
        };

        let service = service(HerdSnapshot::new(snapshot_animals, vec![season]));
        let kpis = service.calculate_kpis();

        assert_eq!(kpis.total_animals, 7);
        assert_eq!(kpis.active + kpis.sold + kpis.deceased, 7);
        assert_eq!((kpis.sold, kpis.deceased), (1, 1));
        assert_eq!(kpis.males + kpis.females, 7);
        assert_eq!(kpis.fiv_count, 1);

        let dist = &kpis.gmd_distribution;
        assert_eq!(dist.poor + dist.average + dist.good + dist.no_data, 7);
        assert_eq!(dist.no_data, 3);
        assert!(kpis.average_gmd_kg_day.is_some());
        assert_eq!(kpis.average_birth_weight_kg, Some(30.0));
        // No recorded current weights, so the latest weighings count
        assert_eq!(service.get_derived_data("c1").unwrap().current_weight_kg, Some(210.0));
        assert_eq!(kpis.average_current_weight_kg, Some(180.0));
        assert!((kpis.average_weaning_weight_205_kg.unwrap() - 180.0).abs() < 1e-9);

        let summary = &kpis.breeding_seasons[0];
        assert_eq!(summary.exposed_females, 3);
        assert_eq!(summary.diagnosed, 2);
        assert_eq!(summary.pregnant, 1);
        assert_eq!(summary.pregnancy_rate, Some(0.5));
        assert_eq!(kpis.overall_pregnancy_rate, Some(0.5));
    }

    #[test]
    fn test_rebuild_produces_fresh_indices() {
        let service = service(herd());
        let mut animals = service.snapshot().animals().to_vec();
        animals.push(calf("c5", "bull", "V1", 200.0));

        let rebuilt = service.rebuild(HerdSnapshot::new(animals, Vec::new()));
        assert!(rebuilt.get_indices().is_built_from(rebuilt.snapshot()));
        assert_ne!(rebuilt.snapshot().version(), service.snapshot().version());
        assert_eq!(rebuilt.get_derived_data("bull").unwrap().progeny_ids.len(), 3);
        assert_eq!(service.get_derived_data("bull").unwrap().progeny_ids.len(), 2);
    }

    #[test]
    fn test_indexed_resolution() {
        let service = service(herd());
        assert_eq!(service.resolve(Some("mimosa"), None).animal().map(|a| a.id.as_str()), Some("cow"));
        assert_eq!(
            service.resolve(Some("Vaca de Fora"), None),
            AncestorRef::External("Vaca de Fora".to_string())
        );
        assert!(service.resolve(None, None).is_absent());
    }
}
