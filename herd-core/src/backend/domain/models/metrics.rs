//! Domain models for per-animal derived data and herd KPIs.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Qualitative band for an average daily gain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GmdBand {
    Poor,
    Average,
    Good,
}

/// Average daily gain (GMD) over an animal's usable weighing history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRate {
    pub daily_gain_kg: f64,
    pub total_gain_kg: f64,
    pub elapsed_days: i64,
    pub sample_count: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub last_weight_kg: f64,
    pub band: GmdBand,
}

/// Derived expected-progeny-style report for one animal.
///
/// Adjusted weights are standardized to 205 days (weaning) and 365 days
/// (yearling). DEP values are deviations from the herd mean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepReport {
    pub animal_id: String,
    pub ear_tag: String,
    pub birth_weight_kg: Option<f64>,
    pub weaning_weight_205_kg: Option<f64>,
    pub yearling_weight_365_kg: Option<f64>,
    pub dep_birth_weight: Option<f64>,
    pub dep_weaning_weight: Option<f64>,
    pub dep_yearling_weight: Option<f64>,
    pub progeny_count: usize,
    pub accuracy: f64,
    pub performance_index: Option<f64>,
}

/// Everything derived for one animal from one herd snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalDerivedData {
    pub animal_id: String,
    pub growth: Option<GrowthRate>,
    /// Recorded current weight, or the latest usable weighing
    pub current_weight_kg: Option<f64>,
    pub dep: DepReport,
    pub progeny_ids: BTreeSet<String>,
    pub sibling_ids: BTreeSet<String>,
    pub is_pregnant: bool,
}

/// Herd-wide lookup tables, built once per snapshot.
///
/// Values are positions into the snapshot's animal slice. Keys ending in
/// `_key` are normalized (trimmed, lowercased) name/ear-tag strings.
#[derive(Debug, Clone, Default)]
pub struct AnimalIndices {
    pub snapshot_version: u64,
    pub by_id: HashMap<String, usize>,
    pub by_ear_tag_key: HashMap<String, Vec<usize>>,
    pub by_name_key: HashMap<String, Vec<usize>>,
    pub children_by_mother_id: HashMap<String, Vec<usize>>,
    pub children_by_father_id: HashMap<String, Vec<usize>>,
    pub children_by_mother_key: HashMap<String, Vec<usize>>,
    pub children_by_father_key: HashMap<String, Vec<usize>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GmdDistribution {
    pub poor: usize,
    pub average: usize,
    pub good: usize,
    pub no_data: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreedingSeasonSummary {
    pub season_id: String,
    pub name: String,
    pub exposed_females: usize,
    pub diagnosed: usize,
    pub pregnant: usize,
    pub pregnancy_rate: Option<f64>,
}

/// Aggregate herd indicators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HerdKpis {
    pub total_animals: usize,
    pub active: usize,
    pub sold: usize,
    pub deceased: usize,
    pub males: usize,
    pub females: usize,
    pub fiv_count: usize,
    pub pregnant_count: usize,
    pub average_gmd_kg_day: Option<f64>,
    pub gmd_distribution: GmdDistribution,
    pub average_current_weight_kg: Option<f64>,
    pub average_birth_weight_kg: Option<f64>,
    pub average_weaning_weight_205_kg: Option<f64>,
    pub abortion_events: usize,
    pub offspring_born_events: usize,
    pub medication_events: usize,
    pub breeding_seasons: Vec<BreedingSeasonSummary>,
    pub overall_pregnancy_rate: Option<f64>,
}

/// Why a projection could not be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsufficientDataReason {
    NoGrowthRate,
    NonPositiveGrowth,
    NoCurrentWeight,
    TargetNotAboveCurrentWeight,
    TargetDateInPast,
    /// The projected date falls outside the representable calendar
    HorizonOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeightPrediction {
    Projected {
        target_date: NaiveDate,
        projected_weight_kg: f64,
        daily_gain_kg: f64,
        days_ahead: i64,
        /// 0.0 ..= 1.0
        confidence: f64,
    },
    InsufficientData(InsufficientDataReason),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlaughterPrediction {
    Projected {
        date: NaiveDate,
        days_remaining: i64,
        target_weight_kg: f64,
        daily_gain_kg: f64,
    },
    InsufficientData(InsufficientDataReason),
}
