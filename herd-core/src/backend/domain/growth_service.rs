//! Growth-rate (GMD) computation and weight projections.
//!
//! GMD is the average daily gain between the earliest and latest usable
//! weighing. A weighing is usable when its date parses and its weight is
//! positive. Fewer than two usable weighings, or no elapsed days between
//! them, means there is no rate at all (which is not the same as zero gain).
//!
//! Projections use the same linear model:
//! `projected = current + daily_gain * days`.
//! Slaughter targets are given in arrobas and converted with the configured
//! kilograms per arroba (15 kg by default).

use chrono::{Duration, NaiveDate};
use log::debug;
use shared::{Animal, WeighingKind};

use crate::backend::domain::models::herd::parse_record_date;
use crate::backend::domain::models::metrics::{
    GmdBand, GrowthRate, InsufficientDataReason, SlaughterPrediction, WeightPrediction,
};
use crate::config::GrowthConfig;

/// A weighing whose date parsed and whose weight is positive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsableWeighing {
    pub date: NaiveDate,
    pub weight: f64,
    pub kind: WeighingKind,
}

/// Usable weighings in chronological order
pub fn usable_weighings(animal: &Animal) -> Vec<UsableWeighing> {
    let mut weighings: Vec<UsableWeighing> = animal
        .weighings
        .iter()
        .filter_map(|w| {
            let date = parse_record_date(&w.date)?;
            (w.weight.is_finite() && w.weight > 0.0).then_some(UsableWeighing {
                date,
                weight: w.weight,
                kind: w.kind,
            })
        })
        .collect();
    weighings.sort_by_key(|w| w.date);
    weighings
}

#[derive(Debug, Clone)]
pub struct GrowthService {
    config: GrowthConfig,
}

impl GrowthService {
    pub fn new(config: GrowthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GrowthConfig {
        &self.config
    }

    /// Average daily gain over the usable weighing history
    pub fn growth_rate(&self, animal: &Animal) -> Option<GrowthRate> {
        let weighings = usable_weighings(animal);
        if weighings.len() < 2 {
            return None;
        }
        let first = weighings.first()?;
        let last = weighings.last()?;

        let elapsed_days = (last.date - first.date).num_days();
        if elapsed_days <= 0 {
            debug!("Animal {} has weighings on a single date, no GMD", animal.id);
            return None;
        }

        let total_gain_kg = last.weight - first.weight;
        let daily_gain_kg = total_gain_kg / elapsed_days as f64;

        Some(GrowthRate {
            daily_gain_kg,
            total_gain_kg,
            elapsed_days,
            sample_count: weighings.len(),
            first_date: first.date,
            last_date: last.date,
            last_weight_kg: last.weight,
            band: self.classify(daily_gain_kg),
        })
    }

    pub fn classify(&self, daily_gain_kg: f64) -> GmdBand {
        if daily_gain_kg < self.config.poor_below_kg_day {
            GmdBand::Poor
        } else if daily_gain_kg >= self.config.good_from_kg_day {
            GmdBand::Good
        } else {
            GmdBand::Average
        }
    }

    pub fn arrobas_to_kg(&self, arrobas: f64) -> f64 {
        arrobas * self.config.arroba_kg
    }

    /// Confidence in a projection, falling with horizon and with fewer samples
    pub fn confidence(&self, days_ahead: i64, sample_count: usize) -> f64 {
        let full = self.config.full_confidence_samples.max(1);
        let sample_factor = sample_count.min(full) as f64 / full as f64;

        let horizon = self.config.confidence_horizon_days.max(1) as f64;
        let horizon_factor = (1.0 - days_ahead.max(0) as f64 / horizon).max(0.1);

        (sample_factor * horizon_factor).clamp(0.0, 1.0)
    }

    /// Current weight: the recorded value, or the latest usable weighing
    pub fn current_weight(&self, animal: &Animal) -> Option<f64> {
        animal
            .current_weight
            .filter(|w| w.is_finite() && *w > 0.0)
            .or_else(|| usable_weighings(animal).last().map(|w| w.weight))
    }

    /// Projected weight of `animal` on `target_date`
    pub fn predict_weight(&self, animal: &Animal, target_date: NaiveDate, today: NaiveDate) -> WeightPrediction {
        let Some(growth) = self.growth_rate(animal) else {
            return WeightPrediction::InsufficientData(InsufficientDataReason::NoGrowthRate);
        };
        let Some(current) = self.current_weight(animal) else {
            return WeightPrediction::InsufficientData(InsufficientDataReason::NoCurrentWeight);
        };

        let days_ahead = (target_date - today).num_days();
        if days_ahead < 0 {
            return WeightPrediction::InsufficientData(InsufficientDataReason::TargetDateInPast);
        }

        WeightPrediction::Projected {
            target_date,
            projected_weight_kg: current + growth.daily_gain_kg * days_ahead as f64,
            daily_gain_kg: growth.daily_gain_kg,
            days_ahead,
            confidence: self.confidence(days_ahead, growth.sample_count),
        }
    }

    /// Date on which `animal` reaches `target_arrobas`
    pub fn predict_slaughter_date(&self, animal: &Animal, target_arrobas: f64, today: NaiveDate) -> SlaughterPrediction {
        let Some(growth) = self.growth_rate(animal) else {
            return SlaughterPrediction::InsufficientData(InsufficientDataReason::NoGrowthRate);
        };
        let Some(current) = self.current_weight(animal) else {
            return SlaughterPrediction::InsufficientData(InsufficientDataReason::NoCurrentWeight);
        };
        self.project_slaughter_date(current, growth.daily_gain_kg, target_arrobas, today)
    }

    /// Solve `current + gain * days >= target` for the first whole day
    pub fn project_slaughter_date(
        &self,
        current_weight_kg: f64,
        daily_gain_kg: f64,
        target_arrobas: f64,
        today: NaiveDate,
    ) -> SlaughterPrediction {
        let target_weight_kg = self.arrobas_to_kg(target_arrobas);
        if target_weight_kg <= current_weight_kg {
            return SlaughterPrediction::InsufficientData(InsufficientDataReason::TargetNotAboveCurrentWeight);
        }
        if !(daily_gain_kg > 0.0) {
            return SlaughterPrediction::InsufficientData(InsufficientDataReason::NonPositiveGrowth);
        }

        let days = ((target_weight_kg - current_weight_kg) / daily_gain_kg).ceil();
        // `as i64` saturates, so bound the float before converting
        if !(days < i64::MAX as f64) {
            return SlaughterPrediction::InsufficientData(InsufficientDataReason::HorizonOutOfRange);
        }
        let days_remaining = days as i64;
        let Some(date) = Duration::try_days(days_remaining).and_then(|span| today.checked_add_signed(span)) else {
            debug!("Slaughter projection of {} days falls outside the calendar", days_remaining);
            return SlaughterPrediction::InsufficientData(InsufficientDataReason::HorizonOutOfRange);
        };
        SlaughterPrediction::Projected {
            date,
            days_remaining,
            target_weight_kg,
            daily_gain_kg,
        }
    }
}
