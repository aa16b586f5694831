use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::HORIZON;
use crate::errors::ServiceError;

/// A product's raw score and its share of the total score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductScore {
    pub product_id: i32,
    pub raw_score: f64,
    pub normalized_weight: f64,
}

/// Forecast revenue of one product for one horizon period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRecord {
    pub product_id: i32,
    pub forecast_date: NaiveDate,
    pub predicted_revenue: f64,
    pub confidence_interval: String,
}

/// Outcome of distributing the total forecast across products.
///
/// `weights` is empty when no product scored above 0; the total forecast is
/// then left undistributed and `records` is empty as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Allocation {
    pub weights: Vec<ProductScore>,
    pub records: Vec<ForecastRecord>,
}

impl Allocation {
    /// Products ordered by weight, highest first.
    pub fn ranked(&self) -> Vec<ProductScore> {
        let mut ranked = self.weights.clone();
        ranked.sort_by(|a, b| {
            b.normalized_weight
                .total_cmp(&a.normalized_weight)
                .then(a.product_id.cmp(&b.product_id))
        });
        ranked
    }
}

#[derive(Debug, Clone)]
pub struct Allocator {
    confidence_band: f64,
    period_step_days: i64,
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new(0.3, 30)
    }
}

impl Allocator {
    pub fn new(confidence_band: f64, period_step_days: i64) -> Self {
        Self {
            confidence_band,
            period_step_days,
        }
    }

    /// Weights for every product with a positive score, by product id.
    /// Empty when the scores sum to 0.
    pub fn normalize(&self, raw_scores: &BTreeMap<i32, f64>) -> Vec<ProductScore> {
        let positive = || {
            raw_scores
                .iter()
                .filter(|(_, score)| score.is_finite() && **score > 0.0)
        };
        let total_score: f64 = positive().map(|(_, score)| score).sum();
        if !total_score.is_finite() || total_score <= 0.0 {
            return Vec::new();
        }

        positive()
            .map(|(product_id, score)| ProductScore {
                product_id: *product_id,
                raw_score: *score,
                normalized_weight: score / total_score,
            })
            .collect()
    }

    /// Date of horizon period `index` (0-based), stepping from `now`.
    ///
    /// Fails when the step or the resulting instant leaves chrono's range.
    pub fn period_date(
        &self,
        now: DateTime<Utc>,
        index: usize,
    ) -> Result<NaiveDate, ServiceError> {
        self.period_step_days
            .checked_mul(index as i64 + 1)
            .and_then(TimeDelta::try_days)
            .and_then(|step| now.checked_add_signed(step))
            .map(|date| date.date_naive())
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "forecast period {} is out of range ({} days per period from {})",
                    index + 1,
                    self.period_step_days,
                    now
                ))
            })
    }

    /// Splits each period's total across positively scored products.
    ///
    /// Records come out ordered by period, then product id.
    pub fn allocate(
        &self,
        forecast_totals: &[f64; HORIZON],
        raw_scores: &BTreeMap<i32, f64>,
        now: DateTime<Utc>,
    ) -> Result<Allocation, ServiceError> {
        let weights = self.normalize(raw_scores);
        if weights.is_empty() {
            return Ok(Allocation::default());
        }

        let mut records = Vec::with_capacity(HORIZON * weights.len());
        for (index, total) in forecast_totals.iter().enumerate() {
            let forecast_date = self.period_date(now, index)?;
            for weight in &weights {
                let predicted_revenue = total.max(0.0) * weight.normalized_weight;
                records.push(ForecastRecord {
                    product_id: weight.product_id,
                    forecast_date,
                    predicted_revenue,
                    confidence_interval: format_confidence_interval(
                        predicted_revenue * (1.0 - self.confidence_band),
                        predicted_revenue * (1.0 + self.confidence_band),
                    ),
                });
            }
        }

        Ok(Allocation { weights, records })
    }
}

/// Renders a confidence band as `[lower, upper]` with two decimals.
pub fn format_confidence_interval(lower: f64, upper: f64) -> String {
    format!("[{:.2}, {:.2}]", lower, upper)
}
