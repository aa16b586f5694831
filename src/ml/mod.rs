/*!
 * # Revenue Forecasting
 *
 * Pure, synchronous computation behind a forecast run:
 *
 * - [`aggregation`] buckets sales into monthly series
 * - [`forecasting`] projects the monthly total series 3 periods ahead
 * - [`scoring`] rates each product on level, growth and stability
 * - [`allocation`] splits each forecast period across products by score
 *
 * [`plan_forecast`] chains the four steps. Nothing in this module performs
 * I/O or reads the wall clock; `now` is always passed in.
 */

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use validator::{Validate, ValidationError};

use crate::{config::ForecastSettings, errors::ServiceError};

pub mod aggregation;
pub mod allocation;
pub mod forecasting;
pub mod scoring;

pub use aggregation::{aggregate, MonthlyBucket, ProductSeries, SalesAggregate};
pub use allocation::{format_confidence_interval, Allocation, Allocator, ForecastRecord, ProductScore};
pub use forecasting::{ForecastMethod, TotalForecast, TrendForecaster};
pub use scoring::{score_series, ScoreBreakdown};

/// Number of periods every run forecasts.
pub const HORIZON: usize = 3;

/// A single recorded sale, as supplied by the transaction store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Sale {
    pub id: i32,
    pub date: NaiveDate,
    pub product_id: i32,
    pub quantity: i32,
    #[validate(custom = "validate_finite_value")]
    pub total_value: f64,
}

impl Sale {
    pub fn new(id: i32, date: NaiveDate, product_id: i32, quantity: i32, total_value: f64) -> Self {
        Self {
            id,
            date,
            product_id,
            quantity,
            total_value,
        }
    }

    pub fn period(&self) -> PeriodKey {
        PeriodKey::from(self.date)
    }

    /// Rejects rows the aggregation cannot meaningfully sum.
    pub fn check_shape(&self) -> Result<(), ServiceError> {
        self.validate().map_err(|e| {
            ServiceError::InvalidInput(format!("sale {} is malformed: {}", self.id, e))
        })
    }
}

fn validate_finite_value(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        let mut err = ValidationError::new("total_value");
        err.message = Some("total_value must be a finite number".into());
        return Err(err);
    }
    Ok(())
}

/// Year-month bucket identifier, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    pub year: i32,
    pub month: u32,
}

impl PeriodKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

impl From<NaiveDate> for PeriodKey {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Everything a run computes before anything is written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPlan {
    pub generated_at: DateTime<Utc>,
    pub total_forecast: TotalForecast,
    pub breakdowns: BTreeMap<i32, ScoreBreakdown>,
    pub allocation: Allocation,
}

impl ForecastPlan {
    pub fn records(&self) -> &[ForecastRecord] {
        &self.allocation.records
    }

    /// False when every product scored 0 and the total was not distributed.
    pub fn allocation_available(&self) -> bool {
        !self.allocation.weights.is_empty()
    }
}

/// Runs aggregation, total forecast, scoring and allocation over `sales`.
///
/// Fails on out-of-range settings, malformed sale rows and forecast dates
/// chrono cannot represent; every other arithmetic edge case resolves to a
/// policy default.
pub fn plan_forecast(
    sales: &[Sale],
    settings: &ForecastSettings,
    now: DateTime<Utc>,
) -> Result<ForecastPlan, ServiceError> {
    settings.validate()?;
    let aggregate = aggregate(sales)?;

    let forecaster = TrendForecaster::new(settings.smoothing_alpha).with_fallback(
        settings.fallback_days_per_period,
        settings.fallback_average_sale,
    );
    let total_forecast =
        forecaster.forecast_totals(&aggregate.total_revenues(), aggregate.average_sale_value());

    let breakdowns: BTreeMap<i32, ScoreBreakdown> = aggregate
        .per_product
        .iter()
        .map(|(product_id, series)| (*product_id, score_series(&series.revenues())))
        .collect();
    let raw_scores: BTreeMap<i32, f64> = breakdowns
        .iter()
        .map(|(product_id, breakdown)| (*product_id, breakdown.score))
        .collect();

    let allocator = Allocator::new(settings.confidence_band, settings.period_step_days);
    let allocation = allocator.allocate(&total_forecast.values, &raw_scores, now)?;

    Ok(ForecastPlan {
        generated_at: now,
        total_forecast,
        breakdowns,
        allocation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_keys_order_and_format() {
        let jan = PeriodKey::from(date(2024, 1, 31));
        let dec = PeriodKey::from(date(2023, 12, 1));
        assert!(dec < jan);
        assert_eq!(jan.to_string(), "2024-01");
        assert_eq!(serde_json::to_string(&dec).unwrap(), "\"2023-12\"");
    }

    #[test]
    fn non_finite_sale_is_malformed() {
        let sale = Sale::new(9, date(2024, 1, 1), 1, 1, f64::NAN);
        assert!(matches!(sale.check_shape(), Err(ServiceError::InvalidInput(_))));
        assert!(Sale::new(9, date(2024, 1, 1), 1, 1, 10.0).check_shape().is_ok());
    }

    #[test]
    fn plan_with_no_sales_uses_default_fallback_and_allocates_nothing() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let plan = plan_forecast(&[], &ForecastSettings::default(), now).unwrap();

        assert_eq!(plan.total_forecast.method, ForecastMethod::FlatAverage);
        assert_eq!(plan.total_forecast.values, [30_000.0; HORIZON]);
        assert!(!plan.allocation_available());
        assert!(plan.records().is_empty());
    }

    #[test]
    fn out_of_range_settings_are_rejected_before_planning() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let sales = vec![
            Sale::new(1, date(2024, 4, 3), 1, 1, 100.0),
            Sale::new(2, date(2024, 5, 3), 1, 1, 120.0),
        ];
        let settings = ForecastSettings {
            period_step_days: i64::MAX / 2,
            ..ForecastSettings::default()
        };

        assert!(matches!(
            plan_forecast(&sales, &settings, now),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
