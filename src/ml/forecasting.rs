use serde::Serialize;
use strum::Display;

use super::HORIZON;

/// How the total forecast of a run was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ForecastMethod {
    /// Three or more monthly observations
    ExponentialSmoothing,
    /// Exactly two monthly observations
    LinearExtrapolation,
    /// Average sale value scaled to a period
    FlatAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalForecast {
    pub method: ForecastMethod,
    pub values: [f64; HORIZON],
}

impl TotalForecast {
    pub fn used_fallback(&self) -> bool {
        self.method == ForecastMethod::FlatAverage
    }
}

/// Projects a monthly total revenue series [`HORIZON`] periods ahead.
#[derive(Debug, Clone)]
pub struct TrendForecaster {
    alpha: f64,
    fallback_days_per_period: f64,
    fallback_average_sale: f64,
}

impl Default for TrendForecaster {
    fn default() -> Self {
        Self::new(0.3)
    }
}

impl TrendForecaster {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fallback_days_per_period: 30.0,
            fallback_average_sale: 1000.0,
        }
    }

    pub fn with_fallback(mut self, days_per_period: f64, default_average_sale: f64) -> Self {
        self.fallback_days_per_period = days_per_period;
        self.fallback_average_sale = default_average_sale;
        self
    }

    /// Forecast from the primary path, `None` when the series is too short
    /// or produces no usable values.
    pub fn forecast(&self, totals: &[f64]) -> Option<[f64; HORIZON]> {
        let (first, last) = match totals {
            [first, .., last] => (*first, *last),
            _ => return None,
        };
        let len = totals.len() as f64;
        let trend = (last - first) / len;

        let base = if totals.len() >= 3 {
            totals[1..]
                .iter()
                .fold(first, |level, r| self.alpha * r + (1.0 - self.alpha) * level)
        } else {
            last
        };

        let mut values = [0.0; HORIZON];
        for (i, value) in values.iter_mut().enumerate() {
            let projected = base + trend * (i + 1) as f64;
            if !projected.is_finite() {
                return None;
            }
            *value = projected.max(0.0);
        }
        Some(values)
    }

    /// Flat per-period estimate from the average sale value.
    pub fn fallback(&self, average_sale: Option<f64>) -> [f64; HORIZON] {
        // a zero average counts as missing
        let average = average_sale
            .filter(|v| v.is_finite() && *v != 0.0)
            .unwrap_or(self.fallback_average_sale);
        let estimate = average * self.fallback_days_per_period;
        [floor_at_zero(estimate); HORIZON]
    }

    /// Primary forecast when available, flat fallback otherwise.
    pub fn forecast_totals(&self, totals: &[f64], average_sale: Option<f64>) -> TotalForecast {
        match self.forecast(totals) {
            Some(values) => TotalForecast {
                method: if totals.len() >= 3 {
                    ForecastMethod::ExponentialSmoothing
                } else {
                    ForecastMethod::LinearExtrapolation
                },
                values,
            },
            None => TotalForecast {
                method: ForecastMethod::FlatAverage,
                values: self.fallback(average_sale),
            },
        }
    }
}

fn floor_at_zero(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
