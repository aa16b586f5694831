use serde::Serialize;

/// Floor added to the coefficient of variation so a perfectly flat series
/// gets a bounded consistency of 10.
const CONSISTENCY_FLOOR: f64 = 0.1;

/// Components of a product's composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub mean: f64,
    pub growth: f64,
    pub consistency: f64,
    pub score: f64,
}

impl ScoreBreakdown {
    const ZERO: Self = Self {
        mean: 0.0,
        growth: 0.0,
        consistency: 0.0,
        score: 0.0,
    };
}

/// Scores a product's monthly revenues (positive months only, oldest first).
///
/// `score = mean * (1 + growth) * consistency`, floored at 0, where growth is
/// the relative change from first to last month and consistency is
/// `1 / (cv + 0.1)` with `cv` the population coefficient of variation.
pub fn score_series(revenues: &[f64]) -> ScoreBreakdown {
    let (first, last) = match revenues {
        [] => return ScoreBreakdown::ZERO,
        [only] => {
            return ScoreBreakdown {
                mean: *only,
                growth: 0.0,
                consistency: 1.0,
                score: non_negative(*only),
            }
        }
        [first, .., last] => (*first, *last),
    };

    let count = revenues.len() as f64;
    let mean = revenues.iter().sum::<f64>() / count;

    let growth = if first == 0.0 {
        0.0
    } else {
        (last - first) / first
    };

    let variance = revenues.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / count;
    let std_dev = variance.sqrt();
    let coefficient_of_variation = if mean == 0.0 { 0.0 } else { std_dev / mean };
    let consistency = 1.0 / (coefficient_of_variation + CONSISTENCY_FLOOR);

    ScoreBreakdown {
        mean,
        growth,
        consistency,
        score: non_negative(mean * (1.0 + growth) * consistency),
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_series_scores_zero() {
        assert_eq!(score_series(&[]).score, 0.0);
    }

    #[rstest]
    #[case(250.0)]
    #[case(0.01)]
    fn single_month_scores_its_value(#[case] value: f64) {
        let breakdown = score_series(&[value]);
        assert_eq!(breakdown.growth, 0.0);
        assert_eq!(breakdown.consistency, 1.0);
        assert_eq!(breakdown.score, value);
    }

    #[test]
    fn flat_series_has_bounded_consistency() {
        let breakdown = score_series(&[100.0, 100.0, 100.0]);
        assert_eq!(breakdown.growth, 0.0);
        assert!(approx(breakdown.consistency, 10.0));
        assert!(approx(breakdown.score, 1000.0));
    }

    #[test]
    fn two_month_series_matches_hand_computation() {
        // mean 150, growth 1.0, std 50, cv 1/3
        let breakdown = score_series(&[100.0, 200.0]);
        assert!(approx(breakdown.mean, 150.0));
        assert!(approx(breakdown.growth, 1.0));
        let consistency = 1.0 / (1.0 / 3.0 + 0.1);
        assert!(approx(breakdown.consistency, consistency));
        assert!(approx(breakdown.score, 150.0 * 2.0 * consistency));
    }

    #[test]
    fn steady_growth_outranks_volatile_series_with_same_mean() {
        let steady = score_series(&[90.0, 100.0, 110.0]);
        let volatile = score_series(&[10.0, 280.0, 10.0]);

        assert!(approx(steady.mean, volatile.mean));
        assert!(steady.growth > 0.0);
        assert!(steady.consistency > volatile.consistency);
        assert!(steady.score > volatile.score);
    }

    #[test]
    fn steep_decline_is_floored_at_zero() {
        // growth below -1 would make the product negative
        let breakdown = score_series(&[100.0, 80.0, -50.0]);
        assert!(breakdown.growth < -1.0);
        assert_eq!(breakdown.score, 0.0);
    }

    #[test]
    fn zero_first_month_is_guarded() {
        let breakdown = score_series(&[0.0, 40.0]);
        assert_eq!(breakdown.growth, 0.0);
        assert!(breakdown.score > 0.0);
    }
}
