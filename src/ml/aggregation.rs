use serde::Serialize;
use std::collections::BTreeMap;

use super::{PeriodKey, Sale};
use crate::errors::ServiceError;

/// Revenue and quantity summed over one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBucket {
    pub period: PeriodKey,
    pub revenue: f64,
    pub quantity: i64,
}

impl MonthlyBucket {
    fn empty(period: PeriodKey) -> Self {
        Self {
            period,
            revenue: 0.0,
            quantity: 0,
        }
    }

    fn add(&mut self, sale: &Sale) {
        self.revenue += sale.total_value;
        self.quantity += i64::from(sale.quantity);
    }
}

/// Months with positive revenue for one product, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSeries {
    pub product_id: i32,
    pub buckets: Vec<MonthlyBucket>,
}

impl ProductSeries {
    pub fn revenues(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.revenue).collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesAggregate {
    /// One bucket per month with at least one sale, ascending
    pub total_series: Vec<MonthlyBucket>,
    /// Products with at least one month of positive revenue
    pub per_product: BTreeMap<i32, ProductSeries>,
    pub sale_count: usize,
    pub revenue_sum: f64,
}

impl SalesAggregate {
    pub fn total_revenues(&self) -> Vec<f64> {
        self.total_series.iter().map(|b| b.revenue).collect()
    }

    /// Mean `total_value` per sale, `None` without sales.
    pub fn average_sale_value(&self) -> Option<f64> {
        if self.sale_count == 0 {
            None
        } else {
            Some(self.revenue_sum / self.sale_count as f64)
        }
    }
}

/// Buckets `sales` into the monthly total series and per-product series.
///
/// Every row is shape-checked first; one malformed row fails the whole
/// aggregation.
pub fn aggregate(sales: &[Sale]) -> Result<SalesAggregate, ServiceError> {
    let mut totals: BTreeMap<PeriodKey, MonthlyBucket> = BTreeMap::new();
    let mut by_product: BTreeMap<i32, BTreeMap<PeriodKey, MonthlyBucket>> = BTreeMap::new();
    let mut revenue_sum = 0.0;

    for sale in sales {
        sale.check_shape()?;
        let period = sale.period();

        totals
            .entry(period)
            .or_insert_with(|| MonthlyBucket::empty(period))
            .add(sale);
        by_product
            .entry(sale.product_id)
            .or_default()
            .entry(period)
            .or_insert_with(|| MonthlyBucket::empty(period))
            .add(sale);
        revenue_sum += sale.total_value;
    }

    let per_product = by_product
        .into_iter()
        .filter_map(|(product_id, months)| {
            let buckets: Vec<MonthlyBucket> = months
                .into_values()
                .filter(|bucket| bucket.revenue > 0.0)
                .collect();
            if buckets.is_empty() {
                None
            } else {
                Some((product_id, ProductSeries { product_id, buckets }))
            }
        })
        .collect();

    Ok(SalesAggregate {
        total_series: totals.into_values().collect(),
        per_product,
        sale_count: sales.len(),
        revenue_sum,
    })
}
