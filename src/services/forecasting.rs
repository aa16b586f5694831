use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::ForecastSettings,
    errors::ServiceError,
    ml::{self, ForecastMethod, ForecastPlan, ForecastRecord, HORIZON},
    models::ForecastView,
    repositories::{
        ForecastRepository, ForecastStore, ProductCatalog, ProductRepository, ReplaceSummary,
        SaleRepository, SaleSource,
    },
};

/// A product's score and weight, with its display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredProduct {
    pub product_id: i32,
    pub name: String,
    pub mean: f64,
    pub growth: f64,
    pub consistency: f64,
    pub raw_score: f64,
    pub normalized_weight: f64,
}

/// Summary of a completed forecast run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRun {
    pub tenant_id: i32,
    pub generated_at: DateTime<Utc>,
    pub method: ForecastMethod,
    pub used_fallback: bool,
    pub forecast_totals: [f64; HORIZON],
    pub allocation_available: bool,
    pub product_scores: Vec<ScoredProduct>,
    pub top_products: Vec<ScoredProduct>,
    pub records: Vec<ForecastRecord>,
    pub replaced: ReplaceSummary,
}

impl ForecastRun {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

const TOP_PRODUCTS: usize = 3;

/// Service computing and storing per-product revenue forecasts
#[derive(Clone)]
pub struct ForecastingService {
    sales: Arc<dyn SaleSource>,
    catalog: Arc<dyn ProductCatalog>,
    store: Arc<dyn ForecastStore>,
    settings: ForecastSettings,
}

impl ForecastingService {
    pub fn new(
        sales: Arc<dyn SaleSource>,
        catalog: Arc<dyn ProductCatalog>,
        store: Arc<dyn ForecastStore>,
        settings: ForecastSettings,
    ) -> Self {
        Self {
            sales,
            catalog,
            store,
            settings,
        }
    }

    /// Wires the SeaORM repositories over one connection pool.
    pub fn from_db(db: Arc<DatabaseConnection>, settings: ForecastSettings) -> Self {
        Self::new(
            Arc::new(SaleRepository::new(db.clone())),
            Arc::new(ProductRepository::new(db.clone())),
            Arc::new(ForecastRepository::new(db)),
            settings,
        )
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    /// Computes a fresh forecast for `tenant_id` and replaces its stored set.
    ///
    /// The store is called once, after every record has been computed.
    /// Any error before or during that call leaves the stored set untouched.
    #[instrument(skip(self), fields(tenant_id = tenant_id))]
    pub async fn run(
        &self,
        tenant_id: i32,
        now: DateTime<Utc>,
    ) -> Result<ForecastRun, ServiceError> {
        let started = Instant::now();
        let result = self.run_inner(tenant_id, now).await;
        histogram!("revenue_forecast.run.duration", started.elapsed());

        match &result {
            Ok(run) => {
                counter!("revenue_forecast.runs.succeeded", 1);
                if run.used_fallback {
                    counter!("revenue_forecast.runs.fallback", 1);
                }
                if !run.allocation_available {
                    counter!("revenue_forecast.runs.unallocated", 1);
                }
            }
            Err(e) if e.is_input_error() => {
                counter!("revenue_forecast.runs.rejected", 1);
                warn!(error = %e, "Forecast run rejected");
            }
            Err(e) => {
                counter!("revenue_forecast.runs.failed", 1);
                error!(error = %e, "Forecast run failed");
            }
        }

        result
    }

    async fn run_inner(
        &self,
        tenant_id: i32,
        now: DateTime<Utc>,
    ) -> Result<ForecastRun, ServiceError> {
        let sales = self.sales.sales_for_tenant(tenant_id).await?;
        debug!(sales = sales.len(), "Computing forecast plan");

        let plan = ml::plan_forecast(&sales, &self.settings, now)?;
        if plan.total_forecast.used_fallback() {
            warn!(
                sales = sales.len(),
                "Not enough monthly history, using flat average-per-sale forecast"
            );
        }

        let product_ids: Vec<i32> = plan.breakdowns.keys().copied().collect();
        let names = self.catalog.product_names(&product_ids).await?;
        let product_scores = scored_products(&plan, &names);
        log_scores(&product_scores);

        let top_products = top_by_weight(&plan, &product_scores);
        if plan.allocation_available() {
            for (rank, product) in top_products.iter().enumerate() {
                info!(
                    rank = rank + 1,
                    product = %product.name,
                    weight = product.normalized_weight,
                    "Top product"
                );
            }
        } else {
            warn!("No product scored above zero, total forecast left unallocated");
        }

        let replaced = self
            .store
            .replace_for_tenant(tenant_id, plan.generated_at, plan.records())
            .await?;

        info!(
            method = %plan.total_forecast.method,
            records = plan.records().len(),
            "Forecast run completed"
        );

        Ok(ForecastRun {
            tenant_id,
            generated_at: plan.generated_at,
            method: plan.total_forecast.method,
            used_fallback: plan.total_forecast.used_fallback(),
            forecast_totals: plan.total_forecast.values,
            allocation_available: plan.allocation_available(),
            records: plan.allocation.records,
            product_scores,
            top_products,
            replaced,
        })
    }

    /// Stored forecasts of a tenant, with product names.
    #[instrument(skip(self))]
    pub async fn forecasts(&self, tenant_id: i32) -> Result<Vec<ForecastView>, ServiceError> {
        self.store.list_for_tenant(tenant_id).await
    }
}

fn display_name(names: &HashMap<i32, String>, product_id: i32) -> String {
    names
        .get(&product_id)
        .cloned()
        .unwrap_or_else(|| format!("product {}", product_id))
}

fn scored_products(plan: &ForecastPlan, names: &HashMap<i32, String>) -> Vec<ScoredProduct> {
    let weights: HashMap<i32, f64> = plan
        .allocation
        .weights
        .iter()
        .map(|w| (w.product_id, w.normalized_weight))
        .collect();

    plan.breakdowns
        .iter()
        .map(|(product_id, breakdown)| ScoredProduct {
            product_id: *product_id,
            name: display_name(names, *product_id),
            mean: breakdown.mean,
            growth: breakdown.growth,
            consistency: breakdown.consistency,
            raw_score: breakdown.score,
            normalized_weight: weights.get(product_id).copied().unwrap_or(0.0),
        })
        .collect()
}

fn top_by_weight(plan: &ForecastPlan, scored: &[ScoredProduct]) -> Vec<ScoredProduct> {
    plan.allocation
        .ranked()
        .iter()
        .take(TOP_PRODUCTS)
        .filter_map(|w| scored.iter().find(|s| s.product_id == w.product_id).cloned())
        .collect()
}

fn log_scores(scored: &[ScoredProduct]) {
    for product in scored {
        debug!(
            product = %product.name,
            mean = product.mean,
            growth = product.growth,
            consistency = product.consistency,
            score = product.raw_score,
            "Product score"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::Sale;
    use chrono::{NaiveDate, TimeZone};

    fn sale(id: i32, y: i32, m: u32, product_id: i32, value: f64) -> Sale {
        Sale::new(
            id,
            NaiveDate::from_ymd_opt(y, m, 15).unwrap(),
            product_id,
            1,
            value,
        )
    }

    #[test]
    fn scored_products_fall_back_to_id_names_and_zero_weights() {
        let sales = vec![
            sale(1, 2024, 1, 1, 100.0),
            sale(2, 2024, 2, 1, 100.0),
            sale(3, 2024, 1, 2, 50.0),
        ];
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let plan = ml::plan_forecast(&sales, &ForecastSettings::default(), now).unwrap();

        let mut names = HashMap::new();
        names.insert(1, "Coffee".to_string());
        let scored = scored_products(&plan, &names);

        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].name, "Coffee");
        assert_eq!(scored[1].name, "product 2");
        let weight_sum: f64 = scored.iter().map(|s| s.normalized_weight).sum();
        assert!((weight_sum - 1.0).abs() < 1e-9);

        let top = top_by_weight(&plan, &scored);
        assert_eq!(top[0].product_id, 1);
    }
}
