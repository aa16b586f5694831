#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use revenue_forecast::{
    config::ForecastSettings,
    db::{self, DbConfig, DbPool},
    errors::ServiceError,
    ml::{ForecastRecord, Sale},
    models::ForecastView,
    repositories::{ForecastStore, ProductCatalog, ProductInfo, ReplaceSummary, SaleSource},
    services::{analytics::AnalyticsService, forecasting::ForecastingService},
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

/// One sale on the 15th of the given month.
pub fn monthly_sale(id: i32, y: i32, m: u32, product_id: i32, value: f64) -> Sale {
    Sale::new(id, date(y, m, 15), product_id, 1, value)
}

/// Sales whose monthly totals are 1000, 1200, 1500, 1400, 1800 (Jan..May 2024)
/// split evenly between products 1 and 2.
pub fn five_month_history() -> Vec<Sale> {
    let totals = [1000.0, 1200.0, 1500.0, 1400.0, 1800.0];
    let mut sales = Vec::new();
    for (i, total) in totals.iter().enumerate() {
        let month = i as u32 + 1;
        sales.push(monthly_sale(i as i32 * 2 + 1, 2024, month, 1, total / 2.0));
        sales.push(monthly_sale(i as i32 * 2 + 2, 2024, month, 2, total / 2.0));
    }
    sales
}

#[derive(Default)]
pub struct InMemorySales {
    by_tenant: Mutex<HashMap<i32, Vec<Sale>>>,
    pub fail: AtomicBool,
}

impl InMemorySales {
    pub fn with(tenant_id: i32, sales: Vec<Sale>) -> Self {
        let source = Self::default();
        source.set(tenant_id, sales);
        source
    }

    pub fn set(&self, tenant_id: i32, sales: Vec<Sale>) {
        self.by_tenant.lock().unwrap().insert(tenant_id, sales);
    }
}

#[async_trait]
impl SaleSource for InMemorySales {
    async fn sales_for_tenant(&self, tenant_id: i32) -> Result<Vec<Sale>, ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::db_error("sales table unavailable"));
        }
        Ok(self
            .by_tenant
            .lock()
            .unwrap()
            .get(&tenant_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    products: Mutex<HashMap<i32, ProductInfo>>,
}

impl InMemoryCatalog {
    pub fn with(products: &[(i32, &str, Option<&str>)]) -> Self {
        let catalog = Self::default();
        {
            let mut map = catalog.products.lock().unwrap();
            for (id, name, category) in products {
                map.insert(
                    *id,
                    ProductInfo {
                        id: *id,
                        name: name.to_string(),
                        category: category.map(str::to_string),
                    },
                );
            }
        }
        catalog
    }

    pub fn name_of(&self, id: i32) -> String {
        self.products
            .lock()
            .unwrap()
            .get(&id)
            .map(|p| p.name.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryCatalog {
    async fn products(&self, ids: &[i32]) -> Result<Vec<ProductInfo>, ServiceError> {
        let map = self.products.lock().unwrap();
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }
}

/// Forecast store recording every replace call.
pub struct InMemoryStore {
    records: Mutex<HashMap<i32, Vec<ForecastRecord>>>,
    catalog: Arc<InMemoryCatalog>,
    pub replace_calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl InMemoryStore {
    pub fn new(catalog: Arc<InMemoryCatalog>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            catalog,
            replace_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn stored(&self, tenant_id: i32) -> Vec<ForecastRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&tenant_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.replace_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastStore for InMemoryStore {
    async fn replace_for_tenant(
        &self,
        tenant_id: i32,
        _generated_at: DateTime<Utc>,
        records: &[ForecastRecord],
    ) -> Result<ReplaceSummary, ServiceError> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::db_error("write failed"));
        }

        let mut map = self.records.lock().unwrap();
        let deleted = map.get(&tenant_id).map_or(0, Vec::len) as u64;
        map.insert(tenant_id, records.to_vec());
        Ok(ReplaceSummary {
            deleted,
            inserted: records.len() as u64,
        })
    }

    async fn list_for_tenant(&self, tenant_id: i32) -> Result<Vec<ForecastView>, ServiceError> {
        let mut views: Vec<ForecastView> = self
            .stored(tenant_id)
            .into_iter()
            .map(|r| ForecastView {
                product_id: r.product_id,
                product_name: self.catalog.name_of(r.product_id),
                forecast_date: r.forecast_date,
                predicted_revenue: r.predicted_revenue,
                confidence_interval: r.confidence_interval,
            })
            .collect();
        views.sort_by(|a, b| {
            a.forecast_date
                .cmp(&b.forecast_date)
                .then(a.product_id.cmp(&b.product_id))
        });
        Ok(views)
    }
}

/// In-memory collaborators wired into the services.
pub struct Harness {
    pub sales: Arc<InMemorySales>,
    pub catalog: Arc<InMemoryCatalog>,
    pub store: Arc<InMemoryStore>,
    pub service: Arc<ForecastingService>,
    pub analytics: AnalyticsService,
}

impl Harness {
    pub fn new(tenant_id: i32, sales: Vec<Sale>) -> Self {
        let sales = Arc::new(InMemorySales::with(tenant_id, sales));
        let catalog = Arc::new(InMemoryCatalog::with(&[
            (1, "Espresso machine", Some("appliances")),
            (2, "Coffee beans", Some("groceries")),
            (3, "Milk frother", Some("appliances")),
        ]));
        let store = Arc::new(InMemoryStore::new(catalog.clone()));
        let service = Arc::new(ForecastingService::new(
            sales.clone(),
            catalog.clone(),
            store.clone(),
            ForecastSettings::default(),
        ));
        let analytics = AnalyticsService::new(sales.clone(), catalog.clone());

        Self {
            sales,
            catalog,
            store,
            service,
            analytics,
        }
    }
}

/// Fresh migrated in-memory SQLite database.
pub async fn sqlite_pool() -> DbPool {
    // one connection so every query sees the same in-memory database
    let pool = db::establish_connection_with_config(&DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    })
    .await
    .expect("failed to open in-memory sqlite");

    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");
    pool
}
