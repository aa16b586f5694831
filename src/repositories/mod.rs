use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ServiceError;
use crate::ml::{ForecastRecord, Sale};
use crate::models::ForecastView;

pub mod forecast_repository;
pub mod product_repository;
pub mod sale_repository;

pub use forecast_repository::ForecastRepository;
pub use product_repository::ProductRepository;
pub use sale_repository::SaleRepository;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Display data for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
    pub id: i32,
    pub name: String,
    pub category: Option<String>,
}

/// Row counts of one forecast replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceSummary {
    pub deleted: u64,
    pub inserted: u64,
}

/// Supplies a tenant's recorded sales.
#[async_trait]
pub trait SaleSource: Send + Sync {
    async fn sales_for_tenant(&self, tenant_id: i32) -> Result<Vec<Sale>, ServiceError>;
}

/// Resolves product ids to display data. Unknown ids are left out.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn products(&self, ids: &[i32]) -> Result<Vec<ProductInfo>, ServiceError>;

    async fn product_names(&self, ids: &[i32]) -> Result<HashMap<i32, String>, ServiceError> {
        Ok(self
            .products(ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect())
    }
}

/// Persists forecast record sets.
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Replaces every stored record of `tenant_id` with `records`.
    ///
    /// All or nothing: on error the previous set is still in place.
    async fn replace_for_tenant(
        &self,
        tenant_id: i32,
        generated_at: DateTime<Utc>,
        records: &[ForecastRecord],
    ) -> Result<ReplaceSummary, ServiceError>;

    /// Stored records ordered by forecast date, then product id.
    async fn list_for_tenant(&self, tenant_id: i32) -> Result<Vec<ForecastView>, ServiceError>;
}
