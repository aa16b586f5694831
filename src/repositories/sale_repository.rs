use async_trait::async_trait;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use tracing::debug;

use crate::errors::AppError;
use crate::ml::Sale;
use crate::models::sale::{
    ActiveModel as SaleActiveModel, Column, Entity as SaleEntity, Model as SaleModel,
};
use crate::repositories::{BaseRepository, Repository, SaleSource};

/// Repository for sale rows
#[derive(Debug, Clone)]
pub struct SaleRepository {
    base: BaseRepository,
}

impl SaleRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find all sales of a tenant, oldest first
    pub async fn find_by_tenant(&self, tenant_id: i32) -> Result<Vec<SaleModel>, AppError> {
        SaleEntity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by_asc(Column::Date)
            .order_by_asc(Column::Id)
            .all(self.base.get_db())
            .await
            .map_err(AppError::DatabaseError)
    }

    /// Record a sale for a tenant. The sale's own id is ignored.
    pub async fn create(&self, tenant_id: i32, sale: &Sale) -> Result<SaleModel, AppError> {
        sale.check_shape()?;

        SaleActiveModel {
            id: NotSet,
            date: Set(sale.date),
            product_id: Set(sale.product_id),
            tenant_id: Set(tenant_id),
            quantity: Set(sale.quantity),
            total_value: Set(sale.total_value),
        }
        .insert(self.base.get_db())
        .await
        .map_err(AppError::DatabaseError)
    }
}

#[async_trait]
impl SaleSource for SaleRepository {
    async fn sales_for_tenant(&self, tenant_id: i32) -> Result<Vec<Sale>, AppError> {
        let rows = self.find_by_tenant(tenant_id).await?;
        debug!(tenant_id, count = rows.len(), "Loaded sales");
        Ok(rows.into_iter().map(Sale::from).collect())
    }
}

impl Repository for SaleRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
