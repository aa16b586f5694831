use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::with_transaction;
use crate::errors::AppError;
use crate::ml::ForecastRecord;
use crate::models::forecast::{
    ActiveModel as ForecastActiveModel, Column, Entity as Forecast, ForecastView, Relation,
};
use crate::models::product;
use crate::repositories::{BaseRepository, ForecastStore, ReplaceSummary, Repository};

/// SeaORM-backed forecast store
#[derive(Debug, Clone)]
pub struct ForecastRepository {
    base: BaseRepository,
}

impl ForecastRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl ForecastStore for ForecastRepository {
    async fn replace_for_tenant(
        &self,
        tenant_id: i32,
        generated_at: DateTime<Utc>,
        records: &[ForecastRecord],
    ) -> Result<ReplaceSummary, AppError> {
        let rows: Vec<ForecastActiveModel> = records
            .iter()
            .map(|record| ForecastActiveModel::from_record(tenant_id, generated_at, record))
            .collect();

        let summary = with_transaction(self.base.get_db(), move |txn| {
            Box::pin(async move {
                let deleted = Forecast::delete_many()
                    .filter(Column::TenantId.eq(tenant_id))
                    .exec(txn)
                    .await?
                    .rows_affected;

                // insert_many rejects an empty batch
                let inserted = if rows.is_empty() {
                    0
                } else {
                    Forecast::insert_many(rows)
                        .exec_without_returning(txn)
                        .await?
                };

                Ok(ReplaceSummary { deleted, inserted })
            })
        })
        .await?;

        info!(
            tenant_id,
            deleted = summary.deleted,
            inserted = summary.inserted,
            "Replaced stored forecasts"
        );
        Ok(summary)
    }

    async fn list_for_tenant(&self, tenant_id: i32) -> Result<Vec<ForecastView>, AppError> {
        let views = Forecast::find()
            .select_only()
            .column(Column::ProductId)
            .column_as(product::Column::Name, "product_name")
            .column(Column::ForecastDate)
            .column(Column::PredictedRevenue)
            .column(Column::ConfidenceInterval)
            .join(JoinType::InnerJoin, Relation::Product.def())
            .filter(Column::TenantId.eq(tenant_id))
            .order_by_asc(Column::ForecastDate)
            .order_by_asc(Column::ProductId)
            .into_model::<ForecastView>()
            .all(self.base.get_db())
            .await
            .map_err(AppError::DatabaseError)?;

        debug!(tenant_id, count = views.len(), "Listed stored forecasts");
        Ok(views)
    }
}

impl Repository for ForecastRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
