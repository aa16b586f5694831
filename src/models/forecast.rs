use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

use crate::ml::ForecastRecord;

/// Stored per-product revenue forecast. A run replaces the tenant's whole set.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "forecasts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tenant_id: i32,
    pub product_id: i32,
    pub forecast_date: NaiveDate,
    pub predicted_revenue: f64,
    pub confidence_interval: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn from_record(tenant_id: i32, generated_at: DateTime<Utc>, record: &ForecastRecord) -> Self {
        Self {
            id: NotSet,
            tenant_id: Set(tenant_id),
            product_id: Set(record.product_id),
            forecast_date: Set(record.forecast_date),
            predicted_revenue: Set(record.predicted_revenue),
            confidence_interval: Set(record.confidence_interval.clone()),
            generated_at: Set(generated_at),
        }
    }
}

/// Stored forecast joined with its product's display name.
#[derive(Clone, Debug, PartialEq, FromQueryResult, Serialize, Deserialize)]
pub struct ForecastView {
    pub product_id: i32,
    pub product_name: String,
    pub forecast_date: NaiveDate,
    pub predicted_revenue: f64,
    pub confidence_interval: String,
}
