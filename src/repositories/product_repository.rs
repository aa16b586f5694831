use async_trait::async_trait;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use validator::Validate;

use crate::errors::AppError;
use crate::models::product::{
    ActiveModel as ProductActiveModel, Column, Entity as Product, Model as ProductModel,
};
use crate::repositories::{BaseRepository, ProductCatalog, ProductInfo, Repository};

/// Repository for product operations
#[derive(Debug, Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find products by id, ordered by id
    pub async fn find_by_ids(&self, ids: &[i32]) -> Result<Vec<ProductModel>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Product::find()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(Column::Id)
            .all(self.base.get_db())
            .await
            .map_err(AppError::DatabaseError)
    }

    /// Create a new product
    pub async fn create(
        &self,
        name: &str,
        category: Option<&str>,
        price: Option<f64>,
    ) -> Result<ProductModel, AppError> {
        let candidate = ProductModel {
            id: 0,
            name: name.to_string(),
            category: category.map(str::to_string),
            price,
        };
        candidate.validate()?;

        ProductActiveModel {
            id: NotSet,
            name: Set(candidate.name),
            category: Set(candidate.category),
            price: Set(candidate.price),
        }
        .insert(self.base.get_db())
        .await
        .map_err(AppError::DatabaseError)
    }
}

#[async_trait]
impl ProductCatalog for ProductRepository {
    async fn products(&self, ids: &[i32]) -> Result<Vec<ProductInfo>, AppError> {
        Ok(self
            .find_by_ids(ids)
            .await?
            .into_iter()
            .map(|p| ProductInfo {
                id: p.id,
                name: p.name,
                category: p.category,
            })
            .collect())
    }
}

impl Repository for ProductRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}
