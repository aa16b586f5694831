use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    errors::ServiceError,
    ml::{aggregate, PeriodKey, Sale},
    repositories::{ProductCatalog, ProductInfo, ProductRepository, SaleRepository, SaleSource},
};

const TOP_PRODUCT_COUNT: usize = 5;
const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestSeller {
    pub product_id: i32,
    pub name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    pub period: PeriodKey,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRevenue {
    pub product_id: i32,
    pub name: String,
    pub revenue: f64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRevenue {
    pub category: String,
    pub revenue: f64,
    pub sales: usize,
}

/// Revenue KPIs of one tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueKpis {
    pub total_revenue: f64,
    /// Mean `total_value` per sale
    pub average_ticket: f64,
    pub total_sales: usize,
    pub distinct_products: usize,
    /// Highest total quantity; ties go to the lowest product id
    pub best_seller: Option<BestSeller>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    /// Up to five products by revenue, highest first
    pub top_products: Vec<ProductRevenue>,
    /// Highest revenue first
    pub categories: Vec<CategoryRevenue>,
}

#[derive(Default)]
struct ProductTotals {
    revenue: f64,
    quantity: i64,
    sales: usize,
}

/// Computes revenue KPIs from a tenant's sales and the matching products.
///
/// Products absent from `products` are reported as `product {id}` under
/// the `Uncategorized` category.
pub fn compute_kpis(sales: &[Sale], products: &[ProductInfo]) -> Result<RevenueKpis, ServiceError> {
    let aggregate = aggregate(sales)?;
    let info: HashMap<i32, &ProductInfo> = products.iter().map(|p| (p.id, p)).collect();
    let name_of = |product_id: i32| {
        info.get(&product_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("product {}", product_id))
    };

    let mut per_product: BTreeMap<i32, ProductTotals> = BTreeMap::new();
    for sale in sales {
        let totals = per_product.entry(sale.product_id).or_default();
        totals.revenue += sale.total_value;
        totals.quantity += i64::from(sale.quantity);
        totals.sales += 1;
    }

    let best_seller = per_product
        .iter()
        .max_by(|(a_id, a), (b_id, b)| a.quantity.cmp(&b.quantity).then(b_id.cmp(a_id)))
        .map(|(product_id, totals)| BestSeller {
            product_id: *product_id,
            name: name_of(*product_id),
            quantity: totals.quantity,
        });

    let mut top_products: Vec<ProductRevenue> = per_product
        .iter()
        .map(|(product_id, totals)| ProductRevenue {
            product_id: *product_id,
            name: name_of(*product_id),
            revenue: totals.revenue,
            quantity: totals.quantity,
        })
        .collect();
    top_products.sort_by(|a, b| {
        b.revenue
            .total_cmp(&a.revenue)
            .then(a.product_id.cmp(&b.product_id))
    });
    top_products.truncate(TOP_PRODUCT_COUNT);

    let mut by_category: BTreeMap<String, CategoryRevenue> = BTreeMap::new();
    for (product_id, totals) in &per_product {
        let category = info
            .get(product_id)
            .and_then(|p| p.category.clone())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        let entry = by_category
            .entry(category.clone())
            .or_insert_with(|| CategoryRevenue {
                category,
                revenue: 0.0,
                sales: 0,
            });
        entry.revenue += totals.revenue;
        entry.sales += totals.sales;
    }
    let mut categories: Vec<CategoryRevenue> = by_category.into_values().collect();
    categories.sort_by(|a, b| {
        b.revenue
            .total_cmp(&a.revenue)
            .then_with(|| a.category.cmp(&b.category))
    });

    Ok(RevenueKpis {
        total_revenue: aggregate.revenue_sum,
        average_ticket: aggregate.average_sale_value().unwrap_or(0.0),
        total_sales: aggregate.sale_count,
        distinct_products: per_product.len(),
        best_seller,
        monthly_revenue: aggregate
            .total_series
            .iter()
            .map(|bucket| MonthlyRevenue {
                period: bucket.period,
                revenue: bucket.revenue,
            })
            .collect(),
        top_products,
        categories,
    })
}

/// Analytics service for tenant revenue reports
#[derive(Clone)]
pub struct AnalyticsService {
    sales: Arc<dyn SaleSource>,
    catalog: Arc<dyn ProductCatalog>,
}

impl AnalyticsService {
    pub fn new(sales: Arc<dyn SaleSource>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { sales, catalog }
    }

    pub fn from_db(db: Arc<DatabaseConnection>) -> Self {
        Self::new(
            Arc::new(SaleRepository::new(db.clone())),
            Arc::new(ProductRepository::new(db)),
        )
    }

    /// Get revenue KPIs for a tenant
    #[instrument(skip(self))]
    pub async fn revenue_kpis(&self, tenant_id: i32) -> Result<RevenueKpis, ServiceError> {
        let sales = self.sales.sales_for_tenant(tenant_id).await?;

        let mut product_ids: Vec<i32> = sales.iter().map(|s| s.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        let products = self.catalog.products(&product_ids).await?;

        let kpis = compute_kpis(&sales, &products)?;
        info!(
            total_sales = kpis.total_sales,
            total_revenue = kpis.total_revenue,
            "Generated revenue KPIs"
        );
        Ok(kpis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sale(id: i32, month: u32, product_id: i32, quantity: i32, value: f64) -> Sale {
        Sale::new(
            id,
            NaiveDate::from_ymd_opt(2024, month, 10).unwrap(),
            product_id,
            quantity,
            value,
        )
    }

    fn product(id: i32, name: &str, category: Option<&str>) -> ProductInfo {
        ProductInfo {
            id,
            name: name.to_string(),
            category: category.map(str::to_string),
        }
    }

    #[test]
    fn empty_sales_give_zero_kpis() {
        let kpis = compute_kpis(&[], &[]).unwrap();
        assert_eq!(kpis.total_revenue, 0.0);
        assert_eq!(kpis.average_ticket, 0.0);
        assert_eq!(kpis.total_sales, 0);
        assert_eq!(kpis.distinct_products, 0);
        assert!(kpis.best_seller.is_none());
        assert!(kpis.monthly_revenue.is_empty());
        assert!(kpis.top_products.is_empty());
        assert!(kpis.categories.is_empty());
    }

    #[test]
    fn kpis_match_hand_computed_values() {
        let sales = vec![
            sale(1, 1, 1, 2, 100.0),
            sale(2, 1, 2, 10, 50.0),
            sale(3, 2, 1, 1, 150.0),
            sale(4, 2, 3, 1, 20.0),
        ];
        let products = vec![
            product(1, "Espresso machine", Some("appliances")),
            product(2, "Coffee beans", Some("groceries")),
        ];

        let kpis = compute_kpis(&sales, &products).unwrap();

        assert_eq!(kpis.total_revenue, 320.0);
        assert_eq!(kpis.average_ticket, 80.0);
        assert_eq!(kpis.total_sales, 4);
        assert_eq!(kpis.distinct_products, 3);

        let best = kpis.best_seller.unwrap();
        assert_eq!(best.name, "Coffee beans");
        assert_eq!(best.quantity, 10);

        let months: Vec<(String, f64)> = kpis
            .monthly_revenue
            .iter()
            .map(|m| (m.period.to_string(), m.revenue))
            .collect();
        assert_eq!(
            months,
            vec![("2024-01".to_string(), 150.0), ("2024-02".to_string(), 170.0)]
        );

        let top: Vec<(&str, f64, i64)> = kpis
            .top_products
            .iter()
            .map(|p| (p.name.as_str(), p.revenue, p.quantity))
            .collect();
        assert_eq!(
            top,
            vec![
                ("Espresso machine", 250.0, 3),
                ("Coffee beans", 50.0, 10),
                ("product 3", 20.0, 1),
            ]
        );

        let categories: Vec<(&str, f64, usize)> = kpis
            .categories
            .iter()
            .map(|c| (c.category.as_str(), c.revenue, c.sales))
            .collect();
        assert_eq!(
            categories,
            vec![
                ("appliances", 250.0, 2),
                ("groceries", 50.0, 1),
                ("Uncategorized", 20.0, 1),
            ]
        );
    }

    #[test]
    fn top_products_are_capped_at_five() {
        let sales: Vec<Sale> = (1..=7)
            .map(|id| sale(id, 3, id, 1, f64::from(id) * 10.0))
            .collect();
        let kpis = compute_kpis(&sales, &[]).unwrap();

        let ids: Vec<i32> = kpis.top_products.iter().map(|p| p.product_id).collect();
        assert_eq!(ids, vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn best_seller_tie_goes_to_lowest_id() {
        let sales = vec![sale(1, 1, 9, 4, 10.0), sale(2, 1, 3, 4, 10.0)];
        let kpis = compute_kpis(&sales, &[]).unwrap();
        assert_eq!(kpis.best_seller.map(|b| b.product_id), Some(3));
    }
}
