mod common;

use std::sync::atomic::Ordering;

use assert_matches::assert_matches;
use common::{five_month_history, monthly_sale, Harness};
use revenue_forecast::errors::ServiceError;

const TENANT: i32 = 11;

#[tokio::test]
async fn kpis_cover_the_tenant_history() {
    let mut sales = five_month_history();
    sales.push(monthly_sale(50, 2024, 5, 3, 400.0));
    let harness = Harness::new(TENANT, sales);

    let kpis = harness.analytics.revenue_kpis(TENANT).await.unwrap();

    assert_eq!(kpis.total_sales, 11);
    assert_eq!(kpis.distinct_products, 3);
    assert!((kpis.total_revenue - 7300.0).abs() < 1e-9);
    assert!((kpis.average_ticket - 7300.0 / 11.0).abs() < 1e-9);

    let may = kpis.monthly_revenue.last().unwrap();
    assert_eq!(may.period.to_string(), "2024-05");
    assert!((may.revenue - 2200.0).abs() < 1e-9);

    let top: Vec<&str> = kpis.top_products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(top, vec!["Espresso machine", "Coffee beans", "Milk frother"]);

    let appliances = kpis
        .categories
        .iter()
        .find(|c| c.category == "appliances")
        .unwrap();
    assert!((appliances.revenue - 3850.0).abs() < 1e-9);
    assert_eq!(appliances.sales, 6);
}

#[tokio::test]
async fn unknown_tenant_gets_empty_kpis() {
    let harness = Harness::new(TENANT, five_month_history());

    let kpis = harness.analytics.revenue_kpis(TENANT + 100).await.unwrap();

    assert_eq!(kpis.total_sales, 0);
    assert_eq!(kpis.total_revenue, 0.0);
    assert!(kpis.best_seller.is_none());
}

#[tokio::test]
async fn source_failure_is_propagated() {
    let harness = Harness::new(TENANT, five_month_history());
    harness.sales.fail.store(true, Ordering::SeqCst);

    let result = harness.analytics.revenue_kpis(TENANT).await;
    assert_matches!(result, Err(ServiceError::DatabaseError(_)));
}
