// Forecast runs over a tenant's sales
pub mod forecasting;

// Revenue KPIs
pub mod analytics;
