use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;
use tracing::{error, info, instrument};
use validator::Validate;

use crate::{
    commands::Command,
    errors::ServiceError,
    services::forecasting::{ForecastRun, ForecastingService},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RunForecastCommand {
    #[validate(range(min = 1, message = "Tenant id must be positive"))]
    pub tenant_id: i32,
    /// Reference instant the forecast dates are stepped from
    pub now: DateTime<Utc>,
}

impl RunForecastCommand {
    pub fn new(tenant_id: i32, now: DateTime<Utc>) -> Self {
        Self { tenant_id, now }
    }

    /// Executes the run and folds the result into a reportable outcome.
    pub async fn outcome(&self, service: Arc<ForecastingService>) -> RunOutcome {
        RunOutcome::from_result(self.execute(service).await)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Reportable result of a forecast run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<ForecastRun>,
}

impl RunOutcome {
    pub fn from_result(result: Result<ForecastRun, ServiceError>) -> Self {
        match result {
            Ok(run) => {
                let mut message = if run.allocation_available {
                    format!(
                        "Forecast generated: {} records for {} products",
                        run.record_count(),
                        run.product_scores
                            .iter()
                            .filter(|p| p.normalized_weight > 0.0)
                            .count()
                    )
                } else {
                    "Forecast generated: no product-level forecast available".to_string()
                };
                if run.used_fallback {
                    message.push_str(" (flat average fallback)");
                }

                Self {
                    status: RunStatus::Success,
                    message,
                    run: Some(run),
                }
            }
            Err(e) => Self {
                status: RunStatus::Error,
                message: e.outcome_message(),
                run: None,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

#[async_trait]
impl Command for RunForecastCommand {
    type Context = ForecastingService;
    type Result = ForecastRun;

    #[instrument(skip(self, service), fields(tenant_id = self.tenant_id))]
    async fn execute(
        &self,
        service: Arc<ForecastingService>,
    ) -> Result<Self::Result, ServiceError> {
        if let Err(e) = self.validate() {
            error!("Invalid RunForecastCommand: {}", e);
            return Err(ServiceError::ValidationError(e.to_string()));
        }

        let run = service.run(self.tenant_id, self.now).await?;

        info!(
            records = run.record_count(),
            used_fallback = run.used_fallback,
            "Forecast run command completed"
        );

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ForecastMethod;
    use crate::repositories::ReplaceSummary;
    use chrono::TimeZone;

    fn run_with(allocation_available: bool, used_fallback: bool) -> ForecastRun {
        ForecastRun {
            tenant_id: 1,
            generated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            method: if used_fallback {
                ForecastMethod::FlatAverage
            } else {
                ForecastMethod::ExponentialSmoothing
            },
            used_fallback,
            forecast_totals: [0.0; 3],
            allocation_available,
            product_scores: Vec::new(),
            top_products: Vec::new(),
            records: Vec::new(),
            replaced: ReplaceSummary::default(),
        }
    }

    #[test]
    fn status_serializes_as_lowercase_literal() {
        assert_eq!(serde_json::to_string(&RunStatus::Success).unwrap(), "\"success\"");
        assert_eq!(RunStatus::Error.to_string(), "error");
    }

    #[test]
    fn unallocated_run_is_still_a_success() {
        let outcome = RunOutcome::from_result(Ok(run_with(false, true)));
        assert!(outcome.is_success());
        assert_eq!(
            outcome.message,
            "Forecast generated: no product-level forecast available (flat average fallback)"
        );
    }

    #[test]
    fn database_failure_reports_generic_message() {
        let outcome = RunOutcome::from_result(Err(ServiceError::db_error("disk I/O error")));
        assert_eq!(outcome.status, RunStatus::Error);
        assert_eq!(outcome.message, "Database error while processing forecast run");
        assert!(outcome.run.is_none());

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json.get("run").is_none());
    }

    #[test]
    fn non_positive_tenant_fails_validation() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(RunForecastCommand::new(0, now).validate().is_err());
        assert!(RunForecastCommand::new(3, now).validate().is_ok());
    }
}
