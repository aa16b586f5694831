pub mod run_forecast_command;

pub use run_forecast_command::{RunForecastCommand, RunOutcome, RunStatus};
