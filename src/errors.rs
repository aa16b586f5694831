use sea_orm::error::DbErr;
use serde::Serialize;

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Whether the error comes from malformed input rather than infrastructure.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::ValidationError(_) | Self::InvalidInput(_))
    }

    /// Message suitable for reporting a failed run upstream.
    /// Database details stay in the logs.
    pub fn outcome_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error while processing forecast run".to_string(),
            Self::Other(_) => "Internal error while processing forecast run".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type AppError = ServiceError;
