use crate::errors::ServiceError;
use async_trait::async_trait;
use std::sync::Arc;

/// Command trait for implementing the Command Pattern
///
/// This trait allows for encapsulating all the logic needed to execute a business operation
/// into a single object that can be validated and executed against its dependencies.
#[async_trait]
pub trait Command: Send + Sync {
    /// The dependencies the command runs against
    type Context: Send + Sync + ?Sized;

    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    ///
    /// # Returns
    /// * `Result<Self::Result, ServiceError>` - The result of command execution or an error
    async fn execute(&self, context: Arc<Self::Context>) -> Result<Self::Result, ServiceError>;
}

pub mod forecasting;
