use ashare_data::error::DataError;
use ashare_execution::{broker::BrokerError, error::ExecutionError};
use thiserror::Error;

/// Defines all possible errors in Ashare core.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("builder incomplete, missing: {0}")]
    BuilderIncomplete(&'static str),

    #[error("data: {0}")]
    Data(#[from] DataError),

    #[error("execution: {0}")]
    Execution(#[from] ExecutionError),

    #[error("broker: {0}")]
    Broker(#[from] BrokerError),

    #[error("engine not running")]
    NotRunning,
}
