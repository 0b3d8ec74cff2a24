use crate::{
    broker::BrokerError,
    order::{OrderError, OrderId},
};
use thiserror::Error;

/// All possible errors produced by the execution layer.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("order validation: {0}")]
    Validation(#[from] OrderError),

    #[error("broker: {0}")]
    Broker(#[from] BrokerError),

    #[error("order store: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("order state serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown order: {0}")]
    UnknownOrder(OrderId),

    #[error("order {0} is not cancelable in its current state")]
    NotCancelable(OrderId),
}
