/// Converts signals into broker orders in live trading.
pub mod executor;

pub use executor::{SignalExecutor, SignalExecutorConfig};
