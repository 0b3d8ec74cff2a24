/// Backtest performance summary generation.
pub mod summary;

pub use summary::{SummaryConfig, TradingSummary};
