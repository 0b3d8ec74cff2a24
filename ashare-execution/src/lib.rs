#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Ashare-Execution
//! Order lifecycle and execution for the Ashare trading engine:
//! * [`Order`](order::Order) model with the linear-plus-terminal state machine.
//! * [`CostModel`](cost::CostModel): commission, stamp tax, transfer fee, market impact.
//! * [`MarketSimulator`](simulator::MarketSimulator): converts an order plus an OHLCV bar into
//!   a deterministic fill decision under exchange microstructure rules.
//! * [`BrokerAdapter`](broker::BrokerAdapter) capability with the in-process
//!   [`MockBroker`](broker::mock::MockBroker).
//! * [`OrderManager`](manager::OrderManager): broker round-trip, per-order fill monitoring,
//!   durable state transitions, submit rate limiting.

/// Order model, identifiers and the order state machine.
pub mod order;

/// Fill records.
pub mod fill;

/// Positions with the T+1 available-quantity lockbox.
pub mod position;

/// Account snapshot.
pub mod account;

/// Deterministic fee/slippage/stamp-tax calculation.
pub mod cost;

/// Exchange-rule market simulation for backtests.
pub mod simulator;

/// The broker capability and implementations.
pub mod broker;

/// Order lifecycle management over a broker.
pub mod manager;

/// Durable order persistence.
pub mod store;

/// Execution module specific errors.
pub mod error;
