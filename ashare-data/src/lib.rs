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

//! # Ashare-Data
//! Market data for the Ashare trading engine:
//! * [`Bar`](bar::Bar) / [`Quote`](quote::Quote) records and the normalised
//!   [`MarketEvent`](event::MarketEvent) consumed by the engine.
//! * The [`DataSource`](source::DataSource) capability with a declared provider fallback chain.
//! * A TTL-indexed [`PersistentCache`](cache::PersistentCache) over an embedded SQLite store,
//!   guarding external HTTP providers.
//! * A polling [`RealtimeFeed`](feed::RealtimeFeed) with per-symbol and global rate limits.

/// Daily/weekly/monthly OHLCV bars and per-symbol bar series.
pub mod bar;

/// Realtime quote snapshots.
pub mod quote;

/// Normalised market events.
pub mod event;

/// The `DataSource` capability and the fallback chain orchestration.
pub mod source;

/// TTL-indexed persistent key-value cache backed by SQLite.
pub mod cache;

/// Polling realtime quote feed.
pub mod feed;

/// Data module specific errors.
pub mod error;
