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

//! Technical analysis utilities for Ashare.
//!
//! Incremental sliding-window indicators shared across strategies, plus the
//! [`IndicatorSet`](set::IndicatorSet) record computed from a closing-bar sequence.
//!
//! Indicators yield `None` until their window is full; arithmetic on partially-warmed
//! indicators is therefore impossible by construction.

pub mod indicators;
pub mod set;
