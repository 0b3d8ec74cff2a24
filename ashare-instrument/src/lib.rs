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

//! # Ashare-Instrument
//! Core `Symbol`, `Exchange`, `Board` and market-rule data structures for Chinese A-share and
//! Hong Kong equities, plus the trading-session calendar utilities shared by the simulator and
//! the live engine.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Defines the [`Exchange`](exchange::Exchange) enum covering the supported venues.
pub mod exchange;

/// [`Symbol`](symbol::Symbol) parsing and validation.
pub mod symbol;

/// [`Board`](board::Board) classification derived from a [`Symbol`](symbol::Symbol).
pub mod board;

/// Per-board [`MarketRules`](rules::MarketRules): daily price limit, board lot, price tick.
pub mod rules;

/// Trading session hours and the weekday trading calendar.
pub mod session;

/// [`Side`] of a trade or order - Buy or Sell.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Side {
    #[serde(alias = "buy", alias = "BUY", alias = "b")]
    Buy,
    #[serde(alias = "sell", alias = "SELL", alias = "s")]
    Sell,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Side::Buy => "buy",
                Side::Sell => "sell",
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn de_side_accepts_upper_and_lower_aliases() {
        for (input, expected) in [
            ("\"buy\"", Side::Buy),
            ("\"BUY\"", Side::Buy),
            ("\"sell\"", Side::Sell),
            ("\"SELL\"", Side::Sell),
        ] {
            let actual: Side = serde_json::from_str(input).unwrap();
            assert_eq!(actual, expected);
        }
    }
}
