use crate::strategy::{Signal, SignalKind, Strategy};
use ashare_data::event::MarketEvent;
use ashare_instrument::symbol::Symbol;
use ashare_ta::indicators::Sma;
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration for constructing a [`MaCrossover`] via the new() constructor method.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fast_period: 5,
            slow_period: 20,
        }
    }
}

#[derive(Debug)]
struct SymbolState {
    fast: Sma,
    slow: Sma,
    previous_spread: Option<Decimal>,
}

/// Moving-average crossover: golden cross (fast crossing above slow) advises a buy, dead
/// cross a sell.
#[derive(Debug)]
pub struct MaCrossover {
    config: Config,
    states: FnvHashMap<Symbol, SymbolState>,
}

impl MaCrossover {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            states: FnvHashMap::default(),
        }
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &'static str {
        "ma_crossover"
    }

    fn on_market(&mut self, market: &MarketEvent) -> Vec<Signal> {
        let close = market.close();
        let config = self.config;
        let state = self
            .states
            .entry(market.symbol.clone())
            .or_insert_with(|| SymbolState {
                fast: Sma::new(config.fast_period),
                slow: Sma::new(config.slow_period),
                previous_spread: None,
            });

        let fast = state.fast.update(close);
        let slow = state.slow.update(close);
        let (Some(fast), Some(slow)) = (fast, slow) else {
            return Vec::new();
        };

        let spread = fast - slow;
        let crossed = match state.previous_spread {
            Some(previous) if previous <= Decimal::ZERO && spread > Decimal::ZERO => {
                Some(SignalKind::Buy)
            }
            Some(previous) if previous >= Decimal::ZERO && spread < Decimal::ZERO => {
                Some(SignalKind::Sell)
            }
            _ => None,
        };
        state.previous_spread = Some(spread);

        match crossed {
            Some(kind) => {
                info!(symbol = %market.symbol, ?kind, %fast, %slow, "ma crossover");
                vec![Signal::new(market.time, market.symbol.clone(), kind, 0.8)]
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashare_data::{bar::Bar, event::MarketEvent};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn event(close: Decimal, day: u32) -> MarketEvent {
        let symbol = Symbol::new("600036.SH").unwrap();
        let bar = Bar::daily(
            symbol,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .checked_add_days(chrono::Days::new(day as u64))
                .unwrap(),
            close,
            close + dec!(0.5),
            close - dec!(0.5),
            close,
            1_000_000,
            None,
        )
        .unwrap();
        MarketEvent::from_bar(Utc::now(), bar)
    }

    #[test]
    fn golden_cross_emits_a_single_buy() {
        let mut strategy = MaCrossover::new(Config {
            fast_period: 2,
            slow_period: 4,
        });

        // Downtrend to put the fast average below the slow one, then a sharp reversal.
        let closes = [
            dec!(12),
            dec!(11),
            dec!(10),
            dec!(9),
            dec!(8),
            dec!(14),
            dec!(15),
        ];

        let mut buys = 0;
        for (day, close) in closes.into_iter().enumerate() {
            for signal in strategy.on_market(&event(close, day as u32)) {
                if signal.kind == SignalKind::Buy {
                    buys += 1;
                }
            }
        }
        assert_eq!(buys, 1);
    }
}
