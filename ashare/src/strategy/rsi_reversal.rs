use crate::strategy::{Signal, SignalKind, Strategy};
use ashare_data::event::MarketEvent;
use ashare_instrument::symbol::Symbol;
use ashare_ta::indicators::Rsi;
use fnv::FnvHashMap;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration for constructing a [`RsiReversal`] via the new() constructor method.
///
/// Thresholds are ordered: `extreme_oversold < oversold < overbought < extreme_overbought`.
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub extreme_oversold: f64,
    pub extreme_overbought: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
            extreme_oversold: 20.0,
            extreme_overbought: 80.0,
        }
    }
}

/// Most recent advisory emitted per symbol; suppresses repeats until the RSI returns to the
/// neutral zone (40-60).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum LastSignal {
    Buy,
    StrongBuy,
    Sell,
    StrongSell,
}

#[derive(Debug)]
struct SymbolState {
    rsi: Rsi,
    last_signal: Option<LastSignal>,
}

/// RSI mean reversion with four thresholds: regular signals inside the oversold/overbought
/// bands, strong signals past the extremes, and a neutral-zone reset in between.
#[derive(Debug)]
pub struct RsiReversal {
    config: Config,
    states: FnvHashMap<Symbol, SymbolState>,
}

impl RsiReversal {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            states: FnvHashMap::default(),
        }
    }
}

impl Strategy for RsiReversal {
    fn name(&self) -> &'static str {
        "rsi_reversal"
    }

    fn on_market(&mut self, market: &MarketEvent) -> Vec<Signal> {
        let close = market.close();
        if close <= Decimal::ZERO {
            return Vec::new();
        }

        let config = self.config;
        let state = self
            .states
            .entry(market.symbol.clone())
            .or_insert_with(|| SymbolState {
                rsi: Rsi::new(config.period),
                last_signal: None,
            });

        let Some(rsi) = state.rsi.update(close).and_then(|rsi| rsi.to_f64()) else {
            return Vec::new();
        };

        let advisory = if rsi <= config.extreme_oversold {
            (state.last_signal != Some(LastSignal::StrongBuy))
                .then_some((LastSignal::StrongBuy, SignalKind::Buy, 0.95))
        } else if rsi <= config.oversold {
            (!matches!(
                state.last_signal,
                Some(LastSignal::Buy) | Some(LastSignal::StrongBuy)
            ))
            .then(|| {
                let strength = 0.7 + (config.oversold - rsi) / config.oversold * 0.2;
                (LastSignal::Buy, SignalKind::Buy, strength)
            })
        } else if rsi >= config.extreme_overbought {
            (state.last_signal != Some(LastSignal::StrongSell))
                .then_some((LastSignal::StrongSell, SignalKind::Sell, 0.95))
        } else if rsi >= config.overbought {
            (!matches!(
                state.last_signal,
                Some(LastSignal::Sell) | Some(LastSignal::StrongSell)
            ))
            .then(|| {
                let strength =
                    0.7 + (rsi - config.overbought) / (100.0 - config.overbought) * 0.2;
                (LastSignal::Sell, SignalKind::Sell, strength)
            })
        } else {
            if (40.0..=60.0).contains(&rsi) {
                state.last_signal = None;
            }
            None
        };

        match advisory {
            Some((latch, kind, strength)) => {
                state.last_signal = Some(latch);
                info!(symbol = %market.symbol, rsi, ?kind, "rsi reversal signal");
                vec![Signal::new(market.time, market.symbol.clone(), kind, strength)]
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashare_data::bar::Bar;
    use chrono::{Days, NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn event(close: Decimal, day: u64) -> MarketEvent {
        let symbol = Symbol::new("600036.SH").unwrap();
        let bar = Bar::daily(
            symbol,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .checked_add_days(Days::new(day))
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

    /// A monotonic decline pins the 14-period RSI at zero: one strong buy, no repeats.
    #[test]
    fn strong_buy_emitted_exactly_once_on_extreme_oversold() {
        let mut strategy = RsiReversal::new(Config::default());

        let closes: Vec<Decimal> = (0..15).map(|i| Decimal::from(50 - 2 * i)).collect();
        let mut signals = Vec::new();
        for (day, close) in closes.into_iter().enumerate() {
            signals.extend(strategy.on_market(&event(close, day as u64)));
        }

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Buy);
        assert!(signals[0].strength.value() >= 0.95);

        // Still falling: the latch holds.
        let more = strategy.on_market(&event(dec!(18), 20));
        assert!(more.is_empty());
    }

    #[test]
    fn neutral_zone_resets_the_latch() {
        let config = Config {
            period: 3,
            ..Config::default()
        };
        let mut strategy = RsiReversal::new(config);

        // Decline to a strong buy...
        for (day, close) in [dec!(50), dec!(45), dec!(40), dec!(35)].into_iter().enumerate() {
            strategy.on_market(&event(close, day as u64));
        }
        // ...recover into the neutral zone so the latch clears...
        for (day, close) in [dec!(37), dec!(36), dec!(35.5)].into_iter().enumerate() {
            strategy.on_market(&event(close, 4 + day as u64));
        }
        // ...then collapse again: a fresh buy may fire.
        let signals = strategy.on_market(&event(dec!(20), 8));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Buy);
    }
}
