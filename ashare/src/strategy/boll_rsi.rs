use crate::strategy::{Signal, SignalKind, Strategy};
use ashare_data::event::MarketEvent;
use ashare_instrument::symbol::Symbol;
use ashare_ta::indicators::{Bollinger, Rsi};
use fnv::FnvHashMap;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration for constructing a [`BollRsiCombo`] via the new() constructor method.
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub boll_period: usize,
    pub std_dev: Decimal,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            boll_period: 20,
            std_dev: Decimal::TWO,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
        }
    }
}

#[derive(Debug)]
struct SymbolState {
    bands: Bollinger,
    rsi: Rsi,
    latched: Option<SignalKind>,
}

/// Bollinger touch confirmed by RSI: both indicators must agree before a signal fires, which
/// filters the false positives either produces alone.
#[derive(Debug)]
pub struct BollRsiCombo {
    config: Config,
    states: FnvHashMap<Symbol, SymbolState>,
}

impl BollRsiCombo {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            states: FnvHashMap::default(),
        }
    }
}

impl Strategy for BollRsiCombo {
    fn name(&self) -> &'static str {
        "boll_rsi_combo"
    }

    fn on_market(&mut self, market: &MarketEvent) -> Vec<Signal> {
        let close = market.close();
        let config = self.config;
        let state = self
            .states
            .entry(market.symbol.clone())
            .or_insert_with(|| SymbolState {
                bands: Bollinger::new(config.boll_period, config.std_dev),
                rsi: Rsi::new(config.rsi_period),
                latched: None,
            });

        let bands = state.bands.update(close);
        let rsi = state.rsi.update(close).and_then(|rsi| rsi.to_f64());
        let (Some(bands), Some(rsi)) = (bands, rsi) else {
            return Vec::new();
        };

        let kind = if close <= bands.lower && rsi <= config.rsi_oversold {
            SignalKind::Buy
        } else if close >= bands.upper && rsi >= config.rsi_overbought {
            SignalKind::Sell
        } else {
            if close > bands.lower && close < bands.upper {
                state.latched = None;
            }
            return Vec::new();
        };

        if state.latched == Some(kind) {
            return Vec::new();
        }
        state.latched = Some(kind);

        // Two independent confirmations justify a stronger advisory than either alone.
        info!(symbol = %market.symbol, rsi, ?kind, "bollinger+rsi confirmation");
        vec![Signal::new(market.time, market.symbol.clone(), kind, 0.85)]
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
            close + dec!(0.1),
            close - dec!(0.1),
            close,
            1_000_000,
            None,
        )
        .unwrap();
        MarketEvent::from_bar(Utc::now(), bar)
    }

    #[test]
    fn buy_requires_both_band_touch_and_oversold_rsi() {
        let mut strategy = BollRsiCombo::new(Config {
            boll_period: 4,
            std_dev: Decimal::ONE,
            rsi_period: 3,
            ..Config::default()
        });

        let mut signals = Vec::new();
        // A persistent decline: the band touch and the oversold RSI line up at the end.
        for (day, close) in [dec!(10), dec!(9.8), dec!(9.6), dec!(9.4), dec!(8.0)]
            .into_iter()
            .enumerate()
        {
            signals.extend(strategy.on_market(&event(close, day as u64)));
        }

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalKind::Buy);
    }
}
