use crate::strategy::{Signal, SignalKind, Strategy};
use ashare_data::event::MarketEvent;
use ashare_instrument::symbol::Symbol;
use ashare_ta::indicators::Bollinger;
use fnv::FnvHashMap;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration for constructing a [`MeanReversion`] via the new() constructor method.
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub period: usize,
    /// Z-score beyond which an entry signal fires.
    pub entry_z: f64,
    /// Z-score inside which the latch resets.
    pub exit_z: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            period: 20,
            entry_z: 2.0,
            exit_z: 0.5,
        }
    }
}

#[derive(Debug)]
struct SymbolState {
    bands: Bollinger,
    latched: Option<SignalKind>,
}

/// Z-score mean reversion: buy stretched-down closes, sell stretched-up ones, one signal per
/// excursion.
#[derive(Debug)]
pub struct MeanReversion {
    config: Config,
    states: FnvHashMap<Symbol, SymbolState>,
}

impl MeanReversion {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            states: FnvHashMap::default(),
        }
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &'static str {
        "mean_reversion"
    }

    fn on_market(&mut self, market: &MarketEvent) -> Vec<Signal> {
        let close = market.close();
        let config = self.config;
        let state = self
            .states
            .entry(market.symbol.clone())
            .or_insert_with(|| SymbolState {
                // One-sigma bands turn (upper - middle) into the rolling standard deviation.
                bands: Bollinger::new(config.period, Decimal::ONE),
                latched: None,
            });

        let Some(bands) = state.bands.update(close) else {
            return Vec::new();
        };
        let sigma = bands.upper - bands.middle;
        if sigma.is_zero() {
            return Vec::new();
        }

        let z = ((close - bands.middle) / sigma).to_f64().unwrap_or(0.0);

        if z.abs() <= config.exit_z {
            state.latched = None;
            return Vec::new();
        }

        let kind = if z <= -config.entry_z {
            SignalKind::Buy
        } else if z >= config.entry_z {
            SignalKind::Sell
        } else {
            return Vec::new();
        };

        if state.latched == Some(kind) {
            return Vec::new();
        }
        state.latched = Some(kind);

        let strength = (0.6 + (z.abs() - config.entry_z) * 0.1).min(0.9);
        info!(symbol = %market.symbol, z, ?kind, "mean reversion excursion");
        vec![Signal::new(market.time, market.symbol.clone(), kind, strength)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ashare_data::bar::Bar;
    use chrono::{Days, NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn event(close: Decimal, day: u64) -> MarketEvent {
        let symbol = Symbol::new("000001.SZ").unwrap();
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
    fn deep_dip_buys_once_until_reset() {
        let mut strategy = MeanReversion::new(Config {
            period: 5,
            entry_z: 1.5,
            exit_z: 0.5,
        });

        let mut signals = Vec::new();
        // Stable closes then a collapse well below the rolling mean, twice in a row.
        for (day, close) in [
            dec!(10),
            dec!(10.1),
            dec!(9.9),
            dec!(10),
            dec!(10.1),
            dec!(8.0),
            dec!(7.9),
        ]
        .into_iter()
        .enumerate()
        {
            signals.extend(strategy.on_market(&event(close, day as u64)));
        }

        let buys: Vec<_> = signals
            .iter()
            .filter(|signal| signal.kind == SignalKind::Buy)
            .collect();
        assert_eq!(buys.len(), 1, "latch must suppress the second excursion");
    }
}
