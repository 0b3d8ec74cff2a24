use crate::strategy::{Signal, SignalKind, Strategy};
use ashare_data::event::MarketEvent;
use ashare_instrument::symbol::Symbol;
use ashare_ta::indicators::Bollinger;
use fnv::FnvHashMap;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Trading interpretation of a band touch.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Buy the lower band, sell the upper band.
    Reversion,
    /// Buy an upward break through the upper band, sell a downward break through the lower.
    Breakout,
}

/// Configuration for constructing a [`BollingerBreakout`] via the new() constructor method.
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub period: usize,
    pub std_dev: Decimal,
    pub mode: Mode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev: Decimal::TWO,
            mode: Mode::Reversion,
        }
    }
}

#[derive(Debug)]
struct SymbolState {
    bands: Bollinger,
    previous_close: Option<Decimal>,
    latched: Option<SignalKind>,
}

/// Bollinger band strategy supporting both reversion and breakout interpretations.
#[derive(Debug)]
pub struct BollingerBreakout {
    config: Config,
    states: FnvHashMap<Symbol, SymbolState>,
}

impl BollingerBreakout {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            states: FnvHashMap::default(),
        }
    }
}

impl Strategy for BollingerBreakout {
    fn name(&self) -> &'static str {
        "bollinger_breakout"
    }

    fn on_market(&mut self, market: &MarketEvent) -> Vec<Signal> {
        let close = market.close();
        let config = self.config;
        let state = self
            .states
            .entry(market.symbol.clone())
            .or_insert_with(|| SymbolState {
                bands: Bollinger::new(config.period, config.std_dev),
                previous_close: None,
                latched: None,
            });

        let previous_close = state.previous_close.replace(close);
        let Some(bands) = state.bands.update(close) else {
            return Vec::new();
        };

        let decision = match config.mode {
            Mode::Reversion => {
                if close <= bands.lower {
                    let stretch = ((bands.lower - close) / bands.lower)
                        .to_f64()
                        .unwrap_or(0.0);
                    Some((SignalKind::Buy, (0.6 + stretch * 5.0).min(0.9)))
                } else if close >= bands.upper {
                    let stretch = ((close - bands.upper) / bands.upper)
                        .to_f64()
                        .unwrap_or(0.0);
                    Some((SignalKind::Sell, (0.6 + stretch * 5.0).min(0.9)))
                } else {
                    state.latched = None;
                    None
                }
            }
            Mode::Breakout => {
                let previous = previous_close.unwrap_or(close);
                if previous <= bands.upper && close > bands.upper {
                    Some((SignalKind::Buy, 0.75))
                } else if previous >= bands.lower && close < bands.lower {
                    Some((SignalKind::Sell, 0.75))
                } else {
                    if close < bands.upper && close > bands.lower {
                        state.latched = None;
                    }
                    None
                }
            }
        };

        let Some((kind, strength)) = decision else {
            return Vec::new();
        };
        if state.latched == Some(kind) {
            return Vec::new();
        }
        state.latched = Some(kind);

        info!(
            symbol = %market.symbol,
            %close,
            upper = %bands.upper,
            lower = %bands.lower,
            ?kind,
            "bollinger signal"
        );
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

    fn run(mode: Mode, closes: &[Decimal]) -> Vec<SignalKind> {
        let mut strategy = BollingerBreakout::new(Config {
            period: 4,
            std_dev: Decimal::ONE,
            mode,
        });
        let mut kinds = Vec::new();
        for (day, close) in closes.iter().enumerate() {
            for signal in strategy.on_market(&event(*close, day as u64)) {
                kinds.push(signal.kind);
            }
        }
        kinds
    }

    #[test]
    fn reversion_buys_the_lower_band() {
        let kinds = run(
            Mode::Reversion,
            &[dec!(10), dec!(10.1), dec!(9.9), dec!(10), dec!(8.5)],
        );
        assert_eq!(kinds, vec![SignalKind::Buy]);
    }

    #[test]
    fn breakout_buys_an_upward_break() {
        let kinds = run(
            Mode::Breakout,
            &[dec!(10), dec!(10.1), dec!(9.9), dec!(10), dec!(12)],
        );
        assert_eq!(kinds, vec![SignalKind::Buy]);
    }
}
