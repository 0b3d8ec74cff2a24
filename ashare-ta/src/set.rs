use crate::indicators::{Atr, Bollinger, BollingerBands, Kdj, KdjOutput, Macd, MacdOutput, Rsi, Sma};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default Bollinger sigma multiplier.
const BOLL_MULTIPLIER: Decimal = Decimal::from_parts(2, 0, 0, false, 0);

/// The standard per-symbol indicator record: MA{5,10,20,60}, MACD(12,26,9), RSI{6,12,24},
/// BOLL(20,2), KDJ(9), ATR(14).
///
/// A pure function of a closing-bar sequence - recomputed, never mutated. Fields stay `None`
/// until their window is covered by the input, so downstream signal logic cannot read a
/// half-warmed value.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct IndicatorSet {
    pub calc_date: NaiveDate,
    pub ma5: Option<Decimal>,
    pub ma10: Option<Decimal>,
    pub ma20: Option<Decimal>,
    pub ma60: Option<Decimal>,
    pub macd: Option<MacdOutput>,
    pub rsi6: Option<Decimal>,
    pub rsi12: Option<Decimal>,
    pub rsi24: Option<Decimal>,
    pub boll: Option<BollingerBands>,
    pub kdj: Option<KdjOutput>,
    pub atr14: Option<Decimal>,
    /// ATR divided by the latest close.
    pub atr_normalized: Option<Decimal>,
}

impl IndicatorSet {
    /// Compute the record for `calc_date` from aligned high/low/close history ending on that
    /// date. Slices must be equal length; the last element is the `calc_date` bar.
    pub fn compute(
        calc_date: NaiveDate,
        highs: &[Decimal],
        lows: &[Decimal],
        closes: &[Decimal],
    ) -> Option<Self> {
        if closes.is_empty() || highs.len() != closes.len() || lows.len() != closes.len() {
            return None;
        }

        let mut ma5 = Sma::new(5);
        let mut ma10 = Sma::new(10);
        let mut ma20 = Sma::new(20);
        let mut ma60 = Sma::new(60);
        let mut macd = Macd::new(12, 26, 9);
        let mut rsi6 = Rsi::new(6);
        let mut rsi12 = Rsi::new(12);
        let mut rsi24 = Rsi::new(24);
        let mut boll = Bollinger::new(20, BOLL_MULTIPLIER);
        let mut kdj = Kdj::new(9);
        let mut atr = Atr::new(14);

        let mut latest_macd = None;
        for ((high, low), close) in highs.iter().zip(lows).zip(closes) {
            ma5.update(*close);
            ma10.update(*close);
            ma20.update(*close);
            ma60.update(*close);
            latest_macd = macd.update(*close);
            rsi6.update(*close);
            rsi12.update(*close);
            rsi24.update(*close);
            boll.update(*close);
            kdj.update(*high, *low, *close);
            atr.update(*high, *low, *close);
        }

        let last_close = *closes.last()?;
        let atr14 = atr.value();
        let atr_normalized = match atr14 {
            Some(atr) if !last_close.is_zero() => Some(atr / last_close),
            _ => None,
        };

        Some(Self {
            calc_date,
            ma5: ma5.value(),
            ma10: ma10.value(),
            ma20: ma20.value(),
            ma60: ma60.value(),
            macd: latest_macd,
            rsi6: rsi6.value(),
            rsi12: rsi12.value(),
            rsi24: rsi24.value(),
            boll: boll.value(),
            kdj: kdj.value(),
            atr14,
            atr_normalized,
        })
    }
}
