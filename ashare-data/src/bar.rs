use crate::error::DataError;
use ashare_instrument::symbol::Symbol;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Bar sampling frequency. Daily unless stated otherwise.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum Frequency {
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1w")]
    Weekly,
    #[serde(rename = "1M")]
    Monthly,
}

impl Display for Frequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Frequency::Daily => "1d",
            Frequency::Weekly => "1w",
            Frequency::Monthly => "1M",
        };
        write!(f, "{label}")
    }
}

/// Price adjustment applied to a historical series.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize)]
pub enum AdjustType {
    #[serde(rename = "none")]
    None,
    /// qfq - adjusted forward from the latest price.
    #[serde(rename = "forward")]
    Forward,
    /// hfq - adjusted backward from the listing price.
    #[serde(rename = "backward")]
    Backward,
}

/// One OHLCV record.
///
/// Invariants, enforced at construction:
/// * `low <= open, close <= high`
/// * `volume >= 0`
/// * `pre_close`, when present, is positive (it anchors the daily limit band)
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct Bar {
    pub symbol: Symbol,
    pub trade_date: NaiveDate,
    pub frequency: Frequency,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub amount: Option<Decimal>,
    pub pre_close: Option<Decimal>,
    pub adjust: AdjustType,
}

impl Bar {
    /// Construct a validated daily bar.
    #[allow(clippy::too_many_arguments)]
    pub fn daily(
        symbol: Symbol,
        trade_date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
        pre_close: Option<Decimal>,
    ) -> Result<Self, DataError> {
        let bar = Self {
            symbol,
            trade_date,
            frequency: Frequency::Daily,
            open,
            high,
            low,
            close,
            volume,
            amount: None,
            pre_close,
            adjust: AdjustType::None,
        };
        bar.validate()?;
        Ok(bar)
    }

    fn validate(&self) -> Result<(), DataError> {
        if self.low > self.open
            || self.low > self.close
            || self.high < self.open
            || self.high < self.close
            || self.low > self.high
        {
            return Err(DataError::Validation(format!(
                "{} {}: OHLC bounds violated (o={} h={} l={} c={})",
                self.symbol, self.trade_date, self.open, self.high, self.low, self.close
            )));
        }
        if self.volume < 0 {
            return Err(DataError::Validation(format!(
                "{} {}: negative volume {}",
                self.symbol, self.trade_date, self.volume
            )));
        }
        if let Some(pre_close) = self.pre_close {
            if pre_close <= Decimal::ZERO {
                return Err(DataError::Validation(format!(
                    "{} {}: non-positive pre_close {pre_close}",
                    self.symbol, self.trade_date
                )));
            }
        }
        Ok(())
    }

    /// A zero-volume bar means the instrument did not trade (suspension or data hole).
    pub fn is_suspended(&self) -> bool {
        self.volume == 0
    }
}

/// Date-sorted bar history for one `(symbol, frequency, adjust)` series.
///
/// `(trade_date)` is unique within a series; inserting a duplicate date replaces the previous
/// record (last writer wins, matching upstream refreshes).
#[derive(Clone, Debug, Default)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut series = Self::new();
        for bar in bars {
            series.insert(bar);
        }
        series
    }

    pub fn insert(&mut self, bar: Bar) {
        match self
            .bars
            .binary_search_by_key(&bar.trade_date, |existing| existing.trade_date)
        {
            Ok(index) => self.bars[index] = bar,
            Err(index) => self.bars.insert(index, bar),
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Bar> {
        self.bars
            .binary_search_by_key(&date, |bar| bar.trade_date)
            .ok()
            .map(|index| &self.bars[index])
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
