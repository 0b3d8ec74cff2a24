use crate::{bar::Bar, quote::Quote};
use ashare_instrument::symbol::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Normalised market event consumed by the engine. The backtest feed produces
/// [`MarketDataKind::Bar`] events from historical series; the realtime feed produces
/// [`MarketDataKind::Quote`] events.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct MarketEvent {
    pub time: DateTime<Utc>,
    pub symbol: Symbol,
    pub kind: MarketDataKind,
}

/// Payload of a [`MarketEvent`].
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub enum MarketDataKind {
    Bar(Bar),
    Quote(Quote),
}

impl MarketEvent {
    pub fn from_bar(time: DateTime<Utc>, bar: Bar) -> Self {
        Self {
            time,
            symbol: bar.symbol.clone(),
            kind: MarketDataKind::Bar(bar),
        }
    }

    pub fn from_quote(quote: Quote) -> Self {
        Self {
            time: quote.timestamp,
            symbol: quote.symbol.clone(),
            kind: MarketDataKind::Quote(quote),
        }
    }

    /// Latest traded price carried by the event: bar close or quote price.
    pub fn close(&self) -> Decimal {
        match &self.kind {
            MarketDataKind::Bar(bar) => bar.close,
            MarketDataKind::Quote(quote) => quote.price,
        }
    }

    /// Session high, when the payload carries one.
    pub fn high(&self) -> Decimal {
        match &self.kind {
            MarketDataKind::Bar(bar) => bar.high,
            MarketDataKind::Quote(quote) => quote.high,
        }
    }

    /// Session low, when the payload carries one.
    pub fn low(&self) -> Decimal {
        match &self.kind {
            MarketDataKind::Bar(bar) => bar.low,
            MarketDataKind::Quote(quote) => quote.low,
        }
    }
}
