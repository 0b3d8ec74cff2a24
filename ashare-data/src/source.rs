use crate::{bar::Bar, error::DataError, quote::Quote};
use ashare_instrument::symbol::Symbol;
use async_trait::async_trait;
use chrono::NaiveDate;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Basic company information for a listed instrument.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct CompanyInfo {
    pub symbol: Symbol,
    pub name: String,
    pub industry: Option<String>,
    pub listed_date: Option<NaiveDate>,
}

/// Capability provided by every market data provider: historical frames, realtime quotes and
/// company information. Concrete crawlers (Sina, EastMoney, Tencent, ...) live outside the
/// core and plug in through this trait.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Provider name used in logs and failure reports.
    fn name(&self) -> &str;

    async fn historical_bars(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError>;

    async fn realtime_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, DataError>;

    async fn company_info(&self, symbol: &Symbol) -> Result<CompanyInfo, DataError>;
}

/// Minimum spacing between requests to one provider, derived from a per-minute budget.
///
/// Callers `pace().await` before every outbound request; the pacer sleeps just long enough to
/// respect the budget. Shared across tasks via internal locking.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    /// Pacer allowing `requests_per_minute` requests per minute. Zero disables pacing.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let min_interval = if requests_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(60.0 / f64::from(requests_per_minute))
        };
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Pacer enforcing a fixed minimum interval.
    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the next request is allowed, then reserve the slot.
    pub async fn pace(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let wait = {
            let mut last = self.last_request.lock();
            let now = Instant::now();
            match *last {
                Some(previous) => {
                    let next_allowed = previous + self.min_interval;
                    if next_allowed > now {
                        *last = Some(next_allowed);
                        next_allowed - now
                    } else {
                        *last = Some(now);
                        Duration::ZERO
                    }
                }
                None => {
                    *last = Some(now);
                    Duration::ZERO
                }
            }
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

/// Ordered provider fallback chain: tries each [`DataSource`] in turn, logging individual
/// failures, and surfaces [`DataError::AllSourcesFailed`] only when every provider has failed.
/// Never fabricates data.
pub struct SourceChain {
    sources: Vec<Arc<dyn DataSource>>,
}

impl std::fmt::Debug for SourceChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceChain")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name().to_owned()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl SourceChain {
    pub fn new(sources: Vec<Arc<dyn DataSource>>) -> Self {
        Self { sources }
    }

    pub async fn historical_bars(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        for source in &self.sources {
            match source.historical_bars(symbol, start, end).await {
                Ok(bars) if !bars.is_empty() => return Ok(bars),
                Ok(_) => warn!(
                    source = source.name(),
                    %symbol,
                    "source returned no bars, falling through"
                ),
                Err(error) => warn!(
                    source = source.name(),
                    %symbol,
                    %error,
                    "source failed, falling through"
                ),
            }
        }
        Err(DataError::AllSourcesFailed {
            symbol: symbol.clone(),
        })
    }

    pub async fn realtime_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, DataError> {
        let Some(first) = symbols.first() else {
            return Ok(Vec::new());
        };

        for source in &self.sources {
            match source.realtime_quotes(symbols).await {
                Ok(quotes) if !quotes.is_empty() => return Ok(quotes),
                Ok(_) => warn!(source = source.name(), "source returned no quotes"),
                Err(error) => warn!(source = source.name(), %error, "source failed"),
            }
        }
        Err(DataError::AllSourcesFailed {
            symbol: first.clone(),
        })
    }

    pub async fn company_info(&self, symbol: &Symbol) -> Result<CompanyInfo, DataError> {
        for source in &self.sources {
            match source.company_info(symbol).await {
                Ok(info) => return Ok(info),
                Err(error) => warn!(
                    source = source.name(),
                    %symbol,
                    %error,
                    "source failed, falling through"
                ),
            }
        }
        Err(DataError::AllSourcesFailed {
            symbol: symbol.clone(),
        })
    }
}

/// In-memory [`DataSource`] backed by preloaded frames. Used by backtests and tests in place
/// of a live crawler.
#[derive(Debug, Default)]
pub struct FixtureSource {
    bars: FnvHashMap<Symbol, Vec<Bar>>,
    quotes: Mutex<FnvHashMap<Symbol, Quote>>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, symbol: Symbol, bars: Vec<Bar>) -> Self {
        self.bars.insert(symbol, bars);
        self
    }

    pub fn set_quote(&self, quote: Quote) {
        self.quotes.lock().insert(quote.symbol.clone(), quote);
    }
}

#[async_trait]
impl DataSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn historical_bars(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, DataError> {
        let bars = self
            .bars
            .get(symbol)
            .ok_or_else(|| DataError::NotFound {
                symbol: symbol.clone(),
            })?
            .iter()
            .filter(|bar| bar.trade_date >= start && bar.trade_date <= end)
            .cloned()
            .collect();
        Ok(bars)
    }

    async fn realtime_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, DataError> {
        let quotes = self.quotes.lock();
        Ok(symbols
            .iter()
            .filter_map(|symbol| quotes.get(symbol).cloned())
            .collect())
    }

    async fn company_info(&self, symbol: &Symbol) -> Result<CompanyInfo, DataError> {
        Err(DataError::NotFound {
            symbol: symbol.clone(),
        })
    }
}
