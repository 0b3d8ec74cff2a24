use crate::{
    event::MarketEvent,
    quote::Quote,
    source::{RequestPacer, SourceChain},
};
use ashare_instrument::symbol::Symbol;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Configuration for the polling [`RealtimeFeed`].
#[derive(Copy, Clone, Debug)]
pub struct FeedConfig {
    /// Base poll cadence.
    pub poll_interval: Duration,
    /// Minimum spacing between polls of the same symbol.
    pub per_symbol_min: Duration,
    /// Minimum spacing between any two upstream requests.
    pub global_min: Duration,
    /// Retries per poll round before giving up until the next round.
    pub max_retries: u32,
    /// Base delay of the exponential retry backoff.
    pub retry_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            per_symbol_min: Duration::from_secs(5),
            global_min: Duration::from_secs(2),
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Polling realtime quote feed.
///
/// Polls the provider chain for subscribed symbols, caches the latest quote per symbol
/// (last writer wins) and pushes a [`MarketEvent`] per fresh quote into the channel handed
/// out at construction. Interacts with the engine only through that channel.
#[derive(Debug)]
pub struct RealtimeFeed {
    chain: Arc<SourceChain>,
    config: FeedConfig,
    subscribed: Mutex<HashSet<Symbol>>,
    last_poll: Mutex<FnvHashMap<Symbol, Instant>>,
    latest: Mutex<FnvHashMap<Symbol, Quote>>,
    /// Global spacing between any two upstream requests.
    pacer: RequestPacer,
    event_tx: mpsc::UnboundedSender<MarketEvent>,
    running: AtomicBool,
}

impl RealtimeFeed {
    /// Construct the feed and the receiving half of its event channel.
    pub fn new(
        chain: Arc<SourceChain>,
        config: FeedConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<MarketEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let feed = Arc::new(Self {
            chain,
            subscribed: Mutex::new(HashSet::new()),
            last_poll: Mutex::new(FnvHashMap::default()),
            latest: Mutex::new(FnvHashMap::default()),
            pacer: RequestPacer::with_interval(config.global_min),
            event_tx,
            running: AtomicBool::new(false),
            config,
        });
        (feed, event_rx)
    }

    pub fn subscribe(&self, symbols: &[Symbol]) {
        let mut subscribed = self.subscribed.lock();
        let added: Vec<_> = symbols
            .iter()
            .filter(|symbol| subscribed.insert((*symbol).clone()))
            .collect();
        if !added.is_empty() {
            info!(count = added.len(), "subscribed symbols");
        }
    }

    pub fn unsubscribe(&self, symbols: &[Symbol]) {
        let mut subscribed = self.subscribed.lock();
        let mut latest = self.latest.lock();
        for symbol in symbols {
            subscribed.remove(symbol);
            latest.remove(symbol);
        }
    }

    /// Latest cached quote for a symbol, if any poll has succeeded for it.
    pub fn latest(&self, symbol: &Symbol) -> Option<Quote> {
        self.latest.lock().get(symbol).cloned()
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Drive the poll loop until [`Self::stop`] is called. Run as a background task; the loop
    /// never mutates engine state directly.
    pub async fn run(self: Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        info!("realtime feed started");

        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(self.config.poll_interval).await;

            let due = self.symbols_due();
            if due.is_empty() {
                continue;
            }

            // Global limiter across all upstream calls.
            self.pacer.pace().await;

            match self.poll_with_retries(&due).await {
                Some(quotes) => self.publish(quotes),
                None => error!(
                    symbols = due.len(),
                    "poll round failed after {} retries", self.config.max_retries
                ),
            }
        }

        info!("realtime feed stopped");
    }

    fn symbols_due(&self) -> Vec<Symbol> {
        let subscribed = self.subscribed.lock();
        let mut last_poll = self.last_poll.lock();
        let now = Instant::now();

        let due: Vec<Symbol> = subscribed
            .iter()
            .filter(|symbol| {
                last_poll
                    .get(*symbol)
                    .is_none_or(|at| now.duration_since(*at) >= self.config.per_symbol_min)
            })
            .cloned()
            .collect();

        for symbol in &due {
            last_poll.insert(symbol.clone(), now);
        }
        due
    }

    async fn poll_with_retries(&self, symbols: &[Symbol]) -> Option<Vec<Quote>> {
        let mut attempt = 0;
        loop {
            match self.chain.realtime_quotes(symbols).await {
                Ok(quotes) => return Some(quotes),
                Err(error) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.config.retry_delay * 2_u32.saturating_pow(attempt - 1);
                    let jitter =
                        Duration::from_millis(rand::rng().random_range(0..=backoff.as_millis().min(1_000) as u64));
                    warn!(%error, attempt, ?backoff, "quote poll failed, retrying");
                    tokio::time::sleep(backoff + jitter).await;
                }
                Err(_) => return None,
            }
        }
    }

    fn publish(&self, quotes: Vec<Quote>) {
        let mut latest = self.latest.lock();
        for quote in quotes {
            latest.insert(quote.symbol.clone(), quote.clone());
            if self.event_tx.send(MarketEvent::from_quote(quote)).is_err() {
                debug!("feed receiver dropped, stopping publication");
                self.running.store(false, Ordering::SeqCst);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FixtureSource;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn quote(symbol: &Symbol, price: rust_decimal::Decimal) -> Quote {
        Quote {
            symbol: symbol.clone(),
            price,
            bid: None,
            ask: None,
            volume: 1_000,
            amount: None,
            high: price,
            low: price,
            open: price,
            prev_close: price,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn feed_publishes_quotes_and_caches_latest() {
        let symbol = Symbol::new("600036.SH").unwrap();
        let source = Arc::new(FixtureSource::new());
        source.set_quote(quote(&symbol, dec!(40.00)));
        let chain = Arc::new(SourceChain::new(vec![
            Arc::clone(&source) as Arc<dyn crate::source::DataSource>
        ]));

        let (feed, mut event_rx) = RealtimeFeed::new(
            chain,
            FeedConfig {
                poll_interval: Duration::from_millis(10),
                per_symbol_min: Duration::from_millis(10),
                global_min: Duration::ZERO,
                ..FeedConfig::default()
            },
        );
        feed.subscribe(std::slice::from_ref(&symbol));

        let handle = tokio::spawn(Arc::clone(&feed).run());

        let event = tokio::time::timeout(Duration::from_secs(5), event_rx.recv())
            .await
            .expect("timed out waiting for quote event")
            .expect("feed channel closed");
        assert_eq!(event.symbol, symbol);
        assert_eq!(event.close(), dec!(40.00));
        assert_eq!(feed.latest(&symbol).unwrap().price, dec!(40.00));

        feed.stop();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn unsubscribe_clears_latest_cache() {
        let symbol = Symbol::new("000001.SZ").unwrap();
        let chain = Arc::new(SourceChain::new(vec![
            Arc::new(FixtureSource::new()) as Arc<dyn crate::source::DataSource>
        ]));
        let (feed, _event_rx) = RealtimeFeed::new(chain, FeedConfig::default());

        feed.subscribe(std::slice::from_ref(&symbol));
        feed.latest
            .lock()
            .insert(symbol.clone(), quote(&symbol, dec!(10)));

        feed.unsubscribe(std::slice::from_ref(&symbol));
        assert!(feed.latest(&symbol).is_none());
    }
}
