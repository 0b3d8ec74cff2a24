use ashare::engine::backtest::BacktestEngine;
use ashare::event::{Event, EventTx};
use ashare::strategy::{Signal, SignalKind, Strategy};
use ashare_data::bar::{Bar, BarSeries};
use ashare_data::event::MarketEvent;
use ashare_instrument::{symbol::Symbol, Side};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

/// Emits one full-strength BUY on the `buy_on`-th market event and one full-strength SELL on
/// the `sell_on`-th.
struct Scripted {
    buy_on: usize,
    sell_on: usize,
    seen: usize,
}

impl Scripted {
    fn new(buy_on: usize, sell_on: usize) -> Self {
        Self {
            buy_on,
            sell_on,
            seen: 0,
        }
    }
}

impl Strategy for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn on_market(&mut self, market: &MarketEvent) -> Vec<Signal> {
        self.seen += 1;
        let kind = if self.seen == self.buy_on {
            SignalKind::Buy
        } else if self.seen == self.sell_on {
            SignalKind::Sell
        } else {
            return Vec::new();
        };
        vec![Signal::new(market.time, market.symbol.clone(), kind, 1.0)]
    }
}

fn flat_series(symbol: &Symbol, closes: &[(u32, Decimal)]) -> BarSeries {
    BarSeries::from_bars(closes.iter().map(|(day, close)| {
        Bar::daily(
            symbol.clone(),
            NaiveDate::from_ymd_opt(2024, 1, *day).unwrap(),
            *close,
            *close,
            *close,
            *close,
            10_000_000,
            Some(*close),
        )
        .unwrap()
    }))
}

/// Full round trip through the shared loop: signal -> sizing -> risk -> simulator -> fill ->
/// ledger, with exact fee accounting.
#[tokio::test]
async fn backtest_round_trip_accounts_for_every_fee() {
    let symbol = Symbol::new("600036.SH").unwrap();
    // 2024-01-01 is a Monday; five consecutive trading days.
    let series = flat_series(
        &symbol,
        &[
            (1, dec!(40.00)),
            (2, dec!(40.00)),
            (3, dec!(40.00)),
            (4, dec!(40.00)),
            (5, dec!(40.00)),
        ],
    );

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let engine = BacktestEngine::builder()
        .start(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        .end(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        .initial_capital(dec!(1000000))
        .strategy(Box::new(Scripted::new(1, 3)))
        .bars(symbol.clone(), series)
        .event_tx(EventTx::new(event_tx))
        .build()
        .unwrap();

    let report = engine.run().await.unwrap();

    // Buy leg: 1_000_000 * 10% / 40 = 2_500 shares at 40.00.
    //   commission 30.00 + transfer fee 2.00 (impact is in the price) = 32.00
    // Sell leg adds the 0.1% stamp tax: 30.00 + 100.00 + 2.00 = 132.00
    assert_eq!(report.trades.len(), 2);
    assert_eq!(report.trades[0].side, Side::Buy);
    assert_eq!(report.trades[0].quantity, 2_500);
    assert_eq!(report.trades[0].price, dec!(40.00));
    assert_eq!(report.trades[0].commission, dec!(32.00));
    assert_eq!(report.trades[1].side, Side::Sell);
    assert_eq!(report.trades[1].commission, dec!(132.00));

    assert_eq!(report.final_cash, dec!(999836.00));
    assert!(report.final_positions.is_empty());

    // One equity sample per market event, monotonic in time.
    assert_eq!(report.equity_curve.len(), 5);
    assert!(report
        .equity_curve
        .windows(2)
        .all(|pair| pair[0].time <= pair[1].time));

    assert_eq!(report.summary.total_trades, 2);
    assert!(report.summary.total_return < 0.0, "fees cost the round trip");

    // Bus invariants, observed through the external sink: the Fill for an order arrives
    // strictly after that order's event, and market events never go back in time.
    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }
    let mut last_market_time = None;
    for (index, event) in events.iter().enumerate() {
        match event {
            Event::Market(market) => {
                if let Some(previous) = last_market_time {
                    assert!(market.time >= previous);
                }
                last_market_time = Some(market.time);
            }
            Event::Fill(fill) => {
                let order_position = events[..index].iter().position(|earlier| {
                    matches!(earlier, Event::Order(order) if order.id == fill.order_id)
                });
                assert!(
                    order_position.is_some(),
                    "fill published before its order event"
                );
            }
            _ => {}
        }
    }
}

/// A bar pinned at the +20% limit must not fill market buys (there is no seller at the
/// limit), leaving the book untouched.
#[tokio::test]
async fn limit_up_bar_blocks_the_buy_end_to_end() {
    let symbol = Symbol::new("688001.SH").unwrap();
    let bar = Bar::daily(
        symbol.clone(),
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        dec!(100.00),
        dec!(120.00),
        dec!(100.00),
        dec!(120.00), // close at exactly pre_close * 1.2
        10_000_000,
        Some(dec!(100.00)),
    )
    .unwrap();

    let engine = BacktestEngine::builder()
        .start(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        .end(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        .initial_capital(dec!(1000000))
        .strategy(Box::new(Scripted::new(1, 99)))
        .bars(symbol.clone(), BarSeries::from_bars([bar]))
        .build()
        .unwrap();

    let report = engine.run().await.unwrap();

    assert!(report.trades.is_empty());
    assert!(report.final_positions.is_empty());
    assert_eq!(report.final_cash, dec!(1000000));
}

/// Shares bought on day D settle at D+1: a sell sized the next session may liquidate the
/// whole position.
#[tokio::test]
async fn t_plus_one_settles_before_the_next_session_sell() {
    let symbol = Symbol::new("000001.SZ").unwrap();
    let series = flat_series(&symbol, &[(1, dec!(10.00)), (2, dec!(10.50))]);

    let engine = BacktestEngine::builder()
        .start(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        .end(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        .initial_capital(dec!(1000000))
        .strategy(Box::new(Scripted::new(1, 2)))
        .bars(symbol.clone(), series)
        .build()
        .unwrap();

    let report = engine.run().await.unwrap();

    assert_eq!(report.trades.len(), 2);
    assert_eq!(report.trades[0].side, Side::Buy);
    assert_eq!(report.trades[1].side, Side::Sell);
    // The day-2 sell liquidates everything bought on day 1.
    assert_eq!(report.trades[1].quantity, report.trades[0].quantity);
    assert!(report.final_positions.is_empty());
}
