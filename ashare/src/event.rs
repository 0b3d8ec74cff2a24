use crate::strategy::Signal;
use ashare_data::event::MarketEvent;
use ashare_execution::{fill::Fill, order::Order};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Events that occur while trading. [`MarketEvent`], [`Signal`], [`Order`] and [`Fill`] drive
/// the engine loop and dictate the trading sequence; the same events are mirrored to an
/// external sink for event-sourcing, dashboards and monitoring.
///
/// Order snapshots on the bus are immutable copies - the live order is owned by the
/// `OrderManager` (live) or the engine (backtest).
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub enum Event {
    Market(MarketEvent),
    Signal(Signal),
    Order(Order),
    Fill(Fill),
}

/// Message transmitter for sending engine messages to downstream consumers.
pub trait MessageTransmitter<Message> {
    /// Attempts to send a message to an external message subscriber.
    fn send(&mut self, message: Message);

    /// Attempts to send many messages to an external message subscriber.
    fn send_many(&mut self, messages: Vec<Message>);
}

/// Transmitter for sending [`Event`]s to an external sink.
#[derive(Debug, Clone)]
pub struct EventTx {
    /// Flag to communicate if the external [`Event`] receiver has been dropped.
    receiver_dropped: bool,
    event_tx: mpsc::UnboundedSender<Event>,
}

impl MessageTransmitter<Event> for EventTx {
    fn send(&mut self, message: Event) {
        if self.receiver_dropped {
            return;
        }

        if self.event_tx.send(message).is_err() {
            warn!(
                action = "setting receiver_dropped = true",
                why = "event receiver dropped",
                "cannot send Events"
            );
            self.receiver_dropped = true;
        }
    }

    fn send_many(&mut self, messages: Vec<Event>) {
        if self.receiver_dropped {
            return;
        }

        messages.into_iter().for_each(|message| {
            let _ = self.event_tx.send(message);
        })
    }
}

impl EventTx {
    /// Constructs a new [`EventTx`] instance using the provided channel transmitter.
    pub fn new(event_tx: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            receiver_dropped: false,
            event_tx,
        }
    }
}
