//! In-process pub/sub bus
//!
//! Two logical channels per symbol: `book.<symbol>` carries level
//! deltas, `trades.<symbol>` carries public trades. Payloads travel as
//! JSON strings so any subscriber can decode them without linking the
//! engine's types. Slow subscribers lag and miss messages rather than
//! block the publisher; reconnect via a fresh depth snapshot.

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use types::ids::Symbol;
use types::numeric::Price;
use types::order::Side;

pub fn book_topic(symbol: &str) -> String {
    format!("book.{}", symbol)
}

pub fn trades_topic(symbol: &str) -> String {
    format!("trades.{}", symbol)
}

/// An incremental change to one price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookUpdate {
    pub symbol: Symbol,
    pub symbol_seq: u64,
    pub side: Side,
    pub price: Price,
    /// Signed change to the level's total quantity.
    pub quantity_delta: Decimal,
    /// Unix nanoseconds of the causing event.
    pub timestamp: i64,
}

/// Broadcast-based topic bus.
pub struct MarketBus {
    channels: DashMap<String, broadcast::Sender<String>>,
    capacity: usize,
}

impl MarketBus {
    /// `capacity` bounds each topic's in-flight backlog per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to a topic, creating the channel on first use.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<String> {
        self.sender(topic).subscribe()
    }

    /// Publish a JSON-serializable payload. Returns the number of
    /// subscribers that received it (zero is not an error).
    pub fn publish<T: Serialize>(&self, topic: &str, payload: &T) -> Result<usize, serde_json::Error> {
        let json = serde_json::to_string(payload)?;
        let delivered = self.sender(topic).send(json).unwrap_or(0);
        debug!(topic, delivered, "published");
        Ok(delivered)
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for MarketBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names() {
        assert_eq!(book_topic("BTC/USDT"), "book.BTC/USDT");
        assert_eq!(trades_topic("BTC/USDT"), "trades.BTC/USDT");
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = MarketBus::default();
        let delivered = bus.publish("book.BTC/USDT", &"payload").unwrap();
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_subscriber_receives_published_payload() {
        let bus = MarketBus::default();
        let mut rx = bus.subscribe("trades.BTC/USDT");

        let update = BookUpdate {
            symbol: Symbol::new("BTC/USDT"),
            symbol_seq: 1,
            side: Side::Buy,
            price: Price::from_u64(100),
            quantity_delta: Decimal::from(5),
            timestamp: 1_708_123_456_789_000_000,
        };
        let delivered = bus.publish("trades.BTC/USDT", &update).unwrap();
        assert_eq!(delivered, 1);

        let json = rx.try_recv().unwrap();
        let decoded: BookUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus = MarketBus::default();
        let mut book_rx = bus.subscribe("book.BTC/USDT");
        let mut trades_rx = bus.subscribe("trades.BTC/USDT");

        bus.publish("book.BTC/USDT", &"book-only").unwrap();

        assert!(book_rx.try_recv().is_ok());
        assert!(trades_rx.try_recv().is_err());
    }
}
