//! Durability sink contract
//!
//! The registry hands every command's ordered event list to a sink and
//! acknowledges the command only after the sink accepts it. Sinks must
//! be idempotent keyed on `(symbol, symbol_seq)` so the engine can
//! replay on restart from the last acknowledged sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use types::ids::{OrderId, Symbol};

use crate::events::EngineEvent;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Receives each command's event list before the command is acknowledged.
pub trait EventSink: Send + Sync {
    /// Persist/publish `events` for `symbol`. `seq_range` is the
    /// inclusive `symbol_seq` span; `command_id` identifies the
    /// commanding order. Events at or below an already committed
    /// sequence must be ignored, not duplicated.
    fn commit(
        &self,
        symbol: &Symbol,
        command_id: OrderId,
        seq_range: (u64, u64),
        events: &[EngineEvent],
    ) -> Result<(), SinkError>;
}

/// In-memory sink for tests and embedded use.
#[derive(Default)]
pub struct MemorySink {
    committed: Mutex<HashMap<String, Vec<EngineEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything committed for a symbol, in sequence order.
    pub fn events_for(&self, symbol: &str) -> Vec<EngineEvent> {
        let committed = self
            .committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        committed.get(symbol).cloned().unwrap_or_default()
    }

    /// Highest committed sequence for a symbol, 0 when none.
    pub fn last_committed(&self, symbol: &str) -> u64 {
        self.events_for(symbol)
            .last()
            .map(|event| event.symbol_seq)
            .unwrap_or(0)
    }
}

impl EventSink for MemorySink {
    fn commit(
        &self,
        symbol: &Symbol,
        _command_id: OrderId,
        _seq_range: (u64, u64),
        events: &[EngineEvent],
    ) -> Result<(), SinkError> {
        let mut committed = self
            .committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let stream = committed.entry(symbol.as_str().to_string()).or_default();
        let watermark = stream.last().map(|event| event.symbol_seq).unwrap_or(0);
        for event in events {
            if event.symbol_seq > watermark {
                stream.push(event.clone());
            }
        }
        Ok(())
    }
}

/// Fans one commit out to several sinks (e.g. journal plus pub/sub).
///
/// All sinks must accept; the first refusal fails the commit.
pub struct MultiSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for MultiSink {
    fn commit(
        &self,
        symbol: &Symbol,
        command_id: OrderId,
        seq_range: (u64, u64),
        events: &[EngineEvent],
    ) -> Result<(), SinkError> {
        for sink in &self.sinks {
            sink.commit(symbol, command_id, seq_range, events)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPayload;
    use types::ids::TraderId;
    use types::numeric::{Price, Quantity};
    use types::order::Side;

    fn event(seq: u64) -> EngineEvent {
        EngineEvent::new(
            Symbol::new("BTC/USDT"),
            seq,
            1_708_123_456_789_000_000,
            EventPayload::OrderRested {
                order_id: OrderId::new(),
                trader_id: TraderId::from("alice"),
                side: Side::Buy,
                price: Price::from_u64(100),
                remaining_quantity: Quantity::from_u64(1),
                accepted_seq: seq,
            },
        )
    }

    #[test]
    fn test_memory_sink_stores_in_order() {
        let sink = MemorySink::new();
        let symbol = Symbol::new("BTC/USDT");
        sink.commit(&symbol, OrderId::new(), (1, 2), &[event(1), event(2)])
            .unwrap();

        assert_eq!(sink.last_committed("BTC/USDT"), 2);
        assert_eq!(sink.events_for("BTC/USDT").len(), 2);
    }

    #[test]
    fn test_memory_sink_idempotent_on_replay() {
        let sink = MemorySink::new();
        let symbol = Symbol::new("BTC/USDT");
        let events = [event(1), event(2)];
        sink.commit(&symbol, OrderId::new(), (1, 2), &events).unwrap();
        // Replaying the same range must not duplicate
        sink.commit(&symbol, OrderId::new(), (1, 2), &events).unwrap();

        assert_eq!(sink.events_for("BTC/USDT").len(), 2);
    }

    #[test]
    fn test_multi_sink_fans_out() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let multi = MultiSink::new(vec![a.clone() as Arc<dyn EventSink>, b.clone()]);

        let symbol = Symbol::new("BTC/USDT");
        multi
            .commit(&symbol, OrderId::new(), (1, 1), &[event(1)])
            .unwrap();

        assert_eq!(a.last_committed("BTC/USDT"), 1);
        assert_eq!(b.last_committed("BTC/USDT"), 1);
    }
}
