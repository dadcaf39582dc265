//! Event envelope and payloads
//!
//! Every mutation the engine performs is described by exactly one event.
//! Events carry a per-symbol sequence number assigned in production
//! order: strictly monotonic, gap-free, starting at 1. The journaled
//! event stream is sufficient to rebuild the book from scratch.
//!
//! Acceptance is not separately evented: an accepted command shows up
//! as its trades, an add or removal delta, and a closing status, while
//! a rejected command leaves no trace in the stream at all.

use serde::{Deserialize, Serialize};
use types::ids::{OrderId, Symbol, TraderId};
use types::numeric::{Price, Quantity};
use types::order::{CancelReason, OrderStatus, Side};
use types::trade::Trade;

/// Envelope around a single engine event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub symbol: Symbol,
    /// Position in the symbol's event stream (1-based, gap-free).
    pub symbol_seq: u64,
    /// Unix nanoseconds.
    pub timestamp: i64,
    pub payload: EventPayload,
}

impl EngineEvent {
    pub fn new(symbol: Symbol, symbol_seq: u64, timestamp: i64, payload: EventPayload) -> Self {
        Self {
            symbol,
            symbol_seq,
            timestamp,
            payload,
        }
    }

    /// Event type as a static label for logging.
    pub fn label(&self) -> &'static str {
        match &self.payload {
            EventPayload::TradeExecuted { .. } => "TradeExecuted",
            EventPayload::OrderRested { .. } => "OrderRested",
            EventPayload::OrderCancelled { .. } => "OrderCancelled",
            EventPayload::OrderStatusChanged { .. } => "OrderStatusChanged",
        }
    }
}

/// Event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    /// A maker and taker matched. Execution price is the maker's.
    TradeExecuted { trade: Trade },

    /// A limit order's remainder was added to the book.
    OrderRested {
        order_id: OrderId,
        trader_id: TraderId,
        side: Side,
        price: Price,
        remaining_quantity: Quantity,
        accepted_seq: u64,
    },

    /// A resting order left the book without trading.
    OrderCancelled {
        order_id: OrderId,
        side: Side,
        price: Price,
        remaining_quantity: Quantity,
        reason: CancelReason,
    },

    /// Closing status of the command's subject order.
    OrderStatusChanged {
        order_id: OrderId,
        status: OrderStatus,
        filled_quantity: Quantity,
        remaining_quantity: Quantity,
    },
}
