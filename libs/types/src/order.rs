//! Order lifecycle model
//!
//! An order starts PENDING, becomes ACTIVE on acceptance, may pass
//! through PARTIALLY_FILLED, and terminates as FILLED, CANCELLED, or
//! REJECTED. Time priority uses the acceptance sequence assigned by the
//! engine, never wall-clock timestamps.

use crate::errors::EngineError;
use crate::ids::{OrderId, Symbol, TraderId};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type. MARKET orders never rest on the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// Why an order was rejected at the command boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    InvalidQuantity,
    QuantityOffLot,
    MissingPrice,
    InvalidPrice,
    PriceOffTick,
    MarketOrderWithPrice,
    MarketOrdersDisabled,
    WrongSymbol,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InvalidQuantity => "INVALID_QUANTITY",
            RejectReason::QuantityOffLot => "QUANTITY_OFF_LOT",
            RejectReason::MissingPrice => "MISSING_PRICE",
            RejectReason::InvalidPrice => "INVALID_PRICE",
            RejectReason::PriceOffTick => "PRICE_OFF_TICK",
            RejectReason::MarketOrderWithPrice => "MARKET_ORDER_WITH_PRICE",
            RejectReason::MarketOrdersDisabled => "MARKET_ORDERS_DISABLED",
            RejectReason::WrongSymbol => "WRONG_SYMBOL",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an order was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    UserRequested,
    UnfilledMarket,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CancelReason::UserRequested => "USER_REQUESTED",
            CancelReason::UnfilledMarket => "UNFILLED_MARKET",
        };
        f.write_str(s)
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason")]
pub enum OrderStatus {
    #[serde(rename = "PENDING")]
    Pending,

    #[serde(rename = "ACTIVE")]
    Active,

    #[serde(rename = "PARTIALLY_FILLED")]
    PartiallyFilled,

    #[serde(rename = "FILLED")]
    Filled,

    #[serde(rename = "CANCELLED")]
    Cancelled(CancelReason),

    #[serde(rename = "REJECTED")]
    Rejected(RejectReason),
}

impl OrderStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled(_) | OrderStatus::Rejected(_)
        )
    }

    /// Whether an order in this state may rest on the book.
    pub fn is_restable(&self) -> bool {
        matches!(self, OrderStatus::Active | OrderStatus::PartiallyFilled)
    }
}

/// A submission as received from the caller, before acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub trader_id: TraderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    /// Required for LIMIT, forbidden for MARKET.
    pub price: Option<Price>,
}

impl OrderRequest {
    pub fn limit(
        trader_id: impl Into<TraderId>,
        symbol: impl Into<Symbol>,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            trader_id: trader_id.into(),
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
        }
    }

    pub fn market(
        trader_id: impl Into<TraderId>,
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
    ) -> Self {
        Self {
            trader_id: trader_id.into(),
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
        }
    }
}

/// A fully accepted order: immutable header plus mutable fill state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub trader_id: TraderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub price: Option<Price>,
    pub filled_quantity: Quantity,
    pub status: OrderStatus,
    /// Acceptance sequence assigned by the engine; drives time priority.
    pub accepted_seq: u64,
    /// Unix nanoseconds. Informational only.
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Build an ACTIVE order from an accepted request.
    pub fn accept(request: OrderRequest, order_id: OrderId, accepted_seq: u64, timestamp: i64) -> Self {
        Self {
            order_id,
            trader_id: request.trader_id,
            symbol: request.symbol,
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price: request.price,
            filled_quantity: Quantity::zero(),
            status: OrderStatus::Active,
            accepted_seq,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity
            .checked_sub(self.filled_quantity)
            .unwrap_or_else(Quantity::zero)
    }

    pub fn is_filled(&self) -> bool {
        self.filled_quantity == self.quantity
    }

    pub fn has_fills(&self) -> bool {
        !self.filled_quantity.is_zero()
    }

    /// Record a fill and advance the status.
    ///
    /// Over-filling indicates a matching bug and surfaces as an
    /// invariant violation rather than a panic.
    pub fn apply_fill(&mut self, fill: Quantity, timestamp: i64) -> Result<(), EngineError> {
        let new_filled = self.filled_quantity + fill;
        if new_filled > self.quantity {
            return Err(EngineError::InvariantViolation(format!(
                "fill {} exceeds order quantity {} on {}",
                new_filled, self.quantity, self.order_id
            )));
        }

        self.filled_quantity = new_filled;
        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = timestamp;
        Ok(())
    }

    /// Move to CANCELLED, keeping fill state intact.
    pub fn cancel(&mut self, reason: CancelReason, timestamp: i64) {
        self.status = OrderStatus::Cancelled(reason);
        self.updated_at = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const TS: i64 = 1_708_123_456_789_000_000;

    fn accepted_order(quantity: &str) -> Order {
        let request = OrderRequest::limit(
            "alice",
            "BTC/USDT",
            Side::Buy,
            Price::from_u64(50_000),
            Quantity::from_str(quantity).unwrap(),
        );
        Order::accept(request, OrderId::new(), 1, TS)
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_accept_sets_active() {
        let order = accepted_order("1.0");
        assert_eq!(order.status, OrderStatus::Active);
        assert_eq!(order.accepted_seq, 1);
        assert_eq!(order.remaining_quantity(), Quantity::from_str("1.0").unwrap());
        assert!(!order.has_fills());
    }

    #[test]
    fn test_partial_then_full_fill() {
        let mut order = accepted_order("1.0");

        order.apply_fill(Quantity::from_str("0.3").unwrap(), TS + 1).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.remaining_quantity(), Quantity::from_str("0.7").unwrap());

        order.apply_fill(Quantity::from_str("0.7").unwrap(), TS + 2).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.status.is_terminal());
        assert!(order.remaining_quantity().is_zero());
    }

    #[test]
    fn test_overfill_is_invariant_violation() {
        let mut order = accepted_order("1.0");
        let result = order.apply_fill(Quantity::from_str("1.5").unwrap(), TS + 1);
        assert!(matches!(result, Err(EngineError::InvariantViolation(_))));
        // State untouched on failure
        assert_eq!(order.status, OrderStatus::Active);
        assert!(!order.has_fills());
    }

    #[test]
    fn test_cancel_keeps_fills() {
        let mut order = accepted_order("2.0");
        order.apply_fill(Quantity::from_str("0.5").unwrap(), TS + 1).unwrap();
        order.cancel(CancelReason::UserRequested, TS + 2);

        assert_eq!(order.status, OrderStatus::Cancelled(CancelReason::UserRequested));
        assert_eq!(order.filled_quantity, Quantity::from_str("0.5").unwrap());
        assert!(order.status.is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let status = OrderStatus::Cancelled(CancelReason::UnfilledMarket);
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"state":"CANCELLED","reason":"UNFILLED_MARKET"}"#);

        let rejected = OrderStatus::Rejected(RejectReason::PriceOffTick);
        let json = serde_json::to_string(&rejected).unwrap();
        assert_eq!(json, r#"{"state":"REJECTED","reason":"PRICE_OFF_TICK"}"#);
    }

    #[test]
    fn test_order_roundtrip() {
        let order = accepted_order("1.5");
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
    }

    #[test]
    fn test_restable_states() {
        assert!(OrderStatus::Active.is_restable());
        assert!(OrderStatus::PartiallyFilled.is_restable());
        assert!(!OrderStatus::Filled.is_restable());
        assert!(!OrderStatus::Pending.is_restable());
    }
}
