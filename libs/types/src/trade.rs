//! Trade records
//!
//! A trade is the atomic exchange produced when an incoming taker
//! crosses a resting maker. The execution price is always the maker's
//! resting price; price improvement accrues to the taker.

use crate::ids::{OrderId, Symbol, TradeId};
use crate::numeric::{Price, Quantity};
use crate::order::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub symbol: Symbol,

    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,

    pub price: Price,
    pub quantity: Quantity,

    /// Side of the aggressing order; the maker sat on the opposite side.
    pub taker_side: Side,

    /// Acceptance sequences of the two parties, for priority audits.
    pub maker_seq: u64,
    pub taker_seq: u64,

    /// Position of this trade in the symbol's event stream.
    pub symbol_seq: u64,

    /// Unix nanoseconds.
    pub executed_at: i64,
}

impl Trade {
    /// Notional value (price × quantity).
    pub fn trade_value(&self) -> Decimal {
        self.price.as_decimal() * self.quantity.as_decimal()
    }

    /// Order id of the maker side of this trade.
    pub fn maker_order_id(&self) -> OrderId {
        match self.taker_side {
            Side::Buy => self.sell_order_id,
            Side::Sell => self.buy_order_id,
        }
    }

    /// Order id of the taker side of this trade.
    pub fn taker_order_id(&self) -> OrderId {
        match self.taker_side {
            Side::Buy => self.buy_order_id,
            Side::Sell => self.sell_order_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_trade(taker_side: Side) -> Trade {
        Trade {
            trade_id: TradeId::new(),
            symbol: Symbol::new("BTC/USDT"),
            buy_order_id: OrderId::new(),
            sell_order_id: OrderId::new(),
            price: Price::from_u64(50_000),
            quantity: Quantity::from_str("0.5").unwrap(),
            taker_side,
            maker_seq: 1,
            taker_seq: 2,
            symbol_seq: 3,
            executed_at: 1_708_123_456_789_000_000,
        }
    }

    #[test]
    fn test_trade_value() {
        let trade = sample_trade(Side::Buy);
        assert_eq!(trade.trade_value(), Decimal::from(25_000));
    }

    #[test]
    fn test_maker_taker_resolution() {
        let trade = sample_trade(Side::Buy);
        assert_eq!(trade.maker_order_id(), trade.sell_order_id);
        assert_eq!(trade.taker_order_id(), trade.buy_order_id);

        let trade = sample_trade(Side::Sell);
        assert_eq!(trade.maker_order_id(), trade.buy_order_id);
        assert_eq!(trade.taker_order_id(), trade.sell_order_id);
    }

    #[test]
    fn test_trade_serialization_roundtrip() {
        let trade = sample_trade(Side::Sell);
        let json = serde_json::to_string(&trade).unwrap();
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, back);
    }
}
