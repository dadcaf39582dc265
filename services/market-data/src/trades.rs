//! Public trade stream
//!
//! Strips a trade down to what the `trades.<symbol>` channel may carry
//! (no trader identities, no acceptance sequences) and keeps a bounded
//! per-symbol history for late joiners.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use types::ids::{Symbol, TradeId};
use types::numeric::{Price, Quantity};
use types::order::Side;
use types::trade::Trade;

/// Publicly broadcastable view of an executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicTrade {
    pub trade_id: TradeId,
    pub symbol: Symbol,
    pub price: Price,
    pub quantity: Quantity,
    /// Notional value (price × quantity).
    pub value: Decimal,
    pub taker_side: Side,
    pub symbol_seq: u64,
    pub executed_at: i64,
}

impl PublicTrade {
    pub fn from_trade(trade: &Trade) -> Self {
        Self {
            trade_id: trade.trade_id,
            symbol: trade.symbol.clone(),
            price: trade.price,
            quantity: trade.quantity,
            value: trade.trade_value(),
            taker_side: trade.taker_side,
            symbol_seq: trade.symbol_seq,
            executed_at: trade.executed_at,
        }
    }
}

/// Ring buffer of the most recent public trades for one symbol.
#[derive(Debug)]
pub struct TradeHistory {
    trades: VecDeque<PublicTrade>,
    max_len: usize,
}

impl TradeHistory {
    pub fn new(max_len: usize) -> Self {
        Self {
            trades: VecDeque::with_capacity(max_len),
            max_len,
        }
    }

    pub fn record(&mut self, trade: PublicTrade) {
        if self.trades.len() >= self.max_len {
            self.trades.pop_front();
        }
        self.trades.push_back(trade);
    }

    /// Most recent trades, newest first.
    pub fn recent(&self, limit: usize) -> Vec<PublicTrade> {
        self.trades.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use types::ids::OrderId;

    fn public_trade(seq: u64, price: u64) -> PublicTrade {
        let trade = Trade {
            trade_id: TradeId::new(),
            symbol: Symbol::new("BTC/USDT"),
            buy_order_id: OrderId::new(),
            sell_order_id: OrderId::new(),
            price: Price::from_u64(price),
            quantity: Quantity::from_str("0.5").unwrap(),
            taker_side: Side::Buy,
            maker_seq: 1,
            taker_seq: 2,
            symbol_seq: seq,
            executed_at: 1_708_123_456_789_000_000 + seq as i64,
        };
        PublicTrade::from_trade(&trade)
    }

    #[test]
    fn test_public_trade_carries_value() {
        let public = public_trade(1, 50_000);
        assert_eq!(public.value, Decimal::from(25_000));
        assert_eq!(public.taker_side, Side::Buy);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = TradeHistory::new(3);
        for seq in 1..=5 {
            history.record(public_trade(seq, 100));
        }

        assert_eq!(history.len(), 3);
        let recent = history.recent(10);
        assert_eq!(recent[0].symbol_seq, 5);
        assert_eq!(recent[2].symbol_seq, 3);
    }

    #[test]
    fn test_recent_newest_first() {
        let mut history = TradeHistory::new(10);
        for seq in 1..=3 {
            history.record(public_trade(seq, 100 + seq));
        }

        let recent = history.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].symbol_seq, 3);
        assert_eq!(recent[1].symbol_seq, 2);
    }

    #[test]
    fn test_public_trade_serialization() {
        let public = public_trade(7, 101);
        let json = serde_json::to_string(&public).unwrap();
        let back: PublicTrade = serde_json::from_str(&json).unwrap();
        assert_eq!(public, back);
    }
}
