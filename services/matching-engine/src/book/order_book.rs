//! Per-symbol order book
//!
//! Pairs the two side books with a locator mapping every resting order
//! id to its (side, price). The locator is what makes cancellation O(1)
//! to route and lets replay identify which party of a trade was resting.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use types::errors::EngineError;
use types::ids::{OrderId, Symbol};
use types::numeric::{Price, Quantity};
use types::order::{Order, Side};

use super::ask_book::AskBook;
use super::bid_book::BidBook;
use super::price_level::LevelEntry;

/// One side of a depth snapshot: a price and the total quantity resting there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub quantity: Quantity,
}

/// Top-of-book view returned by the snapshot API.
///
/// A value copy, never a reference into live book state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: Symbol,
    /// Best bids first (descending price).
    pub bids: Vec<DepthLevel>,
    /// Best asks first (ascending price).
    pub asks: Vec<DepthLevel>,
    /// Event sequence at the time of the read.
    pub symbol_seq: u64,
}

#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    pub(crate) bids: BidBook,
    pub(crate) asks: AskBook,
    /// order_id → (side, price) for every resting order, nothing else.
    locator: HashMap<OrderId, (Side, Price)>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rest an accepted order's remainder on its side of the book.
    pub fn rest(&mut self, order: &Order) -> Result<(), EngineError> {
        let price = order.price.ok_or_else(|| {
            EngineError::InvariantViolation(format!("order {} rested without a price", order.order_id))
        })?;
        if !order.status.is_restable() {
            return Err(EngineError::InvariantViolation(format!(
                "order {} rested in non-restable state",
                order.order_id
            )));
        }
        self.rest_entry(
            order.side,
            price,
            LevelEntry {
                order_id: order.order_id,
                accepted_seq: order.accepted_seq,
                remaining: order.remaining_quantity(),
            },
        )
    }

    /// Low-level insert used by both `rest` and journal replay.
    pub fn rest_entry(&mut self, side: Side, price: Price, entry: LevelEntry) -> Result<(), EngineError> {
        if self.locator.contains_key(&entry.order_id) {
            return Err(EngineError::InvariantViolation(format!(
                "order {} already resting",
                entry.order_id
            )));
        }
        let order_id = entry.order_id;
        match side {
            Side::Buy => self.bids.insert(price, entry),
            Side::Sell => self.asks.insert(price, entry),
        }
        self.locator.insert(order_id, (side, price));
        Ok(())
    }

    /// Remove a resting order. `None` means it is not on the book.
    pub fn cancel(&mut self, order_id: &OrderId) -> Option<(Side, Price, LevelEntry)> {
        let (side, price) = self.locator.remove(order_id)?;
        let entry = match side {
            Side::Buy => self.bids.remove(order_id, price),
            Side::Sell => self.asks.remove(order_id, price),
        }?;
        Some((side, price, entry))
    }

    /// Where a resting order sits, if it does.
    pub fn locate(&self, order_id: &OrderId) -> Option<(Side, Price)> {
        self.locator.get(order_id).copied()
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.locator.contains_key(order_id)
    }

    /// Forget a maker that was fully filled and popped from its level.
    pub(crate) fn unlink(&mut self, order_id: &OrderId) {
        self.locator.remove(order_id);
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Number of resting orders across both sides.
    pub fn resting_orders(&self) -> usize {
        self.locator.len()
    }

    /// Value snapshot of the top `depth` levels per side.
    pub fn snapshot(&self, symbol: &Symbol, depth: usize, symbol_seq: u64) -> BookSnapshot {
        let to_levels = |pairs: Vec<(Price, Decimal)>| {
            pairs
                .into_iter()
                .map(|(price, total)| DepthLevel {
                    price,
                    quantity: Quantity::try_new(total).unwrap_or_else(Quantity::zero),
                })
                .collect()
        };
        BookSnapshot {
            symbol: symbol.clone(),
            bids: to_levels(self.bids.depth(depth)),
            asks: to_levels(self.asks.depth(depth)),
            symbol_seq,
        }
    }

    /// Verify the structural invariants that must hold after every command.
    ///
    /// Cheap checks (no crossed book, no empty levels, locator count)
    /// always run; the full per-order sweep runs in debug builds.
    pub fn check_invariants(&self) -> Result<(), EngineError> {
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                return Err(EngineError::InvariantViolation(format!(
                    "crossed book: best bid {} >= best ask {}",
                    bid, ask
                )));
            }
        }

        let resting = self.bids.order_count() + self.asks.order_count();
        if resting != self.locator.len() {
            return Err(EngineError::InvariantViolation(format!(
                "locator holds {} ids but {} orders rest on the book",
                self.locator.len(),
                resting
            )));
        }

        for (price, level) in self.bids.levels().chain(self.asks.levels()) {
            if level.is_empty() || level.total_quantity() <= Decimal::ZERO {
                return Err(EngineError::InvariantViolation(format!(
                    "empty level kept at {}",
                    price
                )));
            }
        }

        #[cfg(debug_assertions)]
        self.check_invariants_deep()?;

        Ok(())
    }

    /// Per-order sweep: locator agreement, positive remainders, and FIFO
    /// ordering by acceptance sequence within each level.
    #[cfg(debug_assertions)]
    fn check_invariants_deep(&self) -> Result<(), EngineError> {
        let bid_levels = self.bids.levels().map(|(price, level)| (Side::Buy, price, level));
        let ask_levels = self.asks.levels().map(|(price, level)| (Side::Sell, price, level));
        for (side, price, level) in bid_levels.chain(ask_levels) {
            let mut last_seq = None;
            for entry in level.iter() {
                if !entry.remaining.is_positive() {
                    return Err(EngineError::InvariantViolation(format!(
                        "order {} rests with zero remainder",
                        entry.order_id
                    )));
                }
                if self.locator.get(&entry.order_id) != Some(&(side, price)) {
                    return Err(EngineError::InvariantViolation(format!(
                        "locator disagrees about order {}",
                        entry.order_id
                    )));
                }
                if last_seq.is_some_and(|last| entry.accepted_seq <= last) {
                    return Err(EngineError::InvariantViolation(format!(
                        "level {} not in acceptance order",
                        price
                    )));
                }
                last_seq = Some(entry.accepted_seq);
            }
        }
        Ok(())
    }
}
