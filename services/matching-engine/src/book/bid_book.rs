//! Bid (buy-side) book
//!
//! Price levels keyed in a `BTreeMap`; bids iterate descending so the
//! highest price comes first. Empty levels are never kept.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use types::ids::OrderId;
use types::numeric::Price;
use types::order::Side;

use super::price_level::{LevelEntry, PriceLevel};
use crate::matching::crossing::crosses;

#[derive(Debug, Clone, Default)]
pub struct BidBook {
    levels: BTreeMap<Price, PriceLevel>,
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an entry at its price level, creating the level on first use.
    pub fn insert(&mut self, price: Price, entry: LevelEntry) {
        self.levels.entry(price).or_default().push_back(entry);
    }

    /// Remove an entry from its level, dropping the level if it empties.
    pub fn remove(&mut self, order_id: &OrderId, price: Price) -> Option<LevelEntry> {
        let level = self.levels.get_mut(&price)?;
        let entry = level.remove(order_id)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(entry)
    }

    /// Highest bid price.
    pub fn best_price(&self) -> Option<Price> {
        self.levels.keys().next_back().copied()
    }

    pub fn level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    /// Drop the level at `price` if nothing rests there anymore.
    pub fn drop_level_if_empty(&mut self, price: Price) {
        if self.levels.get(&price).is_some_and(|level| level.is_empty()) {
            self.levels.remove(&price);
        }
    }

    /// Levels a SELL taker with the given limit can trade against,
    /// best (highest) first. `None` limit means a MARKET taker: every
    /// level crosses. This is the level sequence the match walk
    /// consumes.
    pub fn iter_crossing(
        &self,
        limit: Option<Price>,
    ) -> impl Iterator<Item = (Price, &PriceLevel)> + '_ {
        self.levels
            .iter()
            .rev()
            .take_while(move |(price, _)| crosses(Side::Sell, limit, **price))
            .map(|(price, level)| (*price, level))
    }

    /// Top `depth` levels as (price, total quantity), best first.
    pub fn depth(&self, depth: usize) -> Vec<(Price, Decimal)> {
        self.levels
            .iter()
            .rev()
            .take(depth)
            .map(|(price, level)| (*price, level.total_quantity()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Total resting orders across all levels.
    pub fn order_count(&self) -> usize {
        self.levels.values().map(PriceLevel::order_count).sum()
    }

    /// All levels in descending price order.
    pub fn levels(&self) -> impl Iterator<Item = (Price, &PriceLevel)> {
        self.levels.iter().rev().map(|(price, level)| (*price, level))
    }
}
