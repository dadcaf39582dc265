//! Last traded price cache
//!
//! Updated on every committed trade; read by anything that needs a
//! quick reference price without touching the book.

use dashmap::DashMap;
use types::numeric::Price;

#[derive(Default)]
pub struct LastPriceCache {
    prices: DashMap<String, Price>,
}

impl LastPriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, symbol: &str, price: Price) {
        self.prices.insert(symbol.to_string(), price);
    }

    pub fn get(&self, symbol: &str) -> Option<Price> {
        self.prices.get(symbol).map(|entry| *entry.value())
    }
}
