//! OHLCV candle aggregation
//!
//! Builds rolling candles from the trade stream across several
//! timeframes at once. Bucket boundaries are aligned to the epoch
//! (1m candles close on minute boundaries), history is bounded per
//! timeframe, and all arithmetic stays in `Decimal`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use types::ids::Symbol;
use types::numeric::{Price, Quantity};

/// Candle intervals the aggregator maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn duration_nanos(&self) -> i64 {
        const MINUTE: i64 = 60 * 1_000_000_000;
        match self {
            Timeframe::M1 => MINUTE,
            Timeframe::M5 => 5 * MINUTE,
            Timeframe::M15 => 15 * MINUTE,
            Timeframe::H1 => 60 * MINUTE,
            Timeframe::H4 => 240 * MINUTE,
            Timeframe::D1 => 1440 * MINUTE,
        }
    }

    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ]
    }

    /// Floor a timestamp to this timeframe's bucket boundary.
    pub fn align(&self, timestamp_nanos: i64) -> i64 {
        let duration = self.duration_nanos();
        (timestamp_nanos / duration) * duration
    }
}

/// One OHLCV bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub trade_count: u64,
}

impl Candle {
    fn open_with(symbol: Symbol, timeframe: Timeframe, open_time: i64, price: Decimal, volume: Decimal) -> Self {
        Self {
            symbol,
            timeframe,
            open_time,
            close_time: open_time + timeframe.duration_nanos() - 1,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
            trade_count: 1,
        }
    }

    fn update(&mut self, price: Decimal, volume: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.volume += volume;
        self.trade_count += 1;
    }
}

/// Candles for one symbol on one timeframe.
#[derive(Debug)]
pub struct CandleSeries {
    symbol: Symbol,
    timeframe: Timeframe,
    current: Option<Candle>,
    closed: VecDeque<Candle>,
    max_history: usize,
}

impl CandleSeries {
    pub fn new(symbol: Symbol, timeframe: Timeframe, max_history: usize) -> Self {
        Self {
            symbol,
            timeframe,
            current: None,
            closed: VecDeque::new(),
            max_history,
        }
    }

    /// Fold one trade in. Returns the candle that closed if this trade
    /// crossed a bucket boundary.
    pub fn apply_trade(&mut self, price: Price, quantity: Quantity, timestamp: i64) -> Option<Candle> {
        let price = price.as_decimal();
        let volume = quantity.as_decimal();
        let bucket = self.timeframe.align(timestamp);

        let mut closed = None;
        if let Some(current) = &self.current {
            if bucket > current.open_time {
                closed = self.current.take();
            }
        }
        if let Some(candle) = closed.as_ref() {
            self.closed.push_back(candle.clone());
            if self.closed.len() > self.max_history {
                self.closed.pop_front();
            }
        }

        match &mut self.current {
            Some(candle) => candle.update(price, volume),
            None => {
                self.current = Some(Candle::open_with(
                    self.symbol.clone(),
                    self.timeframe,
                    bucket,
                    price,
                    volume,
                ));
            }
        }
        closed
    }

    /// The bucket still accumulating trades.
    pub fn current(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    /// Closed candles, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Candle> {
        self.closed.iter().rev().take(limit).cloned().collect()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.len()
    }
}

/// All timeframes for all symbols.
///
/// History is capped per series the way the original kept only the
/// last thousand intervals.
pub struct CandleStore {
    series: HashMap<String, Vec<CandleSeries>>,
    max_history: usize,
}

impl CandleStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            series: HashMap::new(),
            max_history,
        }
    }

    pub fn apply_trade(&mut self, symbol: &Symbol, price: Price, quantity: Quantity, timestamp: i64) {
        let max_history = self.max_history;
        let series = self
            .series
            .entry(symbol.as_str().to_string())
            .or_insert_with(|| {
                Timeframe::all()
                    .iter()
                    .map(|timeframe| CandleSeries::new(symbol.clone(), *timeframe, max_history))
                    .collect()
            });
        for series in series.iter_mut() {
            series.apply_trade(price, quantity, timestamp);
        }
    }

    /// Closed candles for one symbol and timeframe, newest first.
    pub fn recent(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Vec<Candle> {
        self.series
            .get(symbol)
            .and_then(|all| all.iter().find(|series| series.timeframe == timeframe))
            .map(|series| series.recent(limit))
            .unwrap_or_default()
    }

    /// The accumulating bucket for one symbol and timeframe.
    pub fn current(&self, symbol: &str, timeframe: Timeframe) -> Option<Candle> {
        self.series
            .get(symbol)?
            .iter()
            .find(|series| series.timeframe == timeframe)?
            .current()
            .cloned()
    }
}

impl Default for CandleStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const MINUTE: i64 = 60 * 1_000_000_000;

    fn qty(s: &str) -> Quantity {
        Quantity::from_str(s).unwrap()
    }

    #[test]
    fn test_alignment_floors_to_boundary() {
        let ts = 3 * MINUTE + 42;
        assert_eq!(Timeframe::M1.align(ts), 3 * MINUTE);
        assert_eq!(Timeframe::M5.align(ts), 0);
    }

    #[test]
    fn test_first_trade_opens_candle() {
        let mut series = CandleSeries::new(Symbol::new("BTC/USDT"), Timeframe::M1, 10);
        let closed = series.apply_trade(Price::from_u64(100), qty("2"), MINUTE + 5);
        assert!(closed.is_none());

        let current = series.current().unwrap();
        assert_eq!(current.open, Decimal::from(100));
        assert_eq!(current.high, Decimal::from(100));
        assert_eq!(current.low, Decimal::from(100));
        assert_eq!(current.close, Decimal::from(100));
        assert_eq!(current.volume, Decimal::from(2));
        assert_eq!(current.open_time, MINUTE);
    }

    #[test]
    fn test_same_bucket_updates_ohlc() {
        let mut series = CandleSeries::new(Symbol::new("BTC/USDT"), Timeframe::M1, 10);
        series.apply_trade(Price::from_u64(100), qty("1"), MINUTE);
        series.apply_trade(Price::from_u64(110), qty("1"), MINUTE + 10);
        series.apply_trade(Price::from_u64(95), qty("1"), MINUTE + 20);
        series.apply_trade(Price::from_u64(105), qty("1"), MINUTE + 30);

        let current = series.current().unwrap();
        assert_eq!(current.open, Decimal::from(100));
        assert_eq!(current.high, Decimal::from(110));
        assert_eq!(current.low, Decimal::from(95));
        assert_eq!(current.close, Decimal::from(105));
        assert_eq!(current.volume, Decimal::from(4));
        assert_eq!(current.trade_count, 4);
    }

    #[test]
    fn test_boundary_closes_candle() {
        let mut series = CandleSeries::new(Symbol::new("BTC/USDT"), Timeframe::M1, 10);
        series.apply_trade(Price::from_u64(100), qty("1"), MINUTE);
        let closed = series
            .apply_trade(Price::from_u64(101), qty("1"), 2 * MINUTE + 1)
            .unwrap();

        assert_eq!(closed.close, Decimal::from(100));
        assert_eq!(closed.open_time, MINUTE);
        assert_eq!(series.current().unwrap().open, Decimal::from(101));
        assert_eq!(series.closed_count(), 1);
    }

    #[test]
    fn test_history_bounded() {
        let mut series = CandleSeries::new(Symbol::new("BTC/USDT"), Timeframe::M1, 3);
        for minute in 0..6 {
            series.apply_trade(Price::from_u64(100), qty("1"), minute * MINUTE);
        }
        assert!(series.closed_count() <= 3);
    }

    #[test]
    fn test_store_tracks_all_timeframes() {
        let mut store = CandleStore::default();
        let symbol = Symbol::new("BTC/USDT");
        store.apply_trade(&symbol, Price::from_u64(100), qty("1"), MINUTE);
        store.apply_trade(&symbol, Price::from_u64(102), qty("2"), MINUTE + 5);

        for timeframe in Timeframe::all() {
            let current = store.current("BTC/USDT", *timeframe).unwrap();
            assert_eq!(current.close, Decimal::from(102));
            assert_eq!(current.volume, Decimal::from(3));
        }
    }

    #[test]
    fn test_store_unknown_symbol_empty() {
        let store = CandleStore::default();
        assert!(store.recent("ETH/USDC", Timeframe::M1, 10).is_empty());
        assert!(store.current("ETH/USDC", Timeframe::M1).is_none());
    }
}
