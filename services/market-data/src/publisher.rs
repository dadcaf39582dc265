//! Market data publisher
//!
//! An `EventSink` that turns committed engine events into the public
//! feeds: level deltas on `book.<symbol>`, trades on `trades.<symbol>`,
//! plus the last-price cache, candles, and trade history. Usually
//! composed behind the journal sink in a `MultiSink` so durability and
//! fan-out happen in one commit.

use matching_engine::events::{EngineEvent, EventPayload};
use matching_engine::sink::{EventSink, SinkError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use types::ids::{OrderId, Symbol};
use types::numeric::Price;

use crate::bus::{book_topic, trades_topic, BookUpdate, MarketBus};
use crate::candles::{Candle, CandleStore, Timeframe};
use crate::last_price::LastPriceCache;
use crate::trades::{PublicTrade, TradeHistory};

const TRADE_HISTORY_LEN: usize = 1000;

pub struct MarketPublisher {
    bus: Arc<MarketBus>,
    last_prices: LastPriceCache,
    candles: Mutex<CandleStore>,
    history: Mutex<HashMap<String, TradeHistory>>,
}

impl MarketPublisher {
    pub fn new(bus: Arc<MarketBus>) -> Self {
        Self {
            bus,
            last_prices: LastPriceCache::new(),
            candles: Mutex::new(CandleStore::default()),
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> &MarketBus {
        &self.bus
    }

    pub fn last_price(&self, symbol: &str) -> Option<Price> {
        self.last_prices.get(symbol)
    }

    /// Most recent public trades, newest first.
    pub fn recent_trades(&self, symbol: &str, limit: usize) -> Vec<PublicTrade> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history
            .get(symbol)
            .map(|trades| trades.recent(limit))
            .unwrap_or_default()
    }

    /// Closed candles, newest first.
    pub fn recent_candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Vec<Candle> {
        let candles = self.candles.lock().unwrap_or_else(PoisonError::into_inner);
        candles.recent(symbol, timeframe, limit)
    }

    fn publish_book(&self, update: &BookUpdate) -> Result<(), SinkError> {
        self.bus
            .publish(&book_topic(update.symbol.as_str()), update)
            .map_err(|err| SinkError::Unavailable(err.to_string()))?;
        Ok(())
    }

    fn handle_event(&self, event: &EngineEvent) -> Result<(), SinkError> {
        match &event.payload {
            EventPayload::TradeExecuted { trade } => {
                let public = PublicTrade::from_trade(trade);
                self.bus
                    .publish(&trades_topic(trade.symbol.as_str()), &public)
                    .map_err(|err| SinkError::Unavailable(err.to_string()))?;

                // The maker's level shrank by the traded quantity
                self.publish_book(&BookUpdate {
                    symbol: trade.symbol.clone(),
                    symbol_seq: event.symbol_seq,
                    side: trade.taker_side.opposite(),
                    price: trade.price,
                    quantity_delta: -trade.quantity.as_decimal(),
                    timestamp: event.timestamp,
                })?;

                self.last_prices.update(trade.symbol.as_str(), trade.price);
                {
                    let mut candles = self.candles.lock().unwrap_or_else(PoisonError::into_inner);
                    candles.apply_trade(
                        &trade.symbol,
                        trade.price,
                        trade.quantity,
                        trade.executed_at,
                    );
                }
                {
                    let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
                    history
                        .entry(trade.symbol.as_str().to_string())
                        .or_insert_with(|| TradeHistory::new(TRADE_HISTORY_LEN))
                        .record(public);
                }
            }
            EventPayload::OrderRested {
                side,
                price,
                remaining_quantity,
                ..
            } => {
                self.publish_book(&BookUpdate {
                    symbol: event.symbol.clone(),
                    symbol_seq: event.symbol_seq,
                    side: *side,
                    price: *price,
                    quantity_delta: remaining_quantity.as_decimal(),
                    timestamp: event.timestamp,
                })?;
            }
            EventPayload::OrderCancelled {
                side,
                price,
                remaining_quantity,
                ..
            } => {
                self.publish_book(&BookUpdate {
                    symbol: event.symbol.clone(),
                    symbol_seq: event.symbol_seq,
                    side: *side,
                    price: *price,
                    quantity_delta: -remaining_quantity.as_decimal(),
                    timestamp: event.timestamp,
                })?;
            }
            // Private status transitions are not broadcast
            EventPayload::OrderStatusChanged { .. } => {}
        }
        Ok(())
    }
}

impl EventSink for MarketPublisher {
    fn commit(
        &self,
        symbol: &Symbol,
        _command_id: OrderId,
        seq_range: (u64, u64),
        events: &[EngineEvent],
    ) -> Result<(), SinkError> {
        for event in events {
            self.handle_event(event)?;
        }
        debug!(
            symbol = %symbol,
            from_seq = seq_range.0,
            to_seq = seq_range.1,
            events = events.len(),
            "market data published"
        );
        Ok(())
    }
}
