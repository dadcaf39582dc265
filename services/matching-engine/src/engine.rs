//! Per-symbol matching engine
//!
//! A `SymbolEngine` processes one command at a time against its own
//! book: price priority first, acceptance order within a price. Each
//! command yields a report for the caller plus the ordered event list
//! that the registry hands to the durability sink. Matching is a pure
//! function of engine state and the command; all I/O happens after the
//! event list is produced.

use std::collections::{HashSet, VecDeque};
use tracing::{debug, error, info, warn};
use types::errors::EngineError;
use types::ids::{OrderId, Symbol, TradeId};
use types::numeric::{Price, Quantity};
use types::order::{CancelReason, Order, OrderRequest, OrderStatus, OrderType, Side};
use types::trade::Trade;

use crate::book::{BookSnapshot, LevelEntry, OrderBook};
use crate::config::SymbolRules;
use crate::events::{EngineEvent, EventPayload};
use crate::matching::validate_request;

/// A command addressed to one symbol's engine.
#[derive(Debug, Clone)]
pub enum Command {
    Submit(OrderRequest),
    Cancel(OrderId),
}

/// Outcome of a SUBMIT, returned to the caller after the sink commit.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReport {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub filled_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub trades: Vec<Trade>,
    pub symbol_seq: u64,
}

/// Outcome of a CANCEL.
#[derive(Debug, Clone, PartialEq)]
pub struct CancelReport {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub remaining_quantity: Quantity,
    pub symbol_seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Submitted(SubmitReport),
    Cancelled(CancelReport),
}

impl CommandOutcome {
    /// Id of the order the command was about.
    pub fn order_id(&self) -> OrderId {
        match self {
            CommandOutcome::Submitted(report) => report.order_id,
            CommandOutcome::Cancelled(report) => report.order_id,
        }
    }
}

/// Restorable copy of an engine's mutable state, taken before a command
/// when the sink-failure policy is rollback.
#[derive(Debug, Clone)]
pub struct EngineCheckpoint {
    book: OrderBook,
    last_accept_seq: u64,
    last_symbol_seq: u64,
    recent_terminal: TerminalWindow,
}

/// Bounded memory of recently terminal order ids.
///
/// The book alone cannot distinguish a cancel of an unknown id from a
/// cancel of an order that already completed; this window answers that.
const TERMINAL_WINDOW: usize = 16_384;

#[derive(Debug, Clone, Default)]
struct TerminalWindow {
    ids: HashSet<OrderId>,
    order: VecDeque<OrderId>,
}

impl TerminalWindow {
    fn insert(&mut self, order_id: OrderId) {
        if self.ids.insert(order_id) {
            self.order.push_back(order_id);
            if self.order.len() > TERMINAL_WINDOW {
                if let Some(oldest) = self.order.pop_front() {
                    self.ids.remove(&oldest);
                }
            }
        }
    }

    fn contains(&self, order_id: &OrderId) -> bool {
        self.ids.contains(order_id)
    }
}

#[derive(Debug, Clone)]
pub struct SymbolEngine {
    symbol: Symbol,
    rules: SymbolRules,
    book: OrderBook,
    /// Last assigned acceptance sequence (time priority).
    last_accept_seq: u64,
    /// Last emitted event sequence.
    last_symbol_seq: u64,
    recent_terminal: TerminalWindow,
    halted: bool,
}

impl SymbolEngine {
    pub fn new(symbol: Symbol, rules: SymbolRules) -> Self {
        Self {
            symbol,
            rules,
            book: OrderBook::new(),
            last_accept_seq: 0,
            last_symbol_seq: 0,
            recent_terminal: TerminalWindow::default(),
            halted: false,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn last_symbol_seq(&self) -> u64 {
        self.last_symbol_seq
    }

    pub fn last_accept_seq(&self) -> u64 {
        self.last_accept_seq
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Refuse all further commands for this symbol.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn checkpoint(&self) -> EngineCheckpoint {
        EngineCheckpoint {
            book: self.book.clone(),
            last_accept_seq: self.last_accept_seq,
            last_symbol_seq: self.last_symbol_seq,
            recent_terminal: self.recent_terminal.clone(),
        }
    }

    pub fn restore(&mut self, checkpoint: EngineCheckpoint) {
        self.book = checkpoint.book;
        self.last_accept_seq = checkpoint.last_accept_seq;
        self.last_symbol_seq = checkpoint.last_symbol_seq;
        self.recent_terminal = checkpoint.recent_terminal;
    }

    /// Process one command, returning the outcome and the ordered event
    /// list the caller must commit before acknowledging.
    ///
    /// An invariant violation halts the symbol: it is always a bug, and
    /// a halted book cannot leak corrupted state.
    pub fn process(
        &mut self,
        command: Command,
        timestamp: i64,
    ) -> Result<(CommandOutcome, Vec<EngineEvent>), EngineError> {
        if self.halted {
            return Err(EngineError::SymbolHalted {
                symbol: self.symbol.as_str().to_string(),
            });
        }

        let result = match command {
            Command::Submit(request) => self
                .submit(request, timestamp)
                .map(|(report, events)| (CommandOutcome::Submitted(report), events)),
            Command::Cancel(order_id) => self
                .cancel(order_id, timestamp)
                .map(|(report, events)| (CommandOutcome::Cancelled(report), events)),
        };

        if let Err(EngineError::InvariantViolation(detail)) = &result {
            error!(symbol = %self.symbol, %detail, "book invariant violated, halting symbol");
            self.halted = true;
        }
        result
    }

    /// Value snapshot of the top `depth` levels per side.
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        self.book.snapshot(&self.symbol, depth, self.last_symbol_seq)
    }

    fn submit(
        &mut self,
        request: OrderRequest,
        timestamp: i64,
    ) -> Result<(SubmitReport, Vec<EngineEvent>), EngineError> {
        if let Err(err) = validate_request(&self.symbol, &request, &self.rules) {
            let reason = match err {
                EngineError::InvalidOrder(reason) => reason,
                other => return Err(other),
            };
            let order_id = OrderId::new();
            warn!(symbol = %self.symbol, %order_id, %reason, "order rejected");
            self.recent_terminal.insert(order_id);
            return Ok((
                SubmitReport {
                    order_id,
                    status: OrderStatus::Rejected(reason),
                    filled_quantity: Quantity::zero(),
                    remaining_quantity: request.quantity,
                    trades: Vec::new(),
                    symbol_seq: self.last_symbol_seq,
                },
                Vec::new(),
            ));
        }

        self.last_accept_seq += 1;
        let mut order = Order::accept(request, OrderId::new(), self.last_accept_seq, timestamp);
        debug!(
            symbol = %self.symbol,
            order_id = %order.order_id,
            side = ?order.side,
            accepted_seq = order.accepted_seq,
            "order accepted"
        );

        let mut events = Vec::new();
        let mut trades = Vec::new();
        let mut seq = self.last_symbol_seq;

        match order.side {
            Side::Buy => {
                self.match_against_asks(&mut order, &mut trades, &mut events, &mut seq, timestamp)?
            }
            Side::Sell => {
                self.match_against_bids(&mut order, &mut trades, &mut events, &mut seq, timestamp)?
            }
        }

        let remaining = order.remaining_quantity();
        if remaining.is_positive() {
            match order.order_type {
                OrderType::Limit => {
                    self.book.rest(&order)?;
                    let price = order.price.ok_or_else(|| {
                        EngineError::InvariantViolation(
                            "limit order without price survived validation".to_string(),
                        )
                    })?;
                    seq += 1;
                    events.push(EngineEvent::new(
                        self.symbol.clone(),
                        seq,
                        timestamp,
                        EventPayload::OrderRested {
                            order_id: order.order_id,
                            trader_id: order.trader_id.clone(),
                            side: order.side,
                            price,
                            remaining_quantity: remaining,
                            accepted_seq: order.accepted_seq,
                        },
                    ));
                }
                OrderType::Market => {
                    // MARKET never rests; the unfilled remainder is discarded
                    order.cancel(CancelReason::UnfilledMarket, timestamp);
                    info!(
                        symbol = %self.symbol,
                        order_id = %order.order_id,
                        remaining = %remaining,
                        "market order remainder discarded"
                    );
                }
            }
        }

        seq += 1;
        events.push(EngineEvent::new(
            self.symbol.clone(),
            seq,
            timestamp,
            EventPayload::OrderStatusChanged {
                order_id: order.order_id,
                status: order.status,
                filled_quantity: order.filled_quantity,
                remaining_quantity: order.remaining_quantity(),
            },
        ));

        if order.status.is_terminal() {
            self.recent_terminal.insert(order.order_id);
        }
        self.last_symbol_seq = seq;
        self.book.check_invariants()?;

        Ok((
            SubmitReport {
                order_id: order.order_id,
                status: order.status,
                filled_quantity: order.filled_quantity,
                remaining_quantity: order.remaining_quantity(),
                trades,
                symbol_seq: seq,
            },
            events,
        ))
    }

    /// BUY taker walks the asks' crossing levels, best (lowest) first.
    ///
    /// The level sequence comes from `iter_crossing`; the book only
    /// loses levels while a taker matches, so the sequence captured at
    /// command start stays valid for the whole walk.
    fn match_against_asks(
        &mut self,
        taker: &mut Order,
        trades: &mut Vec<Trade>,
        events: &mut Vec<EngineEvent>,
        seq: &mut u64,
        timestamp: i64,
    ) -> Result<(), EngineError> {
        let crossing_levels: Vec<Price> = self
            .book
            .asks
            .iter_crossing(taker.price)
            .map(|(price, _)| price)
            .collect();

        for level_price in crossing_levels {
            if !taker.remaining_quantity().is_positive() {
                break;
            }

            loop {
                let remaining = taker.remaining_quantity();
                if !remaining.is_positive() {
                    break;
                }
                let Some(maker) = self
                    .book
                    .asks
                    .level_mut(level_price)
                    .and_then(|level| level.peek_front().copied())
                else {
                    break;
                };

                let trade_qty = remaining.min(maker.remaining);
                let maker_left = self
                    .book
                    .asks
                    .level_mut(level_price)
                    .and_then(|level| level.fill_front(trade_qty))
                    .ok_or_else(|| {
                        EngineError::InvariantViolation(format!(
                            "maker fill exceeds remainder at {}",
                            level_price
                        ))
                    })?;
                if maker_left.is_zero() {
                    self.book.unlink(&maker.order_id);
                    self.recent_terminal.insert(maker.order_id);
                }

                taker.apply_fill(trade_qty, timestamp)?;

                *seq += 1;
                let trade = Trade {
                    trade_id: TradeId::new(),
                    symbol: self.symbol.clone(),
                    buy_order_id: taker.order_id,
                    sell_order_id: maker.order_id,
                    price: level_price,
                    quantity: trade_qty,
                    taker_side: Side::Buy,
                    maker_seq: maker.accepted_seq,
                    taker_seq: taker.accepted_seq,
                    symbol_seq: *seq,
                    executed_at: timestamp,
                };
                debug!(
                    symbol = %self.symbol,
                    trade_id = %trade.trade_id,
                    price = %trade.price,
                    quantity = %trade.quantity,
                    "trade executed"
                );
                events.push(EngineEvent::new(
                    self.symbol.clone(),
                    *seq,
                    timestamp,
                    EventPayload::TradeExecuted {
                        trade: trade.clone(),
                    },
                ));
                trades.push(trade);
            }

            self.book.asks.drop_level_if_empty(level_price);
        }
        Ok(())
    }

    /// SELL taker walks the bids' crossing levels, best (highest) first.
    ///
    /// Same walk as `match_against_asks` with the sides flipped.
    fn match_against_bids(
        &mut self,
        taker: &mut Order,
        trades: &mut Vec<Trade>,
        events: &mut Vec<EngineEvent>,
        seq: &mut u64,
        timestamp: i64,
    ) -> Result<(), EngineError> {
        let crossing_levels: Vec<Price> = self
            .book
            .bids
            .iter_crossing(taker.price)
            .map(|(price, _)| price)
            .collect();

        for level_price in crossing_levels {
            if !taker.remaining_quantity().is_positive() {
                break;
            }

            loop {
                let remaining = taker.remaining_quantity();
                if !remaining.is_positive() {
                    break;
                }
                let Some(maker) = self
                    .book
                    .bids
                    .level_mut(level_price)
                    .and_then(|level| level.peek_front().copied())
                else {
                    break;
                };

                let trade_qty = remaining.min(maker.remaining);
                let maker_left = self
                    .book
                    .bids
                    .level_mut(level_price)
                    .and_then(|level| level.fill_front(trade_qty))
                    .ok_or_else(|| {
                        EngineError::InvariantViolation(format!(
                            "maker fill exceeds remainder at {}",
                            level_price
                        ))
                    })?;
                if maker_left.is_zero() {
                    self.book.unlink(&maker.order_id);
                    self.recent_terminal.insert(maker.order_id);
                }

                taker.apply_fill(trade_qty, timestamp)?;

                *seq += 1;
                let trade = Trade {
                    trade_id: TradeId::new(),
                    symbol: self.symbol.clone(),
                    buy_order_id: maker.order_id,
                    sell_order_id: taker.order_id,
                    price: level_price,
                    quantity: trade_qty,
                    taker_side: Side::Sell,
                    maker_seq: maker.accepted_seq,
                    taker_seq: taker.accepted_seq,
                    symbol_seq: *seq,
                    executed_at: timestamp,
                };
                debug!(
                    symbol = %self.symbol,
                    trade_id = %trade.trade_id,
                    price = %trade.price,
                    quantity = %trade.quantity,
                    "trade executed"
                );
                events.push(EngineEvent::new(
                    self.symbol.clone(),
                    *seq,
                    timestamp,
                    EventPayload::TradeExecuted {
                        trade: trade.clone(),
                    },
                ));
                trades.push(trade);
            }

            self.book.bids.drop_level_if_empty(level_price);
        }
        Ok(())
    }

    fn cancel(
        &mut self,
        order_id: OrderId,
        timestamp: i64,
    ) -> Result<(CancelReport, Vec<EngineEvent>), EngineError> {
        let Some((side, price, entry)) = self.book.cancel(&order_id) else {
            if self.recent_terminal.contains(&order_id) {
                return Err(EngineError::NotCancellable {
                    order_id: order_id.to_string(),
                });
            }
            return Err(EngineError::NotFound {
                order_id: order_id.to_string(),
            });
        };

        let seq = self.last_symbol_seq + 1;
        self.last_symbol_seq = seq;
        self.recent_terminal.insert(order_id);
        info!(
            symbol = %self.symbol,
            %order_id,
            remaining = %entry.remaining,
            "order cancelled"
        );

        let events = vec![EngineEvent::new(
            self.symbol.clone(),
            seq,
            timestamp,
            EventPayload::OrderCancelled {
                order_id,
                side,
                price,
                remaining_quantity: entry.remaining,
                reason: CancelReason::UserRequested,
            },
        )];
        self.book.check_invariants()?;

        Ok((
            CancelReport {
                order_id,
                status: OrderStatus::Cancelled(CancelReason::UserRequested),
                remaining_quantity: entry.remaining,
                symbol_seq: seq,
            },
            events,
        ))
    }

    /// Apply one journaled event during startup recovery.
    ///
    /// Events must arrive in `symbol_seq` order with no gaps; the book,
    /// locator, and both counters come out exactly as they were when
    /// the event was first produced.
    pub fn apply_replayed(&mut self, event: &EngineEvent) -> Result<(), EngineError> {
        let expected = self.last_symbol_seq + 1;
        if event.symbol_seq != expected {
            return Err(EngineError::InvariantViolation(format!(
                "replay gap: expected sequence {}, got {}",
                expected, event.symbol_seq
            )));
        }

        match &event.payload {
            EventPayload::OrderRested {
                order_id,
                side,
                price,
                remaining_quantity,
                accepted_seq,
                ..
            } => {
                self.book.rest_entry(
                    *side,
                    *price,
                    LevelEntry {
                        order_id: *order_id,
                        accepted_seq: *accepted_seq,
                        remaining: *remaining_quantity,
                    },
                )?;
                self.last_accept_seq = self.last_accept_seq.max(*accepted_seq);
            }
            EventPayload::TradeExecuted { trade } => {
                self.last_accept_seq = self
                    .last_accept_seq
                    .max(trade.maker_seq)
                    .max(trade.taker_seq);
                self.reduce_resting(&trade.maker_order_id(), trade.quantity)?;
            }
            EventPayload::OrderCancelled { order_id, .. } => {
                self.book.cancel(order_id).ok_or_else(|| {
                    EngineError::InvariantViolation(format!(
                        "replayed cancel of unknown order {}",
                        order_id
                    ))
                })?;
                self.recent_terminal.insert(*order_id);
            }
            EventPayload::OrderStatusChanged {
                order_id, status, ..
            } => {
                if status.is_terminal() {
                    self.recent_terminal.insert(*order_id);
                }
            }
        }

        self.last_symbol_seq = event.symbol_seq;
        Ok(())
    }

    /// Reduce a resting maker during replay. The maker must be at the
    /// head of its level because trades consume in FIFO order.
    fn reduce_resting(&mut self, order_id: &OrderId, quantity: Quantity) -> Result<(), EngineError> {
        let (side, price): (Side, Price) = self.book.locate(order_id).ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "replayed trade against unknown maker {}",
                order_id
            ))
        })?;

        let level = match side {
            Side::Buy => self.book.bids.level_mut(price),
            Side::Sell => self.book.asks.level_mut(price),
        };
        let maker_left = level
            .and_then(|level| {
                level.peek_front().filter(|head| head.order_id == *order_id)?;
                level.fill_front(quantity)
            })
            .ok_or_else(|| {
                EngineError::InvariantViolation(format!(
                    "replayed trade does not match the book head at {}",
                    price
                ))
            })?;

        if maker_left.is_zero() {
            self.book.unlink(order_id);
            self.recent_terminal.insert(*order_id);
            match side {
                Side::Buy => self.book.bids.drop_level_if_empty(price),
                Side::Sell => self.book.asks.drop_level_if_empty(price),
            }
        }
        Ok(())
    }
}
