//! Engine registry
//!
//! Routes commands by symbol to the owning engine. Engines are created
//! on first reference; a mutex per engine serializes commands for one
//! symbol while different symbols run in parallel. Every command's
//! events are committed to the sink before the caller sees the result.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};
use types::errors::EngineError;
use types::ids::{OrderId, Symbol};
use types::order::OrderRequest;

use crate::book::BookSnapshot;
use crate::config::{EngineConfig, SinkFailurePolicy};
use crate::engine::{CancelReport, Command, CommandOutcome, SubmitReport, SymbolEngine};
use crate::sink::EventSink;

/// Current wall clock in Unix nanoseconds. Stamps are informational;
/// ordering always comes from sequence numbers.
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as i64)
        .unwrap_or(0)
}

pub struct EngineRegistry {
    engines: DashMap<String, Arc<Mutex<SymbolEngine>>>,
    config: EngineConfig,
    sink: Arc<dyn EventSink>,
}

impl EngineRegistry {
    pub fn new(config: EngineConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            engines: DashMap::new(),
            config,
            sink,
        }
    }

    /// Submit an order for matching. The report is returned only after
    /// the sink has accepted the command's events.
    pub fn submit(&self, symbol: &str, request: OrderRequest) -> Result<SubmitReport, EngineError> {
        match self.execute(symbol, Command::Submit(request))? {
            CommandOutcome::Submitted(report) => Ok(report),
            CommandOutcome::Cancelled(_) => Err(EngineError::InvariantViolation(
                "submit produced a cancel outcome".to_string(),
            )),
        }
    }

    /// Cancel a resting order.
    pub fn cancel(&self, symbol: &str, order_id: OrderId) -> Result<CancelReport, EngineError> {
        match self.execute(symbol, Command::Cancel(order_id))? {
            CommandOutcome::Cancelled(report) => Ok(report),
            CommandOutcome::Submitted(_) => Err(EngineError::InvariantViolation(
                "cancel produced a submit outcome".to_string(),
            )),
        }
    }

    /// Depth snapshot under the same per-symbol exclusion as commands.
    pub fn snapshot(&self, symbol: &str, depth: usize) -> BookSnapshot {
        let depth = self.config.clamp_depth(depth);
        let engine = self.engine(symbol);
        let engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
        engine.snapshot(depth)
    }

    /// Install a recovered engine, replacing any blank one created in
    /// the meantime. Used by startup replay.
    pub fn install(&self, engine: SymbolEngine) {
        let symbol = engine.symbol().as_str().to_string();
        info!(symbol = %symbol, last_seq = engine.last_symbol_seq(), "engine installed from replay");
        self.engines.insert(symbol, Arc::new(Mutex::new(engine)));
    }

    fn engine(&self, symbol: &str) -> Arc<Mutex<SymbolEngine>> {
        self.engines
            .entry(symbol.to_string())
            .or_insert_with(|| {
                info!(%symbol, "creating engine on first reference");
                Arc::new(Mutex::new(SymbolEngine::new(
                    Symbol::new(symbol),
                    self.config.rules_for(symbol),
                )))
            })
            .clone()
    }

    fn execute(&self, symbol: &str, command: Command) -> Result<CommandOutcome, EngineError> {
        let engine = self.engine(symbol);
        let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);

        let checkpoint = matches!(self.config.sink_failure_policy, SinkFailurePolicy::Rollback)
            .then(|| engine.checkpoint());

        let timestamp = now_nanos();
        let (outcome, events) = engine.process(command, timestamp)?;

        if let (Some(first), Some(last)) = (events.first(), events.last()) {
            let seq_range = (first.symbol_seq, last.symbol_seq);
            if let Err(sink_err) =
                self.sink
                    .commit(engine.symbol(), outcome.order_id(), seq_range, &events)
            {
                match self.config.sink_failure_policy {
                    SinkFailurePolicy::Rollback => {
                        if let Some(checkpoint) = checkpoint {
                            engine.restore(checkpoint);
                        }
                        warn!(%symbol, error = %sink_err, "sink refused commit, command rolled back");
                    }
                    SinkFailurePolicy::HaltSymbol => {
                        engine.halt();
                        error!(%symbol, error = %sink_err, "sink refused commit, symbol halted");
                    }
                }
                return Err(EngineError::SinkUnavailable(sink_err.to_string()));
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, SinkError};
    use crate::events::EngineEvent;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use types::numeric::{Price, Quantity};
    use types::order::{OrderStatus, Side};

    /// Sink that can be switched into a failing state.
    struct FlakySink {
        inner: MemorySink,
        failing: AtomicBool,
    }

    impl FlakySink {
        fn new() -> Self {
            Self {
                inner: MemorySink::new(),
                failing: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl EventSink for FlakySink {
        fn commit(
            &self,
            symbol: &Symbol,
            command_id: OrderId,
            seq_range: (u64, u64),
            events: &[EngineEvent],
        ) -> Result<(), SinkError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SinkError::Unavailable("injected failure".to_string()));
            }
            self.inner.commit(symbol, command_id, seq_range, events)
        }
    }

    fn buy(price: u64, quantity: &str) -> OrderRequest {
        OrderRequest::limit(
            "trader",
            "BTC/USDT",
            Side::Buy,
            Price::from_u64(price),
            Quantity::from_str(quantity).unwrap(),
        )
    }

    fn sell(price: u64, quantity: &str) -> OrderRequest {
        OrderRequest::limit(
            "trader",
            "BTC/USDT",
            Side::Sell,
            Price::from_u64(price),
            Quantity::from_str(quantity).unwrap(),
        )
    }

    #[test]
    fn test_submit_commits_before_ack() {
        let sink = Arc::new(MemorySink::new());
        let registry = EngineRegistry::new(EngineConfig::default(), sink.clone());

        let report = registry.submit("BTC/USDT", buy(100, "10")).unwrap();
        assert_eq!(report.status, OrderStatus::Active);
        assert_eq!(sink.last_committed("BTC/USDT"), report.symbol_seq);
    }

    #[test]
    fn test_symbols_are_isolated() {
        let sink = Arc::new(MemorySink::new());
        let registry = EngineRegistry::new(EngineConfig::default(), sink);

        registry.submit("BTC/USDT", buy(100, "10")).unwrap();
        let other = OrderRequest::limit(
            "trader",
            "ETH/USDC",
            Side::Sell,
            Price::from_u64(100),
            Quantity::from_u64(1),
        );
        registry.submit("ETH/USDC", other).unwrap();

        // The crossing prices live on different books: no trade
        let btc = registry.snapshot("BTC/USDT", 10);
        let eth = registry.snapshot("ETH/USDC", 10);
        assert_eq!(btc.bids.len(), 1);
        assert!(btc.asks.is_empty());
        assert_eq!(eth.asks.len(), 1);
        assert!(eth.bids.is_empty());
    }

    #[test]
    fn test_snapshot_depth_clamped() {
        let config = EngineConfig {
            max_book_depth_snapshot: 2,
            ..EngineConfig::default()
        };
        let registry = EngineRegistry::new(config, Arc::new(MemorySink::new()));

        for price in [98, 99, 100] {
            registry.submit("BTC/USDT", buy(price, "1")).unwrap();
        }
        let snapshot = registry.snapshot("BTC/USDT", 100);
        assert_eq!(snapshot.bids.len(), 2);
        assert_eq!(snapshot.bids[0].price, Price::from_u64(100));
    }

    #[test]
    fn test_sink_failure_halts_symbol() {
        let sink = Arc::new(FlakySink::new());
        let registry = EngineRegistry::new(EngineConfig::default(), sink.clone());

        registry.submit("BTC/USDT", buy(100, "10")).unwrap();

        sink.set_failing(true);
        let result = registry.submit("BTC/USDT", sell(100, "5"));
        assert!(matches!(result, Err(EngineError::SinkUnavailable(_))));

        // Halted even after the sink recovers
        sink.set_failing(false);
        let result = registry.submit("BTC/USDT", sell(100, "5"));
        assert!(matches!(result, Err(EngineError::SymbolHalted { .. })));

        // Other symbols unaffected
        let other = OrderRequest::limit(
            "trader",
            "ETH/USDC",
            Side::Buy,
            Price::from_u64(10),
            Quantity::from_u64(1),
        );
        assert!(registry.submit("ETH/USDC", other).is_ok());
    }

    #[test]
    fn test_sink_failure_rollback_restores_book() {
        let config = EngineConfig {
            sink_failure_policy: SinkFailurePolicy::Rollback,
            ..EngineConfig::default()
        };
        let sink = Arc::new(FlakySink::new());
        let registry = EngineRegistry::new(config, sink.clone());

        registry.submit("BTC/USDT", buy(100, "10")).unwrap();
        let before = registry.snapshot("BTC/USDT", 10);

        sink.set_failing(true);
        let result = registry.submit("BTC/USDT", sell(100, "5"));
        assert!(matches!(result, Err(EngineError::SinkUnavailable(_))));

        // Book and counters unchanged; symbol still accepts commands
        let after = registry.snapshot("BTC/USDT", 10);
        assert_eq!(before, after);

        sink.set_failing(false);
        let report = registry.submit("BTC/USDT", sell(100, "5")).unwrap();
        assert_eq!(report.status, OrderStatus::Filled);
    }

    #[test]
    fn test_cancel_roundtrip() {
        let registry = EngineRegistry::new(EngineConfig::default(), Arc::new(MemorySink::new()));
        let report = registry.submit("BTC/USDT", buy(100, "10")).unwrap();

        let cancel = registry.cancel("BTC/USDT", report.order_id).unwrap();
        assert_eq!(cancel.remaining_quantity, Quantity::from_str("10").unwrap());
        assert!(registry.snapshot("BTC/USDT", 10).bids.is_empty());

        let again = registry.cancel("BTC/USDT", report.order_id);
        assert!(matches!(again, Err(EngineError::NotCancellable { .. })));
    }

    #[test]
    fn test_parallel_symbols() {
        let registry = Arc::new(EngineRegistry::new(
            EngineConfig::default(),
            Arc::new(MemorySink::new()),
        ));

        let handles: Vec<_> = ["AAA/USD", "BBB/USD", "CCC/USD", "DDD/USD"]
            .into_iter()
            .map(|symbol| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..50u64 {
                        let request = OrderRequest::limit(
                            "trader",
                            symbol,
                            if i % 2 == 0 { Side::Buy } else { Side::Sell },
                            Price::from_u64(100 + (i % 3)),
                            Quantity::from_u64(1),
                        );
                        registry.submit(symbol, request).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for symbol in ["AAA/USD", "BBB/USD", "CCC/USD", "DDD/USD"] {
            let snapshot = registry.snapshot(symbol, 10);
            // Commands were serialized per symbol; the book is intact
            if let (Some(bid), Some(ask)) = (snapshot.bids.first(), snapshot.asks.first()) {
                assert!(bid.price < ask.price);
            }
        }
    }
}
