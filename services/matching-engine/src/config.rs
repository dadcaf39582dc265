//! Engine configuration
//!
//! Per-symbol price and quantity quanta, snapshot depth bounds, MARKET
//! order policy, and the reaction to durability-sink failures. Symbols
//! absent from the quantum maps get no tick/lot constraint beyond
//! positivity.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

/// How the registry reacts when the durability sink refuses a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SinkFailurePolicy {
    /// Stop accepting commands for the symbol. The default: once events
    /// may have been observed, rolling them back is not possible.
    HaltSymbol,
    /// Restore the pre-command book and counters, then fail the command.
    Rollback,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Price quantum per symbol; off-tick prices are rejected.
    pub tick_size_per_symbol: HashMap<String, Decimal>,
    /// Quantity quantum per symbol; off-lot quantities are rejected.
    pub lot_size_per_symbol: HashMap<String, Decimal>,
    /// Upper bound on the depth a snapshot request may ask for.
    pub max_book_depth_snapshot: usize,
    pub accept_market_orders: bool,
    pub sink_failure_policy: SinkFailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_size_per_symbol: HashMap::new(),
            lot_size_per_symbol: HashMap::new(),
            max_book_depth_snapshot: 50,
            accept_market_orders: true,
            sink_failure_policy: SinkFailurePolicy::HaltSymbol,
        }
    }
}

impl EngineConfig {
    /// Resolve the validation rules for one symbol.
    pub fn rules_for(&self, symbol: &str) -> SymbolRules {
        SymbolRules {
            tick_size: self.tick_size_per_symbol.get(symbol).copied(),
            lot_size: self.lot_size_per_symbol.get(symbol).copied(),
            accept_market_orders: self.accept_market_orders,
        }
    }

    /// Clamp a requested snapshot depth to the configured maximum.
    pub fn clamp_depth(&self, depth: usize) -> usize {
        depth.min(self.max_book_depth_snapshot)
    }
}

/// Validation rules for a single symbol's engine.
#[derive(Debug, Clone, Default)]
pub struct SymbolRules {
    pub tick_size: Option<Decimal>,
    pub lot_size: Option<Decimal>,
    pub accept_market_orders: bool,
}

impl SymbolRules {
    /// Rules with no quanta and MARKET orders allowed.
    pub fn permissive() -> Self {
        Self {
            tick_size: None,
            lot_size: None,
            accept_market_orders: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.accept_market_orders);
        assert_eq!(config.max_book_depth_snapshot, 50);
        assert_eq!(config.sink_failure_policy, SinkFailurePolicy::HaltSymbol);
    }

    #[test]
    fn test_rules_for_configured_symbol() {
        let mut config = EngineConfig::default();
        config
            .tick_size_per_symbol
            .insert("BTC/USDT".to_string(), Decimal::from_str("0.01").unwrap());
        config
            .lot_size_per_symbol
            .insert("BTC/USDT".to_string(), Decimal::from_str("0.001").unwrap());

        let rules = config.rules_for("BTC/USDT");
        assert_eq!(rules.tick_size, Some(Decimal::from_str("0.01").unwrap()));
        assert_eq!(rules.lot_size, Some(Decimal::from_str("0.001").unwrap()));

        let unconstrained = config.rules_for("ETH/USDC");
        assert!(unconstrained.tick_size.is_none());
        assert!(unconstrained.lot_size.is_none());
    }

    #[test]
    fn test_clamp_depth() {
        let config = EngineConfig::default();
        assert_eq!(config.clamp_depth(10), 10);
        assert_eq!(config.clamp_depth(500), 50);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let json = r#"{
            "tick_size_per_symbol": {"BTC/USDT": "0.5"},
            "accept_market_orders": false,
            "sink_failure_policy": "ROLLBACK"
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert!(!config.accept_market_orders);
        assert_eq!(config.sink_failure_policy, SinkFailurePolicy::Rollback);
        assert_eq!(config.max_book_depth_snapshot, 50);
        assert_eq!(
            config.tick_size_per_symbol.get("BTC/USDT"),
            Some(&Decimal::from_str("0.5").unwrap())
        );
    }
}
