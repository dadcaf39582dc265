//! Error taxonomy for the matching system

use crate::order::RejectReason;
use thiserror::Error;

/// Errors surfaced by the engine and registry.
///
/// `InvalidOrder`, `NotFound`, and `NotCancellable` are recovered at the
/// command boundary with no state change. `InvariantViolation` always
/// indicates a bug; the affected symbol stops accepting commands.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid order: {0}")]
    InvalidOrder(RejectReason),

    #[error("order not found: {order_id}")]
    NotFound { order_id: String },

    #[error("order already terminal: {order_id}")]
    NotCancellable { order_id: String },

    #[error("book invariant violated: {0}")]
    InvariantViolation(String),

    #[error("durability sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("symbol halted after sink failure: {symbol}")]
    SymbolHalted { symbol: String },
}
