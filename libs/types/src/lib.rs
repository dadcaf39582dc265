//! Shared domain types for the order matching system
//!
//! Identifiers, exact-decimal numerics, the order lifecycle model, trade
//! records, and the error taxonomy used across the engine, persistence,
//! and market data crates.

pub mod errors;
pub mod ids;
pub mod numeric;
pub mod order;
pub mod trade;
