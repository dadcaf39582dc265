//! Order matching engine
//!
//! Continuous double-auction matching with price-time priority over
//! per-symbol in-memory books.
//!
//! **Guarantees:**
//! - Deterministic matching: same state + same command → same trades
//! - Strict price-time priority; execution at the maker's price
//! - Gap-free per-symbol event sequencing
//! - Events are committed to the durability sink before a command is
//!   acknowledged; the book is the source of truth during a command

pub mod book;
pub mod config;
pub mod engine;
pub mod events;
pub mod matching;
pub mod registry;
pub mod sink;

pub use book::BookSnapshot;
pub use config::{EngineConfig, SinkFailurePolicy, SymbolRules};
pub use engine::{CancelReport, Command, CommandOutcome, SubmitReport, SymbolEngine};
pub use events::{EngineEvent, EventPayload};
pub use registry::EngineRegistry;
pub use sink::{EventSink, MemorySink, MultiSink, SinkError};
