//! Durability for the matching engine
//!
//! Append-only per-symbol journals with checksums, a sequential reader
//! that tolerates torn tails, an `EventSink` implementation committing
//! atomically per command, and startup replay that rebuilds each
//! symbol's book from its journaled event stream.
//!
//! The core keeps no other on-disk state: the journal is the whole
//! durable story, and replaying any committed prefix is deterministic.

pub mod journal;
pub mod reader;
pub mod replay;
pub mod sink;

pub use journal::{JournalConfig, JournalEntry, JournalError, SymbolJournal};
pub use reader::{JournalReader, ReaderError};
pub use replay::{replay_all, replay_dir, ReplayError, ReplayReport};
pub use sink::JournalSink;
