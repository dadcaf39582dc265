//! Startup replay
//!
//! Rebuilds each symbol's in-memory book by applying its journaled
//! event stream in order. The engine comes back with the same resting
//! orders, locator, and counters it had when the last command was
//! acknowledged; replaying any prefix of the stream is deterministic.

use matching_engine::config::SymbolRules;
use matching_engine::engine::SymbolEngine;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};
use types::errors::EngineError;

use crate::journal::JournalConfig;
use crate::reader::{JournalReader, ReaderError};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("journal error: {0}")]
    Journal(#[from] crate::journal::JournalError),

    #[error("engine refused replayed event: {0}")]
    Engine(#[from] EngineError),

    #[error("journal directory {0} holds no events")]
    EmptyStream(String),
}

/// Summary of one symbol's recovery.
#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub symbol: String,
    pub events_applied: u64,
    pub last_symbol_seq: u64,
    pub resting_orders: usize,
}

/// Rebuild one symbol's engine from a journal directory.
///
/// The symbol identity comes from the event envelopes themselves, so a
/// directory name mangled for the filesystem never needs reversing.
pub fn replay_dir(dir: &Path, rules: SymbolRules) -> Result<(SymbolEngine, ReplayReport), ReplayError> {
    let mut reader = JournalReader::open(dir)?;
    let events = reader.read_events()?;

    let first = events
        .first()
        .ok_or_else(|| ReplayError::EmptyStream(dir.display().to_string()))?;
    let symbol = first.symbol.clone();

    let mut engine = SymbolEngine::new(symbol.clone(), rules);
    for event in &events {
        engine.apply_replayed(event)?;
    }
    engine.book().check_invariants()?;

    let report = ReplayReport {
        symbol: symbol.as_str().to_string(),
        events_applied: events.len() as u64,
        last_symbol_seq: engine.last_symbol_seq(),
        resting_orders: engine.book().resting_orders(),
    };
    info!(
        symbol = %report.symbol,
        events = report.events_applied,
        last_seq = report.last_symbol_seq,
        resting = report.resting_orders,
        "symbol replayed"
    );
    Ok((engine, report))
}

/// Rebuild every symbol found under the journal root.
///
/// Symbol directories with no decodable events are skipped with a
/// warning; a fresh engine will be created on first reference instead.
pub fn replay_all(
    config: &JournalConfig,
    rules_for: impl Fn(&str) -> SymbolRules,
) -> Result<Vec<(SymbolEngine, ReplayReport)>, ReplayError> {
    let mut recovered = Vec::new();
    if !config.root_dir.exists() {
        return Ok(recovered);
    }

    let mut dirs: Vec<_> = fs::read_dir(&config.root_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.path())
        .collect();
    dirs.sort();

    for dir in dirs {
        // Rules need the real symbol, which only the stream knows; peek
        // at the first frame before replaying with the right rules.
        let mut reader = JournalReader::open(&dir)?;
        let Some(first) = reader.next_entry()? else {
            warn!(path = %dir.display(), "skipping empty journal directory");
            continue;
        };
        let symbol = first.to_event()?.symbol;

        let (engine, report) = replay_dir(&dir, rules_for(symbol.as_str()))?;
        recovered.push((engine, report));
    }
    Ok(recovered)
}
