//! Journal-backed durability sink
//!
//! Implements the engine's `EventSink` over per-symbol journals. A
//! commit is atomic per command: either every new frame in the batch is
//! flushed or the commit reports failure and the registry reacts per
//! its sink-failure policy.

use matching_engine::events::EngineEvent;
use matching_engine::sink::{EventSink, SinkError};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;
use types::ids::{OrderId, Symbol};

use crate::journal::{JournalConfig, SymbolJournal};

pub struct JournalSink {
    config: JournalConfig,
    journals: Mutex<HashMap<String, SymbolJournal>>,
}

impl JournalSink {
    pub fn new(config: JournalConfig) -> Self {
        Self {
            config,
            journals: Mutex::new(HashMap::new()),
        }
    }

    /// Highest sequence durably committed for a symbol, 0 when none.
    pub fn last_committed(&self, symbol: &str) -> u64 {
        let mut journals = self
            .journals
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match Self::journal_for(&self.config, &mut journals, symbol) {
            Ok(journal) => journal.last_committed(),
            Err(_) => 0,
        }
    }

    fn journal_for<'a>(
        config: &JournalConfig,
        journals: &'a mut HashMap<String, SymbolJournal>,
        symbol: &str,
    ) -> Result<&'a mut SymbolJournal, SinkError> {
        if !journals.contains_key(symbol) {
            let journal = SymbolJournal::open(config, symbol)
                .map_err(|err| SinkError::Unavailable(err.to_string()))?;
            journals.insert(symbol.to_string(), journal);
        }
        journals
            .get_mut(symbol)
            .ok_or_else(|| SinkError::Unavailable("journal map inconsistent".to_string()))
    }
}

impl EventSink for JournalSink {
    fn commit(
        &self,
        symbol: &Symbol,
        command_id: OrderId,
        seq_range: (u64, u64),
        events: &[EngineEvent],
    ) -> Result<(), SinkError> {
        let mut journals = self
            .journals
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let journal = Self::journal_for(&self.config, &mut journals, symbol.as_str())?;

        let written = journal
            .append_events(events)
            .map_err(|err| SinkError::Unavailable(err.to_string()))?;
        debug!(
            symbol = %symbol,
            command_id = %command_id,
            from_seq = seq_range.0,
            to_seq = seq_range.1,
            written,
            "command committed to journal"
        );
        Ok(())
    }
}
