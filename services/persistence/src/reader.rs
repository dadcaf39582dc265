//! Sequential journal reader
//!
//! Walks a symbol's segment files in order, verifying every frame's
//! checksum. A torn tail at the end of the final segment (a crash mid
//! write) truncates the stream gracefully; torn data anywhere else is
//! corruption and aborts the read.

use crate::journal::{segment_files, JournalEntry, JournalError};
use matching_engine::events::EngineEvent;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("corruption in {segment}: {detail}")]
    Corruption { segment: String, detail: String },

    #[error("sequence gap in {segment}: expected {expected}, got {got}")]
    SequenceGap {
        segment: String,
        expected: u64,
        got: u64,
    },
}

/// Reads one symbol directory's frames in sequence order.
pub struct JournalReader {
    segments: Vec<PathBuf>,
    segment_index: usize,
    buffer: Vec<u8>,
    position: usize,
    last_seq: u64,
}

impl JournalReader {
    /// Open a reader over a symbol directory. A missing directory reads
    /// as an empty stream.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let segments = segment_files(dir.as_ref())?;
        Ok(Self {
            segments,
            segment_index: 0,
            buffer: Vec::new(),
            position: 0,
            last_seq: 0,
        })
    }

    /// Next frame, or `None` at end of stream. Enforces strictly
    /// monotonic, gap-free sequences across segment boundaries.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>, ReaderError> {
        loop {
            if self.position >= self.buffer.len() {
                if !self.advance_segment()? {
                    return Ok(None);
                }
            }

            let segment = self.current_segment_name();
            match JournalEntry::decode(&self.buffer[self.position..]) {
                Ok(Some((entry, consumed))) => {
                    self.position += consumed;
                    if self.last_seq > 0 && entry.symbol_seq != self.last_seq + 1 {
                        return Err(ReaderError::SequenceGap {
                            segment,
                            expected: self.last_seq + 1,
                            got: entry.symbol_seq,
                        });
                    }
                    self.last_seq = entry.symbol_seq;
                    return Ok(Some(entry));
                }
                Ok(None) => {
                    // Partial frame. Acceptable only at the very tail of
                    // the last segment (crash mid-append).
                    let is_last = self.segment_index >= self.segments.len();
                    if is_last {
                        warn!(
                            segment,
                            trailing_bytes = self.buffer.len() - self.position,
                            "torn tail truncated"
                        );
                        self.position = self.buffer.len();
                        return Ok(None);
                    }
                    return Err(ReaderError::Corruption {
                        segment,
                        detail: "partial frame before end of stream".to_string(),
                    });
                }
                Err(err) => {
                    return Err(ReaderError::Corruption {
                        segment,
                        detail: err.to_string(),
                    });
                }
            }
        }
    }

    /// Drain the stream into decoded engine events.
    pub fn read_events(&mut self) -> Result<Vec<EngineEvent>, ReaderError> {
        let mut events = Vec::new();
        while let Some(entry) = self.next_entry()? {
            events.push(entry.to_event()?);
        }
        Ok(events)
    }

    fn advance_segment(&mut self) -> Result<bool, ReaderError> {
        while self.segment_index < self.segments.len() {
            let path = &self.segments[self.segment_index];
            self.segment_index += 1;
            let data = fs::read(path)?;
            if !data.is_empty() {
                self.buffer = data;
                self.position = 0;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn current_segment_name(&self) -> String {
        self.segments
            .get(self.segment_index.saturating_sub(1))
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    }
}
