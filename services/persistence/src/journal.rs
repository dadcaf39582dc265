//! Append-only per-symbol event journal
//!
//! One directory per symbol, holding length-prefixed binary frames in
//! rotated segment files. Each frame carries a CRC32C checksum so the
//! reader can detect corruption and stop at a torn tail after a crash.
//!
//! # Frame layout
//! ```text
//! [frame_len:   u32]   length of everything after this field
//! [symbol_seq:  u64]
//! [timestamp:   i64]
//! [payload_len: u32][payload: JSON-encoded EngineEvent]
//! [checksum:    u32]   CRC32C over symbol_seq ++ timestamp ++ payload
//! ```

use crc32c::crc32c;
use matching_engine::events::EngineEvent;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt frame: {0}")]
    Corrupt(String),
}

/// A single journaled frame.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub symbol_seq: u64,
    pub timestamp: i64,
    /// JSON-encoded `EngineEvent`.
    pub payload: Vec<u8>,
    pub checksum: u32,
}

impl JournalEntry {
    pub fn new(symbol_seq: u64, timestamp: i64, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(symbol_seq, timestamp, &payload);
        Self {
            symbol_seq,
            timestamp,
            payload,
            checksum,
        }
    }

    /// Build an entry from an engine event by serializing its envelope.
    pub fn from_event(event: &EngineEvent) -> Result<Self, JournalError> {
        let payload =
            serde_json::to_vec(event).map_err(|err| JournalError::Serialization(err.to_string()))?;
        Ok(Self::new(event.symbol_seq, event.timestamp, payload))
    }

    /// Decode the payload back into an engine event.
    pub fn to_event(&self) -> Result<EngineEvent, JournalError> {
        serde_json::from_slice(&self.payload)
            .map_err(|err| JournalError::Serialization(err.to_string()))
    }

    pub fn compute_checksum(symbol_seq: u64, timestamp: i64, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(16 + payload.len());
        buf.extend_from_slice(&symbol_seq.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.symbol_seq, self.timestamp, &self.payload)
    }

    /// Encode to the binary frame format.
    pub fn encode(&self) -> Vec<u8> {
        let payload_len = self.payload.len() as u32;
        // 8 (seq) + 8 (ts) + 4 (payload_len) + payload + 4 (crc)
        let frame_len: u32 = 8 + 8 + 4 + payload_len + 4;

        let mut buf = Vec::with_capacity(4 + frame_len as usize);
        buf.extend_from_slice(&frame_len.to_le_bytes());
        buf.extend_from_slice(&self.symbol_seq.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Decode one frame from the front of `data`.
    ///
    /// `Ok(None)` means the data ends mid-frame (a torn tail); the
    /// caller decides whether that is acceptable. A decoded frame that
    /// fails its checksum is an error, never silently skipped.
    pub fn decode(data: &[u8]) -> Result<Option<(Self, usize)>, JournalError> {
        if data.len() < 4 {
            return Ok(None);
        }
        let frame_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

        // 8 + 8 + 4 + 0 + 4 is the smallest possible frame
        if frame_len < 24 {
            return Err(JournalError::Corrupt(format!(
                "frame length {} below minimum",
                frame_len
            )));
        }
        if frame_len > 64 * 1024 * 1024 {
            return Err(JournalError::Corrupt(format!(
                "implausible frame length {}",
                frame_len
            )));
        }
        if data.len() < 4 + frame_len {
            return Ok(None);
        }

        let body = &data[4..4 + frame_len];
        let symbol_seq = u64::from_le_bytes(body[0..8].try_into().expect("sized slice"));
        let timestamp = i64::from_le_bytes(body[8..16].try_into().expect("sized slice"));
        let payload_len = u32::from_le_bytes(body[16..20].try_into().expect("sized slice")) as usize;

        if 20 + payload_len + 4 != frame_len {
            return Err(JournalError::Corrupt(format!(
                "payload length {} disagrees with frame length {}",
                payload_len, frame_len
            )));
        }

        let payload = body[20..20 + payload_len].to_vec();
        let checksum =
            u32::from_le_bytes(body[20 + payload_len..].try_into().expect("sized slice"));

        let entry = Self {
            symbol_seq,
            timestamp,
            payload,
            checksum,
        };
        if !entry.verify_checksum() {
            return Err(JournalError::Corrupt(format!(
                "checksum mismatch on frame seq {}",
                symbol_seq
            )));
        }
        Ok(Some((entry, 4 + frame_len)))
    }
}

/// Journal configuration shared by all symbols.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Root directory; one subdirectory is created per symbol.
    pub root_dir: PathBuf,
    /// Segment rotation threshold in bytes.
    pub max_segment_size: u64,
    /// Fsync after each committed batch. Turning this off trades
    /// durability of the last few commands for throughput.
    pub sync_on_commit: bool,
}

impl JournalConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            max_segment_size: 64 * 1024 * 1024,
            sync_on_commit: true,
        }
    }

    /// Directory holding one symbol's segments.
    pub fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.root_dir.join(sanitize_symbol(symbol))
    }
}

/// Filesystem-safe directory name for a symbol ("BTC/USDT" → "BTC_USDT").
pub fn sanitize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn segment_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("segment-{:06}.bin", index))
}

/// Sorted list of segment files in a symbol directory.
pub(crate) fn segment_files(dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
    let mut files = Vec::new();
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("segment-") && name.ends_with(".bin") {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Append-only writer for one symbol's event stream.
///
/// Idempotent on `symbol_seq`: frames at or below the last committed
/// sequence are skipped, so replaying a commit after a crash cannot
/// duplicate history.
pub struct SymbolJournal {
    dir: PathBuf,
    writer: BufWriter<File>,
    current_segment: PathBuf,
    current_size: u64,
    segment_index: u64,
    last_committed: u64,
    max_segment_size: u64,
    sync_on_commit: bool,
}

impl SymbolJournal {
    /// Open (or create) the journal for one symbol, recovering the
    /// committed watermark by scanning existing segments.
    pub fn open(config: &JournalConfig, symbol: &str) -> Result<Self, JournalError> {
        let dir = config.symbol_dir(symbol);
        fs::create_dir_all(&dir)?;

        let files = segment_files(&dir)?;
        let segment_index = files
            .last()
            .and_then(|path| {
                path.file_name()?
                    .to_string_lossy()
                    .trim_start_matches("segment-")
                    .trim_end_matches(".bin")
                    .parse::<u64>()
                    .ok()
            })
            .unwrap_or(0);

        let mut last_committed = 0;
        for path in &files {
            let data = fs::read(path)?;
            let mut pos = 0;
            while let Some((entry, consumed)) = JournalEntry::decode(&data[pos..])? {
                last_committed = last_committed.max(entry.symbol_seq);
                pos += consumed;
            }
        }

        let current_segment = segment_path(&dir, segment_index);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current_segment)?;
        let current_size = file.metadata()?.len();

        info!(
            symbol,
            last_committed,
            segments = files.len(),
            "journal opened"
        );

        Ok(Self {
            dir,
            writer: BufWriter::new(file),
            current_segment,
            current_size,
            segment_index,
            last_committed,
            max_segment_size: config.max_segment_size,
            sync_on_commit: config.sync_on_commit,
        })
    }

    /// Highest sequence durably committed, 0 when the journal is empty.
    pub fn last_committed(&self) -> u64 {
        self.last_committed
    }

    pub fn current_segment_path(&self) -> &Path {
        &self.current_segment
    }

    /// Append one command's events as a batch. Already-committed
    /// sequences are skipped; the batch is flushed (and fsynced per
    /// config) before returning. Returns the number of frames written.
    pub fn append_events(&mut self, events: &[EngineEvent]) -> Result<usize, JournalError> {
        let mut written = 0;
        for event in events {
            if event.symbol_seq <= self.last_committed {
                debug!(
                    symbol_seq = event.symbol_seq,
                    last_committed = self.last_committed,
                    "skipping already-committed frame"
                );
                continue;
            }

            if self.current_size >= self.max_segment_size {
                self.rotate()?;
            }

            let entry = JournalEntry::from_event(event)?;
            let bytes = entry.encode();
            self.writer.write_all(&bytes)?;
            self.current_size += bytes.len() as u64;
            self.last_committed = event.symbol_seq;
            written += 1;
        }

        if written > 0 {
            self.writer.flush()?;
            if self.sync_on_commit {
                self.writer.get_ref().sync_all()?;
            }
        }
        Ok(written)
    }

    /// Flush and fsync everything buffered.
    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        self.sync()?;
        self.segment_index += 1;
        self.current_segment = segment_path(&self.dir, self.segment_index);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_segment)?;
        self.writer = BufWriter::new(file);
        self.current_size = 0;
        debug!(segment = %self.current_segment.display(), "journal segment rotated");
        Ok(())
    }
}
