//! Binary log of every frame exchanged with the controller.
//!
//! One record per frame: kind tag, wall-clock timestamp in microseconds and
//! the raw frame bytes.  Records are `postcard` encoded and COBS framed, so
//! a zero byte separates them and a truncated tail only loses one record.
//! The writer is flushed every [`SYNC_EVERY`] records.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::protocol::AXIS_STATUS_FRAME_LEN;

/// Records written between two flushes.
pub const SYNC_EVERY: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    /// 41-byte status reply.
    Status,
    /// 21-byte `XXR` request.
    XRequest,
    /// 34-byte `YXR` request.
    YRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub kind: FrameKind,
    pub timestamp_us: u64,
    pub payload: heapless::Vec<u8, AXIS_STATUS_FRAME_LEN>,
}

pub struct FrameLog {
    out: Box<dyn Write + Send>,
    since_sync: u32,
    written: u64,
}

impl FrameLog {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            since_sync: 0,
            written: 0,
        }
    }

    /// Append to (or create) the log file at `path`.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        debug!("logging frames to {}", path.display());
        Ok(Self::new(Box::new(file)))
    }

    /// Append one frame.  Frames longer than a status frame are truncated.
    pub fn record(&mut self, kind: FrameKind, frame: &[u8]) -> std::io::Result<()> {
        let timestamp_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        let len = frame.len().min(AXIS_STATUS_FRAME_LEN);
        let mut payload = heapless::Vec::new();
        let _ = payload.extend_from_slice(&frame[..len]);

        let record = FrameRecord {
            kind,
            timestamp_us,
            payload,
        };
        let bytes = postcard::to_allocvec_cobs(&record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        self.out.write_all(&bytes)?;
        self.written += 1;

        self.since_sync += 1;
        if self.since_sync >= SYNC_EVERY {
            self.out.flush()?;
            self.since_sync = 0;
        }
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.written
    }

    /// Flush whatever is buffered.
    pub fn finish(&mut self) -> std::io::Result<()> {
        self.since_sync = 0;
        self.out.flush()
    }

    /// Parse a complete log back into records.  Corrupted records are
    /// skipped with a warning.
    pub fn decode_all(bytes: &[u8]) -> Vec<FrameRecord> {
        let mut records = Vec::new();
        for chunk in bytes.split(|b| *b == 0).filter(|c| !c.is_empty()) {
            let mut buf = chunk.to_vec();
            buf.push(0);
            match postcard::from_bytes_cobs::<FrameRecord>(&mut buf) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping corrupted frame record: {e}"),
            }
        }
        records
    }
}

impl Drop for FrameLog {
    fn drop(&mut self) {
        let _ = self.out.flush();
    }
}
