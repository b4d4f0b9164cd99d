use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::model::{Booking, BookingStatus};
use crate::store::{BookingStore, StoreError};

/// One durable record: a confirmed booking or a cancellation of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEntry {
    Booked(Booking),
    Cancelled {
        participant_id: String,
        reason: String,
        at: NaiveDateTime,
    },
}

/// Encode a single entry to `[len][bincode][crc32]` format.
fn encode_entry(writer: &mut impl Write, entry: &LedgerEntry) -> io::Result<()> {
    let payload =
        bincode::serialize(entry).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Append-only booking ledger.
///
/// Format per entry: `[u32: len][bincode: LedgerEntry][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - A truncated last entry (crash) is safely discarded via length-prefix +
///   CRC check on replay.
pub struct Ledger {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl Ledger {
    /// Open (or create) the ledger file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Append one entry and fsync before returning.
    pub fn append(&mut self, entry: &LedgerEntry) -> io::Result<()> {
        encode_entry(&mut self.writer, entry)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replay the ledger from disk, returning all valid entries.
    /// Truncated/corrupt trailing entries are silently discarded.
    pub fn replay(path: &Path) -> io::Result<Vec<LedgerEntry>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut payload = vec![0u8; len];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }
            let stored_crc = u32::from_le_bytes(crc_buf);
            if stored_crc != crc32fast::hash(&payload) {
                // Corrupt entry — stop replaying
                break;
            }

            match bincode::deserialize::<LedgerEntry>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(_) => break, // corrupt payload
            }
        }

        Ok(entries)
    }
}

/// Apply one replayed entry to the in-memory row set.
fn apply_entry(rows: &mut Vec<Booking>, entry: LedgerEntry) {
    match entry {
        LedgerEntry::Booked(booking) => rows.push(booking),
        LedgerEntry::Cancelled {
            participant_id,
            reason,
            at,
        } => {
            if let Some(row) = rows
                .iter_mut()
                .find(|b| b.is_active() && b.participant_id == participant_id)
            {
                row.cancel(&reason, at);
            }
        }
    }
}

/// `BookingStore` backed by the append-only ledger. State is replayed into
/// memory on open; every commit appends one entry and fsyncs before the row
/// set is updated.
pub struct LedgerStore {
    rows: RwLock<Vec<Booking>>,
    ledger: Mutex<Ledger>,
}

impl LedgerStore {
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut rows = Vec::new();
        for entry in Ledger::replay(path)? {
            apply_entry(&mut rows, entry);
        }
        Ok(Self {
            rows: RwLock::new(rows),
            ledger: Mutex::new(Ledger::open(path)?),
        })
    }
}

#[async_trait]
impl BookingStore for LedgerStore {
    async fn read_all(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.rows.read().await.clone())
    }

    async fn append(&self, booking: Booking) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if booking.is_active()
            && rows
                .iter()
                .any(|b| b.is_active() && b.participant_id == booking.participant_id)
        {
            return Err(StoreError::Conflict(format!(
                "participant {} already has an active record",
                booking.participant_id
            )));
        }
        self.ledger
            .lock()
            .await
            .append(&LedgerEntry::Booked(booking.clone()))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        rows.push(booking);
        Ok(())
    }

    async fn update_status(
        &self,
        participant_id: &str,
        status: BookingStatus,
        reason: &str,
        at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        if status != BookingStatus::Cancelled {
            return Err(StoreError::Conflict(
                "only the Active → Cancelled transition is recorded".into(),
            ));
        }
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|b| b.is_active() && b.participant_id == participant_id)
            .ok_or_else(|| StoreError::NotFound(participant_id.to_string()))?;
        self.ledger
            .lock()
            .await
            .append(&LedgerEntry::Cancelled {
                participant_id: participant_id.to_string(),
                reason: reason.to_string(),
                at,
            })
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        row.cancel(reason, at);
        Ok(())
    }
}
