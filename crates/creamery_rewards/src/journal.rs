//! # Claim Journal
//!
//! **Crash-Safe Persistence for Configuration and Claims**
//!
//! Every state change goes through the journal before it is acknowledged:
//! rarity table updates, reward catalog updates, and recorded claims. On
//! restart the journal is replayed:
//! - Committed transactions: returned in commit order for replay
//! - Uncommitted or rolled-back transactions: discarded
//! - A torn or corrupt tail: cut off at the last good record
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "CRMJ"]
//! [4 bytes: version]
//! [8 bytes: base LSN]
//!
//! Record format:
//! [8 bytes: LSN]
//! [1 byte: record type (BEGIN/OP/COMMIT/ROLLBACK)]
//! [4 bytes: payload length]
//! [N bytes: payload]
//! [4 bytes: CRC32 of above]
//! ```
//!
//! BEGIN carries no payload; its LSN is the transaction id. OP, COMMIT and
//! ROLLBACK payloads start with the 8-byte transaction id they belong to.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::{ItemId, RewardType};
use crate::collaborators::{AccountId, Timestamp};
use crate::error::{RewardError, RewardResult};
use crate::rarity::{RarityRolls, RarityTier};

/// Magic bytes identifying a journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"CRMJ";

/// Current journal format version.
const JOURNAL_VERSION: u32 = 1;

/// Header size in bytes.
const HEADER_LEN: u64 = 16;

/// Fixed bytes of a record around its payload: LSN, type, length, CRC.
const RECORD_OVERHEAD: usize = 8 + 1 + 4 + 4;

/// Largest payload accepted on read. Anything bigger is corruption.
const MAX_PAYLOAD_LEN: u32 = 1 << 20;

/// Journal record types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Begin a new transaction.
    Begin = 1,
    /// An operation within a transaction.
    Operation = 2,
    /// Commit the transaction (durable).
    Commit = 3,
    /// Rollback the transaction.
    Rollback = 4,
}

impl RecordType {
    /// Converts from u8.
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Begin),
            2 => Some(Self::Operation),
            3 => Some(Self::Commit),
            4 => Some(Self::Rollback),
            _ => None,
        }
    }
}

/// A journaled state change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalOp {
    /// The rarity table was replaced.
    RarityRollsSet {
        /// New thresholds.
        rolls: RarityRolls,
    },
    /// One catalog slot was replaced.
    RewardSet {
        /// Slot reward type.
        reward_type: RewardType,
        /// Slot tier.
        tier: RarityTier,
        /// Inclusive lower bound.
        min: u128,
        /// Inclusive upper bound.
        max: u128,
        /// Candidate item ids.
        item_ids: Vec<ItemId>,
    },
    /// An account claimed.
    ClaimRecorded {
        /// Claiming account.
        account: AccountId,
        /// Claim time.
        timestamp: Timestamp,
    },
    /// A recorded claim was undone because its payout was refused.
    ClaimReverted {
        /// Claiming account.
        account: AccountId,
        /// Last claim before the reverted one, if any.
        previous: Option<Timestamp>,
    },
}

impl JournalOp {
    /// Serializes the operation to bytes.
    fn serialize(&self, buf: &mut Vec<u8>) {
        match self {
            Self::RarityRollsSet { rolls } => {
                buf.push(1); // Type tag
                for value in [
                    rolls.common,
                    rolls.uncommon,
                    rolls.rare,
                    rolls.epic,
                    rolls.legendary,
                    rolls.max,
                ] {
                    buf.extend_from_slice(&value.to_le_bytes());
                }
            }
            Self::RewardSet {
                reward_type,
                tier,
                min,
                max,
                item_ids,
            } => {
                buf.push(2);
                buf.push(*reward_type as u8);
                buf.push(*tier as u8);
                buf.extend_from_slice(&min.to_le_bytes());
                buf.extend_from_slice(&max.to_le_bytes());
                buf.extend_from_slice(&(item_ids.len() as u32).to_le_bytes());
                for id in item_ids {
                    buf.extend_from_slice(&id.to_le_bytes());
                }
            }
            Self::ClaimRecorded { account, timestamp } => {
                buf.push(3);
                buf.extend_from_slice(&account.to_le_bytes());
                buf.extend_from_slice(&timestamp.to_le_bytes());
            }
            Self::ClaimReverted { account, previous } => {
                buf.push(4);
                buf.extend_from_slice(&account.to_le_bytes());
                match previous {
                    Some(timestamp) => {
                        buf.push(1);
                        buf.extend_from_slice(&timestamp.to_le_bytes());
                    }
                    None => buf.push(0),
                }
            }
        }
    }

    /// Deserializes an operation from bytes.
    fn deserialize(data: &[u8]) -> Option<Self> {
        let mut cursor = Cursor { data };
        let op = match cursor.u8()? {
            1 => Self::RarityRollsSet {
                rolls: RarityRolls::new(
                    cursor.u64()?,
                    cursor.u64()?,
                    cursor.u64()?,
                    cursor.u64()?,
                    cursor.u64()?,
                    cursor.u64()?,
                ),
            },
            2 => {
                let reward_type = RewardType::from_u8(cursor.u8()?)?;
                let tier = RarityTier::from_u8(cursor.u8()?)?;
                let min = cursor.u128()?;
                let max = cursor.u128()?;
                let len = cursor.u32()? as usize;
                if cursor.data.len() != len.checked_mul(4)? {
                    return None;
                }
                let mut item_ids = Vec::with_capacity(len);
                for _ in 0..len {
                    item_ids.push(cursor.u32()?);
                }
                Self::RewardSet {
                    reward_type,
                    tier,
                    min,
                    max,
                    item_ids,
                }
            }
            3 => Self::ClaimRecorded {
                account: cursor.u64()?,
                timestamp: cursor.u64()?,
            },
            4 => Self::ClaimReverted {
                account: cursor.u64()?,
                previous: match cursor.u8()? {
                    0 => None,
                    1 => Some(cursor.u64()?),
                    _ => return None,
                },
            },
            _ => return None,
        };
        cursor.data.is_empty().then_some(op)
    }
}

/// Little-endian reader over a payload.
struct Cursor<'a> {
    data: &'a [u8],
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.data.len() < N {
            return None;
        }
        let (head, rest) = self.data.split_at(N);
        self.data = rest;
        head.try_into().ok()
    }

    fn u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|b| b[0])
    }

    fn u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn u128(&mut self) -> Option<u128> {
        self.take().map(u128::from_le_bytes)
    }
}

/// A journal record on disk.
#[derive(Clone, Debug)]
pub struct JournalRecord {
    /// Log Sequence Number (unique, monotonic).
    pub lsn: u64,
    /// Record type.
    pub record_type: RecordType,
    /// Payload data.
    pub payload: Vec<u8>,
}

impl JournalRecord {
    /// Transaction id carried at the front of OP/COMMIT/ROLLBACK payloads.
    fn txn_id(&self) -> Option<u64> {
        let bytes = self.payload.get(..8)?;
        bytes.try_into().ok().map(u64::from_le_bytes)
    }
}

/// Transaction handle for grouping operations.
///
/// Dropping an unfinished transaction writes a ROLLBACK record.
pub struct Transaction<'a> {
    journal: &'a ClaimJournal,
    /// Transaction ID (LSN of BEGIN record).
    pub txn_id: u64,
    operations: Vec<JournalOp>,
    finalized: bool,
}

impl Transaction<'_> {
    /// Adds an operation to the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Journal`] on I/O failure or if the transaction
    /// was already finalized.
    pub fn add_operation(&mut self, op: JournalOp) -> RewardResult<()> {
        if self.finalized {
            return Err(RewardError::Journal("transaction already finalized".to_string()));
        }

        let mut payload = self.txn_id.to_le_bytes().to_vec();
        op.serialize(&mut payload);
        self.journal.write_record(RecordType::Operation, &payload)?;
        self.operations.push(op);

        Ok(())
    }

    /// Commits the transaction.
    ///
    /// After this returns, the data is on disk.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Journal`] if the commit record cannot be written
    /// or synced.
    pub fn commit(mut self) -> RewardResult<Vec<JournalOp>> {
        if self.finalized {
            return Err(RewardError::Journal("transaction already finalized".to_string()));
        }

        self.journal
            .write_record(RecordType::Commit, &self.txn_id.to_le_bytes())?;
        self.finalized = true;
        self.journal.sync()?;

        Ok(std::mem::take(&mut self.operations))
    }

    /// Rolls back the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Journal`] if the rollback record cannot be
    /// written. Recovery discards the transaction either way.
    pub fn rollback(mut self) -> RewardResult<()> {
        if self.finalized {
            return Ok(());
        }

        self.finalized = true;
        self.journal
            .write_record(RecordType::Rollback, &self.txn_id.to_le_bytes())?;

        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        // If not finalized, auto-rollback
        if !self.finalized {
            let _ = self
                .journal
                .write_record(RecordType::Rollback, &self.txn_id.to_le_bytes());
        }
    }
}

/// Writer state, guarded as one unit so LSNs follow file order.
struct JournalFile {
    writer: BufWriter<File>,
    next_lsn: u64,
}

/// Append-only journal of configuration changes and claims.
pub struct ClaimJournal {
    path: PathBuf,
    file: Mutex<JournalFile>,
}

impl ClaimJournal {
    /// Opens or creates a journal file and recovers it.
    ///
    /// Returns the journal, positioned for appending, together with every
    /// committed operation in commit order.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Journal`] on I/O failure, a foreign file, or an
    /// unsupported version.
    pub fn open(path: impl AsRef<Path>) -> RewardResult<(Self, Vec<JournalOp>)> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| io_error("failed to open journal", &e))?;

        let len = file
            .metadata()
            .map_err(|e| io_error("failed to read journal metadata", &e))?
            .len();
        if len == 0 {
            write_header(&mut file, 0)?;
            file.sync_all()
                .map_err(|e| io_error("failed to sync journal", &e))?;
        }

        let recovery = Self::recover(&path)?;

        // Drop the torn tail so new records follow the last good one
        file.set_len(recovery.good_len)
            .map_err(|e| io_error("failed to truncate journal", &e))?;
        file.seek(SeekFrom::End(0))
            .map_err(|e| io_error("failed to seek journal", &e))?;

        let journal = Self {
            path,
            file: Mutex::new(JournalFile {
                writer: BufWriter::new(file),
                next_lsn: recovery.next_lsn,
            }),
        };

        Ok((journal, recovery.committed))
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// LSN the next record will get.
    #[must_use]
    pub fn next_lsn(&self) -> u64 {
        self.file.lock().next_lsn
    }

    /// Begins a new transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Journal`] if the BEGIN record cannot be written.
    pub fn begin_transaction(&self) -> RewardResult<Transaction<'_>> {
        let lsn = self.write_record(RecordType::Begin, &[])?;

        Ok(Transaction {
            journal: self,
            txn_id: lsn,
            operations: Vec::new(),
            finalized: false,
        })
    }

    /// Writes `ops` as one committed transaction.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Journal`] on I/O failure; the transaction is
    /// rolled back.
    pub fn append(&self, ops: Vec<JournalOp>) -> RewardResult<()> {
        let mut txn = self.begin_transaction()?;
        for op in ops {
            txn.add_operation(op)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Replaces the whole journal with a single committed transaction
    /// holding `snapshot`.
    ///
    /// The new log is written next to the old one and renamed over it, so a
    /// crash leaves either the old or the new journal intact.
    ///
    /// # Errors
    ///
    /// Returns [`RewardError::Journal`] on I/O failure.
    pub fn checkpoint(&self, snapshot: &[JournalOp]) -> RewardResult<()> {
        let mut file = self.file.lock();
        file.writer
            .flush()
            .map_err(|e| io_error("journal flush failed", &e))?;

        let base_lsn = file.next_lsn;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(JOURNAL_MAGIC);
        bytes.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        bytes.extend_from_slice(&base_lsn.to_le_bytes());

        let txn_id = base_lsn;
        encode_record(&mut bytes, txn_id, RecordType::Begin, &[]);
        let mut lsn = txn_id;
        for op in snapshot {
            lsn += 1;
            let mut payload = txn_id.to_le_bytes().to_vec();
            op.serialize(&mut payload);
            encode_record(&mut bytes, lsn, RecordType::Operation, &payload);
        }
        lsn += 1;
        encode_record(&mut bytes, lsn, RecordType::Commit, &txn_id.to_le_bytes());

        // The staging handle becomes the writer, so nothing is reopened after
        // the rename and a failure anywhere leaves the old writer in place.
        let staging = self.path.with_extension("checkpoint");
        let out = write_staging(&staging, &bytes).and_then(|out| {
            fs::rename(&staging, &self.path)
                .map_err(|e| io_error("failed to install checkpoint", &e))?;
            Ok(out)
        });
        let out = match out {
            Ok(out) => out,
            Err(err) => {
                let _ = fs::remove_file(&staging);
                return Err(err);
            }
        };

        file.writer = BufWriter::new(out);
        file.next_lsn = lsn + 1;

        info!(
            operations = snapshot.len(),
            bytes = bytes.len(),
            "journal checkpointed"
        );
        Ok(())
    }

    /// Writes a record to the journal, returning its LSN.
    fn write_record(&self, record_type: RecordType, payload: &[u8]) -> RewardResult<u64> {
        let mut file = self.file.lock();
        let lsn = file.next_lsn;

        let mut bytes = Vec::with_capacity(RECORD_OVERHEAD + payload.len());
        encode_record(&mut bytes, lsn, record_type, payload);
        file.writer
            .write_all(&bytes)
            .map_err(|e| io_error("journal write failed", &e))?;

        file.next_lsn += 1;
        Ok(lsn)
    }

    /// Flushes and syncs the journal to disk.
    fn sync(&self) -> RewardResult<()> {
        let mut file = self.file.lock();
        file.writer
            .flush()
            .map_err(|e| io_error("journal sync failed", &e))?;
        file.writer
            .get_ref()
            .sync_data()
            .map_err(|e| io_error("journal sync failed", &e))?;
        Ok(())
    }

    /// Reads the journal from the start and collects committed operations.
    fn recover(path: &Path) -> RewardResult<Recovery> {
        let file = File::open(path).map_err(|e| io_error("failed to open journal for recovery", &e))?;
        let file_len = file
            .metadata()
            .map_err(|e| io_error("failed to read journal metadata", &e))?
            .len();
        let mut reader = BufReader::new(file);

        // Read and verify header
        let mut header = [0u8; HEADER_LEN as usize];
        reader
            .read_exact(&mut header)
            .map_err(|e| io_error("failed to read journal header", &e))?;
        if &header[0..4] != JOURNAL_MAGIC {
            return Err(RewardError::Journal("invalid journal magic".to_string()));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != JOURNAL_VERSION {
            return Err(RewardError::Journal(format!(
                "unsupported journal version: {version}"
            )));
        }
        let mut base = [0u8; 8];
        base.copy_from_slice(&header[8..16]);
        let base_lsn = u64::from_le_bytes(base);

        let mut open_transactions: HashMap<u64, Vec<JournalOp>> = HashMap::new();
        // Open transactions holding an operation that failed to decode
        let mut poisoned: HashSet<u64> = HashSet::new();
        let mut committed = Vec::new();
        let mut committed_txns = 0usize;
        let mut rolled_back = 0usize;
        let mut next_lsn = base_lsn;
        let mut good_len = HEADER_LEN;

        loop {
            let record = match read_record(&mut reader) {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(reason) => {
                    warn!(
                        offset = good_len,
                        discarded_bytes = file_len - good_len,
                        %reason,
                        "journal tail is corrupt, truncating"
                    );
                    break;
                }
            };

            good_len += (RECORD_OVERHEAD + record.payload.len()) as u64;
            next_lsn = next_lsn.max(record.lsn.saturating_add(1));

            match record.record_type {
                RecordType::Begin => {
                    open_transactions.insert(record.lsn, Vec::new());
                }
                RecordType::Operation => {
                    let txn_id = record.txn_id().ok_or_else(|| {
                        RewardError::Journal(format!(
                            "operation at lsn {} carries no transaction id",
                            record.lsn
                        ))
                    })?;
                    let Some(ops) = open_transactions.get_mut(&txn_id) else {
                        debug!(lsn = record.lsn, txn_id, "operation outside an open transaction");
                        continue;
                    };
                    match JournalOp::deserialize(&record.payload[8..]) {
                        Some(op) => ops.push(op),
                        None => {
                            warn!(lsn = record.lsn, txn_id, "undecodable journal operation");
                            poisoned.insert(txn_id);
                        }
                    }
                }
                RecordType::Commit => {
                    let Some(txn_id) = record.txn_id() else {
                        continue;
                    };
                    if poisoned.contains(&txn_id) {
                        return Err(RewardError::Journal(format!(
                            "undecodable operation in committed transaction {txn_id}"
                        )));
                    }
                    if let Some(ops) = open_transactions.remove(&txn_id) {
                        committed.extend(ops);
                        committed_txns += 1;
                    }
                }
                RecordType::Rollback => {
                    if let Some(txn_id) = record.txn_id() {
                        poisoned.remove(&txn_id);
                        if open_transactions.remove(&txn_id).is_some() {
                            rolled_back += 1;
                        }
                    }
                }
            }
        }

        if !open_transactions.is_empty() {
            warn!(
                count = open_transactions.len(),
                "journal recovery: uncommitted transactions rolled back"
            );
        }
        info!(
            transactions = committed_txns,
            operations = committed.len(),
            rolled_back,
            "journal recovered"
        );

        Ok(Recovery {
            committed,
            next_lsn,
            good_len,
        })
    }
}

/// Outcome of reading a journal.
struct Recovery {
    committed: Vec<JournalOp>,
    next_lsn: u64,
    good_len: u64,
}

fn io_error(context: &str, err: &std::io::Error) -> RewardError {
    RewardError::Journal(format!("{context}: {err}"))
}

fn write_header(file: &mut File, base_lsn: u64) -> RewardResult<()> {
    let mut header = Vec::with_capacity(HEADER_LEN as usize);
    header.extend_from_slice(JOURNAL_MAGIC);
    header.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
    header.extend_from_slice(&base_lsn.to_le_bytes());
    file.write_all(&header)
        .map_err(|e| io_error("failed to write journal header", &e))
}

/// Writes and syncs a checkpoint image, returning its handle positioned at the end.
fn write_staging(staging: &Path, bytes: &[u8]) -> RewardResult<File> {
    let mut out = OpenOptions::new()
        .create(true)
        .truncate(true)
        .read(true)
        .write(true)
        .open(staging)
        .map_err(|e| io_error("failed to create checkpoint", &e))?;
    out.write_all(bytes)
        .map_err(|e| io_error("failed to write checkpoint", &e))?;
    out.sync_all()
        .map_err(|e| io_error("failed to sync checkpoint", &e))?;
    Ok(out)
}

/// Appends one framed record (with CRC) to `buf`.
fn encode_record(buf: &mut Vec<u8>, lsn: u64, record_type: RecordType, payload: &[u8]) {
    let start = buf.len();
    buf.extend_from_slice(&lsn.to_le_bytes());
    buf.push(record_type as u8);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);

    let crc = crc32fast::hash(&buf[start..]);
    buf.extend_from_slice(&crc.to_le_bytes());
}

/// Reads one record. `Ok(None)` is a clean end of file.
fn read_record(reader: &mut impl Read) -> Result<Option<JournalRecord>, String> {
    let mut head = [0u8; 13];
    match reader.read_exact(&mut head[..1]) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.to_string()),
    }
    reader
        .read_exact(&mut head[1..])
        .map_err(|e| format!("short record header: {e}"))?;

    let mut lsn_bytes = [0u8; 8];
    lsn_bytes.copy_from_slice(&head[0..8]);
    let lsn = u64::from_le_bytes(lsn_bytes);
    let record_type =
        RecordType::from_u8(head[8]).ok_or_else(|| format!("invalid record type {}", head[8]))?;
    let payload_len = u32::from_le_bytes([head[9], head[10], head[11], head[12]]);
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(format!("payload length {payload_len} out of range"));
    }

    let mut payload = vec![0u8; payload_len as usize];
    reader
        .read_exact(&mut payload)
        .map_err(|e| format!("short payload: {e}"))?;

    let mut crc_bytes = [0u8; 4];
    reader
        .read_exact(&mut crc_bytes)
        .map_err(|e| format!("missing checksum: {e}"))?;
    let stored_crc = u32::from_le_bytes(crc_bytes);

    // Verify CRC
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&head);
    hasher.update(&payload);
    if hasher.finalize() != stored_crc {
        return Err("CRC mismatch".to_string());
    }

    Ok(Some(JournalRecord {
        lsn,
        record_type,
        payload,
    }))
}
