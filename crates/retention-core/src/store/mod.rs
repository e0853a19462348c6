//! Persistent storage using redb.
//!
//! # Table design
//!
//! Every table maps a byte key to a JSON-encoded record. Keys are composites
//! of 16-byte UUIDs and 8-byte big-endian millisecond timestamps, so byte
//! order equals (owner, time) order and a prefix range scan returns one
//! owner's rows chronologically:
//!
//! ```text
//! members, leads, risk_scores, playbooks, executions, messages
//!                      [ organization: 16 | id: 16 ]
//! check_ins, bookings, risk_snapshots
//!                      [ member: 16 | timestamp_ms: 8 | id: 16 ]
//! payments             [ member: 16 | id: 16 ]
//! playbook_versions    [ playbook: 16 | version: u32 BE ]
//! settings             [ organization: 16 | key utf-8 ]
//! policies             [ organization: 16 ]
//! jobs                 [ available_at_ms: 8 | job: 16 ]
//! ```
//!
//! redb admits one write transaction at a time. Every multi-record mutation
//! here runs inside a single write transaction, which makes read-check-write
//! sequences (execution CAS, version increments) atomic.

mod executions;
mod members;
mod playbooks;
mod scores;

pub use executions::{Delivery, DeliveryContext};

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, RetentionError};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

type Bytes = &'static [u8];
type Table = TableDefinition<'static, Bytes, Bytes>;

const MEMBERS: Table = TableDefinition::new("members");
const LEADS: Table = TableDefinition::new("leads");
const CHECK_INS: Table = TableDefinition::new("check_ins");
const BOOKINGS: Table = TableDefinition::new("bookings");
const PAYMENTS: Table = TableDefinition::new("payments");
const RISK_SCORES: Table = TableDefinition::new("risk_scores");
const RISK_SNAPSHOTS: Table = TableDefinition::new("risk_snapshots");
const SETTINGS: Table = TableDefinition::new("settings");
const POLICIES: Table = TableDefinition::new("policies");
const PLAYBOOKS: Table = TableDefinition::new("playbooks");
const PLAYBOOK_VERSIONS: Table = TableDefinition::new("playbook_versions");
const EXECUTIONS: Table = TableDefinition::new("executions");
const MESSAGES: Table = TableDefinition::new("messages");
const JOBS: Table = TableDefinition::new("jobs");

const ALL_TABLES: [Table; 14] = [
    MEMBERS,
    LEADS,
    CHECK_INS,
    BOOKINGS,
    PAYMENTS,
    RISK_SCORES,
    RISK_SNAPSHOTS,
    SETTINGS,
    POLICIES,
    PLAYBOOKS,
    PLAYBOOK_VERSIONS,
    EXECUTIONS,
    MESSAGES,
    JOBS,
];

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn ts_ms(ts: DateTime<Utc>) -> u64 {
    ts.timestamp_millis().max(0) as u64
}

/// `[ owner: 16 | id: 16 ]`
fn pair_key(owner: Uuid, id: Uuid) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(owner.as_bytes());
    key[16..].copy_from_slice(id.as_bytes());
    key
}

/// `[ owner: 16 | timestamp_ms: 8 | id: 16 ]`
fn timeline_key(owner: Uuid, ts: DateTime<Utc>, id: Uuid) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..16].copy_from_slice(owner.as_bytes());
    key[16..24].copy_from_slice(&ts_ms(ts).to_be_bytes());
    key[24..].copy_from_slice(id.as_bytes());
    key
}

/// Inclusive bounds covering every timeline key of `owner` at or after `since`.
fn timeline_bounds(owner: Uuid, since: Option<DateTime<Utc>>) -> ([u8; 40], [u8; 40]) {
    let mut lo = [0u8; 40];
    lo[..16].copy_from_slice(owner.as_bytes());
    if let Some(since) = since {
        lo[16..24].copy_from_slice(&ts_ms(since).to_be_bytes());
    }
    let mut hi = [0xffu8; 40];
    hi[..16].copy_from_slice(owner.as_bytes());
    (lo, hi)
}

/// `[ playbook: 16 | version: u32 BE ]`
fn version_key(playbook_id: Uuid, version: u32) -> [u8; 20] {
    let mut key = [0u8; 20];
    key[..16].copy_from_slice(playbook_id.as_bytes());
    key[16..].copy_from_slice(&version.to_be_bytes());
    key
}

/// Inclusive bounds covering every `pair_key(owner, _)`.
fn pair_bounds(owner: Uuid) -> ([u8; 32], [u8; 32]) {
    (
        pair_key(owner, Uuid::nil()),
        pair_key(owner, Uuid::from_bytes([0xff; 16])),
    )
}

fn db_err(e: impl std::fmt::Display) -> RetentionError {
    RetentionError::Store(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

// ---------------------------------------------------------------------------
// Table read helpers (work on both read and write transactions)
// ---------------------------------------------------------------------------

fn get_json<T, R>(table: &R, key: &[u8]) -> Result<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<Bytes, Bytes>,
{
    match table.get(key).map_err(db_err)? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

fn scan_json<T, R>(table: &R, lo: &[u8], hi: &[u8]) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<Bytes, Bytes>,
{
    let mut out = Vec::new();
    for entry in table.range(lo..=hi).map_err(db_err)? {
        let (_, v) = entry.map_err(db_err)?;
        out.push(decode(v.value())?);
    }
    Ok(out)
}

fn last_json<T, R>(table: &R, lo: &[u8], hi: &[u8]) -> Result<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<Bytes, Bytes>,
{
    match table.range(lo..=hi).map_err(db_err)?.next_back() {
        Some(entry) => {
            let (_, v) = entry.map_err(db_err)?;
            Ok(Some(decode(v.value())?))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// RetentionDb
// ---------------------------------------------------------------------------

/// Persistent store for every record the retention core reads or owns.
pub struct RetentionDb {
    db: Database,
}

impl RetentionDb {
    /// Open or create the redb database at `path`, creating all tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        for table in ALL_TABLES {
            wt.open_table(table).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    /// Read one JSON record.
    fn read_one<T: DeserializeOwned>(
        &self,
        table: Table,
        key: &[u8],
    ) -> Result<Option<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let t = rt.open_table(table).map_err(db_err)?;
        get_json(&t, key)
    }

    /// Read every JSON record with a key in `lo..=hi`.
    fn read_range<T: DeserializeOwned>(
        &self,
        table: Table,
        lo: &[u8],
        hi: &[u8],
    ) -> Result<Vec<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let t = rt.open_table(table).map_err(db_err)?;
        scan_json(&t, lo, hi)
    }

    /// Insert or replace one JSON record in its own transaction.
    fn write_one<T: Serialize>(
        &self,
        table: Table,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let bytes = encode(value)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut t = wt.open_table(table).map_err(db_err)?;
            t.insert(key, bytes.as_slice()).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
