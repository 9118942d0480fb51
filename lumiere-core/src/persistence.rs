//! SQLite save-slot store.
//!
//! Each slot holds one whole-snapshot [`SaveFile`] serialized to JSON.
//! The schema is intentionally simple:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS save_slots (
//!     name       TEXT PRIMARY KEY,
//!     data       BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT NOT NULL
//! );
//! ```
//!
//! - WAL mode so the UI can list slots while a save is being written.
//! - JSON inside a BLOB column keeps the schema stable across save-format
//!   revisions.
//! - A CRC-32 checksum detects corruption; a mismatch fails the load
//!   instead of handing back a silently broken snapshot.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use crate::error::{CoreError, Result};
use crate::save::SaveFile;

/// Basic CRC-32 (ISO 3309 / ITU-T V.42), hex-encoded.
fn crc32_hex(data: &[u8]) -> String {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    format!("{:08x}", !crc)
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS save_slots (
    name       TEXT PRIMARY KEY,
    data       BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT NOT NULL
);";

/// Metadata for one stored slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    /// User-chosen slot name.
    pub name: String,
    /// When the slot was last written.
    pub updated_at: DateTime<Utc>,
}

/// Handle to an open SQLite database of save slots.
pub struct SaveStore {
    conn: Connection,
    db_path: PathBuf,
}

impl std::fmt::Debug for SaveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SaveStore {
    /// Open (or create) the slot database at `path`.
    ///
    /// # Errors
    /// Returns [`CoreError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), "save store opened");
        Ok(Self { conn, db_path })
    }

    /// Open an in-memory store (useful for tests).
    ///
    /// # Errors
    /// Returns [`CoreError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Write (upsert) a snapshot into the named slot.
    ///
    /// # Errors
    /// Returns [`CoreError::Serialization`] if JSON encoding fails, or
    /// [`CoreError::Database`] on SQLite failures.
    pub fn save_slot(&self, name: &str, save: &SaveFile) -> Result<()> {
        let start = Instant::now();
        let json = serde_json::to_vec(save)?;
        let checksum = crc32_hex(&json);
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO save_slots (name, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![name, json, now, checksum],
        )?;

        debug!(
            slot = name,
            nodes = save.tree.len(),
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "slot saved"
        );
        Ok(())
    }

    /// Load the snapshot stored in the named slot.
    ///
    /// Returns `None` if the slot does not exist.
    ///
    /// # Errors
    /// Returns [`CoreError::Corrupt`] on a checksum mismatch,
    /// [`CoreError::Serialization`] if JSON decoding fails, or
    /// [`CoreError::Database`] on SQLite failures.
    pub fn load_slot(&self, name: &str) -> Result<Option<SaveFile>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data, checksum FROM save_slots WHERE name = ?1")?;

        let row: Option<(Vec<u8>, String)> = stmt
            .query_row(params![name], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((data, stored_checksum)) = row else {
            return Ok(None);
        };

        let actual = crc32_hex(&data);
        if stored_checksum != actual {
            return Err(CoreError::Corrupt {
                slot: name.to_string(),
            });
        }

        let save: SaveFile = serde_json::from_slice(&data)?;
        debug!(slot = name, nodes = save.tree.len(), "slot loaded");
        Ok(Some(save))
    }

    /// Delete the named slot. Returns `true` if a row was removed.
    ///
    /// # Errors
    /// Returns [`CoreError::Database`] on SQLite failures.
    pub fn delete_slot(&self, name: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM save_slots WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }

    /// List all slots, most recently written first.
    ///
    /// # Errors
    /// Returns [`CoreError::Database`] on SQLite failures.
    pub fn list_slots(&self) -> Result<Vec<SlotInfo>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name, updated_at FROM save_slots ORDER BY updated_at DESC")?;

        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let updated_at: String = row.get(1)?;
            Ok((name, updated_at))
        })?;

        let mut slots = Vec::new();
        for row in rows {
            let (name, updated_at) = row?;
            let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .map_err(|e| CoreError::Config(format!("bad timestamp in slot table: {e}")))?
                .with_timezone(&Utc);
            slots.push(SlotInfo { name, updated_at });
        }
        Ok(slots)
    }

    /// Back up the slot database to `dest_path` using SQLite's
    /// online-backup API. Safe to call while slots are being written.
    ///
    /// # Errors
    /// Returns [`CoreError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;
        info!(dest = %dest_path.as_ref().display(), "save store backed up");
        Ok(())
    }
}
