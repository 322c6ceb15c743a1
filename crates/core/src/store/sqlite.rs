//! SQLite-backed stream store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{StoreError, StreamStore};
use crate::media::ItemId;
use crate::ranking::{ParsedTitle, Stream};

/// SQLite-backed stream store.
pub struct SqliteStreamStore {
    conn: Mutex<Connection>,
}

impl SqliteStreamStore {
    /// Open the database file, creating it and the tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            -- Ranked streams, one row per (item, infohash)
            CREATE TABLE IF NOT EXISTS streams (
                item_id INTEGER NOT NULL,
                infohash TEXT NOT NULL,
                raw_title TEXT NOT NULL,
                rank INTEGER NOT NULL,
                parsed TEXT NOT NULL,
                blacklisted INTEGER NOT NULL DEFAULT 0,
                position INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (item_id, infohash)
            );

            CREATE INDEX IF NOT EXISTS idx_streams_item ON streams(item_id);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_stream(row: &rusqlite::Row) -> rusqlite::Result<(Stream, String)> {
        let parsed_json: String = row.get(3)?;
        Ok((
            Stream {
                infohash: row.get(0)?,
                raw_title: row.get(1)?,
                rank: row.get(2)?,
                parsed: ParsedTitle::default(),
                blacklisted: row.get(4)?,
            },
            parsed_json,
        ))
    }
}

impl StreamStore for SqliteStreamStore {
    fn save_streams(&self, item: ItemId, streams: &[Stream]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        let mut new_count = 0;

        for (position, stream) in streams.iter().enumerate() {
            let infohash = stream.infohash.to_lowercase();
            let parsed = serde_json::to_string(&stream.parsed)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            let exists = tx
                .query_row(
                    "SELECT 1 FROM streams WHERE item_id = ? AND infohash = ?",
                    params![item.0 as i64, &infohash],
                    |_| Ok(()),
                )
                .optional()
                .map_err(|e| StoreError::Database(e.to_string()))?
                .is_some();

            tx.execute(
                "INSERT INTO streams (item_id, infohash, raw_title, rank, parsed, blacklisted, position, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(item_id, infohash) DO UPDATE SET
                    raw_title = excluded.raw_title,
                    rank = excluded.rank,
                    parsed = excluded.parsed,
                    blacklisted = MAX(streams.blacklisted, excluded.blacklisted),
                    position = excluded.position,
                    updated_at = excluded.updated_at",
                params![
                    item.0 as i64,
                    &infohash,
                    &stream.raw_title,
                    stream.rank,
                    &parsed,
                    stream.blacklisted,
                    position as i64,
                    &now,
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

            if !exists {
                new_count += 1;
            }
        }

        tx.commit()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(new_count)
    }

    fn load_streams(&self, item: ItemId) -> Result<Vec<Stream>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT infohash, raw_title, rank, parsed, blacklisted FROM streams
                 WHERE item_id = ?
                 ORDER BY rank DESC, position ASC, infohash ASC",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![item.0 as i64], Self::row_to_stream)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut streams = Vec::new();
        for row in rows {
            let (mut stream, parsed_json) =
                row.map_err(|e| StoreError::Database(e.to_string()))?;
            stream.parsed = serde_json::from_str(&parsed_json)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            streams.push(stream);
        }
        Ok(streams)
    }

    fn count_streams(&self, item: ItemId) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM streams WHERE item_id = ?",
                params![item.0 as i64],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(count as usize)
    }

    fn blacklist(&self, item: ItemId, infohash: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE streams SET blacklisted = 1, updated_at = ?
                 WHERE item_id = ? AND infohash = ? AND blacklisted = 0",
                params![Utc::now().to_rfc3339(), item.0 as i64, infohash.to_lowercase()],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(changed > 0)
    }

    fn blacklisted_count(&self, item: ItemId) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM streams WHERE item_id = ? AND blacklisted = 1",
                params![item.0 as i64],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(count as usize)
    }
}
