//! Core Store implementation: SQLite for indexed lookups, JSONL for an
//! append-only, git-friendly history of every write.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use rusqlite::{Connection, params};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::record::{Filter, IndexValue, Record};

/// Generic persistent record store backed by a SQLite index and a
/// per-collection JSONL append log.
///
/// The SQLite database (`store.db`) is the fast query path: one `records`
/// table holding the JSON blob per row, and a `record_index` table holding
/// the subset of fields each [`Record`] exposes via `indexed_fields`. The
/// JSONL files (`<collection>.jsonl`) are a complete, append-only history of
/// every create/update, suitable for committing to git for audit purposes;
/// `rebuild_indexes` can reconstruct the SQLite index from the JSONL log
/// alone, which is how a fresh checkout recovers its queryable state.
pub struct Store {
    conn: Connection,
    base_path: PathBuf,
}

impl Store {
    /// Open or create a store rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        let db_path = base_path.join("store.db");
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );
            CREATE TABLE IF NOT EXISTS record_index (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                field TEXT NOT NULL,
                value_text TEXT NOT NULL,
                value_kind TEXT NOT NULL,
                PRIMARY KEY (collection, id, field)
            );
            CREATE INDEX IF NOT EXISTS idx_record_index_lookup
                ON record_index(collection, field, value_text);",
        )?;

        debug!(?base_path, "Store::open: opened");
        Ok(Self { conn, base_path })
    }

    /// Open a store in a fresh temp directory (tests only).
    #[cfg(test)]
    pub fn open_temp() -> Result<(Self, tempfile::TempDir)> {
        let dir = tempfile::tempdir()?;
        let store = Self::open(dir.path())?;
        Ok((store, dir))
    }

    fn lock_path(&self) -> PathBuf {
        self.base_path.join(".lock")
    }

    /// Hold an exclusive advisory lock across the store directory for the
    /// duration of `f`. Guards against two processes writing the JSONL log
    /// concurrently; SQLite's own WAL locking covers the index.
    fn with_lock<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;
        lock_file.lock_exclusive().map_err(StoreError::Io)?;
        let result = f();
        let _ = lock_file.unlock();
        result
    }

    fn jsonl_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{collection}.jsonl"))
    }

    fn append_jsonl<T: Record>(&self, record: &T) -> Result<()> {
        let path = self.jsonl_path(T::collection_name());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn write_index(&self, collection: &str, id: &str, fields: &HashMap<String, IndexValue>) -> Result<()> {
        self.conn
            .execute("DELETE FROM record_index WHERE collection = ?1 AND id = ?2", params![collection, id])?;
        for (field, value) in fields {
            self.conn.execute(
                "INSERT INTO record_index (collection, id, field, value_text, value_kind)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![collection, id, field, value.to_sql_text(), value.kind()],
            )?;
        }
        Ok(())
    }

    /// Insert a brand-new record. Errors if a record with the same id
    /// already exists in the collection.
    pub fn create<T: Record>(&mut self, record: T) -> Result<T> {
        let collection = T::collection_name();
        let id = record.id().to_string();

        self.with_lock(|| {
            let data = serde_json::to_string(&record)?;
            let existing: Option<i64> = self
                .conn
                .query_row(
                    "SELECT updated_at FROM records WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get(0),
                )
                .ok();
            if existing.is_some() {
                return Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
                    Some(format!("record already exists: {collection}/{id}")),
                )));
            }

            self.conn.execute(
                "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![collection, id, data, record.updated_at()],
            )?;
            self.write_index(collection, &id, &record.indexed_fields())?;
            self.append_jsonl(&record)?;
            Ok(record)
        })
    }

    /// Fetch a single record by id.
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
        let collection = T::collection_name();
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .ok();
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Overwrite an existing record. Errors with [`StoreError::NotFound`] if
    /// no row with this id exists yet.
    pub fn update<T: Record>(&mut self, record: T) -> Result<T> {
        let collection = T::collection_name();
        let id = record.id().to_string();

        self.with_lock(|| {
            let data = serde_json::to_string(&record)?;
            let changed = self.conn.execute(
                "UPDATE records SET data = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
                params![data, record.updated_at(), collection, id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id,
                });
            }
            self.write_index(collection, &id, &record.indexed_fields())?;
            self.append_jsonl(&record)?;
            Ok(record)
        })
    }

    /// Atomically overwrite a record only if `json_path` (an SQLite
    /// `json_extract` path, e.g. `"$.status"`) currently equals `expected`.
    /// Returns `true` if the swap happened. This is the primitive the job
    /// queue uses to claim a job without a lost-update race: two workers
    /// racing to claim the same row will see exactly one `true`.
    pub fn conditional_update<T: Record>(&mut self, id: &str, json_path: &str, expected: &str, record: T) -> Result<bool> {
        let collection = T::collection_name();

        self.with_lock(|| {
            let data = serde_json::to_string(&record)?;
            let tx = self.conn.transaction()?;
            let changed = tx.execute(
                "UPDATE records SET data = ?1, updated_at = ?2
                 WHERE collection = ?3 AND id = ?4 AND json_extract(data, ?5) = ?6",
                params![data, record.updated_at(), collection, id, json_path, expected],
            )?;
            if changed > 0 {
                tx.execute("DELETE FROM record_index WHERE collection = ?1 AND id = ?2", params![collection, id])?;
                for (field, value) in record.indexed_fields() {
                    tx.execute(
                        "INSERT INTO record_index (collection, id, field, value_text, value_kind)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![collection, id, field, value.to_sql_text(), value.kind()],
                    )?;
                }
            }
            tx.commit()?;
            if changed > 0 {
                self.append_jsonl(&record)?;
            }
            Ok(changed > 0)
        })
    }

    /// Remove a record. Returns `true` if a row was actually deleted.
    pub fn delete<T: Record>(&mut self, id: &str) -> Result<bool> {
        let collection = T::collection_name();
        self.with_lock(|| {
            let changed = self
                .conn
                .execute("DELETE FROM records WHERE collection = ?1 AND id = ?2", params![collection, id])?;
            self.conn
                .execute("DELETE FROM record_index WHERE collection = ?1 AND id = ?2", params![collection, id])?;
            Ok(changed > 0)
        })
    }

    /// List all records in a collection matching every filter (AND).
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>> {
        let collection = T::collection_name();

        let mut sql = String::from("SELECT data FROM records WHERE collection = ?1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(collection.to_string())];

        for (idx, filter) in filters.iter().enumerate() {
            let field_param = format!("?{}", args.len() + 1);
            let value_param = format!("?{}", args.len() + 2);
            sql.push_str(&format!(
                " AND id IN (SELECT id FROM record_index WHERE collection = ?1 AND field = {field_param} AND value_text {op} {value_param})",
                op = filter.op.sql(),
            ));
            args.push(Box::new(filter.field.clone()));
            args.push(Box::new(filter.value.to_sql_text()));
            let _ = idx;
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(refs.as_slice(), |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            let json = row?;
            out.push(serde_json::from_str(&json)?);
        }
        Ok(out)
    }

    /// Rebuild the SQLite index for a collection by replaying its JSONL log.
    /// Returns the number of records indexed. Used on startup so a store
    /// recovered from a bare JSONL checkout (e.g. after `git clone`) regains
    /// a queryable index.
    pub fn rebuild_indexes<T: Record>(&mut self) -> Result<usize> {
        let path = self.jsonl_path(T::collection_name());
        if !path.exists() {
            return Ok(0);
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut latest: HashMap<String, T> = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&line) {
                Ok(record) => {
                    latest.insert(record.id().to_string(), record);
                }
                Err(e) => warn!(error = %e, "rebuild_indexes: skipping malformed JSONL line"),
            }
        }

        let count = latest.len();
        for (id, record) in latest {
            let data = serde_json::to_string(&record)?;
            self.conn.execute(
                "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                params![T::collection_name(), id, data, record.updated_at()],
            )?;
            self.write_index(T::collection_name(), &id, &record.indexed_fields())?;
        }

        Ok(count)
    }

    /// Checkpoint the WAL so `store.db` reflects every committed write.
    /// Call before a git commit of the store directory, or on shutdown.
    pub fn sync(&mut self) -> Result<()> {
        self.conn.pragma_update(None, "wal_checkpoint", "TRUNCATE")?;
        Ok(())
    }

    /// Distinct collection names currently present in the index. Used by
    /// the CLI, which has no compile-time `Record` type to query through.
    pub fn collections(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT collection FROM records ORDER BY collection")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Row count for a collection by name, bypassing `Record`.
    pub fn count_raw(&self, collection: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Every record in a collection as raw JSON, bypassing `Record`. Used by
    /// the CLI `dump` command, which has no concrete domain type to
    /// deserialize into.
    pub fn list_raw(&self, collection: &str) -> Result<Vec<serde_json::Value>> {
        let mut stmt = self.conn.prepare("SELECT data FROM records WHERE collection = ?1")?;
        let rows = stmt.query_map(params![collection], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    /// Rebuild the `records` table for a collection from its JSONL log
    /// without going through `Record`. Restores the collection's rows but
    /// not `record_index`, since indexed fields are type-specific; callers
    /// that need filtering back should follow up with [`Store::rebuild_indexes`]
    /// from the owning crate once they have the concrete type in scope.
    pub fn rebuild_raw(&mut self, collection: &str) -> Result<usize> {
        let path = self.jsonl_path(collection);
        if !path.exists() {
            return Ok(0);
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut latest: HashMap<String, (serde_json::Value, i64)> = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let value: serde_json::Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "rebuild_raw: skipping malformed JSONL line");
                    continue;
                }
            };
            let id = value.get("id").and_then(|v| v.as_str()).map(str::to_string);
            let updated_at = value.get("updated_at").and_then(|v| v.as_i64()).unwrap_or(0);
            if let Some(id) = id {
                latest.insert(id, (value, updated_at));
            }
        }

        let count = latest.len();
        for (id, (value, updated_at)) in latest {
            let data = serde_json::to_string(&value)?;
            self.conn.execute(
                "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                params![collection, id, data, updated_at],
            )?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Widget {
        id: String,
        status: String,
        updated_at: i64,
    }

    impl Record for Widget {
        fn id(&self) -> &str {
            &self.id
        }
        fn updated_at(&self) -> i64 {
            self.updated_at
        }
        fn collection_name() -> &'static str {
            "widgets"
        }
        fn indexed_fields(&self) -> HashMap<String, IndexValue> {
            let mut f = HashMap::new();
            f.insert("status".to_string(), IndexValue::String(self.status.clone()));
            f
        }
    }

    #[test]
    fn create_get_roundtrip() {
        let (mut store, _dir) = Store::open_temp().unwrap();
        let w = Widget {
            id: "w1".into(),
            status: "pending".into(),
            updated_at: now_ms_for_test(),
        };
        store.create(w.clone()).unwrap();

        let fetched: Widget = store.get("w1").unwrap().unwrap();
        assert_eq!(fetched, w);
    }

    #[test]
    fn create_twice_fails() {
        let (mut store, _dir) = Store::open_temp().unwrap();
        let w = Widget {
            id: "w1".into(),
            status: "pending".into(),
            updated_at: 1,
        };
        store.create(w.clone()).unwrap();
        assert!(store.create(w).is_err());
    }

    #[test]
    fn update_missing_is_not_found() {
        let (mut store, _dir) = Store::open_temp().unwrap();
        let w = Widget {
            id: "missing".into(),
            status: "pending".into(),
            updated_at: 1,
        };
        let err = store.update(w).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn list_filters_by_indexed_field() {
        let (mut store, _dir) = Store::open_temp().unwrap();
        store
            .create(Widget {
                id: "a".into(),
                status: "pending".into(),
                updated_at: 1,
            })
            .unwrap();
        store
            .create(Widget {
                id: "b".into(),
                status: "done".into(),
                updated_at: 2,
            })
            .unwrap();

        let pending: Vec<Widget> = store
            .list(&[Filter::eq("status", IndexValue::String("pending".into()))])
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "a");
    }

    #[test]
    fn conditional_update_races_are_exclusive() {
        let (mut store, _dir) = Store::open_temp().unwrap();
        store
            .create(Widget {
                id: "a".into(),
                status: "queued".into(),
                updated_at: 1,
            })
            .unwrap();

        let claimed = store
            .conditional_update(
                "a",
                "$.status",
                "queued",
                Widget {
                    id: "a".into(),
                    status: "running".into(),
                    updated_at: 2,
                },
            )
            .unwrap();
        assert!(claimed);

        // Second attempt sees status already flipped to "running" and loses.
        let second = store
            .conditional_update(
                "a",
                "$.status",
                "queued",
                Widget {
                    id: "a".into(),
                    status: "running".into(),
                    updated_at: 3,
                },
            )
            .unwrap();
        assert!(!second);
    }

    #[test]
    fn rebuild_indexes_from_jsonl() {
        let (mut store, dir) = Store::open_temp().unwrap();
        store
            .create(Widget {
                id: "a".into(),
                status: "pending".into(),
                updated_at: 1,
            })
            .unwrap();
        drop(store);

        // Fresh store over the same directory, database deleted to emulate
        // a clone that only carries the JSONL log.
        std::fs::remove_file(dir.path().join("store.db")).unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        let count = store.rebuild_indexes::<Widget>().unwrap();
        assert_eq!(count, 1);

        let fetched: Widget = store.get("a").unwrap().unwrap();
        assert_eq!(fetched.status, "pending");
    }

    fn now_ms_for_test() -> i64 {
        crate::record::now_ms()
    }
}
