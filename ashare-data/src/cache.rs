use ashare_instrument::symbol::Symbol;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// All possible errors produced by the [`PersistentCache`].
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Values must be JSON-serializable; anything else is a programming error surfaced here.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Filter for [`PersistentCache::invalidate`]. Populated fields are applied independently,
/// matching rows for any of them are removed.
#[derive(Clone, Debug, Default)]
pub struct InvalidationFilter {
    /// SQL `LIKE` pattern over the cache key, eg/ `"fundamental:%"`.
    pub pattern: Option<String>,
    pub symbol: Option<Symbol>,
    pub data_type: Option<String>,
}

impl InvalidationFilter {
    pub fn pattern<S: Into<String>>(pattern: S) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    pub fn symbol(symbol: Symbol) -> Self {
        Self {
            symbol: Some(symbol),
            ..Self::default()
        }
    }

    pub fn data_type<S: Into<String>>(data_type: S) -> Self {
        Self {
            data_type: Some(data_type.into()),
            ..Self::default()
        }
    }
}

/// Cache statistics snapshot.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct CacheStats {
    pub total_entries: u64,
    pub expired_entries: u64,
    pub valid_entries: u64,
    pub by_type: HashMap<String, u64>,
}

/// TTL-indexed key-value cache over an embedded SQLite store, guarding external data
/// providers.
///
/// Semantics:
/// * `set` atomically replaces the key.
/// * `get` lazily deletes rows at or past `expires_at`, then honours a caller-supplied
///   `max_age` ceiling on top of the stored TTL - a value stored for an hour can still be
///   treated as stale by a caller demanding five-minute freshness.
/// * Every operation runs in its own implicit transaction; concurrent readers and writers are
///   serialized on the connection.
#[derive(Debug)]
pub struct PersistentCache {
    conn: Mutex<Connection>,
}

impl PersistentCache {
    /// Open (and if needed create) the cache at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        Self::init(Connection::open(path)?)
    }

    /// Private in-memory cache, for tests and ephemeral runs.
    pub fn in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_store (
                cache_key  TEXT PRIMARY KEY,
                cache_value TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                data_type  TEXT,
                symbol     TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_expires ON cache_store(expires_at);
            CREATE INDEX IF NOT EXISTS idx_symbol ON cache_store(symbol);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fetch a value no older than `max_age_s` seconds. Expired rows are deleted on the way
    /// out (lazy expiry).
    pub fn get(&self, key: &str, max_age_s: i64) -> Result<Option<serde_json::Value>, CacheError> {
        let now = now_unix();
        let conn = self.conn.lock();

        let row: Option<(String, i64, i64)> = conn
            .query_row(
                "SELECT cache_value, created_at, expires_at FROM cache_store WHERE cache_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((raw, created_at, expires_at)) = row else {
            debug!(key, "cache miss");
            return Ok(None);
        };

        if expires_at <= now {
            debug!(key, "cache expired");
            conn.execute("DELETE FROM cache_store WHERE cache_key = ?1", params![key])?;
            return Ok(None);
        }

        let age = now - created_at;
        if age >= max_age_s {
            debug!(key, age, max_age_s, "cache entry older than caller ceiling");
            return Ok(None);
        }

        let value = serde_json::from_str(&raw)?;
        debug!(key, age, "cache hit");
        Ok(Some(value))
    }

    /// Like [`Self::get`], but degrades storage failures to a miss (logged), per the
    /// read-through contract: a broken cache must never block the live source.
    pub fn get_or_miss(&self, key: &str, max_age_s: i64) -> Option<serde_json::Value> {
        match self.get(key, max_age_s) {
            Ok(value) => value,
            Err(error) => {
                warn!(key, %error, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store a JSON-serializable value with a TTL, atomically replacing any existing entry.
    pub fn set<V: Serialize>(
        &self,
        key: &str,
        value: &V,
        ttl_s: i64,
        data_type: Option<&str>,
        symbol: Option<&Symbol>,
    ) -> Result<(), CacheError> {
        let now = now_unix();
        let serialized = serde_json::to_string(value)?;

        self.conn.lock().execute(
            "INSERT OR REPLACE INTO cache_store
             (cache_key, cache_value, created_at, expires_at, data_type, symbol)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key,
                serialized,
                now,
                now + ttl_s,
                data_type,
                symbol.map(|symbol| symbol.to_string()),
            ],
        )?;
        debug!(key, ttl_s, "cache set");
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.conn
            .lock()
            .execute("DELETE FROM cache_store WHERE cache_key = ?1", params![key])?;
        Ok(())
    }

    /// Remove entries matching any populated field of the filter. Returns the removed count.
    pub fn invalidate(&self, filter: &InvalidationFilter) -> Result<usize, CacheError> {
        let conn = self.conn.lock();
        let mut removed = 0;

        if let Some(pattern) = &filter.pattern {
            removed += conn.execute(
                "DELETE FROM cache_store WHERE cache_key LIKE ?1",
                params![pattern],
            )?;
        }
        if let Some(symbol) = &filter.symbol {
            removed += conn.execute(
                "DELETE FROM cache_store WHERE symbol = ?1",
                params![symbol.to_string()],
            )?;
        }
        if let Some(data_type) = &filter.data_type {
            removed += conn.execute(
                "DELETE FROM cache_store WHERE data_type = ?1",
                params![data_type],
            )?;
        }

        Ok(removed)
    }

    /// Remove every expired entry. Returns the removed count.
    pub fn cleanup_expired(&self) -> Result<usize, CacheError> {
        let removed = self.conn.lock().execute(
            "DELETE FROM cache_store WHERE expires_at <= ?1",
            params![now_unix()],
        )?;
        if removed > 0 {
            debug!(removed, "cleaned up expired cache entries");
        }
        Ok(removed)
    }

    /// Remove everything.
    pub fn clear_all(&self) -> Result<(), CacheError> {
        self.conn.lock().execute("DELETE FROM cache_store", [])?;
        warn!("all cache entries cleared");
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let conn = self.conn.lock();
        let now = now_unix();

        let total_entries: u64 =
            conn.query_row("SELECT COUNT(*) FROM cache_store", [], |row| row.get(0))?;
        let expired_entries: u64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_store WHERE expires_at <= ?1",
            params![now],
            |row| row.get(0),
        )?;

        let mut by_type = HashMap::new();
        let mut statement = conn.prepare(
            "SELECT COALESCE(data_type, ''), COUNT(*) FROM cache_store GROUP BY data_type",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        for row in rows {
            let (data_type, count) = row?;
            by_type.insert(data_type, count);
        }

        Ok(CacheStats {
            total_entries,
            expired_entries,
            valid_entries: total_entries - expired_entries,
            by_type,
        })
    }
}

fn now_unix() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> PersistentCache {
        PersistentCache::in_memory().unwrap()
    }

    #[test]
    fn set_get_round_trip_within_ttl() {
        let cache = cache();
        cache.set("k", &json!({"x": 1}), 3600, None, None).unwrap();
        assert_eq!(cache.get("k", 3600).unwrap(), Some(json!({"x": 1})));
    }

    #[test]
    fn get_honours_caller_max_age_ceiling() {
        let cache = cache();
        cache.set("k", &json!(42), 3600, None, None).unwrap();
        // Stored for an hour, but the caller demands sub-zero-second freshness.
        assert_eq!(cache.get("k", 0).unwrap(), None);
        // The row itself is not deleted by a max_age rejection.
        assert_eq!(cache.stats().unwrap().total_entries, 1);
    }

    #[test]
    fn expired_entry_is_lazily_deleted_on_get() {
        let cache = cache();
        cache.set("k", &json!(1), -1, None, None).unwrap();
        assert_eq!(cache.stats().unwrap().total_entries, 1);
        assert_eq!(cache.get("k", 3600).unwrap(), None);
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn set_replaces_existing_key_atomically() {
        let cache = cache();
        cache.set("k", &json!("old"), 3600, None, None).unwrap();
        cache.set("k", &json!("new"), 3600, None, None).unwrap();
        assert_eq!(cache.get("k", 3600).unwrap(), Some(json!("new")));
        assert_eq!(cache.stats().unwrap().total_entries, 1);
    }

    #[test]
    fn invalidate_by_pattern_symbol_and_type() {
        let cache = cache();
        let symbol = Symbol::new("600036.SH").unwrap();
        cache
            .set("fundamental:600036", &json!(1), 3600, Some("fundamental"), Some(&symbol))
            .unwrap();
        cache
            .set("sentiment:600036", &json!(2), 3600, Some("sentiment"), Some(&symbol))
            .unwrap();
        cache.set("other:123", &json!(3), 3600, None, None).unwrap();

        let removed = cache
            .invalidate(&InvalidationFilter::pattern("fundamental:%"))
            .unwrap();
        assert_eq!(removed, 1);

        let removed = cache
            .invalidate(&InvalidationFilter::symbol(symbol))
            .unwrap();
        assert_eq!(removed, 1);

        assert_eq!(cache.stats().unwrap().total_entries, 1);
    }

    #[test]
    fn cleanup_removes_only_expired_rows() {
        let cache = cache();
        cache.set("live", &json!(1), 3600, None, None).unwrap();
        cache.set("dead", &json!(2), -1, None, None).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 1);

        assert_eq!(cache.cleanup_expired().unwrap(), 1);
        assert_eq!(cache.stats().unwrap().total_entries, 1);
    }

    #[test]
    fn stats_group_by_data_type() {
        let cache = cache();
        cache.set("a", &json!(1), 3600, Some("bars"), None).unwrap();
        cache.set("b", &json!(2), 3600, Some("bars"), None).unwrap();
        cache.set("c", &json!(3), 3600, Some("quotes"), None).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.by_type.get("bars"), Some(&2));
        assert_eq!(stats.by_type.get("quotes"), Some(&1));
    }

    #[test]
    fn open_on_disk_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let cache = PersistentCache::open(&path).unwrap();
            cache.set("k", &json!("durable"), 3600, None, None).unwrap();
        }

        let cache = PersistentCache::open(&path).unwrap();
        assert_eq!(cache.get("k", 3600).unwrap(), Some(json!("durable")));
    }
}
