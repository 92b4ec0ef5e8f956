//! Named, versioned cache stores.
//!
//! A store is a namespace of entries keyed by request identity. Deleting a
//! store removes every entry it owns (foreign key cascade).
//!
//! Stores are shared by every client of the proxy, so per-user response
//! headers (`Set-Cookie`) are never written.

use super::connection::CacheDb;
use super::request::{CacheRequest, CachedResponse};
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

const UPSERT_ENTRY: &str = "INSERT INTO entries (
        store, key_hash, method, url, status_code, headers_json, body, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(store, key_hash) DO UPDATE SET
        method = excluded.method,
        url = excluded.url,
        status_code = excluded.status_code,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

const ENSURE_STORE: &str = "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)";

const STORE_EXISTS: &str = "SELECT EXISTS(SELECT 1 FROM stores WHERE name = ?1)";

/// Response headers that belong to one client and must not be replayed.
const PRIVATE_HEADERS: &[&str] = &["set-cookie", "set-cookie2"];

/// Whether a response header is dropped before storing.
fn is_private_header(name: &str) -> bool {
    PRIVATE_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Per-store bookkeeping for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
}

/// Row ready to be written: everything serialized up front so the
/// database closure only deals in owned primitives.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status_code: i64,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn encode(request: &CacheRequest, response: &CachedResponse) -> Result<Self, Error> {
        Ok(Self {
            key_hash: request.key(),
            method: request.method.to_ascii_uppercase(),
            url: request.url.clone(),
            status_code: i64::from(response.status),
            headers_json: serde_json::to_string(&shareable_headers(&response.headers))?,
            body: response.body.clone(),
        })
    }
}

fn shareable_headers(headers: &[(String, String)]) -> Vec<&(String, String)> {
    headers.iter().filter(|(name, _)| !is_private_header(name)).collect()
}

fn check_store_name(name: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("store name cannot be empty".into()));
    }
    Ok(())
}

impl CacheDb {
    /// Open (create if absent) the named store.
    pub async fn open_store(&self, name: &str) -> Result<(), Error> {
        check_store_name(name)?;
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(ENSURE_STORE, params![name, now])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Whether the named store exists.
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(STORE_EXISTS, params![name], |row| row.get(0))?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All store names, oldest first.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM stores ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all its entries.
    ///
    /// Returns false if the store did not exist.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM stores WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response under the request's identity.
    ///
    /// Creates the store if needed. Last write wins.
    pub async fn put(&self, store: &str, request: &CacheRequest, response: &CachedResponse) -> Result<(), Error> {
        check_store_name(store)?;
        let store = store.to_string();
        let row = EntryRow::encode(request, response)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(ENSURE_STORE, params![store, now])?;
                conn.execute(
                    UPSERT_ENTRY,
                    params![
                        store,
                        row.key_hash,
                        row.method,
                        row.url,
                        row.status_code,
                        row.headers_json,
                        row.body,
                        now
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response only if the store still exists.
    ///
    /// Used for writes that may land after the store was deleted (a
    /// background refresh racing an activation); returns false when the
    /// write was skipped.
    pub async fn put_existing(
        &self,
        store: &str,
        request: &CacheRequest,
        response: &CachedResponse,
    ) -> Result<bool, Error> {
        let store = store.to_string();
        let row = EntryRow::encode(request, response)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                let exists: bool = tx.query_row(STORE_EXISTS, params![store], |row| row.get(0))?;
                if !exists {
                    return Ok(false);
                }
                tx.execute(
                    UPSERT_ENTRY,
                    params![
                        store,
                        row.key_hash,
                        row.method,
                        row.url,
                        row.status_code,
                        row.headers_json,
                        row.body,
                        now
                    ],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Store several responses atomically: either all land or none do.
    pub async fn put_all(&self, store: &str, entries: &[(CacheRequest, CachedResponse)]) -> Result<(), Error> {
        check_store_name(store)?;
        let store = store.to_string();
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::encode(request, response))
            .collect::<Result<Vec<_>, Error>>()?;
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(ENSURE_STORE, params![store, now])?;
                {
                    let mut stmt = tx.prepare(UPSERT_ENTRY)?;
                    for row in &rows {
                        stmt.execute(params![
                            store,
                            row.key_hash,
                            row.method,
                            row.url,
                            row.status_code,
                            row.headers_json,
                            row.body,
                            now
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for a request identity.
    pub async fn match_request(&self, store: &str, request: &CacheRequest) -> Result<Option<CachedResponse>, Error> {
        let store = store.to_string();
        let key_hash = request.key();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<(i64, String, Vec<u8>)>, Error> {
                let mut stmt =
                    conn.prepare("SELECT status_code, headers_json, body FROM entries WHERE store = ?1 AND key_hash = ?2")?;

                let result = stmt.query_row(params![store, key_hash], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)));

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        let Some((status_code, headers_json, body)) = row else {
            return Ok(None);
        };

        let status = u16::try_from(status_code).map_err(|_| Error::Corrupt(format!("status code {status_code}")))?;
        let headers = serde_json::from_str(&headers_json)?;
        Ok(Some(CachedResponse { status, headers, body }))
    }

    /// URLs cached in a store, sorted.
    pub async fn keys(&self, store: &str) -> Result<Vec<String>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE store = ?1 ORDER BY url ASC")?;
                let urls = stmt
                    .query_map(params![store], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Every store with its entry count, oldest first.
    pub async fn store_summaries(&self) -> Result<Vec<StoreSummary>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<StoreSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT s.name, s.created_at, COUNT(e.key_hash)
                     FROM stores s LEFT JOIN entries e ON e.store = s.name
                     GROUP BY s.name, s.created_at
                     ORDER BY s.created_at ASC, s.name ASC",
                )?;
                let summaries = stmt
                    .query_map([], |row| {
                        Ok(StoreSummary {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(summaries)
            })
            .await
            .map_err(Error::from)
    }
}
