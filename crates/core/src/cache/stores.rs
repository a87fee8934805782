//! SQLite implementation of [`CacheStorage`].
//!
//! Stores live in the `stores` table; their entries cascade from it, so
//! deleting a store drops every entry in one statement.

use super::CacheStorage;
use super::connection::CacheDb;
use super::hash::request_key;
use crate::Error;
use crate::message::{CacheRequest, StoredResponse};
use http::{Method, StatusCode};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use url::Url;

/// Owned entry ready to be written on the database thread.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status_code: i64,
    response_url: String,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn build(request: &CacheRequest, response: &StoredResponse) -> Result<Self, Error> {
        response.ensure_storable()?;
        Ok(Self {
            key_hash: request_key(request),
            method: request.method().as_str().to_string(),
            url: request.url().to_string(),
            status_code: i64::from(response.status.as_u16()),
            response_url: response.url.to_string(),
            headers_json: response.headers_json()?,
            body: response.body.to_vec(),
        })
    }
}

/// Entry as read back from the database.
struct StoredRow {
    status_code: i64,
    response_url: String,
    headers_json: String,
    body: Vec<u8>,
}

impl StoredRow {
    fn into_response(self) -> Result<StoredResponse, Error> {
        let status = u16::try_from(self.status_code)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| Error::CorruptEntry(format!("status {}", self.status_code)))?;
        let url = Url::parse(&self.response_url).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let headers = StoredResponse::headers_from_json(&self.headers_json)?;
        Ok(StoredResponse::new(url, status, headers, self.body))
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow { status_code: row.get(0)?, response_url: row.get(1)?, headers_json: row.get(2)?, body: row.get(3)? })
}

fn ensure_store(conn: &rusqlite::Connection, name: &str) -> Result<i64, Error> {
    conn.execute(
        "INSERT INTO stores (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    let id = conn.query_row("SELECT id FROM stores WHERE name = ?1", params![name], |row| row.get(0))?;
    Ok(id)
}

fn store_id(conn: &rusqlite::Connection, name: &str) -> Result<Option<i64>, Error> {
    let id = conn
        .query_row("SELECT id FROM stores WHERE name = ?1", params![name], |row| row.get(0))
        .optional()?;
    Ok(id)
}

fn write_entry(conn: &rusqlite::Connection, store_id: i64, entry: &EntryRow) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO entries (
            store_id, key_hash, method, url, status_code, response_url,
            headers_json, body, stored_at, seq
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
            (SELECT COALESCE(MAX(seq), 0) + 1 FROM entries WHERE store_id = ?1))
        ON CONFLICT(store_id, key_hash) DO UPDATE SET
            status_code = excluded.status_code,
            response_url = excluded.response_url,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at,
            seq = excluded.seq",
        params![
            store_id,
            &entry.key_hash,
            &entry.method,
            &entry.url,
            entry.status_code,
            &entry.response_url,
            &entry.headers_json,
            &entry.body,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

#[async_trait::async_trait]
impl CacheStorage for CacheDb {
    async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM stores WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM stores ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM stores WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(&self, request: &CacheRequest) -> Result<Option<StoredResponse>, Error> {
        let key_hash = request_key(request);
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let row = conn
                    .query_row(
                        "SELECT e.status_code, e.response_url, e.headers_json, e.body
                        FROM entries e JOIN stores s ON s.id = e.store_id
                        WHERE e.key_hash = ?1
                        ORDER BY s.id ASC LIMIT 1",
                        params![key_hash],
                        read_row,
                    )
                    .optional()?;
                row.map(StoredRow::into_response).transpose()
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, name: &str, request: &CacheRequest, response: &StoredResponse) -> Result<bool, Error> {
        let name = name.to_string();
        let entry = EntryRow::build(request, response)?;
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                let Some(store_id) = store_id(&tx, &name)? else {
                    return Ok(false);
                };
                write_entry(&tx, store_id, &entry)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, name: &str, entries: Vec<(CacheRequest, StoredResponse)>) -> Result<(), Error> {
        let name = name.to_string();
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::build(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                let store_id = ensure_store(&tx, &name)?;
                for row in &rows {
                    write_entry(&tx, store_id, row)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, name: &str) -> Result<Vec<CacheRequest>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<CacheRequest>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.method, e.url
                    FROM entries e JOIN stores s ON s.id = e.store_id
                    WHERE s.name = ?1
                    ORDER BY e.seq ASC",
                )?;
                let pairs = stmt
                    .query_map(params![name], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;

                pairs
                    .into_iter()
                    .map(|(method, url)| {
                        let method =
                            Method::from_bytes(method.as_bytes()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
                        let url = Url::parse(&url).map_err(|e| Error::CorruptEntry(e.to_string()))?;
                        Ok(CacheRequest::new(method, url))
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }
}
