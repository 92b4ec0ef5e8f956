//! Schema migrations.
//!
//! The schema version lives in SQLite's `user_version` header field. Each
//! pending step runs in its own transaction together with the version bump,
//! so a failed step leaves the database at the previous version.

use super::Error;
use tokio_rusqlite::{Connection, rusqlite};

/// Schema steps in order; step `n` upgrades `user_version` from `n` to `n + 1`.
const MIGRATIONS: &[&str] = &[include_str!("../../migrations/001_cache_stores.sql")];

/// Bring the schema up to date.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current = schema_version(conn)?;
        if current > MIGRATIONS.len() {
            return Err(Error::MigrationFailed(format!(
                "database schema version {current} is newer than this build ({})",
                MIGRATIONS.len()
            )));
        }

        for (step, sql) in MIGRATIONS.iter().enumerate().skip(current) {
            let target = step + 1;
            tracing::debug!(version = target, "migrating cache schema");
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {target}: {e}")))?;
            tx.pragma_update(None, "user_version", target as i64)?;
            tx.commit()?;
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}

fn schema_version(conn: &rusqlite::Connection) -> Result<usize, Error> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    usize::try_from(version).map_err(|_| Error::Corrupt(format!("schema version {version}")))
}
