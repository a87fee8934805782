//! Database schema migrations.
//!
//! Applied versions are recorded in `_migrations`; each run applies only
//! the versions above the recorded maximum.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

/// Ordered migration list: (version, SQL). Every statement is `IF NOT EXISTS`.
const MIGRATIONS: &[(i64, &str)] = &[
    (1, include_str!("../../migrations/001_stores.sql")),
    (2, include_str!("../../migrations/002_entries.sql")),
];

/// Highest migration version shipped with this build.
fn latest_version() -> i64 {
    MIGRATIONS.last().map(|(v, _)| *v).unwrap_or(0)
}

fn current_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))
        .map_err(Error::from)
}

/// Run any pending migrations.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute, or if the database
/// was migrated by a newer build.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current = current_version(conn)?;
        if current > latest_version() {
            return Err(Error::MigrationFailed(format!(
                "database is at version {current}, newer than supported version {}",
                latest_version()
            )));
        }
        let pending = MIGRATIONS.iter().filter(|(version, _)| *version > current);

        for (version, sql) in pending {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "applied cache migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
