//! Metadata migrations, embedded at compile time.
//!
//! Destination tables are shaped by their pipeline's `TableSchema`; the only
//! tables wsync owns itself are the run log and the migration ledger.

use rusqlite::{Connection, Result};
use tracing::info;

/// A single migration with version identifier and SQL content.
struct Migration {
    version: &'static str,
    sql: &'static str,
}

/// All migrations in order.
///
/// The `wsync_migrations` table tracks which have been applied.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001_create_sync_runs",
        sql: "CREATE TABLE IF NOT EXISTS wsync_runs (
                id TEXT PRIMARY KEY,
                pipeline TEXT NOT NULL,
                mode TEXT NOT NULL,
                window_start TEXT,
                window_end TEXT,
                rows_written INTEGER NOT NULL DEFAULT 0,
                rows_deleted INTEGER NOT NULL DEFAULT 0,
                entities_succeeded INTEGER NOT NULL DEFAULT 0,
                entities_empty INTEGER NOT NULL DEFAULT 0,
                entities_failed INTEGER NOT NULL DEFAULT 0,
                days_committed INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                error TEXT,
                started_at INTEGER NOT NULL,
                finished_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_wsync_runs_pipeline
                ON wsync_runs (pipeline, started_at DESC);",
    },
];

/// Run all pending migrations on the database.
///
/// Already-applied migrations are skipped, so this is safe to call on every
/// open. Each migration runs in its own transaction together with its ledger
/// entry.
///
/// # Errors
///
/// Returns an error if a migration fails to apply.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS wsync_migrations (
            version TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let applied: std::collections::HashSet<String> = conn
        .prepare("SELECT version FROM wsync_migrations")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for migration in MIGRATIONS {
        if applied.contains(migration.version) {
            continue;
        }

        info!(version = migration.version, "Applying migration");

        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO wsync_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().timestamp_millis()],
        )?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_migrations_fresh_db() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).expect("Migrations should apply to fresh database");

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM wsync_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let has_days: bool = conn
            .prepare("SELECT 1 FROM pragma_table_info('wsync_runs') WHERE name = 'days_committed'")
            .unwrap()
            .exists([])
            .unwrap();
        assert!(has_days);

        let has_index: bool = conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = 'idx_wsync_runs_pipeline'")
            .unwrap()
            .exists([])
            .unwrap();
        assert!(has_index);
    }

    #[test]
    fn test_run_migrations_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();

        run_migrations(&mut conn).expect("First run should succeed");
        run_migrations(&mut conn).expect("Second run should succeed (idempotent)");

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM wsync_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
