//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_code TEXT PRIMARY KEY,
                name TEXT,
                date_of_birth TEXT,
                gender TEXT,
                eye_color TEXT,
                relationship_status TEXT,
                job_title TEXT,
                mobile TEXT,
                email TEXT,
                location TEXT,
                photo_url TEXT,
                bio TEXT,
                accepted_terms INTEGER NOT NULL DEFAULT 0,
                accepted_privacy INTEGER NOT NULL DEFAULT 0,
                onboarding_step INTEGER NOT NULL DEFAULT 0,
                is_onboarding_complete INTEGER NOT NULL DEFAULT 0,
                onboarding_completed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_profiles_updated ON profiles(updated_at);

            CREATE TABLE IF NOT EXISTS link_categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                icon TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS profile_links (
                id TEXT PRIMARY KEY,
                user_code TEXT NOT NULL REFERENCES profiles(user_code) ON DELETE CASCADE,
                label TEXT NOT NULL,
                url TEXT NOT NULL,
                category_id TEXT NOT NULL,
                description TEXT,
                display_order INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_profile_links_user ON profile_links(user_code);
        "#,
    },
    Migration {
        version: 2,
        name: "seed_link_categories",
        sql: r#"
            INSERT OR IGNORE INTO link_categories (id, name, icon, sort_order) VALUES
                ('website', 'Website', 'globe', 1),
                ('instagram', 'Instagram', 'instagram', 2),
                ('x', 'X', 'x', 3),
                ('linkedin', 'LinkedIn', 'linkedin', 4),
                ('youtube', 'YouTube', 'youtube', 5),
                ('tiktok', 'TikTok', 'tiktok', 6),
                ('github', 'GitHub', 'github', 7),
                ('email', 'Email', 'mail', 8),
                ('other', 'Other', 'link', 99);
        "#,
    },
];

/// Run all pending migrations.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    let version = get_current_version(conn).await?;
    tracing::info!("Database migrations complete (at V{version})");

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
