use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: [&str; 8] = [
    r"
        CREATE TABLE IF NOT EXISTS applications (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            university TEXT NOT NULL,
            program TEXT NOT NULL,
            country TEXT NOT NULL,
            degree TEXT NOT NULL,
            program_link TEXT,
            portal_link TEXT,
            status TEXT NOT NULL,
            funding TEXT NOT NULL,
            progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS requirements (
            id INTEGER PRIMARY KEY,
            application_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            criteria_type TEXT,
            criteria_value TEXT,
            min_score REAL,
            waived INTEGER NOT NULL DEFAULT 0,
            conversion_notes TEXT,
            num_recommenders INTEGER CHECK (num_recommenders IS NULL OR num_recommenders >= 0),
            FOREIGN KEY (application_id) REFERENCES applications(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS recommenders (
            id INTEGER PRIMARY KEY,
            application_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            email TEXT,
            kind TEXT NOT NULL,
            status TEXT NOT NULL,
            FOREIGN KEY (application_id) REFERENCES applications(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS important_dates (
            id INTEGER PRIMARY KEY,
            application_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            FOREIGN KEY (application_id) REFERENCES applications(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_applications_user_created
            ON applications (user_id, created_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_requirements_application
            ON requirements (application_id, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_recommenders_application
            ON recommenders (application_id, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_important_dates_application_date
            ON important_dates (application_id, date);
    ",
];

/// Runs the versioned migrations for the current schema.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: applications with their requirements, recommenders and dates.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
