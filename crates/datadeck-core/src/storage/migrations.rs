//! Database migrations
//!
//! This module manages SQLite schema migrations for DataDeck.
//! Migrations are versioned and applied automatically on database connection.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Identity store (districts, schools, users)
const MIGRATION_V1: &str = r#"
    -- Districts table
    CREATE TABLE IF NOT EXISTS districts (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_districts_is_active ON districts(is_active);

    -- Schools table (each school belongs to exactly one district)
    CREATE TABLE IF NOT EXISTS schools (
        id TEXT PRIMARY KEY NOT NULL,
        district_id TEXT NOT NULL REFERENCES districts(id),
        name TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_schools_district_id ON schools(district_id);

    -- Users table: teachers, admins, staff, observers, and student accounts
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY NOT NULL,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        first_name TEXT,
        last_name TEXT,
        role TEXT NOT NULL CHECK (role IN ('admin', 'staff', 'teacher', 'observer', 'student')),
        school_id TEXT REFERENCES schools(id),
        district_id TEXT REFERENCES districts(id),
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
    CREATE INDEX IF NOT EXISTS idx_users_school_id ON users(school_id);
    CREATE INDEX IF NOT EXISTS idx_users_district_id ON users(district_id);
"#;

/// Migration 2: Module registry
const MIGRATION_V2: &str = r#"
    -- Curriculum modules selectable at session creation
    CREATE TABLE IF NOT EXISTS modules (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        sort_order INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_modules_active_sort ON modules(is_active, sort_order);
"#;

/// Migration 3: Sessions and students
///
/// The partial unique index on (created_by, section) for non-archived rows is
/// the database-level enforcement of the core invariant: at most one active
/// session per teacher and section. The service checks first for a friendly
/// conflict message; the index closes the check-then-act race.
const MIGRATION_V3: &str = r#"
    -- Sessions table
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        original_name TEXT,
        session_code TEXT NOT NULL UNIQUE,
        section INTEGER NOT NULL,
        module_id TEXT NOT NULL REFERENCES modules(id),
        character_theme TEXT NOT NULL CHECK (character_theme IN ('animals', 'superheroes', 'fantasy', 'space')),
        is_paused INTEGER NOT NULL DEFAULT 0,
        is_archived INTEGER NOT NULL DEFAULT 0,
        archived_at TIMESTAMP,
        created_by TEXT NOT NULL REFERENCES users(id),
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_created_by ON sessions(created_by);
    CREATE INDEX IF NOT EXISTS idx_sessions_created_at ON sessions(created_at);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_active_teacher_section
        ON sessions(created_by, section) WHERE is_archived = 0;

    -- Students table: session-scoped specialization of a users row
    CREATE TABLE IF NOT EXISTS students (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        teacher_id TEXT NOT NULL REFERENCES users(id),
        character_name TEXT NOT NULL,
        pin_hash TEXT NOT NULL,
        avatar_path TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(session_id, character_name)
    );

    CREATE INDEX IF NOT EXISTS idx_students_session_id ON students(session_id);
    CREATE INDEX IF NOT EXISTS idx_students_teacher_id ON students(teacher_id);
"#;

/// Get the current schema version from the database
async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    // Ensure migrations table exists
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let row: Option<(i32,)> = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(v,)| v).unwrap_or(0))
}

/// Record that a migration has been applied
async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    if current_version < 1 {
        tracing::info!("Applying migration v1: Identity store");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Module registry");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    if current_version < 3 {
        tracing::info!("Applying migration v3: Sessions and students");
        sqlx::raw_sql(MIGRATION_V3).execute(pool).await?;
        record_migration(pool, 3).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Check if the database needs migrations
pub async fn needs_migration(pool: &SqlitePool) -> anyhow::Result<bool> {
    let current_version = get_current_version(pool).await?;
    Ok(current_version < CURRENT_VERSION)
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool")
    }

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await;

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, 0);
        assert!(status.needs_migration);

        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
        assert!(!status.needs_migration);
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let pool = create_test_pool().await;

        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let status = migration_status(&pool).await.unwrap();
        assert_eq!(status.current_version, CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        let tables = vec![
            "districts",
            "schools",
            "users",
            "modules",
            "sessions",
            "students",
        ];

        for table in tables {
            let result: (i32,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&pool)
                .await
                .unwrap_or_else(|_| panic!("Table {} should exist", table));
            assert_eq!(result.0, 0, "Table {} should be empty", table);
        }
    }

    #[tokio::test]
    async fn test_active_session_partial_index_enforced() {
        let pool = create_test_pool().await;
        run_migrations(&pool).await.unwrap();

        sqlx::query("INSERT INTO users (id, username, email, password_hash, role) VALUES ('t1', 'teacher', 't@example.com', 'x', 'teacher')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO modules (id, name) VALUES ('m1', 'Data Basics')")
            .execute(&pool)
            .await
            .unwrap();

        let insert = "INSERT INTO sessions (id, name, session_code, section, module_id, character_theme, created_by) \
                      VALUES (?, ?, ?, 3, 'm1', 'animals', 't1')";

        sqlx::query(insert)
            .bind("s1")
            .bind("First")
            .bind("AAAA1111")
            .execute(&pool)
            .await
            .unwrap();

        // Second active session for the same (teacher, section) must be rejected
        let err = sqlx::query(insert)
            .bind("s2")
            .bind("Second")
            .bind("BBBB2222")
            .execute(&pool)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("UNIQUE"));

        // Archiving the first frees the slot
        sqlx::query("UPDATE sessions SET is_archived = 1 WHERE id = 's1'")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(insert)
            .bind("s3")
            .bind("Third")
            .bind("CCCC3333")
            .execute(&pool)
            .await
            .unwrap();
    }
}
