//! Session repository for database operations
//!
//! Mutating methods that participate in the create/resolve transaction take
//! a `&mut SqliteConnection` so the manager can thread a single transaction
//! through conflict checks, inserts, and student generation.

use super::session::Session;
use crate::domain::student::CharacterTheme;
use crate::error::{is_unique_violation, Error, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Alphabet for session join codes; uppercase alphanumerics only so codes
/// survive being read aloud and written on a whiteboard
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Attempts at drawing a free session code before giving up
const CODE_MAX_ATTEMPTS: u32 = 32;

/// Status filter for session listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatusFilter {
    /// Non-archived sessions regardless of pause state
    Active,
    /// Non-archived sessions that are paused
    Paused,
    /// Archived sessions
    Archived,
    All,
}

impl SessionStatusFilter {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "archived" => Some(Self::Archived),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn where_clause(&self) -> &'static str {
        match self {
            Self::Active => "AND is_archived = 0",
            Self::Paused => "AND is_archived = 0 AND is_paused = 1",
            Self::Archived => "AND is_archived = 1",
            Self::All => "",
        }
    }
}

/// Repository for session database operations
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========== Session CRUD ==========

    /// Insert a new session
    ///
    /// A violation of the one-active-per-(teacher, section) partial index is
    /// reported as `Error::IntegrityViolation`; the manager translates it
    /// into a user-facing conflict after re-reading the winning row.
    pub async fn insert(&self, conn: &mut SqliteConnection, session: &Session) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (
                id, name, original_name, session_code, section, module_id,
                character_theme, is_paused, is_archived, archived_at,
                created_by, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(&session.name)
        .bind(&session.original_name)
        .bind(&session.session_code)
        .bind(session.section)
        .bind(session.module_id.to_string())
        .bind(session.character_theme.as_str())
        .bind(session.is_paused)
        .bind(session.is_archived)
        .bind(session.archived_at)
        .bind(session.created_by.to_string())
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&mut *conn)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e, "sessions.created_by, sessions.section") => {
                Err(Error::IntegrityViolation(format!(
                    "Active session already exists for teacher {} section {}",
                    session.created_by, session.section
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Update an existing session
    ///
    /// Like `insert`, maps a partial-index violation (possible when
    /// unarchiving into an occupied slot) to `Error::IntegrityViolation`.
    pub async fn update(&self, conn: &mut SqliteConnection, session: &Session) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET
                name = ?,
                original_name = ?,
                section = ?,
                module_id = ?,
                character_theme = ?,
                is_paused = ?,
                is_archived = ?,
                archived_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&session.name)
        .bind(&session.original_name)
        .bind(session.section)
        .bind(session.module_id.to_string())
        .bind(session.character_theme.as_str())
        .bind(session.is_paused)
        .bind(session.is_archived)
        .bind(session.archived_at)
        .bind(session.updated_at)
        .bind(session.id.to_string())
        .execute(&mut *conn)
        .await;

        match result {
            Ok(r) if r.rows_affected() == 0 => {
                Err(Error::NotFound(format!("Session {}", session.id)))
            }
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e, "sessions.created_by, sessions.section") => {
                Err(Error::IntegrityViolation(format!(
                    "Active session already exists for teacher {} section {}",
                    session.created_by, session.section
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get a session by ID
    pub async fn get(&self, session_id: Uuid) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"
        ))
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRow::into_session).transpose()
    }

    /// Delete a session and its entire student roster, including the user
    /// accounts generated for the students. Runs in its own transaction.
    pub async fn delete(&self, session_id: Uuid) -> Result<bool> {
        let id = session_id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM users
            WHERE id IN (SELECT user_id FROM students WHERE session_id = ?)
            "#,
        )
        .bind(&id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM students WHERE session_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // ========== Conflict Detection ==========

    /// Find the active session holding a (teacher, section) slot
    ///
    /// Returns `Ok(None)` when the slot is free and `Ok(Some)` for exactly
    /// one holder. More than one non-archived row for the slot means the
    /// database invariant itself is broken, reported as
    /// `Error::IntegrityViolation` rather than silently picking one.
    pub async fn find_active_conflict(
        &self,
        conn: &mut SqliteConnection,
        teacher_id: Uuid,
        section: i64,
        exclude: Option<Uuid>,
    ) -> Result<Option<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE created_by = ? AND section = ? AND is_archived = 0
            "#
        ))
        .bind(teacher_id.to_string())
        .bind(section)
        .fetch_all(&mut *conn)
        .await?;

        let exclude = exclude.map(|id| id.to_string());
        let mut sessions: Vec<Session> = rows
            .into_iter()
            .filter(|row| exclude.as_deref() != Some(row.id.as_str()))
            .map(SessionRow::into_session)
            .collect::<Result<_>>()?;

        match sessions.len() {
            0 => Ok(None),
            1 => Ok(sessions.pop()),
            n => Err(Error::IntegrityViolation(format!(
                "{} active sessions found for teacher {} section {}, expected at most 1",
                n, teacher_id, section
            ))),
        }
    }

    // ========== Listing ==========

    /// List a teacher's sessions, newest first
    pub async fn list_for_teacher(
        &self,
        teacher_id: Uuid,
        filter: SessionStatusFilter,
    ) -> Result<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE created_by = ? {}
            ORDER BY created_at DESC
            "#,
            filter.where_clause()
        ))
        .bind(teacher_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SessionRow::into_session).collect()
    }

    /// List sessions belonging to any of the given teachers, newest first.
    /// Used for observer visibility over a school's teachers.
    pub async fn list_for_teachers(
        &self,
        teacher_ids: &[Uuid],
        filter: SessionStatusFilter,
    ) -> Result<Vec<Session>> {
        if teacher_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; teacher_ids.len()].join(", ");
        let sql = format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE created_by IN ({placeholders}) {}
            ORDER BY created_at DESC
            "#,
            filter.where_clause()
        );
        let mut query = sqlx::query_as(&sql);
        for id in teacher_ids {
            query = query.bind(id.to_string());
        }

        let rows: Vec<SessionRow> = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(SessionRow::into_session).collect()
    }

    // ========== Session Codes ==========

    /// Draw a session join code not used by any existing session
    ///
    /// Codes are checked inside the caller's transaction; the UNIQUE column
    /// constraint backstops the check at insert time.
    pub async fn generate_unique_code(
        &self,
        conn: &mut SqliteConnection,
        length: usize,
    ) -> Result<String> {
        for _ in 0..CODE_MAX_ATTEMPTS {
            let code = random_code(length);
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT 1 FROM sessions WHERE session_code = ?")
                    .bind(&code)
                    .fetch_optional(&mut *conn)
                    .await?;
            if exists.is_none() {
                return Ok(code);
            }
        }

        Err(Error::IntegrityViolation(format!(
            "Failed to generate a unique session code after {} attempts",
            CODE_MAX_ATTEMPTS
        )))
    }
}

fn random_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

const SESSION_COLUMNS: &str = "id, name, original_name, session_code, section, module_id, \
     character_theme, is_paused, is_archived, archived_at, \
     created_by, created_at, updated_at";

// ========== Database Row Types ==========

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    name: String,
    original_name: Option<String>,
    session_code: String,
    section: i64,
    module_id: String,
    character_theme: String,
    is_paused: bool,
    is_archived: bool,
    archived_at: Option<DateTime<Utc>>,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> Result<Session> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| Error::Parse(format!("Invalid session ID: {}", e)))?;
        let module_id = Uuid::parse_str(&self.module_id)
            .map_err(|e| Error::Parse(format!("Invalid module ID: {}", e)))?;
        let created_by = Uuid::parse_str(&self.created_by)
            .map_err(|e| Error::Parse(format!("Invalid teacher ID: {}", e)))?;
        let character_theme = CharacterTheme::from_str(&self.character_theme).ok_or_else(|| {
            Error::Parse(format!("Invalid character theme: {}", self.character_theme))
        })?;

        Ok(Session {
            id,
            name: self.name,
            original_name: self.original_name,
            session_code: self.session_code,
            section: self.section,
            module_id,
            character_theme,
            is_paused: self.is_paused,
            is_archived: self.is_archived,
            archived_at: self.archived_at,
            created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
