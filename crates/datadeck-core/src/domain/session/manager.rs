//! Session manager for orchestrating session lifecycle
//!
//! High-level operations: conflict-checked creation with roster generation,
//! pause/resume, archive/unarchive, deletion, and listings. Every mutating
//! call takes the acting `Principal` and enforces ownership.

use super::repository::{SessionRepository, SessionStatusFilter};
use super::session::Session;
use crate::domain::identity::{IdentityRepository, Principal, User};
use crate::domain::module::ModuleRepository;
use crate::domain::student::{
    CharacterTheme, GeneratedStudent, Student, StudentGenerator, StudentRepository,
};
use crate::error::{is_locked, Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

/// Default length of session join codes
pub const DEFAULT_CODE_LENGTH: usize = 8;

/// Input for creating a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub name: String,
    pub section: i64,
    pub module_id: Uuid,
    pub character_theme: CharacterTheme,
}

/// Result of a successful session creation
#[derive(Debug)]
pub struct CreatedSession {
    pub session: Session,
    /// The roster with plaintext PINs, available only at creation time
    pub students: Vec<GeneratedStudent>,
    /// The previously active session for the slot, if one was auto-archived
    pub archived_previous: Option<Session>,
}

/// Manager for session lifecycle operations
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: SessionRepository,
    modules: ModuleRepository,
    students: StudentRepository,
    identity: IdentityRepository,
    code_length: usize,
}

impl SessionManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            sessions: SessionRepository::new(pool.clone()),
            modules: ModuleRepository::new(pool.clone()),
            students: StudentRepository::new(pool.clone()),
            identity: IdentityRepository::new(pool),
            code_length: DEFAULT_CODE_LENGTH,
        }
    }

    pub fn with_code_length(mut self, length: usize) -> Self {
        self.code_length = length;
        self
    }

    pub fn repository(&self) -> &SessionRepository {
        &self.sessions
    }

    pub fn students(&self) -> &StudentRepository {
        &self.students
    }

    // ========== Creation and Conflict Resolution ==========

    /// Create a session with its full roster, resolving any slot conflict
    ///
    /// The conflict check, optional auto-archive of the previous session,
    /// session insert, and student generation all run in one immediate
    /// (write-locked) transaction, so concurrent creates serialize and the
    /// later one sees the winner at its conflict check. Without
    /// `auto_archive`, an occupied (teacher, section) slot returns
    /// `Error::Conflict` carrying the holder so the caller can offer
    /// archive-and-replace.
    pub async fn resolve_and_create(
        &self,
        principal: Principal,
        input: NewSession,
        student_count: usize,
        auto_archive: bool,
    ) -> Result<CreatedSession> {
        if !principal.role.can_create_sessions() {
            return Err(Error::Authorization(format!(
                "Role '{}' cannot create sessions",
                principal.role
            )));
        }
        if input.section < 1 {
            return Err(Error::Validation(format!(
                "Section must be 1 or greater, got {}",
                input.section
            )));
        }
        if input.name.trim().is_empty() {
            return Err(Error::Validation("Session name must not be empty".into()));
        }

        let module = self
            .modules
            .get(input.module_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Module {}", input.module_id)))?;
        if !module.is_active {
            return Err(Error::Validation(format!(
                "Module '{}' is no longer available",
                module.name
            )));
        }

        let section = input.section;
        let mut conn = self.sessions.pool().acquire().await?;

        // Take the write lock before reading the slot. A deferred
        // transaction that upgrades to a write at insert time gets
        // SQLITE_BUSY under WAL when it loses the race, instead of
        // reaching the partial unique index.
        if let Err(e) = sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await {
            if is_locked(&e) {
                if let Some(winner) = self
                    .sessions
                    .find_active_conflict(&mut conn, principal.id, section, None)
                    .await?
                {
                    return Err(Error::Conflict {
                        session_id: winner.id,
                        session_name: winner.name,
                    });
                }
            }
            return Err(e.into());
        }

        let result = self
            .create_in_slot(&mut conn, principal, input, student_count, auto_archive)
            .await;

        match result {
            Ok(created) => {
                if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    return Err(e.into());
                }
                info!(
                    session_id = %created.session.id,
                    teacher_id = %principal.id,
                    section,
                    students = created.students.len(),
                    archived_previous = created.archived_previous.is_some(),
                    "Created session"
                );
                Ok(created)
            }
            Err(e) => {
                if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    warn!(
                        teacher_id = %principal.id,
                        section,
                        "Rollback after failed create did not complete: {}",
                        rollback_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Body of [`resolve_and_create`](Self::resolve_and_create), run inside
    /// an already-open immediate transaction on `conn`. The caller commits
    /// on success and rolls back on error.
    async fn create_in_slot(
        &self,
        conn: &mut SqliteConnection,
        principal: Principal,
        input: NewSession,
        student_count: usize,
        auto_archive: bool,
    ) -> Result<CreatedSession> {
        let conflict = self
            .sessions
            .find_active_conflict(&mut *conn, principal.id, input.section, None)
            .await?;

        let archived_previous = match conflict {
            Some(existing) if !auto_archive => {
                return Err(Error::Conflict {
                    session_id: existing.id,
                    session_name: existing.name,
                });
            }
            Some(mut existing) => {
                info!(
                    session_id = %existing.id,
                    section = input.section,
                    "Auto-archiving previous session for section"
                );
                existing.archive();
                self.sessions.update(&mut *conn, &existing).await?;
                Some(existing)
            }
            None => None,
        };

        let code = self
            .sessions
            .generate_unique_code(&mut *conn, self.code_length)
            .await?;
        let session = Session::new(
            input.name,
            code,
            input.section,
            input.module_id,
            input.character_theme,
            principal.id,
        );

        match self.sessions.insert(&mut *conn, &session).await {
            Ok(()) => {}
            Err(Error::IntegrityViolation(msg)) => {
                // Writers are serialized, so reaching the index here means
                // the conflict check and the index disagree. Report the
                // holder if one is visible.
                warn!(
                    teacher_id = %principal.id,
                    section = input.section,
                    "Session insert hit the slot index: {}",
                    msg
                );
                return match self
                    .sessions
                    .find_active_conflict(&mut *conn, principal.id, input.section, None)
                    .await?
                {
                    Some(winner) => Err(Error::Conflict {
                        session_id: winner.id,
                        session_name: winner.name,
                    }),
                    None => Err(Error::IntegrityViolation(msg)),
                };
            }
            Err(e) => return Err(e),
        }

        let students = StudentGenerator::generate(&mut *conn, &session, student_count).await?;

        Ok(CreatedSession {
            session,
            students,
            archived_previous,
        })
    }

    // ========== Access ==========

    /// Get a session, enforcing ownership
    ///
    /// A session that exists but belongs to someone else is an authorization
    /// error, never a not-found.
    pub async fn get(&self, principal: Principal, session_id: Uuid) -> Result<Session> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Session {}", session_id)))?;

        if !principal.owns_or_overrides(session.created_by) {
            return Err(Error::Authorization(format!(
                "Session {} belongs to another teacher",
                session_id
            )));
        }
        Ok(session)
    }

    /// List a teacher's sessions
    pub async fn list(
        &self,
        principal: Principal,
        teacher_id: Uuid,
        filter: SessionStatusFilter,
    ) -> Result<Vec<Session>> {
        if !principal.owns_or_overrides(teacher_id) {
            return Err(Error::Authorization(
                "Cannot list sessions for another teacher".into(),
            ));
        }
        self.sessions.list_for_teacher(teacher_id, filter).await
    }

    /// List sessions visible to an observer: those of teachers sharing the
    /// observer's school and district
    pub async fn list_for_observer(
        &self,
        observer: &User,
        filter: SessionStatusFilter,
    ) -> Result<Vec<Session>> {
        let teacher_ids = self.identity.teacher_ids_for_observer(observer).await?;
        self.sessions.list_for_teachers(&teacher_ids, filter).await
    }

    // ========== Lifecycle ==========

    /// Pause student logins for a session. No-op if already paused.
    pub async fn pause(&self, principal: Principal, session_id: Uuid) -> Result<Session> {
        let mut session = self.get(principal, session_id).await?;

        if session.is_archived {
            return Err(Error::Validation(
                "Cannot pause an archived session".into(),
            ));
        }
        if session.is_paused {
            return Ok(session);
        }

        session.pause();
        let mut conn = self.sessions.pool().acquire().await?;
        self.sessions.update(&mut conn, &session).await?;

        info!(session_id = %session_id, "Session paused");
        Ok(session)
    }

    /// Resume student logins for a session. No-op if not paused.
    pub async fn unpause(&self, principal: Principal, session_id: Uuid) -> Result<Session> {
        let mut session = self.get(principal, session_id).await?;

        if session.is_archived {
            return Err(Error::Validation(
                "Cannot resume an archived session".into(),
            ));
        }
        if !session.is_paused {
            return Ok(session);
        }

        session.unpause();
        let mut conn = self.sessions.pool().acquire().await?;
        self.sessions.update(&mut conn, &session).await?;

        info!(session_id = %session_id, "Session resumed");
        Ok(session)
    }

    /// Archive a session, freeing its (teacher, section) slot. No-op if
    /// already archived.
    pub async fn archive(&self, principal: Principal, session_id: Uuid) -> Result<Session> {
        let mut session = self.get(principal, session_id).await?;

        if session.is_archived {
            return Ok(session);
        }

        session.archive();
        let mut conn = self.sessions.pool().acquire().await?;
        self.sessions.update(&mut conn, &session).await?;

        info!(session_id = %session_id, "Session archived");
        Ok(session)
    }

    /// Restore an archived session into its (teacher, section) slot
    ///
    /// Fails with `Error::Conflict` if another active session took the slot
    /// since archiving.
    pub async fn unarchive(&self, principal: Principal, session_id: Uuid) -> Result<Session> {
        let mut session = self.get(principal, session_id).await?;

        if !session.is_archived {
            return Ok(session);
        }

        let mut conn = self.sessions.pool().acquire().await?;

        // Same write-lock-first discipline as creation: nothing may claim
        // the slot between the check and the restoring update.
        if let Err(e) = sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await {
            if is_locked(&e) {
                if let Some(holder) = self
                    .sessions
                    .find_active_conflict(
                        &mut conn,
                        session.created_by,
                        session.section,
                        Some(session_id),
                    )
                    .await?
                {
                    return Err(Error::Conflict {
                        session_id: holder.id,
                        session_name: holder.name,
                    });
                }
            }
            return Err(e.into());
        }

        let result = self.restore_into_slot(&mut conn, &mut session).await;

        match result {
            Ok(()) => {
                if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
                    let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                    return Err(e.into());
                }
                info!(session_id = %session_id, "Session unarchived");
                Ok(session)
            }
            Err(e) => {
                if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    warn!(
                        session_id = %session_id,
                        "Rollback after failed unarchive did not complete: {}",
                        rollback_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Body of [`unarchive`](Self::unarchive), run inside an already-open
    /// immediate transaction on `conn`.
    async fn restore_into_slot(
        &self,
        conn: &mut SqliteConnection,
        session: &mut Session,
    ) -> Result<()> {
        if let Some(holder) = self
            .sessions
            .find_active_conflict(
                &mut *conn,
                session.created_by,
                session.section,
                Some(session.id),
            )
            .await?
        {
            return Err(Error::Conflict {
                session_id: holder.id,
                session_name: holder.name,
            });
        }

        session.unarchive();
        match self.sessions.update(&mut *conn, session).await {
            Ok(()) => Ok(()),
            Err(Error::IntegrityViolation(msg)) => {
                warn!(
                    session_id = %session.id,
                    "Unarchive hit the slot index: {}",
                    msg
                );
                match self
                    .sessions
                    .find_active_conflict(
                        &mut *conn,
                        session.created_by,
                        session.section,
                        Some(session.id),
                    )
                    .await?
                {
                    Some(winner) => Err(Error::Conflict {
                        session_id: winner.id,
                        session_name: winner.name,
                    }),
                    None => Err(Error::IntegrityViolation(msg)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a session and its entire roster, from any lifecycle state
    pub async fn delete(&self, principal: Principal, session_id: Uuid) -> Result<bool> {
        self.get(principal, session_id).await?;
        let deleted = self.sessions.delete(session_id).await?;
        info!(session_id = %session_id, "Session deleted");
        Ok(deleted)
    }

    // ========== Roster Operations ==========

    /// A session's roster, alphabetical by character name
    pub async fn list_students(
        &self,
        principal: Principal,
        session_id: Uuid,
    ) -> Result<Vec<Student>> {
        self.get(principal, session_id).await?;
        self.students.list_for_session(session_id).await
    }

    /// Reset one student's PIN, returning the new plaintext once
    pub async fn reset_student_pin(
        &self,
        principal: Principal,
        student_id: Uuid,
    ) -> Result<GeneratedStudent> {
        let student = self
            .students
            .get(student_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Student {}", student_id)))?;

        if !principal.owns_or_overrides(student.teacher_id) {
            return Err(Error::Authorization(format!(
                "Student {} belongs to another teacher",
                student_id
            )));
        }

        let result = self.students.reset_pin(&student).await?;
        info!(student_id = %student_id, "Student PIN reset");
        Ok(result)
    }

    /// Reset every PIN in a session's roster
    pub async fn reset_all_pins(
        &self,
        principal: Principal,
        session_id: Uuid,
    ) -> Result<Vec<GeneratedStudent>> {
        self.get(principal, session_id).await?;
        let results = self.students.reset_all_pins(session_id).await?;
        info!(
            session_id = %session_id,
            count = results.len(),
            "All session PINs reset"
        );
        Ok(results)
    }

    /// Remove one student and its account from a session
    pub async fn remove_student(&self, principal: Principal, student_id: Uuid) -> Result<bool> {
        let student = self
            .students
            .get(student_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Student {}", student_id)))?;

        if !principal.owns_or_overrides(student.teacher_id) {
            return Err(Error::Authorization(format!(
                "Student {} belongs to another teacher",
                student_id
            )));
        }

        let deleted = self.students.delete(&student).await?;
        info!(student_id = %student_id, session_id = %student.session_id, "Student removed");
        Ok(deleted)
    }
}
