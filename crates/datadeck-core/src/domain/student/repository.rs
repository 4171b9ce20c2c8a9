//! Student repository for database operations

use super::generator::GeneratedStudent;
use super::pin;
use super::student::Student;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

const STUDENT_COLUMNS: &str = "s.id, s.user_id, s.session_id, s.teacher_id, s.character_name, \
     u.username, s.pin_hash, s.avatar_path, s.created_at";

/// Repository for student database operations
#[derive(Debug, Clone)]
pub struct StudentRepository {
    pool: SqlitePool,
}

impl StudentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn get(&self, student_id: Uuid) -> Result<Option<Student>> {
        let row: Option<StudentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {STUDENT_COLUMNS}
            FROM students s
            JOIN users u ON u.id = s.user_id
            WHERE s.id = ?
            "#
        ))
        .bind(student_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(StudentRow::into_student).transpose()
    }

    /// A session's roster, alphabetical by character name
    pub async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<Student>> {
        let rows: Vec<StudentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {STUDENT_COLUMNS}
            FROM students s
            JOIN users u ON u.id = s.user_id
            WHERE s.session_id = ?
            ORDER BY s.character_name
            "#
        ))
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StudentRow::into_student).collect()
    }

    /// Every student across a teacher's sessions
    pub async fn list_for_teacher(&self, teacher_id: Uuid) -> Result<Vec<Student>> {
        let rows: Vec<StudentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {STUDENT_COLUMNS}
            FROM students s
            JOIN users u ON u.id = s.user_id
            WHERE s.teacher_id = ?
            ORDER BY s.session_id, s.character_name
            "#
        ))
        .bind(teacher_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StudentRow::into_student).collect()
    }

    pub async fn count_for_session(&self, session_id: Uuid) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM students WHERE session_id = ?")
                .bind(session_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Replace a student's PIN with a fresh random one
    ///
    /// Both the student record and the backing user account get the new
    /// hash. The plaintext PIN is returned once and never stored.
    /// Replace a student's PIN with a fresh random one
    pub async fn reset_pin(&self, student: &Student) -> Result<GeneratedStudent> {
        let mut tx = self.pool.begin().await?;
        let reset = apply_pin_reset(&mut tx, student).await?;
        tx.commit().await?;
        Ok(reset)
    }

    /// Reset every PIN in a session's roster, returning the new plaintext
    /// PINs once
    ///
    /// The whole roster is reset in one transaction; a failure partway
    /// through leaves every existing PIN intact.
    pub async fn reset_all_pins(&self, session_id: Uuid) -> Result<Vec<GeneratedStudent>> {
        let roster = self.list_for_session(session_id).await?;

        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(roster.len());
        for student in &roster {
            results.push(apply_pin_reset(&mut tx, student).await?);
        }
        tx.commit().await?;

        Ok(results)
    }

    /// Remove a student and its backing user account
    pub async fn delete(&self, student: &Student) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(student.id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(student.user_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Write a fresh PIN for one student onto `conn`
///
/// Both the student record and the backing user account get the new hash.
/// The plaintext PIN is returned once and never stored.
async fn apply_pin_reset(
    conn: &mut SqliteConnection,
    student: &Student,
) -> Result<GeneratedStudent> {
    let new_pin = pin::generate_pin();
    let new_hash = pin::hash_pin(&new_pin);
    let now = Utc::now();

    sqlx::query("UPDATE students SET pin_hash = ? WHERE id = ?")
        .bind(&new_hash)
        .bind(student.id.to_string())
        .execute(&mut *conn)
        .await?;

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&new_hash)
        .bind(now)
        .bind(student.user_id.to_string())
        .execute(&mut *conn)
        .await?;

    let mut updated = student.clone();
    updated.pin_hash = new_hash;
    Ok(GeneratedStudent {
        student: updated,
        pin: new_pin,
    })
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: String,
    user_id: String,
    session_id: String,
    teacher_id: String,
    character_name: String,
    username: String,
    pin_hash: String,
    avatar_path: String,
    created_at: DateTime<Utc>,
}

impl StudentRow {
    fn into_student(self) -> Result<Student> {
        Ok(Student {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| Error::Parse(format!("Invalid student ID: {}", e)))?,
            user_id: Uuid::parse_str(&self.user_id)
                .map_err(|e| Error::Parse(format!("Invalid user ID: {}", e)))?,
            session_id: Uuid::parse_str(&self.session_id)
                .map_err(|e| Error::Parse(format!("Invalid session ID: {}", e)))?,
            teacher_id: Uuid::parse_str(&self.teacher_id)
                .map_err(|e| Error::Parse(format!("Invalid teacher ID: {}", e)))?,
            character_name: self.character_name,
            username: self.username,
            pin_hash: self.pin_hash,
            avatar_path: self.avatar_path,
            created_at: self.created_at,
        })
    }
}
