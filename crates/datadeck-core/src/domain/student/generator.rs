//! Batch student generation
//!
//! Generates a session's whole roster inside the caller's transaction:
//! either every student (user account plus student record) lands, or none
//! do. Character names are drawn without replacement from the session's
//! theme pool and PINs are unique within the batch.

use super::pin;
use super::student::Student;
use crate::domain::identity::Role;
use crate::domain::session::Session;
use crate::error::{is_unique_violation, Error, Result};
use chrono::Utc;
use rand::seq::SliceRandom;
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

/// Largest roster a single session may hold
pub const MAX_STUDENTS: usize = 40;

/// Attempts at drawing a batch-unique PIN before giving up
const PIN_MAX_ATTEMPTS: u32 = 1000;

/// A freshly generated student together with its plaintext PIN
///
/// The PIN exists in plaintext only here; it is never stored or retrievable
/// again after this value is dropped.
#[derive(Debug, Clone)]
pub struct GeneratedStudent {
    pub student: Student,
    pub pin: String,
}

/// Generator for session rosters
pub struct StudentGenerator;

impl StudentGenerator {
    /// Generate `count` students for a session inside the caller's
    /// transaction
    ///
    /// Fails with `Error::GenerationExhausted` when the theme's name pool
    /// cannot cover the request, and with `Error::IntegrityViolation` if an
    /// insert collides with an existing character name in the session. The
    /// caller rolls the transaction back on any error.
    pub async fn generate(
        conn: &mut SqliteConnection,
        session: &Session,
        count: usize,
    ) -> Result<Vec<GeneratedStudent>> {
        if count == 0 || count > MAX_STUDENTS {
            return Err(Error::Validation(format!(
                "Student count must be between 1 and {}, got {}",
                MAX_STUDENTS, count
            )));
        }

        let theme = session.character_theme;
        let pool = theme.name_pool();
        if count > pool.len() {
            return Err(Error::GenerationExhausted {
                theme: theme.to_string(),
                available: pool.len(),
                requested: count,
            });
        }

        let mut rng = rand::thread_rng();
        let names: Vec<&String> = pool.choose_multiple(&mut rng, count).collect();
        let pins = generate_batch_pins(count)?;

        let mut generated = Vec::with_capacity(count);
        for (i, (name, pin)) in names.into_iter().zip(pins).enumerate() {
            let student =
                insert_student(conn, session, name, &pin, i + 1).await?;
            generated.push(GeneratedStudent { student, pin });
        }

        info!(
            session_id = %session.id,
            theme = %theme,
            count = generated.len(),
            "Generated student roster"
        );

        Ok(generated)
    }
}

/// Draw `count` PINs with no duplicates within the batch
fn generate_batch_pins(count: usize) -> Result<Vec<String>> {
    let mut seen = HashSet::with_capacity(count);
    let mut pins = Vec::with_capacity(count);
    let mut attempts = 0;

    while pins.len() < count {
        attempts += 1;
        if attempts > PIN_MAX_ATTEMPTS {
            return Err(Error::IntegrityViolation(format!(
                "Failed to draw {} distinct PINs after {} attempts",
                count, PIN_MAX_ATTEMPTS
            )));
        }
        let pin = pin::generate_pin();
        if seen.insert(pin.clone()) {
            pins.push(pin);
        }
    }

    Ok(pins)
}

async fn insert_student(
    conn: &mut SqliteConnection,
    session: &Session,
    character_name: &str,
    pin: &str,
    ordinal: usize,
) -> Result<Student> {
    let now = Utc::now();
    let username = format!("student_{}_{:02}", session.session_code, ordinal);
    let email = format!("{}@datadeck.local", username);
    let pin_hash = pin::hash_pin(pin);
    let avatar_path = session.character_theme.avatar_path(character_name);
    let user_id = Uuid::new_v4();
    let student_id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO users (
            id, username, email, password_hash, first_name, last_name,
            role, school_id, district_id, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, NULL, ?, NULL, NULL, ?, ?)
        "#,
    )
    .bind(user_id.to_string())
    .bind(&username)
    .bind(&email)
    .bind(&pin_hash)
    .bind(character_name)
    .bind(Role::Student.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let result = sqlx::query(
        r#"
        INSERT INTO students (
            id, user_id, session_id, teacher_id, character_name,
            pin_hash, avatar_path, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(student_id.to_string())
    .bind(user_id.to_string())
    .bind(session.id.to_string())
    .bind(session.created_by.to_string())
    .bind(character_name)
    .bind(&pin_hash)
    .bind(&avatar_path)
    .bind(now)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e, "students") => {
            return Err(Error::IntegrityViolation(format!(
                "Character name '{}' already taken in session {}",
                character_name, session.id
            )));
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Student {
        id: student_id,
        user_id,
        session_id: session.id,
        teacher_id: session.created_by,
        character_name: character_name.to_string(),
        username,
        pin_hash,
        avatar_path,
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_pins_are_distinct() {
        let pins = generate_batch_pins(40).unwrap();
        let unique: HashSet<&String> = pins.iter().collect();
        assert_eq!(unique.len(), 40);
        assert!(pins.iter().all(|p| p.len() == 4));
    }
}
