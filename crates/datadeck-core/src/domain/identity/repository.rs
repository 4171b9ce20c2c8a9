//! Identity repository for database operations

use super::district::{District, School};
use super::role::Role;
use super::user::{NewUser, User};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Repository for districts, schools, and users
#[derive(Debug, Clone)]
pub struct IdentityRepository {
    pool: SqlitePool,
}

impl IdentityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========== Districts ==========

    pub async fn create_district(&self, district: &District) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO districts (id, name, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(district.id.to_string())
        .bind(&district.name)
        .bind(district.is_active)
        .bind(district.created_at)
        .bind(district.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_district(&self, district_id: Uuid) -> Result<Option<District>> {
        let row: Option<DistrictRow> = sqlx::query_as(
            "SELECT id, name, is_active, created_at, updated_at FROM districts WHERE id = ?",
        )
        .bind(district_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(DistrictRow::into_district).transpose()
    }

    pub async fn list_districts(&self) -> Result<Vec<District>> {
        let rows: Vec<DistrictRow> = sqlx::query_as(
            "SELECT id, name, is_active, created_at, updated_at FROM districts ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DistrictRow::into_district).collect()
    }

    /// Soft-disable or re-enable a district without touching its schools
    pub async fn set_district_active(&self, district_id: Uuid, is_active: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE districts SET is_active = ?, updated_at = ? WHERE id = ?",
        )
        .bind(is_active)
        .bind(Utc::now())
        .bind(district_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("District {}", district_id)));
        }
        Ok(())
    }

    // ========== Schools ==========

    pub async fn create_school(&self, school: &School) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schools (id, district_id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(school.id.to_string())
        .bind(school.district_id.to_string())
        .bind(&school.name)
        .bind(school.created_at)
        .bind(school.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_schools(&self, district_id: Uuid) -> Result<Vec<School>> {
        let rows: Vec<SchoolRow> = sqlx::query_as(
            r#"
            SELECT id, district_id, name, created_at, updated_at
            FROM schools
            WHERE district_id = ?
            ORDER BY name
            "#,
        )
        .bind(district_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SchoolRow::into_school).collect()
    }

    // ========== Users ==========

    /// Create a user after role/association validation
    pub async fn create_user(&self, input: NewUser) -> Result<User> {
        input.validate()?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: input.username,
            email: input.email,
            password_hash: input.password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            role: input.role,
            school_id: input.school_id,
            district_id: input.district_id,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, first_name, last_name,
                role, school_id, district_id, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.school_id.map(|s| s.to_string()))
        .bind(user.district_id.map(|d| d.to_string()))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, password_hash, first_name, last_name,
                   role, school_id, district_id, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, password_hash, first_name, last_name,
                   role, school_id, district_id, created_at, updated_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    /// List the ids of teachers in the same school and district as an
    /// observer; used to scope observer session visibility.
    pub async fn teacher_ids_for_observer(&self, observer: &User) -> Result<Vec<Uuid>> {
        let (Some(school_id), Some(district_id)) = (observer.school_id, observer.district_id)
        else {
            return Ok(Vec::new());
        };

        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM users
            WHERE role = 'teacher' AND school_id = ? AND district_id = ?
            "#,
        )
        .bind(school_id.to_string())
        .bind(district_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id,)| {
                Uuid::parse_str(&id).map_err(|e| Error::Parse(format!("Invalid user ID: {}", e)))
            })
            .collect()
    }
}

// ========== Database Row Types ==========

#[derive(sqlx::FromRow)]
struct DistrictRow {
    id: String,
    name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DistrictRow {
    fn into_district(self) -> Result<District> {
        Ok(District {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| Error::Parse(format!("Invalid district ID: {}", e)))?,
            name: self.name,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SchoolRow {
    id: String,
    district_id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SchoolRow {
    fn into_school(self) -> Result<School> {
        Ok(School {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| Error::Parse(format!("Invalid school ID: {}", e)))?,
            district_id: Uuid::parse_str(&self.district_id)
                .map_err(|e| Error::Parse(format!("Invalid district ID: {}", e)))?,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: String,
    school_id: Option<String>,
    district_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| Error::Parse(format!("Invalid user ID: {}", e)))?;
        let role = Role::from_str(&self.role)
            .ok_or_else(|| Error::Parse(format!("Invalid role: {}", self.role)))?;
        let school_id = self
            .school_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| Error::Parse(format!("Invalid school ID: {}", e)))?;
        let district_id = self
            .district_id
            .map(|d| Uuid::parse_str(&d))
            .transpose()
            .map_err(|e| Error::Parse(format!("Invalid district ID: {}", e)))?;

        Ok(User {
            id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            role,
            school_id,
            district_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
