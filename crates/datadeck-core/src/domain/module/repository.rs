//! Module repository for database operations

use super::module::Module;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Repository for curriculum module persistence
#[derive(Debug, Clone)]
pub struct ModuleRepository {
    pool: SqlitePool,
}

impl ModuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, module: &Module) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO modules (id, name, description, is_active, sort_order, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(module.id.to_string())
        .bind(&module.name)
        .bind(&module.description)
        .bind(module.is_active)
        .bind(module.sort_order)
        .bind(module.created_at)
        .bind(module.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, module_id: Uuid) -> Result<Option<Module>> {
        let row: Option<ModuleRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, is_active, sort_order, created_at, updated_at
            FROM modules
            WHERE id = ?
            "#,
        )
        .bind(module_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ModuleRow::into_module).transpose()
    }

    /// Active modules in picker order: sort_order first, name breaks ties
    pub async fn list_active(&self) -> Result<Vec<Module>> {
        let rows: Vec<ModuleRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, is_active, sort_order, created_at, updated_at
            FROM modules
            WHERE is_active = 1
            ORDER BY sort_order, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ModuleRow::into_module).collect()
    }

    pub async fn list_all(&self) -> Result<Vec<Module>> {
        let rows: Vec<ModuleRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, is_active, sort_order, created_at, updated_at
            FROM modules
            ORDER BY sort_order, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ModuleRow::into_module).collect()
    }

    pub async fn update(&self, module: &Module) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE modules
            SET name = ?, description = ?, is_active = ?, sort_order = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&module.name)
        .bind(&module.description)
        .bind(module.is_active)
        .bind(module.sort_order)
        .bind(module.updated_at)
        .bind(module.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Module {}", module.id)));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ModuleRow {
    id: String,
    name: String,
    description: Option<String>,
    is_active: bool,
    sort_order: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ModuleRow {
    fn into_module(self) -> Result<Module> {
        Ok(Module {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| Error::Parse(format!("Invalid module ID: {}", e)))?,
            name: self.name,
            description: self.description,
            is_active: self.is_active,
            sort_order: self.sort_order,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn create_test_repo() -> ModuleRepository {
        let db = Database::in_memory()
            .await
            .expect("Failed to create test database");
        ModuleRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_list_active_ordering() {
        let repo = create_test_repo().await;

        repo.create(&Module::new("Zebra Migration", None, 2))
            .await
            .unwrap();
        repo.create(&Module::new("Air Quality", None, 2))
            .await
            .unwrap();
        repo.create(&Module::new("Weather Data", None, 1))
            .await
            .unwrap();

        let mut retired = Module::new("Old Unit", None, 0);
        retired.deactivate();
        repo.create(&retired).await.unwrap();

        let active = repo.list_active().await.unwrap();
        let names: Vec<&str> = active.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Weather Data", "Air Quality", "Zebra Migration"]);
    }

    #[tokio::test]
    async fn test_update_missing_module() {
        let repo = create_test_repo().await;
        let module = Module::new("Phantom", None, 0);
        let result = repo.update(&module).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
