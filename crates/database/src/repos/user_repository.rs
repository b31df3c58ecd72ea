//! User repository for database operations.

use sqlx::SqlitePool;
use tracing::info;

use crate::entities::{CreateUserRequest, User};
use crate::types::{DatabaseError, DatabaseResult};

/// Repository for user database operations
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, nickname, current_group_id, version, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(User::from_row).transpose()
    }

    pub async fn list(&self) -> DatabaseResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, nickname, current_group_id, version, created_at, updated_at FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(User::from_row).collect()
    }

    /// Create a new user
    pub async fn create(&self, request: &CreateUserRequest) -> DatabaseResult<User> {
        if request.id.trim().is_empty() {
            return Err(DatabaseError::validation("user id cannot be empty"));
        }

        let user = User::new(request);

        sqlx::query(
            "INSERT INTO users (id, nickname, current_group_id, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.nickname)
        .bind(&user.current_group_id)
        .bind(user.version)
        .bind(&user.created_at)
        .bind(&user.updated_at)
        .execute(&self.pool)
        .await?;

        info!(user_id = %user.id, "created user");
        Ok(user)
    }
}
