//! Groupting Database Crate
//!
//! Document storage for the matching coordinator: groups, chatrooms and
//! users over SQLite, the first-committer-wins [`StoreTransaction`], and the
//! [`ChangeFeed`] that turns committed group writes into triggers.

use sqlx::SqlitePool;

use groupting_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod feed;
pub mod migrations;
pub mod repos;
pub mod store;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

pub use entities::{
    Chatroom, CreateGroupRequest, CreateUserRequest, Group, GroupStatus, User, PAIR_SEPARATOR,
};
pub use feed::{ChangeFeed, GroupChange};
pub use repos::{ChatroomRepository, GroupRepository, UserRepository};
pub use store::{MatchStore, StoreTransaction};
pub use types::{DatabaseError, DatabaseResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}
