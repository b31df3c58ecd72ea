//! Shared types and result types for the database layer

pub mod errors;

pub use errors::DatabaseError;

pub type DatabaseResult<T> = Result<T, DatabaseError>;

pub use crate::entities::{CreateGroupRequest, CreateUserRequest};
