//! Repository implementations for database operations

pub mod chatroom_repository;
pub mod group_repository;
pub mod user_repository;

pub use chatroom_repository::ChatroomRepository;
pub use group_repository::GroupRepository;
pub use user_repository::UserRepository;
