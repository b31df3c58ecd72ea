//! Stored documents: groups, chatrooms and users.

pub mod chatroom;
pub mod group;
pub mod user;

pub use chatroom::Chatroom;
pub use group::{CreateGroupRequest, Group, GroupStatus, PAIR_SEPARATOR};
pub use user::{CreateUserRequest, User};
