// Core domain models for Microblog
// These are plain data structures shared by storage, GraphQL, and the event bus

//! # Domain Models Module
//!
//! The models here are deliberately thin: a [`Post`] and a [`User`] row plus
//! the change-sets used by create/update operations. Identifiers are always
//! assigned by the storage layer, never by callers, which is why the `New*`
//! types carry no `id` field.

// Post row and its create/update change-sets
pub mod post;

// User row and its create/update change-sets
pub mod user;

pub use post::{NewPost, Post, PostChanges};
pub use user::{NewUser, User, UserChanges};
