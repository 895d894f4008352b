// Storage abstraction for the posts and users services

//! # Storage Abstraction Layer
//!
//! This module separates resolver logic from persistence details. Each
//! service owns one trait ([`PostStorage`], [`UserStorage`]) that a backend
//! implements; the in-memory implementations here back development, tests,
//! and single-process deployments. A relational backend would implement the
//! same traits — the query execution itself is an external collaborator's
//! concern and stays out of this crate.
//!
//! ## Contracts
//!
//! - Identifiers are assigned by the store at creation, never by callers.
//!   The in-memory stores hand out sequential integers the way a database
//!   sequence would.
//! - `update_*` / `delete_*` return `Ok(None)` for a missing id; deciding
//!   whether that is a NotFound error belongs to the execution layer, not
//!   the store.
//! - All operations are async and return `Result` so network-backed
//!   implementations slot in without changing the resolvers.
//!
//! ## Thread Safety
//!
//! The in-memory implementations use `RwLock<HashMap>`: many concurrent
//! readers, exclusive writers. Locks are never held across an await.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::RwLock;

use crate::models::{NewPost, NewUser, Post, PostChanges, User, UserChanges};
use crate::Result;

/// Storage trait for the posts service
#[async_trait::async_trait]
pub trait PostStorage: Send + Sync {
    /// Create a post, assigning it a fresh id
    async fn create_post(&self, new_post: NewPost) -> Result<Post>;

    /// Get a post by id
    ///
    /// `Ok(None)` means the post does not exist; that is not an error at
    /// this layer.
    async fn get_post(&self, id: i32) -> Result<Option<Post>>;

    /// List all posts
    async fn list_posts(&self) -> Result<Vec<Post>>;

    /// Apply a change-set to an existing post
    ///
    /// Returns the updated post, or `Ok(None)` if no post has that id.
    async fn update_post(&self, id: i32, changes: PostChanges) -> Result<Option<Post>>;

    /// Delete a post by id, returning the removed row if it existed
    async fn delete_post(&self, id: i32) -> Result<Option<Post>>;
}

/// Storage trait for the users service
#[async_trait::async_trait]
pub trait UserStorage: Send + Sync {
    /// Create a user, assigning it a fresh id
    async fn create_user(&self, new_user: NewUser) -> Result<User>;

    /// Get a user by id
    async fn get_user(&self, id: i32) -> Result<Option<User>>;

    /// List all users
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Apply a change-set to an existing user
    async fn update_user(&self, id: i32, changes: UserChanges) -> Result<Option<User>>;

    /// Delete a user by id, returning the removed row if it existed
    async fn delete_user(&self, id: i32) -> Result<Option<User>>;
}

/// In-memory post storage for development and testing
///
/// Not persistent and not distributed: rows live in process memory and are
/// lost on restart.
#[derive(Default)]
pub struct InMemoryPostStorage {
    posts: RwLock<HashMap<i32, Post>>,
    next_id: AtomicI32,
}

impl InMemoryPostStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait::async_trait]
impl PostStorage for InMemoryPostStorage {
    async fn create_post(&self, new_post: NewPost) -> Result<Post> {
        let post = Post {
            id: self.allocate_id(),
            title: new_post.title,
            content: new_post.content,
            user_id: new_post.user_id,
        };

        let mut posts = self.posts.write().unwrap();
        posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: i32) -> Result<Option<Post>> {
        let posts = self.posts.read().unwrap();
        Ok(posts.get(&id).cloned())
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        let posts = self.posts.read().unwrap();
        let mut all: Vec<Post> = posts.values().cloned().collect();
        // Stable listing order for clients rendering tables
        all.sort_by_key(|post| post.id);
        Ok(all)
    }

    async fn update_post(&self, id: i32, changes: PostChanges) -> Result<Option<Post>> {
        let mut posts = self.posts.write().unwrap();
        Ok(posts.get_mut(&id).map(|post| {
            post.apply(changes);
            post.clone()
        }))
    }

    async fn delete_post(&self, id: i32) -> Result<Option<Post>> {
        let mut posts = self.posts.write().unwrap();
        Ok(posts.remove(&id))
    }
}

/// In-memory user storage for development and testing
#[derive(Default)]
pub struct InMemoryUserStorage {
    users: RwLock<HashMap<i32, User>>,
    next_id: AtomicI32,
}

impl InMemoryUserStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait::async_trait]
impl UserStorage for InMemoryUserStorage {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let user = User {
            id: self.allocate_id(),
            name: new_user.name,
            email: new_user.email,
        };

        let mut users = self.users.write().unwrap();
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i32) -> Result<Option<User>> {
        let users = self.users.read().unwrap();
        Ok(users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = self.users.read().unwrap();
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by_key(|user| user.id);
        Ok(all)
    }

    async fn update_user(&self, id: i32, changes: UserChanges) -> Result<Option<User>> {
        let mut users = self.users.write().unwrap();
        Ok(users.get_mut(&id).map(|user| {
            user.apply(changes);
            user.clone()
        }))
    }

    async fn delete_user(&self, id: i32) -> Result<Option<User>> {
        let mut users = self.users.write().unwrap();
        Ok(users.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post() -> NewPost {
        NewPost {
            title: "A".to_string(),
            content: "B".to_string(),
            user_id: 1,
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let storage = InMemoryPostStorage::new();
        let first = storage.create_post(sample_post()).await.unwrap();
        let second = storage.create_post(sample_post()).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn created_post_round_trips_through_list() {
        let storage = InMemoryPostStorage::new();
        let created = storage.create_post(sample_post()).await.unwrap();

        let listed = storage.list_posts().await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn update_applies_only_provided_fields() {
        let storage = InMemoryPostStorage::new();
        let created = storage.create_post(sample_post()).await.unwrap();

        let updated = storage
            .update_post(
                created.id,
                PostChanges {
                    title: Some("New title".to_string()),
                    content: None,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "New title");
        assert_eq!(updated.content, "B");
    }

    #[tokio::test]
    async fn missing_ids_yield_none() {
        let storage = InMemoryPostStorage::new();
        assert!(storage.get_post(99).await.unwrap().is_none());
        assert!(storage
            .update_post(99, PostChanges::default())
            .await
            .unwrap()
            .is_none());
        assert!(storage.delete_post(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let storage = InMemoryPostStorage::new();
        let created = storage.create_post(sample_post()).await.unwrap();

        let deleted = storage.delete_post(created.id).await.unwrap().unwrap();
        assert_eq!(deleted, created);
        assert!(storage.list_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_crud_round_trip() {
        let storage = InMemoryUserStorage::new();
        let created = storage
            .create_user(NewUser {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.id, 1);

        let updated = storage
            .update_user(
                created.id,
                UserChanges {
                    name: None,
                    email: Some("ada@lovelace.dev".to_string()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.email, "ada@lovelace.dev");

        assert!(storage.delete_user(created.id).await.unwrap().is_some());
        assert!(storage.get_user(created.id).await.unwrap().is_none());
    }
}
