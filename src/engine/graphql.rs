// GraphQL API for the posts and users services
// This binds the schema fields to resolvers over the storage layer and
// the event bus

//! # GraphQL Execution Layer
//!
//! One schema per service:
//!
//! - **Posts**: `Post { id, title, content, userId }` with `posts`/`post`
//!   queries, `createPost`/`updatePost`/`deletePost` mutations, and
//!   `postAdded`/`postDeleted` subscriptions.
//! - **Users**: `User { id, name, email }` with `users`/`user` queries and
//!   `createUser`/`updateUser`/`deleteUser` mutations.
//!
//! Resolver bindings are static: the derive macros map each field to a typed
//! handler when the schema is built, so an unknown binding is a build-time
//! failure rather than a request-time one. Scalar argument coercion (Int, ID)
//! happens before any resolver runs — a non-numeric `userId` is rejected by
//! the execution layer and no store write is attempted.
//!
//! Mutations publish to the event bus only after the store write succeeds, so
//! subscribers never observe an event for a write that did not happen. The
//! reverse is not guaranteed: a subscriber that is not registered at publish
//! time misses the event permanently.

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, ErrorExtensions, Object, Schema, SimpleObject, Subscription, ID};
use futures::{Stream, StreamExt};
use tracing::{debug, error, info};

use crate::engine::events::{EventBus, POST_ADDED, POST_DELETED};
use crate::engine::storage::{PostStorage, UserStorage};
use crate::models::{NewPost, NewUser, Post, PostChanges, User, UserChanges};
use crate::MicroblogError;

// GraphQL types - these are the API representations of our domain models

#[derive(SimpleObject, Debug, Clone)]
pub struct PostGQL {
    pub id: ID,
    pub title: String,
    pub content: String,
    pub user_id: i32,
}

#[derive(SimpleObject, Debug, Clone)]
pub struct UserGQL {
    pub id: ID,
    pub name: String,
    pub email: String,
}

impl From<&Post> for PostGQL {
    fn from(post: &Post) -> Self {
        Self {
            id: ID(post.id.to_string()),
            title: post.title.clone(),
            content: post.content.clone(),
            user_id: post.user_id,
        }
    }
}

impl From<&User> for UserGQL {
    fn from(user: &User) -> Self {
        Self {
            id: ID(user.id.to_string()),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Attach a machine-readable `code` extension to surfaced errors
///
/// Clients branch on the code instead of string-matching messages. The
/// transport status stays 200; the GraphQL error envelope is the reporting
/// channel.
impl ErrorExtensions for MicroblogError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| {
            let code = match self {
                MicroblogError::PostNotFound { .. } | MicroblogError::UserNotFound { .. } => {
                    "NOT_FOUND"
                }
                MicroblogError::InvalidInput(_) => "INVALID_INPUT",
                _ => "INTERNAL",
            };
            e.set("code", code);
        })
    }
}

/// Parse an `ID` argument into a store identifier
///
/// IDs travel as strings on the wire; a non-numeric value fails here, before
/// any storage call.
fn parse_id(id: &ID) -> async_graphql::Result<i32> {
    id.parse::<i32>()
        .map_err(|_| MicroblogError::InvalidInput(format!("Invalid id: {}", id.as_str())).extend())
}

/// Surface a storage failure: log it server-side, return a structured error
fn storage_error(operation: &str, err: MicroblogError) -> async_graphql::Error {
    error!(operation, error = %err, "storage operation failed");
    err.extend()
}

// ---------------------------------------------------------------------------
// Posts service
// ---------------------------------------------------------------------------

/// GraphQL Query root for the posts service
pub struct PostsQuery;

#[Object]
impl PostsQuery {
    /// List all posts
    async fn posts(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<PostGQL>> {
        let storage = ctx.data::<Arc<dyn PostStorage>>()?;
        let posts = storage
            .list_posts()
            .await
            .map_err(|e| storage_error("posts", e))?;
        Ok(posts.iter().map(PostGQL::from).collect())
    }

    /// Get a single post by id
    async fn post(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<PostGQL>> {
        let storage = ctx.data::<Arc<dyn PostStorage>>()?;
        let id = parse_id(&id)?;
        let post = storage
            .get_post(id)
            .await
            .map_err(|e| storage_error("post", e))?;
        Ok(post.as_ref().map(PostGQL::from))
    }
}

/// GraphQL Mutation root for the posts service
pub struct PostsMutation;

#[Object]
impl PostsMutation {
    /// Create a post and notify `postAdded` subscribers
    async fn create_post(
        &self,
        ctx: &Context<'_>,
        title: String,
        content: String,
        user_id: i32,
    ) -> async_graphql::Result<PostGQL> {
        let storage = ctx.data::<Arc<dyn PostStorage>>()?;
        let bus = ctx.data::<EventBus<Post>>()?;

        let post = storage
            .create_post(NewPost {
                title,
                content,
                user_id,
            })
            .await
            .map_err(|e| storage_error("createPost", e))?;

        // Publish only after the store write committed
        let delivered = bus.publish(POST_ADDED, post.clone());
        info!(post_id = post.id, delivered, "post created");

        Ok(PostGQL::from(&post))
    }

    /// Update a post's title and/or content
    async fn update_post(
        &self,
        ctx: &Context<'_>,
        id: ID,
        title: Option<String>,
        content: Option<String>,
    ) -> async_graphql::Result<PostGQL> {
        let storage = ctx.data::<Arc<dyn PostStorage>>()?;
        let id = parse_id(&id)?;

        let updated = storage
            .update_post(id, PostChanges { title, content })
            .await
            .map_err(|e| storage_error("updatePost", e))?;

        match updated {
            Some(post) => {
                debug!(post_id = post.id, "post updated");
                Ok(PostGQL::from(&post))
            }
            None => Err(MicroblogError::PostNotFound { id }.extend()),
        }
    }

    /// Delete a post and notify `postDeleted` subscribers
    ///
    /// Deleting a nonexistent id is a NotFound error and publishes nothing.
    async fn delete_post(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<PostGQL> {
        let storage = ctx.data::<Arc<dyn PostStorage>>()?;
        let bus = ctx.data::<EventBus<Post>>()?;
        let id = parse_id(&id)?;

        let deleted = storage
            .delete_post(id)
            .await
            .map_err(|e| storage_error("deletePost", e))?;

        match deleted {
            Some(post) => {
                let delivered = bus.publish(POST_DELETED, post.clone());
                info!(post_id = post.id, delivered, "post deleted");
                Ok(PostGQL::from(&post))
            }
            None => Err(MicroblogError::PostNotFound { id }.extend()),
        }
    }
}

/// GraphQL Subscription root for the posts service
pub struct PostsSubscription;

#[Subscription]
impl PostsSubscription {
    /// Subscribe to newly created posts
    async fn post_added(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<impl Stream<Item = PostGQL>> {
        let bus = ctx.data::<EventBus<Post>>()?;
        debug!("postAdded subscription opened");
        Ok(bus
            .subscribe(POST_ADDED)
            .map(|event| PostGQL::from(&event.payload)))
    }

    /// Subscribe to deleted posts
    async fn post_deleted(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<impl Stream<Item = PostGQL>> {
        let bus = ctx.data::<EventBus<Post>>()?;
        debug!("postDeleted subscription opened");
        Ok(bus
            .subscribe(POST_DELETED)
            .map(|event| PostGQL::from(&event.payload)))
    }
}

// ---------------------------------------------------------------------------
// Users service
// ---------------------------------------------------------------------------

/// GraphQL Query root for the users service
pub struct UsersQuery;

#[Object]
impl UsersQuery {
    /// List all users
    async fn users(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<UserGQL>> {
        let storage = ctx.data::<Arc<dyn UserStorage>>()?;
        let users = storage
            .list_users()
            .await
            .map_err(|e| storage_error("users", e))?;
        Ok(users.iter().map(UserGQL::from).collect())
    }

    /// Get a single user by id
    async fn user(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<UserGQL>> {
        let storage = ctx.data::<Arc<dyn UserStorage>>()?;
        let id = parse_id(&id)?;
        let user = storage
            .get_user(id)
            .await
            .map_err(|e| storage_error("user", e))?;
        Ok(user.as_ref().map(UserGQL::from))
    }
}

/// GraphQL Mutation root for the users service
pub struct UsersMutation;

#[Object]
impl UsersMutation {
    /// Create a user
    async fn create_user(
        &self,
        ctx: &Context<'_>,
        name: String,
        email: String,
    ) -> async_graphql::Result<UserGQL> {
        let storage = ctx.data::<Arc<dyn UserStorage>>()?;
        let user = storage
            .create_user(NewUser { name, email })
            .await
            .map_err(|e| storage_error("createUser", e))?;
        info!(user_id = user.id, "user created");
        Ok(UserGQL::from(&user))
    }

    /// Update a user's name and/or email
    async fn update_user(
        &self,
        ctx: &Context<'_>,
        id: ID,
        name: Option<String>,
        email: Option<String>,
    ) -> async_graphql::Result<UserGQL> {
        let storage = ctx.data::<Arc<dyn UserStorage>>()?;
        let id = parse_id(&id)?;

        let updated = storage
            .update_user(id, UserChanges { name, email })
            .await
            .map_err(|e| storage_error("updateUser", e))?;

        match updated {
            Some(user) => Ok(UserGQL::from(&user)),
            None => Err(MicroblogError::UserNotFound { id }.extend()),
        }
    }

    /// Delete a user
    async fn delete_user(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<UserGQL> {
        let storage = ctx.data::<Arc<dyn UserStorage>>()?;
        let id = parse_id(&id)?;

        let deleted = storage
            .delete_user(id)
            .await
            .map_err(|e| storage_error("deleteUser", e))?;

        match deleted {
            Some(user) => {
                info!(user_id = user.id, "user deleted");
                Ok(UserGQL::from(&user))
            }
            None => Err(MicroblogError::UserNotFound { id }.extend()),
        }
    }
}

// Schema type aliases
pub type PostsSchema = Schema<PostsQuery, PostsMutation, PostsSubscription>;
pub type UsersSchema = Schema<UsersQuery, UsersMutation, EmptySubscription>;

/// Create the posts schema with its storage backend and event bus
///
/// The bus is injected into resolver context data so the mutation and
/// subscription roots share one instance — no ambient global.
pub fn create_posts_schema(storage: Arc<dyn PostStorage>, bus: EventBus<Post>) -> PostsSchema {
    Schema::build(PostsQuery, PostsMutation, PostsSubscription)
        .data(storage)
        .data(bus)
        .finish()
}

/// Create the users schema with its storage backend
pub fn create_users_schema(storage: Arc<dyn UserStorage>) -> UsersSchema {
    Schema::build(UsersQuery, UsersMutation, EmptySubscription)
        .data(storage)
        .finish()
}
