// Microblog - Rust Edition
// A two-service GraphQL CRUD application (users, posts) with real-time
// post subscriptions delivered over WebSocket

//! # Microblog Library
//!
//! This is the main library crate for Microblog. It contains two GraphQL
//! services that share one codebase:
//!
//! - **Posts service**: `Query.posts`, `Mutation.createPost` /
//!   `updatePost` / `deletePost`, and `Subscription.postAdded` /
//!   `postDeleted` streamed over WebSocket.
//! - **Users service**: `Query.users` / `user(id)`, `Mutation.createUser` /
//!   `updateUser` / `deleteUser`.
//!
//! ## Core Components
//!
//! ### Domain Models
//! - [`Post`]: a post row ({ id, title, content, userId })
//! - [`User`]: a user row ({ id, name, email })
//!
//! ### Event Bus
//! [`EventBus`] is an in-process, single-node publish/subscribe mechanism
//! keyed by named topics. Mutation resolvers publish to it after the store
//! write succeeds; subscription resolvers turn a registered listener into a
//! lazy stream of payloads. There is **no delivery guarantee**: a client that
//! is not subscribed at publish time never sees the event, and nothing is
//! buffered or replayed. Horizontal scaling would require an external broker,
//! which this crate deliberately does not provide.
//!
//! ### Storage Layer
//! [`PostStorage`] and [`UserStorage`] abstract persistence behind async
//! traits with in-memory implementations. Identifiers are assigned by the
//! store at creation; resolvers never assign them.
//!
//! ### Servers and Client
//! The `server` module wires each schema to an axum router (HTTP queries and
//! mutations, WebSocket subscriptions, GraphiQL, health check). The `client`
//! module is the programmatic consumer: GraphQL over HTTP plus a
//! reconnecting `graphql-ws` subscription client.

// Core domain models
pub mod models;

// Engine implementations (event bus, storage, GraphQL schemas)
pub mod engine;

// Server implementations (axum HTTP/WebSocket transports)
pub mod server;

// Client consumers (HTTP queries/mutations, WebSocket subscriptions)
pub mod client;

// Re-export core domain types for easy access
pub use models::{Post, PostChanges, User, UserChanges};

// Re-export engine types for convenience
pub use engine::{
    events::{Event, EventBus, POST_ADDED, POST_DELETED},
    graphql::{
        create_posts_schema, create_users_schema, PostGQL, PostsSchema, UserGQL, UsersSchema,
    },
    storage::{InMemoryPostStorage, InMemoryUserStorage, PostStorage, UserStorage},
};

// Re-export server types for convenience
pub use server::graphql::{PostsServerBuilder, ServiceConfig, UsersServerBuilder};

// Re-export client types for convenience
pub use client::{GraphQLClient, SubscriptionClient};

use thiserror::Error;

/// Custom error types for Microblog operations
///
/// Validation and not-found failures are recovered at the GraphQL execution
/// layer and surfaced to clients as structured errors with a machine-readable
/// `code` extension; they never reach the transport as raw failures.
#[derive(Error, Debug)]
pub enum MicroblogError {
    /// Error when a post cannot be found
    #[error("Post not found: {id}")]
    PostNotFound { id: i32 },

    /// Error when a user cannot be found
    #[error("User not found: {id}")]
    UserNotFound { id: i32 },

    /// Error when invalid input is provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage-related errors
    /// Using anyhow::Error for flexible error handling across backends
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// GraphQL-specific errors
    #[error("GraphQL error: {0}")]
    GraphQL(String),

    /// Transport-level errors (dropped sockets, malformed frames)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for MicroblogError {
    fn from(err: std::io::Error) -> Self {
        MicroblogError::Internal(err.to_string())
    }
}

/// Type alias for Results that use our custom error type
pub type Result<T> = std::result::Result<T, MicroblogError>;
