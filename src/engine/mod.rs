// Microblog engine
// This contains the event bus, storage abstraction, and GraphQL schemas

//! # Engine Module
//!
//! The engine sits between the domain models and the transports:
//!
//! - **Event System** (`events`): topic-keyed in-process pub/sub connecting
//!   mutation resolvers to subscription streams
//! - **Storage Layer** (`storage`): async persistence traits plus in-memory
//!   implementations
//! - **GraphQL Engine** (`graphql`): schemas, resolvers, and type mappings
//!   for the posts and users services

/// Event bus for subscription delivery
pub mod events;

/// GraphQL schemas and resolvers
pub mod graphql;

/// Storage abstraction layer
pub mod storage;

// Re-export main engine types for clean API access
pub use events::{Event, EventBus, EventStream, POST_ADDED, POST_DELETED};
pub use graphql::{
    create_posts_schema, create_users_schema, PostGQL, PostsMutation, PostsQuery, PostsSchema,
    PostsSubscription, UserGQL, UsersMutation, UsersQuery, UsersSchema,
};
pub use storage::{InMemoryPostStorage, InMemoryUserStorage, PostStorage, UserStorage};
