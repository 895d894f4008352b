// Server implementations
// This contains the axum HTTP/WebSocket transports for both services

/// GraphQL server setup for the posts and users services
pub mod graphql;

pub use graphql::{
    PostsServer, PostsServerBuilder, ServiceConfig, UsersServer, UsersServerBuilder,
};
