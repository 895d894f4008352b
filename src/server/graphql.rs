// GraphQL server implementation for Microblog
// One axum router per service: HTTP queries/mutations, WebSocket
// subscriptions, GraphiQL, and a health check

//! # Transport Adapters
//!
//! Each service terminates client connections and bridges them to its
//! GraphQL schema:
//!
//! - `POST /graphql`: request body `{query, variables}`; the response is
//!   always a `{data}` / `{errors}` envelope with HTTP 200 — resolver
//!   failures report through the GraphQL error channel, never a 5xx.
//! - `GET /graphql` (and `/ws`): WebSocket upgrade for subscriptions.
//!   `async_graphql_axum::GraphQLSubscription` speaks both the `graphql-ws`
//!   and `graphql-transport-ws` subprotocols, multiplexes operations by
//!   client-supplied id, and cancels every subscription opened on a socket
//!   when that socket closes. Cancellation drops the resolver's event
//!   stream, which synchronously deregisters its bus listener.
//! - `GET /`: GraphiQL IDE wired to both endpoints.
//! - `GET /health`: liveness probe.
//!
//! Reconnect policy belongs to clients; the server keeps no session state
//! across reconnects — a new connection starts with an empty subscription
//! set.

use std::sync::Arc;

use async_graphql_axum::{GraphQLRequest, GraphQLResponse, GraphQLSubscription};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router, Server,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::engine::{
    events::EventBus,
    graphql::{create_posts_schema, create_users_schema, PostsSchema, UsersSchema},
    storage::{InMemoryPostStorage, InMemoryUserStorage, PostStorage, UserStorage},
};
use crate::models::Post;

/// GraphQL service configuration
#[derive(Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub cors_enabled: bool,
}

impl ServiceConfig {
    fn with_port(port: u16) -> Self {
        Self {
            port,
            cors_enabled: true,
        }
    }
}

/// Posts service server
///
/// Owns the storage backend and the event bus; both are injected into the
/// schema so mutation and subscription resolvers share them.
pub struct PostsServer {
    config: ServiceConfig,
    storage: Arc<dyn PostStorage>,
    bus: EventBus<Post>,
}

impl PostsServer {
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::with_port(4002),
            storage: Arc::new(InMemoryPostStorage::new()),
            bus: EventBus::new(),
        }
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn PostStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus<Post>) -> Self {
        self.bus = bus;
        self
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let schema = create_posts_schema(self.storage, self.bus);
        let port = self.config.port;

        let mut app = Router::new()
            .route("/", get(move || async move { Html(graphiql_html(port)) }))
            .route(
                "/graphql",
                post(posts_graphql_handler).get_service(GraphQLSubscription::new(schema.clone())),
            )
            .route_service("/ws", GraphQLSubscription::new(schema.clone()))
            .route("/health", get(health_check))
            .with_state(schema);

        if self.config.cors_enabled {
            app = app.layer(CorsLayer::permissive());
        }

        let addr = format!("0.0.0.0:{}", port);

        info!("🚀 Posts service running on http://localhost:{}", port);
        info!("📊 GraphiQL interface: http://localhost:{}", port);
        info!("🔗 GraphQL endpoint: http://localhost:{}/graphql", port);
        info!("📡 Subscription endpoint: ws://localhost:{}/graphql", port);

        Server::bind(&addr.parse()?)
            .serve(app.into_make_service())
            .await?;
        Ok(())
    }
}

impl Default for PostsServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Users service server
///
/// No subscriptions here: the users schema has an empty subscription root,
/// so the router only exposes the HTTP endpoint.
pub struct UsersServer {
    config: ServiceConfig,
    storage: Arc<dyn UserStorage>,
}

impl UsersServer {
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::with_port(4001),
            storage: Arc::new(InMemoryUserStorage::new()),
        }
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn UserStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let schema = create_users_schema(self.storage);
        let port = self.config.port;

        let mut app = Router::new()
            .route("/", get(move || async move { Html(graphiql_html(port)) }))
            .route("/graphql", post(users_graphql_handler))
            .route("/health", get(health_check))
            .with_state(schema);

        if self.config.cors_enabled {
            app = app.layer(CorsLayer::permissive());
        }

        let addr = format!("0.0.0.0:{}", port);

        info!("🚀 Users service running on http://localhost:{}", port);
        info!("🔗 GraphQL endpoint: http://localhost:{}/graphql", port);

        Server::bind(&addr.parse()?)
            .serve(app.into_make_service())
            .await?;
        Ok(())
    }
}

impl Default for UsersServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the posts service
pub struct PostsServerBuilder {
    server: PostsServer,
}

impl PostsServerBuilder {
    pub fn new() -> Self {
        Self {
            server: PostsServer::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        let mut config = self.server.config.clone();
        config.port = port;
        self.server = self.server.with_config(config);
        self
    }

    pub fn with_cors(mut self, enabled: bool) -> Self {
        let mut config = self.server.config.clone();
        config.cors_enabled = enabled;
        self.server = self.server.with_config(config);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn PostStorage>) -> Self {
        self.server = self.server.with_storage(storage);
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus<Post>) -> Self {
        self.server = self.server.with_event_bus(bus);
        self
    }

    pub async fn build_and_run(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server.run().await
    }
}

impl Default for PostsServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the users service
pub struct UsersServerBuilder {
    server: UsersServer,
}

impl UsersServerBuilder {
    pub fn new() -> Self {
        Self {
            server: UsersServer::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        let mut config = self.server.config.clone();
        config.port = port;
        self.server = self.server.with_config(config);
        self
    }

    pub fn with_cors(mut self, enabled: bool) -> Self {
        let mut config = self.server.config.clone();
        config.cors_enabled = enabled;
        self.server = self.server.with_config(config);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn UserStorage>) -> Self {
        self.server = self.server.with_storage(storage);
        self
    }

    pub async fn build_and_run(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server.run().await
    }
}

impl Default for UsersServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// GraphQL handlers

async fn posts_graphql_handler(
    State(schema): State<PostsSchema>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

async fn users_graphql_handler(
    State(schema): State<UsersSchema>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

// GraphiQL interface with WebSocket support
fn graphiql_html(port: u16) -> String {
    format!(
        r#"
<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="robots" content="noindex">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="referrer" content="origin">
    <title>GraphiQL IDE</title>
    <style>
      body {{
        height: 100%;
        margin: 0;
        width: 100%;
        overflow: hidden;
      }}
      #graphiql {{
        height: 100vh;
      }}
    </style>
    <script crossorigin src="https://unpkg.com/react@18/umd/react.development.js"></script>
    <script crossorigin src="https://unpkg.com/react-dom@18/umd/react-dom.development.js"></script>
    <link rel="icon" href="https://graphql.org/favicon.ico">
    <link rel="stylesheet" href="https://unpkg.com/graphiql@3/graphiql.min.css" />
  </head>
  <body>
    <div id="graphiql">Loading...</div>
    <script src="https://unpkg.com/graphiql@3/graphiql.min.js" type="application/javascript"></script>
    <script>
      const root = ReactDOM.createRoot(document.getElementById('graphiql'));

      const fetcher = GraphiQL.createFetcher({{
        url: '/graphql',
        subscriptionUrl: 'ws://localhost:{port}/graphql',
      }});

      root.render(React.createElement(GraphiQL, {{
        fetcher: fetcher,
        defaultEditorToolsVisibility: true,
      }}));
    </script>
  </body>
</html>
"#
    )
}

// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Microblog GraphQL service is running!")
}
