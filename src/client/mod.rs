// Client consumers for the Microblog services
// GraphQL over HTTP for queries/mutations, WebSocket for subscriptions

//! # Client Module
//!
//! The programmatic counterpart of the browser app: [`GraphQLClient`] issues
//! queries and mutations over HTTP POST and decodes the `{data, errors}`
//! envelope; [`SubscriptionClient`] opens a persistent `graphql-ws` channel
//! and multiplexes subscription operations over it.
//!
//! Reconnect policy lives here, on the client side. The server keeps no
//! session state across reconnects, so after a drop the subscription client
//! re-opens the socket with capped exponential backoff and re-sends `start`
//! for every operation that is still alive.

/// WebSocket subscription client (`graphql-ws` subprotocol)
pub mod subscriptions;

pub use subscriptions::{SubscriptionClient, SubscriptionConfig, SubscriptionStream};

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::{MicroblogError, Result};

/// Configuration for the HTTP GraphQL client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout_ms: u64,
}

/// Request body for `POST /graphql`
#[derive(Debug, Serialize)]
struct GraphQLRequestBody<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    variables: serde_json::Value,
}

/// Response envelope from `POST /graphql`
///
/// Failures arrive as entries in `errors` with HTTP 200; the transport
/// status is not the reporting channel.
#[derive(Debug, Deserialize)]
struct GraphQLResponseBody {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQLErrorEntry>>,
}

/// One structured GraphQL error
#[derive(Debug, Deserialize)]
pub struct GraphQLErrorEntry {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<serde_json::Value>,
}

/// HTTP client for queries and mutations
#[derive(Debug, Clone)]
pub struct GraphQLClient {
    http_client: HttpClient,
    endpoint: String,
}

impl GraphQLClient {
    /// Create a client for the given service base URL (e.g.
    /// `http://localhost:4002`)
    pub fn new(base_url: &str) -> Result<Self> {
        let config = ClientConfig {
            base_url: Url::parse(base_url)
                .map_err(|e| MicroblogError::InvalidInput(format!("Invalid base URL: {}", e)))?,
            timeout_ms: 30_000,
        };
        Self::with_config(config)
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                MicroblogError::Internal(format!("Failed to create HTTP client: {}", e))
            })?;

        let endpoint = config
            .base_url
            .join("/graphql")
            .map_err(|e| MicroblogError::InvalidInput(format!("Invalid base URL: {}", e)))?
            .to_string();

        Ok(Self {
            http_client,
            endpoint,
        })
    }

    /// Execute a query or mutation and return the `data` value
    ///
    /// Any entries in the `errors` array are folded into a
    /// [`MicroblogError::GraphQL`].
    pub async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let body = GraphQLRequestBody { query, variables };

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| MicroblogError::Transport(format!("Request failed: {}", e)))?;

        let envelope: GraphQLResponseBody = response
            .json()
            .await
            .map_err(|e| MicroblogError::Transport(format!("Malformed response body: {}", e)))?;

        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(MicroblogError::GraphQL(messages.join("; ")));
        }

        Ok(envelope.data.unwrap_or(serde_json::Value::Null))
    }

    /// Execute a query (alias for readability at call sites)
    pub async fn query(&self, query: &str, variables: serde_json::Value) -> Result<serde_json::Value> {
        self.execute(query, variables).await
    }

    /// Execute a mutation (alias for readability at call sites)
    pub async fn mutate(
        &self,
        mutation: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.execute(mutation, variables).await
    }
}
