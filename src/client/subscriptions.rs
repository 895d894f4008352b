// WebSocket subscription client speaking the `graphql-ws` subprotocol

//! # Real-Time Subscription Client
//!
//! One WebSocket connection multiplexes any number of subscription
//! operations. Wire messages follow the `graphql-ws` subprotocol:
//!
//! - client → server: `connection_init`, `start {id, payload}`, `stop {id}`
//! - server → client: `connection_ack`, `ka`, `data {id, payload}`,
//!   `error {id, payload}`, `complete {id}`
//!
//! Each operation is tagged with a client-supplied id so concurrent
//! subscriptions share the socket. A server-side `error` closes that one
//! subscription stream; the socket and the other operations stay up.
//!
//! ## Reconnection
//!
//! The client owns reconnect policy. When the socket drops, the connection
//! task re-dials with capped exponential backoff and replays `start` for
//! every operation still alive. Events published while disconnected are lost
//! — the server buffers nothing for absent listeners, so there is a gap, not
//! a replay.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use crate::{MicroblogError, Result};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Messages the client sends over the socket
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectionInit {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
    Start {
        id: String,
        payload: OperationPayload,
    },
    Stop {
        id: String,
    },
}

/// The subscription document carried by a `start` message
#[derive(Debug, Clone, Serialize)]
pub struct OperationPayload {
    pub query: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub variables: serde_json::Value,
}

/// Messages the server sends over the socket
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck,
    #[serde(rename = "ka")]
    ConnectionKeepAlive,
    Data {
        id: String,
        payload: serde_json::Value,
    },
    Error {
        id: String,
        payload: serde_json::Value,
    },
    Complete {
        id: String,
    },
}

/// Configuration for the subscription client
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub url: Url,
    pub reconnect: bool,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub handshake_timeout: Duration,
}

impl SubscriptionConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            reconnect: true,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// One registered operation: its document plus the delivery channel
struct ActiveSubscription {
    query: String,
    variables: serde_json::Value,
    sender: mpsc::UnboundedSender<serde_json::Value>,
}

/// State shared between the client handle, streams, and the connection task
struct Shared {
    subscriptions: Mutex<HashMap<String, ActiveSubscription>>,
    next_id: AtomicU64,
}

/// WebSocket subscription client
///
/// Cloning shares the underlying connection; dropping the client and all of
/// its streams shuts the connection task down.
#[derive(Clone)]
pub struct SubscriptionClient {
    shared: Arc<Shared>,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
}

impl SubscriptionClient {
    /// Connect to a subscription endpoint (e.g. `ws://localhost:4002/graphql`)
    pub fn connect(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| MicroblogError::InvalidInput(format!("Invalid WebSocket URL: {}", e)))?;
        Self::with_config(SubscriptionConfig::new(url))
    }

    pub fn with_config(config: SubscriptionConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        });
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();

        tokio::spawn(connection_task(config, shared.clone(), outgoing_rx));

        Ok(Self { shared, outgoing })
    }

    /// Open a subscription and return its stream of `data` payloads
    ///
    /// Dropping the stream sends `stop` for its operation id and stops
    /// delivery; the socket and other subscriptions are unaffected.
    pub fn subscribe(&self, query: &str, variables: serde_json::Value) -> SubscriptionStream {
        let id = (self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut subscriptions = self.shared.subscriptions.lock().unwrap();
        subscriptions.insert(
            id.clone(),
            ActiveSubscription {
                query: query.to_string(),
                variables: variables.clone(),
                sender,
            },
        );
        drop(subscriptions);

        // If the connection is down the start message is queued and flushed
        // after the handshake; the resubscribe pass covers the rest
        let _ = self.outgoing.send(ClientMessage::Start {
            id: id.clone(),
            payload: OperationPayload {
                query: query.to_string(),
                variables,
            },
        });

        SubscriptionStream {
            id,
            inner: UnboundedReceiverStream::new(receiver),
            shared: self.shared.clone(),
            outgoing: self.outgoing.clone(),
        }
    }
}

/// Stream of payloads for one subscription operation
pub struct SubscriptionStream {
    id: String,
    inner: UnboundedReceiverStream<serde_json::Value>,
    shared: Arc<Shared>,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
}

impl Stream for SubscriptionStream {
    type Item = serde_json::Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        let mut subscriptions = self.shared.subscriptions.lock().unwrap();
        subscriptions.remove(&self.id);
        drop(subscriptions);

        let _ = self.outgoing.send(ClientMessage::Stop {
            id: self.id.clone(),
        });
    }
}

/// How one connection attempt ended
enum ConnectionExit {
    /// All client handles and streams were dropped; stop for good
    Shutdown,
    /// The server closed the socket after a successful session
    Dropped,
}

/// Owns the socket lifecycle: dial, handshake, pump, reconnect
async fn connection_task(
    config: SubscriptionConfig,
    shared: Arc<Shared>,
    mut outgoing: mpsc::UnboundedReceiver<ClientMessage>,
) {
    let mut backoff = config.initial_backoff;

    loop {
        match run_connection(&config, &shared, &mut outgoing).await {
            Ok(ConnectionExit::Shutdown) => break,
            Ok(ConnectionExit::Dropped) => {
                // A full session happened; start the backoff ladder over
                backoff = config.initial_backoff;
                warn!("subscription connection dropped");
            }
            Err(e) => {
                warn!(error = %e, "subscription connection failed");
            }
        }

        if !config.reconnect {
            break;
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(config.max_backoff);
    }

    // Fail-close any remaining streams by dropping their senders
    shared.subscriptions.lock().unwrap().clear();
}

async fn run_connection(
    config: &SubscriptionConfig,
    shared: &Shared,
    outgoing: &mut mpsc::UnboundedReceiver<ClientMessage>,
) -> Result<ConnectionExit> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| MicroblogError::Transport(format!("Invalid WebSocket request: {}", e)))?;
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static("graphql-ws"),
    );

    let (socket, _response) = tokio::time::timeout(config.handshake_timeout, connect_async(request))
        .await
        .map_err(|_| MicroblogError::Transport("WebSocket connect timed out".to_string()))?
        .map_err(|e| MicroblogError::Transport(format!("WebSocket connect failed: {}", e)))?;

    let (mut sink, mut stream) = socket.split();

    send_message(&mut sink, &ClientMessage::ConnectionInit { payload: None }).await?;

    // Wait for connection_ack before sending operations
    loop {
        let frame = tokio::time::timeout(config.handshake_timeout, stream.next())
            .await
            .map_err(|_| MicroblogError::Transport("Timed out waiting for connection_ack".to_string()))?
            .ok_or_else(|| MicroblogError::Transport("Connection closed during handshake".to_string()))?
            .map_err(|e| MicroblogError::Transport(format!("Handshake read failed: {}", e)))?;

        if let Message::Text(text) = frame {
            if matches!(
                serde_json::from_str::<ServerMessage>(&text),
                Ok(ServerMessage::ConnectionAck)
            ) {
                break;
            }
        }
    }
    debug!("subscription connection established");

    // The server session is fresh, so replay start for every operation that
    // is still alive on our side
    let resubscribes: Vec<ClientMessage> = {
        let subscriptions = shared.subscriptions.lock().unwrap();
        subscriptions
            .iter()
            .map(|(id, sub)| ClientMessage::Start {
                id: id.clone(),
                payload: OperationPayload {
                    query: sub.query.clone(),
                    variables: sub.variables.clone(),
                },
            })
            .collect()
    };
    for message in resubscribes {
        send_message(&mut sink, &message).await?;
    }

    loop {
        tokio::select! {
            message = outgoing.recv() => match message {
                Some(message) => send_message(&mut sink, &message).await?,
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(ConnectionExit::Shutdown);
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_server_message(shared, &text),
                Some(Ok(Message::Ping(data))) => {
                    sink.send(Message::Pong(data)).await.map_err(|e| {
                        MicroblogError::Transport(format!("Pong failed: {}", e))
                    })?;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(ConnectionExit::Dropped),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(MicroblogError::Transport(format!("Socket read failed: {}", e)));
                }
            },
        }
    }
}

/// Route one server frame to the stream registered under its operation id
fn handle_server_message(shared: &Shared, text: &str) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::Data { id, payload }) => {
            let value = payload
                .get("data")
                .cloned()
                .unwrap_or(payload);

            let mut subscriptions = shared.subscriptions.lock().unwrap();
            let receiver_gone = subscriptions
                .get(&id)
                .map_or(false, |sub| sub.sender.send(value).is_err());
            if receiver_gone {
                subscriptions.remove(&id);
            }
        }
        Ok(ServerMessage::Error { id, payload }) => {
            // One error message closes that subscription id only
            warn!(operation_id = %id, payload = %payload, "subscription errored");
            shared.subscriptions.lock().unwrap().remove(&id);
        }
        Ok(ServerMessage::Complete { id }) => {
            debug!(operation_id = %id, "subscription completed");
            shared.subscriptions.lock().unwrap().remove(&id);
        }
        Ok(ServerMessage::ConnectionAck) | Ok(ServerMessage::ConnectionKeepAlive) => {}
        Err(e) => {
            warn!(error = %e, "unrecognized server message");
        }
    }
}

async fn send_message(sink: &mut WsSink, message: &ClientMessage) -> Result<()> {
    let text = serde_json::to_string(message)?;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| MicroblogError::Transport(format!("Socket write failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_message_matches_wire_shape() {
        let message = ClientMessage::Start {
            id: "1".to_string(),
            payload: OperationPayload {
                query: "subscription { postAdded { id } }".to_string(),
                variables: serde_json::Value::Null,
            },
        };

        let wire = serde_json::to_value(&message).unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "start",
                "id": "1",
                "payload": { "query": "subscription { postAdded { id } }" }
            })
        );
    }

    #[test]
    fn stop_message_matches_wire_shape() {
        let message = ClientMessage::Stop {
            id: "1".to_string(),
        };
        let wire = serde_json::to_value(&message).unwrap();
        assert_eq!(wire, json!({ "type": "stop", "id": "1" }));
    }

    #[test]
    fn server_messages_parse_from_wire_shapes() {
        let ack: ServerMessage = serde_json::from_str(r#"{"type":"connection_ack"}"#).unwrap();
        assert!(matches!(ack, ServerMessage::ConnectionAck));

        let data: ServerMessage = serde_json::from_str(
            r#"{"type":"data","id":"1","payload":{"data":{"postAdded":{"id":"1"}}}}"#,
        )
        .unwrap();
        match data {
            ServerMessage::Data { id, payload } => {
                assert_eq!(id, "1");
                assert!(payload.get("data").is_some());
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let complete: ServerMessage =
            serde_json::from_str(r#"{"type":"complete","id":"1"}"#).unwrap();
        assert!(matches!(complete, ServerMessage::Complete { .. }));
    }
}
