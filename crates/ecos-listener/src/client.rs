//! Client side of the router protocol.
//!
//! [`RouterClient`] connects to a running [`Router`](crate::Router),
//! registers a section filter, relays command batches to the station and
//! turns every snapshot it receives into a fresh [`DataProvider`].

use std::time::Duration;

use ecos_core::protocol::encode_commands;
use ecos_core::{Command, DataProvider, DataProviderMode, Item};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::ListenerError;
use crate::router::{ClientFilter, RouterRequest};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct RouterClient {
    url: String,
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl RouterClient {
    /// Connect to `url` (e.g. `ws://127.0.0.1:10050`) and register `filter`.
    ///
    /// A filter without any enabled section is rejected before
    /// connecting, since the router would never publish to it.
    pub async fn connect(
        url: &str,
        filter: ClientFilter,
        timeout: Duration,
    ) -> Result<Self, ListenerError> {
        if filter.is_empty() {
            return Err(ListenerError::EmptyFilter);
        }

        tracing::info!(url, "Connecting to router");
        let (ws, _response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| ListenerError::Timeout {
                addr: url.to_owned(),
                timeout_secs: timeout.as_secs(),
            })?
            .map_err(|e| ListenerError::Connect {
                addr: url.to_owned(),
                reason: e.to_string(),
            })?;

        let (write, read) = ws.split();
        let mut client = Self {
            url: url.to_owned(),
            write,
            read,
        };
        client.register(filter).await?;
        Ok(client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Replace the section filter of this client.
    pub async fn register(&mut self, filter: ClientFilter) -> Result<(), ListenerError> {
        if filter.is_empty() {
            return Err(ListenerError::EmptyFilter);
        }
        self.send(&RouterRequest::Register(filter)).await
    }

    /// Relay an entity's pending commands, in drain order. The entity's
    /// stack is left as it is. Returns `false` when nothing is pending.
    pub async fn relay_item(&mut self, item: &impl Item) -> Result<bool, ListenerError> {
        let Some(encoded) = item.to_base64() else {
            return Ok(false);
        };
        self.relay_encoded(encoded).await
    }

    /// Relay `commands` as one batch. Returns `false` for an empty batch.
    pub async fn relay_commands(&mut self, commands: &[Command]) -> Result<bool, ListenerError> {
        let Some(encoded) = encode_commands(commands) else {
            return Ok(false);
        };
        self.relay_encoded(encoded).await
    }

    /// Wait for the next snapshot and rebuild it as a model.
    ///
    /// Registered clients receive filtered snapshots, so the model only
    /// holds the enabled sections. `None` once the router closes.
    pub async fn next_snapshot(&mut self) -> Option<Result<DataProvider, ListenerError>> {
        loop {
            match self.read.next().await? {
                Ok(Message::Text(text)) => {
                    let provider = DataProvider::new(DataProviderMode::Any);
                    return Some(
                        provider
                            .load_json(text.as_str())
                            .map(|()| provider)
                            .map_err(ListenerError::from),
                    );
                }
                Ok(Message::Close(frame)) => {
                    tracing::debug!(url = %self.url, ?frame, "Router closed connection");
                    return None;
                }
                // Ping replies are queued by tungstenite itself.
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    /// Send a close frame and flush it.
    pub async fn close(mut self) -> Result<(), ListenerError> {
        self.write.close().await?;
        Ok(())
    }

    async fn relay_encoded(&mut self, encoded_commands: String) -> Result<bool, ListenerError> {
        self.send(&RouterRequest::RelayToEcos { encoded_commands }).await?;
        Ok(true)
    }

    async fn send(&mut self, request: &RouterRequest) -> Result<(), ListenerError> {
        let text = serde_json::to_string(request)?;
        self.write.send(Message::text(text)).await?;
        Ok(())
    }
}
