//! WebSocket fan-out of the live model.
//!
//! Every client receives the general and the feedback snapshot on
//! connect. Clients that register a section filter also receive the
//! filtered snapshot after every model change. `relayToEcos` requests
//! forward a base64 command batch to the general station connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use ecos_core::DataProvider;
use ecos_core::protocol::decode_commands;
use ecos_core::store::snapshot::{SECTION_ACCESSORIES, SECTION_FEEDBACKS, SECTION_LOCOMOTIVES};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::config::RouterConfig;
use crate::connector::ConnectorHandle;
use crate::error::ListenerError;

// ── Client protocol ──────────────────────────────────────────────────

/// Sections a registered client wants to receive. Unset flags are off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientFilter {
    pub enable_locomotives: bool,
    pub enable_accessories: bool,
    #[serde(rename = "enableS88")]
    pub enable_s88: bool,
}

impl ClientFilter {
    /// Every section enabled.
    pub fn all() -> Self {
        Self {
            enable_locomotives: true,
            enable_accessories: true,
            enable_s88: true,
        }
    }

    /// No section enabled; such a client never receives updates.
    pub fn is_empty(&self) -> bool {
        !(self.enable_locomotives || self.enable_accessories || self.enable_s88)
    }
}

/// A JSON text frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum RouterRequest {
    Register(ClientFilter),
    RelayToEcos {
        #[serde(rename = "encodedCommands", default)]
        encoded_commands: String,
    },
}

/// Copy of `snapshot` reduced to the sections `filter` enables.
///
/// An empty `feedbacks` array is dropped as well. Returns `None` when at
/// most one key is left, i.e. there is nothing worth sending.
pub fn filter_snapshot(snapshot: &Value, filter: &ClientFilter) -> Option<Value> {
    let Value::Object(map) = snapshot else {
        return None;
    };
    let mut map = map.clone();

    if !filter.enable_locomotives {
        map.remove(SECTION_LOCOMOTIVES);
    }
    if !filter.enable_accessories {
        map.remove(SECTION_ACCESSORIES);
    }
    if !filter.enable_s88 {
        map.remove(SECTION_FEEDBACKS);
    }
    if map
        .get(SECTION_FEEDBACKS)
        .and_then(Value::as_array)
        .is_some_and(Vec::is_empty)
    {
        map.remove(SECTION_FEEDBACKS);
    }

    (map.len() > 1).then_some(Value::Object(map))
}

// ── Sources ──────────────────────────────────────────────────────────

/// The models the router publishes and where relayed commands go.
#[derive(Clone)]
pub struct RouterSources {
    pub general: Arc<DataProvider>,
    pub feedback: Option<Arc<DataProvider>>,
    pub relay: ConnectorHandle,
}

impl RouterSources {
    fn providers(&self) -> impl Iterator<Item = &Arc<DataProvider>> {
        std::iter::once(&self.general).chain(self.feedback.as_ref())
    }
}

// ── Router ───────────────────────────────────────────────────────────

struct Client {
    peer: SocketAddr,
    filter: Option<ClientFilter>,
    outgoing: mpsc::UnboundedSender<Message>,
}

type Clients = Arc<DashMap<u64, Client>>;

/// A bound, not yet serving, WebSocket router.
pub struct Router {
    listener: TcpListener,
    clients: Clients,
    next_id: AtomicU64,
}

impl Router {
    /// Bind to `config.bind:config.port`, probing the following
    /// `config.port_search` ports when the address is taken.
    pub async fn bind(config: &RouterConfig) -> Result<Self, ListenerError> {
        let mut last_error = None;

        for offset in 0..=config.port_search {
            let Some(port) = config.port.checked_add(offset) else {
                break;
            };
            let addr = format!("{}:{port}", config.bind);
            match TcpListener::bind(&addr).await {
                Ok(listener) => {
                    tracing::info!(addr = %addr, "Router listening");
                    return Ok(Self {
                        listener,
                        clients: Arc::new(DashMap::new()),
                        next_id: AtomicU64::new(1),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                    tracing::debug!(addr = %addr, "Router port in use, trying next");
                    last_error = Some((addr, e));
                }
                Err(e) => return Err(ListenerError::Bind { addr, source: e }),
            }
        }

        let (addr, source) = last_error.unwrap_or_else(|| {
            (
                format!("{}:{}", config.bind, config.port),
                std::io::Error::from(std::io::ErrorKind::AddrInUse),
            )
        });
        Err(ListenerError::Bind { addr, source })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ListenerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Accept clients and publish model changes until `cancel` fires.
    pub async fn serve(self, sources: RouterSources, cancel: CancellationToken) {
        let mut general_rx = sources.general.subscribe_modified();
        let mut feedback_rx = sources.feedback.as_ref().map(|p| p.subscribe_modified());

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_client(stream, peer, &sources, &cancel),
                    Err(e) => tracing::warn!(error = %e, "Router accept failed"),
                },
                changed = general_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    broadcast(&self.clients, &sources.general);
                }
                changed = wait_changed(&mut feedback_rx) => {
                    if changed.is_err() {
                        feedback_rx = None;
                    } else if let Some(provider) = &sources.feedback {
                        broadcast(&self.clients, provider);
                    }
                }
            }
        }

        tracing::debug!(clients = self.clients.len(), "Router stopped");
    }

    fn spawn_client(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        sources: &RouterSources,
        cancel: &CancellationToken,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let clients = Arc::clone(&self.clients);
        let sources = sources.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            if let Err(e) = run_client(id, stream, peer, &clients, &sources, &cancel).await {
                tracing::debug!(%peer, error = %e, "Router client failed");
            }
            clients.remove(&id);
            tracing::info!(%peer, clients = clients.len(), "Router client left");
        });
    }
}

async fn wait_changed(rx: &mut Option<watch::Receiver<u64>>) -> Result<(), watch::error::RecvError> {
    match rx {
        Some(rx) => rx.changed().await,
        None => std::future::pending().await,
    }
}

// ── Per-client connection ────────────────────────────────────────────

async fn run_client(
    id: u64,
    stream: TcpStream,
    peer: SocketAddr,
    clients: &Clients,
    sources: &RouterSources,
    cancel: &CancellationToken,
) -> Result<(), ListenerError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    tracing::info!(%peer, "New router client");

    let (mut write, mut read) = ws.split();
    let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel();
    clients.insert(
        id,
        Client {
            peer,
            filter: None,
            outgoing,
        },
    );

    for provider in sources.providers() {
        let document = provider.to_json().map_err(|e| ListenerError::WebSocket(e.to_string()))?;
        write.send(Message::text(document.to_string())).await?;
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            Some(message) = outgoing_rx.recv() => write.send(message).await?,
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_request(id, text.as_str(), clients, sources),
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
        }
    }
}

fn handle_request(id: u64, text: &str, clients: &Clients, sources: &RouterSources) {
    let request = match serde_json::from_str::<RouterRequest>(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(client = id, error = %e, "Ignoring unrecognized router message");
            return;
        }
    };

    match request {
        RouterRequest::Register(filter) => {
            if let Some(mut client) = clients.get_mut(&id) {
                tracing::info!(peer = %client.peer, ?filter, "Router client registered");
                client.filter = Some(filter);
            }
        }
        RouterRequest::RelayToEcos { encoded_commands } => {
            let commands = decode_commands(&encoded_commands);
            if commands.is_empty() {
                tracing::warn!(client = id, "Relay request carried no commands");
                return;
            }
            let sent = sources.relay.send_commands(&commands);
            tracing::info!(client = id, sent, "Relayed commands to station");
        }
    }
}

/// Send the filtered snapshot of `provider` to every registered client.
fn broadcast(clients: &Clients, provider: &DataProvider) {
    if clients.is_empty() {
        return;
    }
    let snapshot = match provider.to_json() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot serialize snapshot");
            return;
        }
    };

    for client in clients.iter() {
        let Some(filter) = client.filter else {
            continue;
        };
        let Some(document) = filter_snapshot(&snapshot, &filter) else {
            continue;
        };
        match serde_json::to_string_pretty(&document) {
            // A closed channel means the client task is already leaving.
            Ok(text) => {
                let _ = client.outgoing.send(Message::text(text));
            }
            Err(e) => tracing::warn!(error = %e, "Cannot encode snapshot"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
