//! Network side of the ECoS gateway.
//!
//! - **[`connector`]** — TCP connection to the command station with line
//!   framing and reconnect backoff.
//!
//! - **[`LineAssembler`]** — Buffers framed lines into complete blocks.
//!
//! - **[`Listener`]** — Runs the general and the S88 session, each a
//!   connector feeding its own [`DataProvider`](ecos_core::DataProvider),
//!   and writes queued entity commands back to the station.
//!
//! - **[`Router`]** — WebSocket server publishing model snapshots to
//!   registered clients and relaying their command batches.
//!
//! - **[`RouterClient`]** — The other end of the router: registers a
//!   filter, relays commands and rebuilds received snapshots.

pub mod assembler;
pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod listener;
pub mod router;
pub mod session;

pub use assembler::LineAssembler;
pub use client::RouterClient;
pub use config::{ListenerConfig, ReconnectConfig, RouterConfig};
pub use connector::{ConnectorEvent, ConnectorHandle, ConnectorOptions, spawn_connector};
pub use error::ListenerError;
pub use listener::Listener;
pub use router::{ClientFilter, Router, RouterRequest, RouterSources, filter_snapshot};
