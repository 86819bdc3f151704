//! Protocol parsing and live object model for ESU ECoS command stations.
//!
//! The station speaks a line-oriented text protocol: commands such as
//! `get(1000, speed)` go out, reply and event blocks come back. This crate
//! turns that stream into a typed model:
//!
//! - **[`protocol`]** — Argument tokens, [`Command`] decoding and
//!   synthesis, the [`Block`] parser and the base64 command batch codec.
//!
//! - **[`model`]** — The [`Entity`] variants (central station,
//!   locomotives, accessories, S88 feedback buses) behind the shared
//!   [`Item`] trait. Each entity carries a LIFO [`CommandStack`] of
//!   commands it wants transmitted.
//!
//! - **[`DataProvider`]** — Reconciliation engine. Applies parsed blocks
//!   to the collection through an ordered handler chain, publishes a
//!   version bump on `watch` after each change and emits list queries on
//!   a `broadcast` channel.
//!
//! - **[`Snapshot`]** — The JSON document form of the collection.

pub mod error;
pub mod model;
pub mod protocol;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::{CoreError, ProtocolError};
pub use model::{
    Accessory, CentralStation, CommandStack, Entity, EntityKind, FeedbackBus, Item, Locomotive,
    StationState,
};
pub use protocol::{Argument, Block, BlockKind, Command, CommandKind, Entry};
pub use store::{DataProvider, DataProviderMode, Snapshot};
