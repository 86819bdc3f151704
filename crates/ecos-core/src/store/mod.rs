//! Live entity collection and the reconciliation engine that keeps it in
//! sync with the station.

pub mod provider;
pub mod snapshot;

pub use provider::{DataProvider, DataProviderMode};
pub use snapshot::Snapshot;
