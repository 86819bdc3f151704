// ── Station session ──
//
// One connector feeding one data provider. Lines are assembled into
// blocks, reconciled, and whatever the model queued in response is
// written back to the same connection.

use std::sync::Arc;

use ecos_core::model::{ACCESSORIES_ID, BASE_OBJECT_ID, FEEDBACKS_ID, LOCOMOTIVES_ID};
use ecos_core::{Command, DataProvider, DataProviderMode, EntityKind};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::assembler::LineAssembler;
use crate::connector::{ConnectorEvent, ConnectorHandle};

/// Station manager object the general session also subscribes to.
const MANAGER_OBJECT_ID: i32 = 5;

/// Commands sent right after a session connects.
pub fn initial_commands(mode: DataProviderMode) -> Vec<Command> {
    let general = || {
        [
            Some(Command::request(BASE_OBJECT_ID, &["view"])),
            Some(Command::get(BASE_OBJECT_ID, &["info", "status"])),
            Some(Command::request(MANAGER_OBJECT_ID, &["view"])),
            Some(Command::request(LOCOMOTIVES_ID, &["view"])),
            Some(Command::request(ACCESSORIES_ID, &["view"])),
            EntityKind::Accessory.list_query(),
            EntityKind::Locomotive.list_query(),
        ]
        .into_iter()
        .flatten()
    };
    let feedback = || {
        [
            EntityKind::FeedbackBus.list_query(),
            Some(Command::request(FEEDBACKS_ID, &["view"])),
        ]
        .into_iter()
        .flatten()
    };

    match mode {
        DataProviderMode::General => general().collect(),
        DataProviderMode::Feedback => feedback().collect(),
        DataProviderMode::Any => general().chain(feedback()).collect(),
    }
}

/// Drive one session until cancelled or the connector goes away.
pub async fn run_session(
    provider: Arc<DataProvider>,
    connector: ConnectorHandle,
    mut events: mpsc::Receiver<ConnectorEvent>,
    cancel: CancellationToken,
) {
    let name = connector.name().to_owned();
    let mut assembler = LineAssembler::new();
    let mut emitted = provider.subscribe_commands();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(ConnectorEvent::Connected) => {
                    assembler.reset();
                    let sent = connector.send_commands(&initial_commands(provider.mode()));
                    tracing::debug!(session = %name, sent, "Sent initial commands");
                }
                Some(ConnectorEvent::Line(line)) => {
                    process_line(&name, &mut assembler, &provider, &connector, &line);
                }
                Some(ConnectorEvent::Disconnected) => {
                    if assembler.pending() > 0 {
                        tracing::debug!(session = %name, lines = assembler.pending(), "Dropping partial batch");
                    }
                    assembler.reset();
                }
                None => break,
            },
            batch = emitted.recv() => match batch {
                Ok(commands) => {
                    connector.send_commands(commands.iter());
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(session = %name, skipped, "Session fell behind on model commands");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    tracing::debug!(session = %name, "Session stopped");
}

/// Feed one line; once a batch completes, reconcile it and flush the
/// entity command stacks to the station.
pub fn process_line(
    name: &str,
    assembler: &mut LineAssembler,
    provider: &DataProvider,
    connector: &ConnectorHandle,
    line: &str,
) {
    let blocks = match assembler.push(line) {
        Ok(blocks) => blocks,
        Err(e) => {
            tracing::warn!(session = name, error = %e, "Discarding unparsable batch");
            return;
        }
    };
    if blocks.is_empty() {
        return;
    }

    let handled = blocks.iter().filter(|block| provider.handle_data(block)).count();
    tracing::debug!(session = name, blocks = blocks.len(), handled, "Reconciled batch");

    let pending = provider.drain_commands();
    if !pending.is_empty() {
        connector.send_commands(&pending);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn natives(commands: &[Command]) -> Vec<&str> {
        commands.iter().map(Command::native).collect()
    }

    #[test]
    fn general_session_subscribes_lists() {
        assert_eq!(
            natives(&initial_commands(DataProviderMode::General)),
            [
                "request(1, view)",
                "get(1, info, status)",
                "request(5, view)",
                "request(10, view)",
                "request(11, view)",
                "queryObjects(11, addr, protocol, type, addrext, mode, symbol, name1, name2, name3, switching)",
                "queryObjects(10, addr, name, protocol)",
            ]
        );
    }

    #[test]
    fn feedback_session_lists_s88_first() {
        assert_eq!(
            natives(&initial_commands(DataProviderMode::Feedback)),
            ["queryObjects(26, ports)", "request(26, view)"]
        );
    }

    #[test]
    fn single_session_covers_everything() {
        let all = initial_commands(DataProviderMode::Any);
        assert_eq!(all.len(), 9);
        assert_eq!(all[8].native(), "request(26, view)");
    }
}
