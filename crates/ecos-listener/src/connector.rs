//! TCP connector to the command station with auto-reconnect.
//!
//! Frames the station stream into lines and delivers them as
//! [`ConnectorEvent`]s over an mpsc channel. Outgoing command lines are
//! queued through a cloneable [`ConnectorHandle`]. A dropped connection
//! is retried with exponential backoff + jitter until cancelled.

use std::sync::Arc;
use std::time::Duration;

use ecos_core::Command;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;

use crate::config::{ListenerConfig, ReconnectConfig};
use crate::error::ListenerError;

// ── Channel capacity ─────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── Events ───────────────────────────────────────────────────────────

/// What the connector reports to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    /// A connection was established. Commands queued before it were dropped.
    Connected,
    /// One framed line, without its terminator.
    Line(String),
    /// The connection ended; a reconnect follows unless cancelled.
    Disconnected,
}

// ── Options ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConnectorOptions {
    pub addr: String,
    pub connect_timeout: Duration,
    pub max_line_length: usize,
    pub reconnect: ReconnectConfig,
}

impl From<&ListenerConfig> for ConnectorOptions {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            addr: config.station_addr(),
            connect_timeout: config.connect_timeout,
            max_line_length: config.max_line_length,
            reconnect: config.reconnect.clone(),
        }
    }
}

// ── ConnectorHandle ──────────────────────────────────────────────────

/// Write side of a running connector. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ConnectorHandle {
    name: Arc<str>,
    outgoing: mpsc::UnboundedSender<String>,
}

impl ConnectorHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue one raw protocol line. Returns `false` once the connector is gone.
    pub fn send_line(&self, line: impl Into<String>) -> bool {
        self.outgoing.send(line.into()).is_ok()
    }

    pub fn send_command(&self, command: &Command) -> bool {
        self.send_line(command.native())
    }

    /// Queue commands in order. Returns how many were accepted.
    pub fn send_commands<'a>(&self, commands: impl IntoIterator<Item = &'a Command>) -> usize {
        commands
            .into_iter()
            .take_while(|command| self.send_command(command))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.outgoing.is_closed()
    }
}

/// Spawn the connection loop for one session.
///
/// Must be called inside a tokio runtime. The loop ends when `cancel`
/// fires, the event receiver is dropped or the retry limit is reached.
pub fn spawn_connector(
    name: &str,
    options: ConnectorOptions,
    cancel: CancellationToken,
) -> (ConnectorHandle, mpsc::Receiver<ConnectorEvent>) {
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let name: Arc<str> = Arc::from(name);

    let task_name = Arc::clone(&name);
    tokio::spawn(async move {
        connect_loop(&task_name, &options, event_tx, outgoing_rx, cancel).await;
    });

    (
        ConnectorHandle {
            name,
            outgoing: outgoing_tx,
        },
        event_rx,
    )
}

// ── Background reconnection loop ─────────────────────────────────────

/// connect → read/write → on error, backoff → reconnect.
async fn connect_loop(
    name: &str,
    options: &ConnectorOptions,
    events: mpsc::Sender<ConnectorEvent>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        if events.is_closed() {
            break;
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_run(name, options, &events, &mut outgoing, &cancel) => result,
        };

        match result {
            Ok(()) => {
                tracing::info!(connector = name, "Station connection closed");
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(connector = name, error = %e, attempt, "Station connection error");

                if let Some(max) = options.reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            connector = name,
                            max_retries = max,
                            "Reconnection limit reached, giving up"
                        );
                        break;
                    }
                }
            }
        }

        if cancel.is_cancelled() || events.is_closed() {
            break;
        }

        let delay = calculate_backoff(attempt, &options.reconnect);
        tracing::info!(
            connector = name,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "Waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    tracing::debug!(connector = name, "Connector loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Connect once and pump lines both ways until the stream drops.
async fn connect_and_run(
    name: &str,
    options: &ConnectorOptions,
    events: &mpsc::Sender<ConnectorEvent>,
    outgoing: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> Result<(), ListenerError> {
    let addr = options.addr.as_str();
    tracing::info!(connector = name, addr, "Connecting to command station");

    let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| ListenerError::Timeout {
            addr: addr.to_owned(),
            timeout_secs: options.connect_timeout.as_secs(),
        })?
        .map_err(|e| ListenerError::Connect {
            addr: addr.to_owned(),
            reason: e.to_string(),
        })?;
    stream.set_nodelay(true)?;

    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(options.max_line_length));

    // The model is requested afresh on every connect.
    let mut stale = 0usize;
    while outgoing.try_recv().is_ok() {
        stale += 1;
    }
    if stale > 0 {
        tracing::debug!(connector = name, stale, "Dropped commands queued while disconnected");
    }

    tracing::info!(connector = name, addr, "Connected to command station");
    if events.send(ConnectorEvent::Connected).await.is_err() {
        return Ok(());
    }

    let result = pump(name, &mut framed, events, outgoing, cancel).await;
    // Receiver may already be gone during shutdown.
    let _ = events.send(ConnectorEvent::Disconnected).await;
    result
}

async fn pump<T>(
    name: &str,
    framed: &mut Framed<T, LinesCodec>,
    events: &mpsc::Sender<ConnectorEvent>,
    outgoing: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> Result<(), ListenerError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            Some(line) = outgoing.recv() => {
                tracing::debug!(connector = name, line = %line, "Sending command");
                framed.send(line).await?;
            }
            frame = framed.next() => {
                match frame {
                    Some(Ok(line)) => {
                        tracing::trace!(connector = name, line = %line, "Received line");
                        if events.send(ConnectorEvent::Line(line)).await.is_err() {
                            return Ok(());
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        tracing::info!(connector = name, "Station closed the stream");
                        return Ok(());
                    }
                }
            }
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pump_writes_queued_commands_then_reads_lines() {
        let mock = tokio_test::io::Builder::new()
            .write(b"get(1, status)\n")
            .read(b"<EVENT 1>\r\n1 status[GO]\r\n")
            .build();
        let mut framed = Framed::new(mock, LinesCodec::new());
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();
        outgoing_tx.send("get(1, status)".to_owned()).unwrap();

        let cancel = CancellationToken::new();
        pump("test", &mut framed, &events_tx, &mut outgoing_rx, &cancel)
            .await
            .unwrap();

        assert_eq!(events_rx.try_recv().unwrap(), ConnectorEvent::Line("<EVENT 1>".into()));
        assert_eq!(events_rx.try_recv().unwrap(), ConnectorEvent::Line("1 status[GO]".into()));
        assert!(events_rx.try_recv().is_err());
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        assert!(calculate_backoff(10, &config) <= Duration::from_millis(12_500));
        assert!(calculate_backoff(u32::MAX, &config) <= Duration::from_millis(12_500));
    }

    #[test]
    fn options_follow_listener_config() {
        let config = ListenerConfig {
            host: "10.0.0.5".into(),
            ..ListenerConfig::default()
        };
        let options = ConnectorOptions::from(&config);
        assert_eq!(options.addr, "10.0.0.5:15471");
        assert_eq!(options.reconnect, config.reconnect);
    }
}
