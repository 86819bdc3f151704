#![allow(clippy::unwrap_used, clippy::expect_used)]
// Drives a listener against a scripted station on loopback.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ecos_core::Command;
use ecos_core::protocol::encode_commands;
use ecos_listener::{Listener, ListenerConfig, RouterConfig};
use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_tungstenite::tungstenite::Message;

const STEP: Duration = Duration::from_secs(5);

const STARTUP: &str = "\
<REPLY get(1, info, status)>\r\n\
1 status[GO]\r\n\
1 ApplicationVersion[4.2.9]\r\n\
<END 0 (OK)>\r\n\
<REPLY queryObjects(10, addr, name, protocol)>\r\n\
1000 addr[3] name[\"BR 89\"] protocol[DCC28]\r\n\
<END 0 (OK)>\r\n";

async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(STEP, future).await.expect("step timed out")
}

struct Station {
    lines: tokio::io::Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl Station {
    async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = within(listener.accept()).await.unwrap();
        let (read, write) = stream.into_split();
        Self {
            lines: BufReader::new(read).lines(),
            write,
        }
    }

    async fn next_line(&mut self) -> String {
        within(self.lines.next_line()).await.unwrap().expect("station stream closed")
    }

    /// Read until `expected` arrives, returning everything read.
    async fn read_until(&mut self, expected: &str) -> Vec<String> {
        let mut seen = Vec::new();
        loop {
            let line = self.next_line().await;
            let done = line == expected;
            seen.push(line);
            if done {
                return seen;
            }
        }
    }

    async fn send(&mut self, text: &str) {
        self.write.write_all(text.as_bytes()).await.unwrap();
    }
}

async fn start() -> (Arc<Listener>, Station, std::net::SocketAddr) {
    let station = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ListenerConfig {
        host: "127.0.0.1".into(),
        port: station.local_addr().unwrap().port(),
        feedback_session: false,
        router: RouterConfig {
            port: 0,
            port_search: 0,
            ..RouterConfig::default()
        },
        ..ListenerConfig::default()
    };

    let listener = Arc::new(Listener::new(config));
    let router = listener.bind_router().await.unwrap().expect("router enabled");
    let router_addr = router.local_addr().unwrap();

    let serving = Arc::clone(&listener);
    tokio::spawn(async move { serving.serve(Some(router)).await });

    let station = Station::accept(&station).await;
    (listener, station, router_addr)
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = within(ws.next()).await.unwrap().unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn session_requests_model_and_answers_discovery() {
    let (listener, mut station, _) = start().await;

    let initial = station.read_until("request(26, view)").await;
    assert_eq!(initial.first().map(String::as_str), Some("request(1, view)"));
    assert!(initial.contains(&"queryObjects(10, addr, name, protocol)".to_owned()));

    station.send(STARTUP).await;
    assert_eq!(station.next_line().await, "get(1000, speed, speedstep, profile, protocol, name, addr, dir, funcset, funcdesc)");
    assert_eq!(station.next_line().await, "request(1000, view)");

    let loco = listener.general().get_object_by(1000).unwrap();
    assert_eq!(loco.as_locomotive().unwrap().name, "BR 89");
    listener.shutdown();
}

#[tokio::test]
async fn router_publishes_snapshots_and_relays_commands() {
    let (listener, mut station, router_addr) = start().await;
    station.read_until("request(26, view)").await;
    station.send(STARTUP).await;
    station.read_until("request(1000, view)").await;

    let (mut ws, _) = within(tokio_tungstenite::connect_async(format!("ws://{router_addr}")))
        .await
        .unwrap();

    let first = next_json(&mut ws).await;
    assert_eq!(first["ecosbase"][0]["status"], "GO");
    assert_eq!(first["locomotives"][0]["objectId"], 1000);

    ws.send(Message::text(
        json!({"mode": "register", "enableLocomotives": true}).to_string(),
    ))
    .await
    .unwrap();

    let batch = encode_commands(&[Command::get(1000, &["speed"])]).unwrap();
    ws.send(Message::text(
        json!({"mode": "relayToEcos", "encodedCommands": batch}).to_string(),
    ))
    .await
    .unwrap();
    assert_eq!(station.read_until("get(1000, speed)").await.last().unwrap(), "get(1000, speed)");

    station.send("<EVENT 1000>\r\n1000 speed[42]\r\n<END 0 (OK)>\r\n").await;
    let update = loop {
        let doc = next_json(&mut ws).await;
        if doc["locomotives"][0]["speed"] == 42 {
            break doc;
        }
    };
    assert!(update.get("accessories").is_none());
    assert!(update.get("feedbacks").is_none());

    listener.shutdown();
}

#[tokio::test]
async fn unparsable_batch_is_skipped() {
    let (listener, mut station, _) = start().await;
    station.read_until("request(26, view)").await;

    station.send("<BOGUS>\r\n<EVENT 1>\r\n<END 0 (OK)>\r\n").await;
    station.send(STARTUP).await;
    station.read_until("request(1000, view)").await;

    assert_eq!(listener.general().len(), 2);
    listener.shutdown();
}
