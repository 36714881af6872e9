/*
[INPUT]:  Test scenarios needing a live signal engine double
[OUTPUT]: Multi-connection WebSocket server, session fixtures, view waiters
[POS]:    Test infrastructure - shared across monitor integration tests
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for gestalt-signal-monitor tests

#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gestalt_signal_adapter::SessionStore;
use gestalt_signal_monitor::stream::{BackoffConfig, SessionConfig, StreamView};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

pub const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const WAIT: Duration = Duration::from_secs(5);

/// Fast timers so lifecycle tests finish in milliseconds.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        connect_timeout: Duration::from_millis(300),
        heartbeat_interval: Duration::from_secs(30),
        force_reconnect_grace: Duration::from_millis(20),
        history_limit: 50,
        backoff: BackoffConfig {
            base_delay_ms: 50,
            growth: 1.5,
            max_delay_ms: 200,
            jitter_ms: 0,
        },
    }
}

pub fn authenticated_store() -> SessionStore {
    let store = SessionStore::new();
    store.set_authenticated(TEST_ADDRESS.to_string()).unwrap();
    store
}

/// What the server observed from one client connection
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Text(String),
    Close(Option<(u16, String)>),
    /// Socket ended without a close frame
    Dropped,
}

/// Server side of one accepted WebSocket connection
pub struct ServerConn {
    outgoing: mpsc::UnboundedSender<Message>,
    observed: mpsc::UnboundedReceiver<Observed>,
}

impl ServerConn {
    pub fn send_json(&self, value: Value) {
        let _ = self.outgoing.send(Message::Text(value.to_string().into()));
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.outgoing.send(Message::Text(text.to_string().into()));
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.outgoing.send(Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        })));
    }

    pub async fn next_observed(&mut self) -> Observed {
        timeout(WAIT, self.observed.recv())
            .await
            .expect("client frame within timeout")
            .unwrap_or(Observed::Dropped)
    }

    /// Skip pings until the connection ends.
    pub async fn wait_closed(&mut self) -> Observed {
        loop {
            match self.next_observed().await {
                Observed::Text(_) => continue,
                other => return other,
            }
        }
    }
}

/// WebSocket server accepting any number of connections
pub struct EngineServer {
    pub url: String,
    connections: mpsc::UnboundedReceiver<ServerConn>,
}

impl EngineServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (conn_tx, conn_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
                let (obs_tx, obs_rx) = mpsc::unbounded_channel();
                tokio::spawn(async move {
                    let (mut write, mut read) = ws.split();
                    loop {
                        tokio::select! {
                            outgoing = out_rx.recv() => {
                                let Some(message) = outgoing else { break };
                                let closing = matches!(message, Message::Close(_));
                                if write.send(message).await.is_err() || closing {
                                    // Drain until the peer answers the close.
                                    if closing {
                                        while let Some(Ok(_)) = read.next().await {}
                                    }
                                    break;
                                }
                            }
                            incoming = read.next() => match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    let _ = obs_tx.send(Observed::Text(text.to_string()));
                                }
                                Some(Ok(Message::Close(frame))) => {
                                    let _ = obs_tx.send(Observed::Close(
                                        frame.map(|f| (u16::from(f.code), f.reason.to_string())),
                                    ));
                                    break;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(_)) | None => {
                                    let _ = obs_tx.send(Observed::Dropped);
                                    break;
                                }
                            }
                        }
                    }
                });
                if conn_tx
                    .send(ServerConn {
                        outgoing: out_tx,
                        observed: obs_rx,
                    })
                    .is_err()
                {
                    break;
                }
            }
        });

        Self {
            url,
            connections: conn_rx,
        }
    }

    pub async fn accept(&mut self) -> ServerConn {
        timeout(WAIT, self.connections.recv())
            .await
            .expect("client connected within timeout")
            .expect("server running")
    }

    /// Assert no client connects within `window`.
    pub async fn expect_no_connection(&mut self, window: Duration) {
        if let Ok(Some(_)) = timeout(window, self.connections.recv()).await {
            panic!("unexpected connection");
        }
    }
}

/// TCP listener that accepts sockets but never completes a WebSocket handshake
pub async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    url
}

pub fn market_data(symbol: &str, close: f64, signal: &str) -> Value {
    json!({
        "type": "market_data",
        "timestamp": "2026-01-05T14:30:00",
        "data": {
            "symbol": symbol,
            "timestamp": "2026-01-05T14:30:00",
            "close": close,
            "trading_signal": signal,
            "directional_indicator": 0.42,
            "phi_sigma": 1.3,
        }
    })
}

pub fn signal_history(signals: &[&str]) -> Value {
    let data: Vec<Value> = signals
        .iter()
        .enumerate()
        .map(|(i, signal)| {
            json!({
                "recorded_at": format!("2026-01-05T14:{:02}:00", 59 - i),
                "signal": signal,
                "symbol": "MNQ",
                "price": 21000.25,
            })
        })
        .collect();
    json!({"type": "signal_history", "timestamp": "2026-01-05T15:00:00", "data": data})
}

/// Wait until the published view satisfies `predicate`.
pub async fn wait_for_view<F>(views: &mut watch::Receiver<StreamView>, predicate: F) -> StreamView
where
    F: Fn(&StreamView) -> bool,
{
    timeout(WAIT, async {
        loop {
            {
                let view = views.borrow_and_update();
                if predicate(&view) {
                    return view.clone();
                }
            }
            views.changed().await.expect("stream client alive");
        }
    })
    .await
    .expect("view condition within timeout")
}
