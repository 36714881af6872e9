/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for gestalt-signal-adapter tests

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use wiremock::MockServer;

pub const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// What a scripted WebSocket peer observed from the client
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Text(String),
    Close(Option<(u16, String)>),
}

/// Start a one-connection WebSocket server that sends `script` after the
/// handshake, then reports every client frame on the returned channel.
pub async fn scripted_ws_server(script: Vec<Message>) -> (String, mpsc::UnboundedReceiver<Observed>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        for message in script {
            if ws.send(message).await.is_err() {
                return;
            }
        }
        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Text(text) => {
                    let _ = tx.send(Observed::Text(text.to_string()));
                }
                Message::Close(frame) => {
                    let _ = tx.send(Observed::Close(
                        frame.map(|f| (u16::from(f.code), f.reason.to_string())),
                    ));
                    break;
                }
                _ => {}
            }
        }
    });

    (url, rx)
}
