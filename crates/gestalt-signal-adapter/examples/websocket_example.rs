/*
[INPUT]:  Signal engine WebSocket URL (GESTALT_WS_URL)
[OUTPUT]: Printed engine frames for a single connection
[POS]:    Examples - WebSocket stream handling
[UPDATE]: When WebSocket API changes
*/

use gestalt_signal_adapter::*;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

/// Example: one raw transport attempt
///
/// Opens a connection, pings once, prints frames for ten seconds, then
/// closes with the client cleanup code. Reconnection lives in the monitor crate.
#[tokio::main]
async fn main() {
    println!("=== Gestalt WebSocket Example ===\n");

    let url = std::env::var("GESTALT_WS_URL").unwrap_or_else(|_| "ws://localhost:8765".to_string());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = spawn_transport(&url, 1u64, tx);
    println!("✓ Connecting to {}", url);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let Ok(Some((_, event))) = timeout(remaining, rx.recv()).await else {
            break;
        };
        match event {
            TransportEvent::Opened => {
                println!("✓ Connected");
                if let Err(e) = handle.send(&ClientMessage::Ping) {
                    eprintln!("Ping failed: {}", e);
                }
            }
            TransportEvent::Frame(text) => match ServerMessage::parse(&text) {
                Ok(ServerMessage::MarketData { data, .. }) => println!(
                    "  market_data {} close={:?} signal={:?}",
                    data.symbol.as_deref().unwrap_or("?"),
                    data.close,
                    data.trading_signal
                ),
                Ok(ServerMessage::SignalHistory { data, .. }) => {
                    println!("  signal_history ({} entries)", data.len())
                }
                Ok(message) => println!("  {}", message.kind()),
                Err(e) => eprintln!("  malformed frame: {}", e),
            },
            TransportEvent::Closed(info) => {
                println!("Connection closed: {:?} {}", info.code, info.reason);
                return;
            }
            TransportEvent::Failed(error) => {
                eprintln!("✗ Connection failed: {}", error);
                return;
            }
        }
    }

    handle.close(CLIENT_CLEANUP_CODE, CLIENT_CLEANUP_REASON);
    println!("\n✓ WebSocket example complete");
}
