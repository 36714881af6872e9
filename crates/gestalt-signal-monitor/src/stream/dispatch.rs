/*
[INPUT]:  Text frames from the open attempt
[OUTPUT]: Latest market snapshot and bounded signal history
[POS]:    Stream layer - inbound frame classification and routing
[UPDATE]: When the engine adds frame types consumers must see
*/

use std::sync::Arc;

use gestalt_signal_adapter::{MarketSnapshot, ServerMessage, SignalRecord};
use tracing::{debug, info, trace};

use super::state::StreamFault;

/// Server-side history page size
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Routes parsed frames into the snapshot and history consumers read.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    snapshot: Option<Arc<MarketSnapshot>>,
    history: Arc<Vec<SignalRecord>>,
    history_limit: usize,
    pongs: u64,
}

impl Dispatcher {
    pub fn new(history_limit: usize) -> Self {
        Self {
            snapshot: None,
            history: Arc::new(Vec::new()),
            history_limit: history_limit.max(1),
            pongs: 0,
        }
    }

    pub fn snapshot(&self) -> Option<Arc<MarketSnapshot>> {
        self.snapshot.clone()
    }

    pub fn history(&self) -> Arc<Vec<SignalRecord>> {
        self.history.clone()
    }

    pub fn pongs(&self) -> u64 {
        self.pongs
    }

    /// Parse and apply one frame. Returns whether the snapshot or history changed.
    ///
    /// A malformed frame is reported but never affects the connection.
    pub fn handle_frame(&mut self, text: &str) -> Result<bool, StreamFault> {
        let message =
            ServerMessage::parse(text).map_err(|err| StreamFault::Parse(err.to_string()))?;
        Ok(self.apply(message))
    }

    pub fn apply(&mut self, message: ServerMessage) -> bool {
        match message {
            ServerMessage::Connection { message, status, .. } => {
                info!(
                    status = status.as_deref().unwrap_or("unknown"),
                    message = message.as_deref().unwrap_or(""),
                    "engine acknowledged connection"
                );
                false
            }
            ServerMessage::MarketData {
                data,
                signal_history,
                ..
            } => {
                trace!(symbol = data.symbol.as_deref().unwrap_or("?"), "market data");
                self.snapshot = Some(Arc::new(data));
                if let Some(history) = signal_history {
                    self.replace_history(history);
                }
                true
            }
            ServerMessage::SignalHistory { data, .. } => {
                self.replace_history(data);
                true
            }
            ServerMessage::Pong { .. } => {
                self.pongs += 1;
                trace!(pongs = self.pongs, "heartbeat acknowledged");
                false
            }
            ServerMessage::Other => false,
        }
    }

    fn replace_history(&mut self, mut records: Vec<SignalRecord>) {
        if records.len() > self.history_limit {
            debug!(
                received = records.len(),
                limit = self.history_limit,
                "truncating signal history"
            );
            records.truncate(self.history_limit);
        }
        self.history = Arc::new(records);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
