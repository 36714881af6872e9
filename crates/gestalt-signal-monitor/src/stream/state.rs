/*
[INPUT]:  Session transitions and dispatcher contents
[OUTPUT]: Connection state, status text, fault taxonomy, and the published view
[POS]:    Stream layer - shared state vocabulary
[UPDATE]: When adding states, status kinds, or view fields
*/

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gestalt_signal_adapter::{MarketSnapshot, SignalRecord};
use thiserror::Error;

/// Identity of one connection attempt. Strictly increasing within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Requested by this client; never retried.
    Intentional,
    /// Anything else; schedules a reconnect.
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed(CloseKind),
}

impl ConnectionState {
    pub fn is_in_flight(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

/// Human-readable condition, derived from session transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    AwaitingAuth,
    Connecting,
    Connected,
    Reconnecting { delay: Duration },
    Offline,
    Disconnected,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "Idle"),
            Status::AwaitingAuth => write!(f, "Waiting for wallet authentication"),
            Status::Connecting => write!(f, "Connecting..."),
            Status::Connected => write!(f, "Connected"),
            Status::Reconnecting { delay } => {
                write!(f, "Reconnecting in {}s...", delay.as_millis().div_ceil(1000))
            }
            Status::Offline => write!(f, "Offline - waiting for network"),
            Status::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Why an attempt ended or a frame was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamFault {
    #[error("no connection within {}ms", .after.as_millis())]
    Timeout { after: Duration },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("connection lost (code {}, reason {reason:?})", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Lost { code: Option<u16>, reason: String },
    #[error("malformed frame: {0}")]
    Parse(String),
}

/// What presentation renders after each state change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamView {
    pub connected: bool,
    pub state: ConnectionState,
    pub status: Status,
    pub error: Option<StreamFault>,
    pub snapshot: Option<Arc<MarketSnapshot>>,
    pub history: Arc<Vec<SignalRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnecting_status_rounds_up_to_whole_seconds() {
        let status = Status::Reconnecting {
            delay: Duration::from_millis(2_300),
        };
        assert_eq!(status.to_string(), "Reconnecting in 3s...");
    }

    #[test]
    fn in_flight_states() {
        assert!(ConnectionState::Connecting.is_in_flight());
        assert!(ConnectionState::Open.is_in_flight());
        assert!(!ConnectionState::Idle.is_in_flight());
        assert!(!ConnectionState::Closed(CloseKind::Lost).is_in_flight());
    }

    #[test]
    fn fault_messages() {
        let fault = StreamFault::Lost {
            code: None,
            reason: String::new(),
        };
        assert_eq!(fault.to_string(), "connection lost (code none, reason \"\")");
        let timeout = StreamFault::Timeout {
            after: Duration::from_secs(10),
        };
        assert_eq!(timeout.to_string(), "no connection within 10000ms");
    }
}
