/*
[INPUT]:  Raw WebSocket text frames from the signal engine
[OUTPUT]: Parsed ServerMessage values and serialized ClientMessage frames
[POS]:    WebSocket layer - message parsing and validation
[UPDATE]: When adding new message types or changing format
*/

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{MarketSnapshot, SignalRecord};

/// Close code sent when the client tears a connection down on purpose
pub const CLIENT_CLEANUP_CODE: u16 = 1000;
/// Close reason paired with [`CLIENT_CLEANUP_CODE`]; any other pair counts as a lost connection
pub const CLIENT_CLEANUP_REASON: &str = "Client cleanup";

const OTHER_LOG_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static OTHER_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Frames pushed by the engine
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connection")]
    Connection {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        timestamp: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "market_data")]
    MarketData {
        #[serde(default)]
        timestamp: Option<String>,
        data: MarketSnapshot,
        #[serde(default)]
        signal_history: Option<Vec<SignalRecord>>,
    },
    #[serde(rename = "signal_history")]
    SignalHistory {
        #[serde(default)]
        timestamp: Option<String>,
        data: Vec<SignalRecord>,
    },
    #[serde(rename = "pong")]
    Pong {
        #[serde(default)]
        timestamp: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl ServerMessage {
    /// Parse one text frame.
    ///
    /// Unknown `type` values parse to [`ServerMessage::Other`]; malformed JSON or a
    /// known type with a malformed body is an error the caller should drop.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(parsed) => {
                if matches!(parsed, ServerMessage::Other) {
                    log_other_message_once(text);
                }
                Ok(parsed)
            }
            Err(err) => {
                log_parse_fail_once(&err, text);
                Err(err)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connection { .. } => "connection",
            ServerMessage::MarketData { .. } => "market_data",
            ServerMessage::SignalHistory { .. } => "signal_history",
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::Other => "other",
        }
    }
}

/// Frames sent by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping,
}

impl ClientMessage {
    pub fn to_json(&self) -> String {
        match self {
            ClientMessage::Ping => r#"{"type":"ping"}"#.to_string(),
        }
    }
}

/// Close code and reason observed when a connection ends
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseInfo {
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// The close was requested by this client (code 1000 + "Client cleanup").
    pub fn is_client_cleanup(&self) -> bool {
        self.code == Some(CLIENT_CLEANUP_CODE) && self.reason == CLIENT_CLEANUP_REASON
    }
}

fn log_other_message_once(raw: &str) {
    let count = OTHER_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < OTHER_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = OTHER_LOG_LIMIT,
            bytes = raw.len(),
            "ws message type unrecognized"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = OTHER_LOG_LIMIT,
            message = %preview,
            "ws message type unrecognized"
        );
    }
}

fn log_parse_fail_once(err: &serde_json::Error, raw: &str) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws message parse failed"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            message = %preview,
            "ws message parse failed"
        );
    } else {
        debug!(error = %err, bytes = raw.len(), "ws message parse failed");
    }
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
