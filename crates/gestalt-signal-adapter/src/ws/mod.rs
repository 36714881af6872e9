/*
[INPUT]:  WebSocket URL and per-attempt event channels
[OUTPUT]: Parsed engine frames and ordered transport events
[POS]:    WebSocket layer - real-time data streams
[UPDATE]: When adding new frame types or changing connection logic
*/

pub mod client;
pub mod message;

pub use client::{TransportEvent, TransportHandle, spawn_transport};
pub use message::{
    CLIENT_CLEANUP_CODE, CLIENT_CLEANUP_REASON, ClientMessage, CloseInfo, ServerMessage,
};
