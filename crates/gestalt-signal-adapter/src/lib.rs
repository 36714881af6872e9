/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Gestalt signal adapter crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{
    AuthGate,
    AuthManager,
    EvmWalletSigner,
    MockWalletSigner,
    SessionData,
    SessionStore,
    WalletSigner,
};

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    GestaltClient,
    GestaltError,
    Result,
};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    CLIENT_CLEANUP_CODE,
    CLIENT_CLEANUP_REASON,
    ClientMessage,
    CloseInfo,
    ServerMessage,
    TransportEvent,
    TransportHandle,
    spawn_transport,
};
