/*
[INPUT]:  Public API exports for gestalt-signal-monitor crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod logging;
pub mod stream;

// Re-export main types for convenience
pub use config::MonitorConfig;
pub use stream::{
    ConnectionState, ExternalTrigger, SessionConfig, Status, StreamClient, StreamFault,
    StreamView, TriggerHub,
};
