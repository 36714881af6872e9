/*
[INPUT]:  Stream URL, auth gate, trigger sources, and stream tuning
[OUTPUT]: StreamClient handle publishing StreamView updates
[POS]:    Stream layer - resilient live signal stream
[UPDATE]: When adding stream components or changing the public surface
*/

pub mod dispatch;
pub mod policy;
pub mod runtime;
pub mod session;
pub mod state;
pub mod triggers;

pub use dispatch::{DEFAULT_HISTORY_LIMIT, Dispatcher};
pub use policy::{BackoffConfig, ReconnectPolicy, ReconnectSchedule};
pub use runtime::StreamClient;
pub use session::{CloseMode, Effect, Input, Session, SessionConfig, Timer, TimerSlot};
pub use state::{AttemptId, CloseKind, ConnectionState, Status, StreamFault, StreamView};
pub use triggers::{ConnectivityProbe, ExternalTrigger, SuspendDetector, TriggerHub, TriggerSource};
