/*
[INPUT]:  Auth server URL, wallet credentials, and optional session file
[OUTPUT]: Verified wallet sessions and the stream's authentication gate
[POS]:    Auth layer - challenge / signature login for the signal engine
[UPDATE]: When auth flow or signature methods change
*/

pub mod evm_wallet;
pub mod manager;
pub mod session;
pub mod wallet;

pub use evm_wallet::EvmWalletSigner;
pub use manager::{AuthManager, normalize_address};
pub use session::{AuthGate, DEFAULT_SESSION_TTL_SECONDS, SessionData, SessionStore};
pub use wallet::{MockWalletSigner, WalletSigner};
