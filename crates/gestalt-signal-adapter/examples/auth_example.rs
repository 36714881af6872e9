/*
[INPUT]:  Wallet private key (GESTALT_WALLET_KEY) and auth API base URL
[OUTPUT]: Verified wallet session persisted to disk
[POS]:    Examples - authentication flow demonstration
[UPDATE]: When auth flow changes
*/

use gestalt_signal_adapter::*;

/// Example: Authentication flow
///
/// 1. Create HTTP client
/// 2. Reuse a persisted session if one is still valid
/// 3. Otherwise sign the server challenge with the wallet
/// 4. Verify and store the session
#[tokio::main]
async fn main() {
    println!("=== Gestalt Authentication Example ===\n");

    let base_url =
        std::env::var("GESTALT_AUTH_URL").unwrap_or_else(|_| "http://localhost:8766".to_string());
    let client = match GestaltClient::with_config_and_base_url(ClientConfig::default(), &base_url) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    println!("✓ HTTP client created for {}", client.auth_base_url());

    let session_path = std::env::temp_dir().join("gestalt-auth-example-session.json");
    let auth_manager = AuthManager::with_session_store(client, SessionStore::with_file(&session_path));

    if let Some(session) = auth_manager.restore_session() {
        println!("✓ Restored session for {} (expires {})", session.address, session.expires_at);
        return;
    }

    let key = match std::env::var("GESTALT_WALLET_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("Set GESTALT_WALLET_KEY to a hex private key to log in");
            return;
        }
    };
    let wallet = match EvmWalletSigner::new(&key) {
        Ok(wallet) => wallet,
        Err(e) => {
            eprintln!("Invalid wallet key: {}", e);
            return;
        }
    };
    println!("✓ Wallet loaded: {}", wallet.address());

    match auth_manager.authenticate(&wallet).await {
        Ok(session) => {
            println!("✓ Authenticated {}", session.address);
            println!("  Session stored at {}", session_path.display());
        }
        Err(GestaltError::NotWhitelisted { address }) => {
            eprintln!("✗ {} is not on the server whitelist", address);
        }
        Err(e) => eprintln!("✗ Authentication failed: {}", e),
    }
}
