/*
[INPUT]:  Wallet signer and HTTP client
[OUTPUT]: Verified wallet session gating access to the stream
[POS]:    Auth layer - orchestrates the challenge / sign / verify flow
[UPDATE]: When auth endpoints or flow steps change
*/

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::http::{GestaltClient, GestaltError, Result};
use crate::types::{ChallengeRequest, ChallengeResponse, VerifyRequest, VerifyResponse};

use super::{SessionData, SessionStore, WalletSigner};

const CHALLENGE_ENDPOINT: &str = "/auth/challenge";
const VERIFY_ENDPOINT: &str = "/auth/verify";

/// Manages the complete authentication flow
#[derive(Debug, Clone)]
pub struct AuthManager {
    client: GestaltClient,
    sessions: SessionStore,
}

impl AuthManager {
    /// Create a new auth manager with an in-memory session store.
    pub fn new(client: GestaltClient) -> Self {
        Self::with_session_store(client, SessionStore::new())
    }

    pub fn with_session_store(client: GestaltClient, sessions: SessionStore) -> Self {
        Self { client, sessions }
    }

    /// Get the session store (also the stream's [`super::AuthGate`])
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Reuse a persisted session when one is still valid.
    pub fn restore_session(&self) -> Option<SessionData> {
        self.sessions.restore()
    }

    /// Step 1: Request a one-time challenge for `address`
    ///
    /// POST /auth/challenge
    pub async fn request_challenge(&self, address: &str) -> Result<ChallengeResponse> {
        let address = normalize_address(address)?;
        let body = ChallengeRequest { address };
        self.client.post_json(CHALLENGE_ENDPOINT, &body).await
    }

    /// Step 2: Submit the signed challenge
    ///
    /// POST /auth/verify
    pub async fn verify(&self, address: &str, signature: &str) -> Result<VerifyResponse> {
        let address = normalize_address(address)?;
        if !signature.starts_with("0x") {
            return Err(GestaltError::Config(
                "Signature must be 0x-prefixed hex".to_string(),
            ));
        }

        let body = VerifyRequest {
            address: address.clone(),
            signature: signature.to_string(),
        };

        match self.client.post_json(VERIFY_ENDPOINT, &body).await {
            Ok(response) => Ok(response),
            Err(GestaltError::Api { code, .. }) if code == StatusCode::FORBIDDEN.as_u16() => {
                Err(GestaltError::NotWhitelisted { address })
            }
            Err(GestaltError::Api { code, message })
                if code == StatusCode::BAD_REQUEST.as_u16()
                    || code == StatusCode::UNAUTHORIZED.as_u16() =>
            {
                Err(GestaltError::Authentication { message })
            }
            Err(err) => Err(err),
        }
    }

    /// Complete authentication flow
    ///
    /// 1. Request challenge
    /// 2. Sign challenge message with wallet
    /// 3. Verify signature (and whitelist) on the server
    /// 4. Store the session
    pub async fn authenticate(&self, wallet: &dyn WalletSigner) -> Result<SessionData> {
        let address = wallet.address().to_string();

        let challenge = self.request_challenge(&address).await?;
        let signature = wallet.sign_message(&challenge.message).await?;
        let verified = self.verify(&address, &signature).await?;

        if !verified.authenticated {
            let message = verified
                .error
                .unwrap_or_else(|| "server did not authenticate address".to_string());
            warn!(%address, %message, "wallet verification rejected");
            return Err(GestaltError::Authentication { message });
        }

        let verified_address = verified.address.unwrap_or_else(|| address.clone());
        if !verified_address.eq_ignore_ascii_case(&address) {
            return Err(GestaltError::InvalidResponse(format!(
                "verified address {verified_address} does not match wallet {address}"
            )));
        }

        let session = self.sessions.set_authenticated(verified_address.to_ascii_lowercase())?;
        info!(address = %session.address, expires_at = %session.expires_at, "wallet authenticated");
        Ok(session)
    }

    /// Forget the current session
    pub fn logout(&self) -> Result<()> {
        self.sessions.clear()
    }
}

/// Validate and lowercase an EVM address (`0x` + 40 hex chars), as the server does.
pub fn normalize_address(address: &str) -> Result<String> {
    let address = address.trim().to_ascii_lowercase();
    let valid = address
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()));

    if valid {
        Ok(address)
    } else {
        Err(GestaltError::Config(format!(
            "Invalid address format: {address}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::auth::{AuthGate, EvmWalletSigner, MockWalletSigner};
    use crate::http::ClientConfig;
    use rstest::rstest;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const CHALLENGE: &str = "Sign this message to authenticate with Gestalt Signal Engine.\n\nNonce: abc123";

    fn manager_for(server: &MockServer) -> AuthManager {
        let client =
            GestaltClient::with_config_and_base_url(ClientConfig::default(), &server.uri()).unwrap();
        AuthManager::new(client)
    }

    async fn mount_challenge(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/challenge"))
            .and(body_json(serde_json::json!({"address": TEST_ADDRESS})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": CHALLENGE,
                "nonce": "abc123",
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[rstest]
    #[case("0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266", true)]
    #[case("  0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266 ", true)]
    #[case("f39fd6e51aad88f6f4ce6ab8827279cfffb92266", false)]
    #[case("0x1234", false)]
    #[case("0xz39fd6e51aad88f6f4ce6ab8827279cfffb92266", false)]
    fn test_normalize_address(#[case] input: &str, #[case] valid: bool) {
        let result = normalize_address(input);
        assert_eq!(result.is_ok(), valid);
        if let Ok(address) = result {
            assert_eq!(address, TEST_ADDRESS);
        }
    }

    #[tokio::test]
    async fn test_authenticate_happy_path_with_evm_wallet() {
        let server = MockServer::start().await;
        let auth_manager = manager_for(&server);
        let wallet = EvmWalletSigner::new(TEST_KEY).unwrap();
        let expected_signature = wallet.sign_message(CHALLENGE).await.unwrap();

        mount_challenge(&server).await;
        Mock::given(method("POST"))
            .and(path("/auth/verify"))
            .and(body_json(serde_json::json!({
                "address": TEST_ADDRESS,
                "signature": expected_signature,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "authenticated": true,
                "address": TEST_ADDRESS,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gate = auth_manager.sessions().watch();
        let session = auth_manager.authenticate(&wallet).await.unwrap();

        assert_eq!(session.address, TEST_ADDRESS);
        assert!(*gate.borrow());
        assert_eq!(auth_manager.sessions().address().as_deref(), Some(TEST_ADDRESS));
    }

    #[tokio::test]
    async fn test_authenticate_not_whitelisted() {
        let server = MockServer::start().await;
        let auth_manager = manager_for(&server);
        let wallet = MockWalletSigner::new(TEST_ADDRESS, "0xdeadbeef");

        mount_challenge(&server).await;
        Mock::given(method("POST"))
            .and(path("/auth/verify"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "authenticated": false,
                "error": "Address not whitelisted",
            })))
            .mount(&server)
            .await;

        let err = auth_manager.authenticate(&wallet).await.unwrap_err();
        match err {
            GestaltError::NotWhitelisted { address } => assert_eq!(address, TEST_ADDRESS),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(auth_manager.sessions().is_expired());
    }

    #[tokio::test]
    async fn test_authenticate_invalid_signature() {
        let server = MockServer::start().await;
        let auth_manager = manager_for(&server);
        let wallet = MockWalletSigner::new(TEST_ADDRESS, "0xdeadbeef");

        mount_challenge(&server).await;
        Mock::given(method("POST"))
            .and(path("/auth/verify"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "authenticated": false,
                "error": "Invalid signature",
            })))
            .mount(&server)
            .await;

        let err = auth_manager.authenticate(&wallet).await.unwrap_err();
        assert!(err.is_auth_error());
        assert!(err.to_string().contains("Invalid signature"));
    }

    #[tokio::test]
    async fn test_invalid_address_never_hits_server() {
        let server = MockServer::start().await;
        let auth_manager = manager_for(&server);

        let err = auth_manager.request_challenge("0x1234").await.unwrap_err();
        assert!(matches!(err, GestaltError::Config(_)));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_logout_closes_gate() {
        let server = MockServer::start().await;
        let auth_manager = manager_for(&server);
        auth_manager
            .sessions()
            .set_authenticated(TEST_ADDRESS.to_string())
            .unwrap();
        let gate = auth_manager.sessions().watch();
        assert!(*gate.borrow());

        auth_manager.logout().unwrap();
        assert!(!*gate.borrow());
    }
}
