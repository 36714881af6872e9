/*
[INPUT]:  Mock authentication responses
[OUTPUT]: Test results for auth flow
[POS]:    Integration tests - authentication
[UPDATE]: When auth endpoints or flow changes
*/

mod common;

use common::{TEST_ADDRESS, TEST_KEY, setup_mock_server};
use gestalt_signal_adapter::{
    AuthGate, AuthManager, ClientConfig, EvmWalletSigner, GestaltClient, GestaltError,
    MockWalletSigner, SessionStore, WalletSigner,
};
use tokio_test::assert_ok;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn client_for(uri: &str) -> GestaltClient {
    assert_ok!(GestaltClient::with_config_and_base_url(
        ClientConfig::default(),
        uri
    ))
}

#[tokio::test]
async fn test_auth_manager_creation() {
    let client = assert_ok!(GestaltClient::new());
    let auth_manager = AuthManager::new(client);

    assert!(auth_manager.sessions().is_expired());
    assert!(!auth_manager.sessions().is_authenticated());
}

#[tokio::test]
async fn test_mock_wallet_signer() {
    let wallet = MockWalletSigner::new(TEST_ADDRESS, "0xmock_signature");

    assert_eq!(wallet.address(), TEST_ADDRESS);

    let signature = assert_ok!(wallet.sign_message("test").await);
    assert_eq!(signature, "0xmock_signature");
}

#[tokio::test]
async fn test_full_login_persists_session_for_restart() {
    let server = setup_mock_server().await;
    let wallet = assert_ok!(EvmWalletSigner::new(TEST_KEY));

    Mock::given(method("POST"))
        .and(path("/auth/challenge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "Sign this message to authenticate with Gestalt Signal Engine.\n\nNonce: 01",
            "nonce": "01",
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authenticated": true,
            "address": TEST_ADDRESS,
        })))
        .mount(&server)
        .await;

    let mut session_path = std::env::temp_dir();
    session_path.push(format!("gestalt-auth-test-{}", Uuid::new_v4()));
    session_path.push("session.json");

    let auth_manager = AuthManager::with_session_store(
        client_for(&server.uri()),
        SessionStore::with_file(&session_path),
    );
    let session = assert_ok!(auth_manager.authenticate(&wallet).await);
    assert_eq!(session.address, TEST_ADDRESS);

    // A second process restores without touching the server.
    let restarted = AuthManager::with_session_store(
        client_for("http://127.0.0.1:1"),
        SessionStore::with_file(&session_path),
    );
    let restored = restarted.restore_session().expect("session restored");
    assert_eq!(restored.address, TEST_ADDRESS);
    assert!(*restarted.sessions().watch().borrow());

    assert_ok!(restarted.logout());
    assert!(!session_path.exists());
    let _ = std::fs::remove_dir_all(session_path.parent().unwrap());
}

#[tokio::test]
async fn test_expired_challenge_surfaces_as_auth_error() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/auth/challenge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "m",
            "nonce": "n",
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/verify"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "authenticated": false,
            "error": "Challenge expired. Request a new challenge.",
        })))
        .mount(&server)
        .await;

    let auth_manager = AuthManager::new(client_for(&server.uri()));
    let wallet = MockWalletSigner::new(TEST_ADDRESS, "0xsig");

    match auth_manager.authenticate(&wallet).await {
        Err(GestaltError::Authentication { message }) => {
            assert!(message.contains("Challenge expired"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/auth/challenge"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": "Internal server error",
        })))
        .mount(&server)
        .await;

    let auth_manager = AuthManager::new(client_for(&server.uri()));
    let err = auth_manager.request_challenge(TEST_ADDRESS).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(!err.is_auth_error());
}
