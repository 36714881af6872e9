/*
[INPUT]:  HTTP configuration (auth base URL, timeouts)
[OUTPUT]: Configured reqwest client ready for auth API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::error::{GestaltError, Result};
use crate::types::ApiErrorBody;

/// Default auth server, matching the signal engine's local deployment
const AUTH_BASE_URL: &str = "http://localhost:8766";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the signal engine's auth API
#[derive(Debug, Clone)]
pub struct GestaltClient {
    http_client: Client,
    auth_base_url: Url,
}

impl GestaltClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_url(config, AUTH_BASE_URL)
    }

    /// Create a client pointed at an explicit auth server
    pub fn with_config_and_base_url(config: ClientConfig, auth_base_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            auth_base_url: Url::parse(auth_base_url)?,
        })
    }

    pub fn auth_base_url(&self) -> &Url {
        &self.auth_base_url
    }

    /// Build request builder for auth endpoints
    pub(crate) fn auth_request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.auth_base_url.join(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// POST a JSON body and decode the JSON reply.
    ///
    /// Non-2xx replies carrying `{"error": "..."}` become [`GestaltError::Api`].
    pub(crate) async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.auth_request(Method::POST, endpoint)?.json(body);
        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&bytes)
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());
            debug!(endpoint, status = status.as_u16(), %message, "auth api rejected request");
            return Err(GestaltError::api_error(status, message));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, serde::Deserialize)]
    struct Health {
        status: String,
    }

    #[tokio::test]
    async fn test_post_json_decodes_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/health"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})),
            )
            .mount(&server)
            .await;

        let client =
            GestaltClient::with_config_and_base_url(ClientConfig::default(), &server.uri()).unwrap();
        let health: Health = client
            .post_json("/auth/health", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(health.status, "ok");
    }

    #[tokio::test]
    async fn test_post_json_maps_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/challenge"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "Invalid address format"})),
            )
            .mount(&server)
            .await;

        let client =
            GestaltClient::with_config_and_base_url(ClientConfig::default(), &server.uri()).unwrap();
        let err = client
            .post_json::<_, Health>("/auth/challenge", &serde_json::json!({"address": "nope"}))
            .await
            .unwrap_err();

        match err {
            GestaltError::Api { code, message } => {
                assert_eq!(code, 400);
                assert_eq!(message, "Invalid address format");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
