use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{CollectionEnvelope, CreateRequest, ErrorBody, UserEnvelope};
use super::{
    BatchResponse, BookmarkApi, BookmarkPayload, Collection, CollectionId, RaindropError, User,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.raindrop.io/rest/v1";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP implementation of [`BookmarkApi`] authenticated with a bearer token.
pub struct RaindropClient {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
    timeout: Duration,
}

/// The token is never printed.
impl std::fmt::Debug for RaindropClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaindropClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RaindropClient {
    /// Builds a client for `base_url`.
    ///
    /// Plain `http://` is accepted only for localhost, so the token cannot
    /// leak to the network unencrypted.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        token: SecretString,
    ) -> Result<Self, RaindropError> {
        let base_url = base_url.trim_end_matches('/');

        if !base_url.starts_with("https://") {
            let is_localhost = base_url.starts_with("http://127.0.0.1")
                || base_url.starts_with("http://localhost");
            if !is_localhost {
                tracing::error!(base_url = %base_url, "Rejecting non-HTTPS Raindrop base URL");
                return Err(RaindropError::InsecureBaseUrl);
            }
            tracing::warn!(
                base_url = %base_url,
                "Using non-HTTPS Raindrop base URL (localhost only)"
            );
        }

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            token,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, Vec<u8>), RaindropError> {
        let request = request.bearer_auth(self.token.expose_secret());

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| RaindropError::Timeout)?
            .map_err(RaindropError::Network)?;

        let status = response.status();
        let body = tokio::time::timeout(self.timeout, response.bytes())
            .await
            .map_err(|_| RaindropError::Timeout)?
            .map_err(RaindropError::Network)?;

        Ok((status, body.to_vec()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RaindropError> {
        let (status, body) = self.send(self.client.get(self.url(path))).await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        decode(&body)
    }
}

#[async_trait]
impl BookmarkApi for RaindropClient {
    async fn get_user(&self) -> Result<User, RaindropError> {
        let envelope: UserEnvelope = self.get_json("/user").await?;
        Ok(envelope.user)
    }

    async fn get_collection(&self, id: CollectionId) -> Result<Collection, RaindropError> {
        let envelope: CollectionEnvelope = self.get_json(&format!("/collection/{id}")).await?;
        Ok(envelope.item)
    }

    async fn create_raindrops(
        &self,
        items: &[BookmarkPayload],
    ) -> Result<BatchResponse, RaindropError> {
        let body = serde_json::to_vec(&CreateRequest { items })
            .map_err(|e| RaindropError::Decode(e.to_string()))?;

        let request = self
            .client
            .post(self.url("/raindrops"))
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        let (status, body) = self.send(request).await?;

        // Server-side, auth and throttling failures mean nothing was created
        if status.is_server_error()
            || matches!(
                status,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
            )
        {
            return Err(status_error(status, &body));
        }

        // Other statuses carry a result flag the caller reports per batch
        match decode::<BatchResponse>(&body) {
            Ok(response) => Ok(response),
            Err(_) if !status.is_success() => Err(status_error(status, &body)),
            Err(e) => Err(e),
        }
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, RaindropError> {
    serde_json::from_slice(body).map_err(|e| RaindropError::Decode(e.to_string()))
}

fn status_error(status: StatusCode, body: &[u8]) -> RaindropError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error_message);
    RaindropError::HttpStatus {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RaindropClient {
        RaindropClient::new(
            reqwest::Client::new(),
            &server.uri(),
            SecretString::from("test-token".to_string()),
        )
        .unwrap()
    }

    fn payload(link: &str) -> BookmarkPayload {
        BookmarkPayload {
            link: link.into(),
            created: chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            tags: vec!["Blog".into()],
            collection_id: -1,
        }
    }

    #[test]
    fn test_rejects_plain_http_remote() {
        let result = RaindropClient::new(
            reqwest::Client::new(),
            "http://api.raindrop.io/rest/v1",
            SecretString::from("t".to_string()),
        );
        assert!(matches!(result, Err(RaindropError::InsecureBaseUrl)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = RaindropClient::new(
            reqwest::Client::new(),
            DEFAULT_API_BASE_URL,
            SecretString::from("super-secret".to_string()),
        )
        .unwrap();
        let printed = format!("{:?}", client);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_get_user_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": true,
                "user": {"groups": [{"title": "Inbox", "collections": [1, 2]}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user = client_for(&server).get_user().await.unwrap();
        assert_eq!(user.groups[0].title, "Inbox");
        assert_eq!(user.groups[0].collections, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_get_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collection/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": true,
                "item": {"_id": 7, "title": "Reading"}
            })))
            .mount(&server)
            .await;

        let collection = client_for(&server).get_collection(7).await.unwrap();
        assert_eq!(collection.id, 7);
        assert_eq!(collection.title, "Reading");
    }

    #[tokio::test]
    async fn test_get_user_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"result": false, "errorMessage": "Unauthorized"})),
            )
            .mount(&server)
            .await;

        match client_for(&server).get_user().await {
            Err(RaindropError::HttpStatus { status: 401, message }) => {
                assert_eq!(message.as_deref(), Some("Unauthorized"));
            }
            other => panic!("expected 401, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_posts_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/raindrops"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({
                "items": [{
                    "pleaseParse": {},
                    "created": "2024-01-01T00:00:00Z",
                    "tags": ["Blog"],
                    "collection": {"$id": -1},
                    "link": "https://example.com/1"
                }]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": true, "items": [{"_id": 99}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .create_raindrops(&[payload("https://example.com/1")])
            .await
            .unwrap();
        assert!(response.result);
        assert_eq!(response.items.len(), 1);
    }

    #[tokio::test]
    async fn test_create_bad_request_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/raindrops"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"result": false, "errorMessage": "link is invalid"})),
            )
            .mount(&server)
            .await;

        let response = client_for(&server)
            .create_raindrops(&[payload("not a link")])
            .await
            .unwrap();
        assert!(!response.result);
        assert_eq!(response.error_message.as_deref(), Some("link is invalid"));
    }

    #[tokio::test]
    async fn test_create_server_error_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/raindrops"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .create_raindrops(&[payload("https://example.com/1")])
            .await;
        assert!(matches!(
            result,
            Err(RaindropError::HttpStatus { status: 502, .. })
        ));
    }
}
