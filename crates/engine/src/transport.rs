//! HTTP transport: connection pooling, the client auth header, and a thin
//! retry wrapper over transport-level failures.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use sha2::{Digest, Sha256};
use workbridge_core::{ClientConfig, WorkbridgeError};

const MAX_TRANSPORT_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

fn auth_header_value(client_id: &str, auth_token: &str) -> String {
    let digest = Sha256::digest(auth_token.as_bytes());
    let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
    format!("Bearer client.sdk.{client_id}.{hex}")
}

fn is_transport_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request()
}

/// A decoded HTTP response: status plus raw body bytes, so callers can
/// decide how to classify non-2xx statuses per their own policy.
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: bytes::Bytes,
}

impl TransportResponse {
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, WorkbridgeError> {
        serde_json::from_slice(&self.body).map_err(WorkbridgeError::Serialization)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// A shared HTTP client configured once per supervisor instance.
#[derive(Clone, Debug)]
pub struct Transport {
    client: reqwest::Client,
    base: String,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self, WorkbridgeError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            auth_header_value(&config.client_id, &config.auth_token)
                .parse()
                .expect("auth header value is always valid ASCII"),
        );
        headers.insert(reqwest::header::CONTENT_TYPE, "application/json".parse().unwrap());

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.connection_timeout())
            .build()?;

        Ok(Self { client, base: config.endpoint_base() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Sends a request, retrying up to [`MAX_TRANSPORT_ATTEMPTS`] times on
    /// transport-level failures (connect/timeout/build errors) with a fixed
    /// delay. HTTP error statuses are returned to the caller, not retried
    /// here — each component classifies those per its own policy.
    async fn send_with_retry(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<TransportResponse, WorkbridgeError> {
        let url = self.url(path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self.client.request(method.clone(), &url).query(query);
            if let Some(body) = body {
                request = request.json(body);
            }
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.bytes().await?;
                    return Ok(TransportResponse { status, body });
                }
                Err(err) if attempt < MAX_TRANSPORT_ATTEMPTS && is_transport_error(&err) => {
                    tracing::warn!(attempt, error = %err, url = %url, "transport error, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(err) => return Err(WorkbridgeError::Transport(err)),
            }
        }
    }

    pub async fn put_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, WorkbridgeError> {
        self.send_with_retry(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<TransportResponse, WorkbridgeError> {
        self.send_with_retry(Method::POST, path, query, Some(body)).await
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<TransportResponse, WorkbridgeError> {
        self.send_with_retry(Method::GET, path, query, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_header_has_expected_shape() {
        let header = auth_header_value("client-1", "secret-token");
        assert!(header.starts_with("Bearer client.sdk.client-1."));
        let hex_part = header.rsplit('.').next().unwrap();
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn auth_header_is_deterministic() {
        assert_eq!(
            auth_header_value("a", "b"),
            auth_header_value("a", "b"),
        );
        assert_ne!(auth_header_value("a", "b"), auth_header_value("a", "c"));
    }
}
