#[cfg(feature = "fs")]
pub mod file;

#[cfg(feature = "reqwest")]
pub mod reqwest;

#[cfg(feature = "fs")]
pub mod hybrid;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport capability used by the importer: perform a request and hand back the
/// response body, or a failure.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn request(
        &self,
        url: &str,
        method: Method,
        body: Option<Vec<u8>>,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError>;

    async fn get(
        &self,
        url: &str,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        self.request(url, Method::Get, None, headers).await
    }

    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        self.request(url, Method::Post, Some(body), headers).await
    }

    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        url: &str,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<T, ResourceError> {
        let bytes = self.get(url, headers).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl<C: ResourceClient + ?Sized> ResourceClient for Arc<C> {
    async fn request(
        &self,
        url: &str,
        method: Method,
        body: Option<Vec<u8>>,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        (**self).request(url, method, body, headers).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected HTTP status code: {0}")]
    Status(u16),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Runs `request` against `client`, failing with [`ResourceError::Timeout`] if a timeout is
/// given and expires first.
pub async fn request_with_timeout<C: ResourceClient + ?Sized>(
    client: &C,
    url: &str,
    method: Method,
    body: Option<Vec<u8>>,
    headers: Option<BTreeMap<String, String>>,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, ResourceError> {
    let request = client.request(url, method, body, headers);
    match timeout {
        Some(limit) => tokio::time::timeout(limit, request)
            .await
            .map_err(|_| ResourceError::Timeout(limit))?,
        None => request.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowClient(Vec<u8>);

    #[async_trait]
    impl ResourceClient for SlowClient {
        async fn request(
            &self,
            _url: &str,
            _method: Method,
            _body: Option<Vec<u8>>,
            _headers: Option<BTreeMap<String, String>>,
        ) -> Result<Vec<u8>, ResourceError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(self.0.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_expires() {
        let client = SlowClient(vec![1]);
        let err = request_with_timeout(&client, "http://x", Method::Get, None, None, Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::Timeout(limit) if limit == Duration::from_secs(1)));

        let bytes = request_with_timeout(&client, "http://x", Method::Get, None, None, None)
            .await
            .unwrap();
        assert_eq!(bytes, vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn get_json_through_shared_client() {
        let client = Arc::new(SlowClient(br#"{"a": [1, 2]}"#.to_vec()));
        let value: serde_json::Value = client.get_json("http://x", None).await.unwrap();
        assert_eq!(value["a"][1], 2);
    }
}
