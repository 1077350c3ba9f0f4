use super::{Method, ResourceClient, ResourceError};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Serves `file://` urls from the local filesystem, e.g. a mirrored collection root.
#[derive(Clone, Debug, Default)]
pub struct FileClient;

#[async_trait]
impl ResourceClient for FileClient {
    async fn request(
        &self,
        url: &str,
        method: Method,
        _body: Option<Vec<u8>>,
        _headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        if method != Method::Get {
            return Err(ResourceError::Unsupported(format!(
                "{method} is not supported for file:// urls"
            )));
        }
        if let Some(path) = url.strip_prefix("file://") {
            let bytes = tokio::fs::read(path).await?;
            Ok(bytes)
        } else {
            Err(ResourceError::Unsupported(
                "This client supports only file:// urls.".to_string(),
            ))
        }
    }
}
