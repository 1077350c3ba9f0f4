use super::{Method, ResourceClient, ResourceError};
use crate::resource::file::FileClient;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Routes `file://` urls to a [`FileClient`] and everything else to `inner`.
pub struct HybridClient<T: ResourceClient> {
    file_client: FileClient,
    inner: T,
}

impl<T: ResourceClient> HybridClient<T> {
    pub fn new(inner: T) -> Self {
        Self {
            file_client: FileClient,
            inner,
        }
    }
}

#[async_trait]
impl<T: ResourceClient + Send + Sync> ResourceClient for HybridClient<T> {
    async fn request(
        &self,
        url: &str,
        method: Method,
        body: Option<Vec<u8>>,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        if url.starts_with("file://") {
            self.file_client.request(url, method, body, headers).await
        } else {
            self.inner.request(url, method, body, headers).await
        }
    }
}
