use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// A fetched copy of a deployed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub content_type: String,
    pub body: Bytes,
}

#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Fetch one resource by its manifest-relative path.
    async fn fetch(&self, path: &str) -> Result<FetchedResource>;
}
