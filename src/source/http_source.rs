use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::traits::{FetchedResource, ResourceSource};

/// Live source fetching assets from the deployment origin over HTTP.
pub struct HttpSource {
    client: Client,
    base: Url,
}

impl HttpSource {
    /// `base_url` is the deployment root all manifest paths are joined to.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base =
            Url::parse(base_url).map_err(|e| anyhow!("invalid base url {}: {}", base_url, e))?;
        // A trailing slash keeps the last path segment when joining.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base,
        })
    }
}

#[async_trait]
impl ResourceSource for HttpSource {
    async fn fetch(&self, path: &str) -> Result<FetchedResource> {
        let url = self
            .base
            .join(path)
            .map_err(|e| anyhow!("invalid resource path {}: {}", path, e))?;

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!("fetch failed path={} status={}", path, status.as_u16());
            return Err(anyhow!("fetch failed: HTTP {}", status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let body = resp.bytes().await?;
        debug!("fetched path={} bytes={}", path, body.len());

        Ok(FetchedResource { content_type, body })
    }
}
