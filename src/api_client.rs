use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    provider::{Provider, ProviderError},
    types::{Instance, InstanceSelector, Page, Snapshot, Volume, PROJECT_TAG},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The credentials and endpoint of one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub host: String,
    pub token: String,
    pub region: Option<String>,
}

/// A provider backed by the compute API over HTTP.
pub struct ApiClient {
    client: reqwest::Client,
    base: url::Url,
    credentials: ApiCredentials,
}

#[derive(Serialize)]
struct SnapshotCreate<'a> {
    description: &'a str,
    client_token: &'a str,
}

/// Returns the base URL for a host. Hosts without a scheme get https, unless
/// they point at localhost.
pub fn base_url(host: &str) -> Result<url::Url> {
    let host = host.trim_end_matches('/');
    if host.is_empty() {
        return Err(anyhow!("no host configured"));
    }

    let baseurl = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
        format!("http://{}", host)
    } else {
        format!("https://{}", host)
    };

    Ok(url::Url::parse(&baseurl)?)
}

/// Maps a non-success HTTP status onto the provider error taxonomy.
pub fn error_for_status(status: StatusCode, body: &str) -> ProviderError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{} {}", status, body.trim())
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::Throttled(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(detail),
        StatusCode::NOT_FOUND => ProviderError::NotFound(detail),
        s if s.is_server_error() => ProviderError::Unavailable(detail),
        _ => ProviderError::Rejected(detail),
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_decode() {
        ProviderError::Decode(err.to_string())
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

impl ApiClient {
    pub fn new(credentials: ApiCredentials) -> Result<Self> {
        if credentials.token.is_empty() {
            return Err(anyhow!(
                "no token configured for {}, set one with `shotty config set token <TOKEN>`",
                credentials.host
            ));
        }

        let base = base_url(&credentials.host)?;
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(ApiClient {
            client,
            base,
            credentials,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<url::Url, ProviderError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Rejected(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    /// The listing URL for one page of instances. Carries a query string only
    /// when there is a filter or a page token to send.
    fn instances_url(&self, selector: &InstanceSelector, page_token: Option<&str>) -> Result<url::Url, ProviderError> {
        let mut url = self.url(&["instances"])?;

        let mut pairs: Vec<(String, &str)> = Vec::new();
        match selector {
            InstanceSelector::All => {}
            InstanceSelector::Project(project) => pairs.push((format!("tag:{}", PROJECT_TAG), project.as_str())),
            InstanceSelector::Id(id) => pairs.push(("instance_id".to_string(), id.as_str())),
        }
        if let Some(token) = page_token {
            pairs.push(("page_token".to_string(), token));
        }

        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: url::Url) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, url).bearer_auth(&self.credentials.token);
        if let Some(region) = &self.credentials.region {
            req = req.header("X-Region", region);
        }
        req
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, ProviderError> {
        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        resp.json::<T>().await.map_err(transport_error)
    }

    async fn send_empty(&self, req: reqwest::RequestBuilder) -> Result<(), ProviderError> {
        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        Ok(())
    }

    /// Fetches every page of a listing endpoint.
    async fn get_all<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>, ProviderError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(segments)?;
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("page_token", token);
            }

            let page: Page<T> = self.send(self.request(reqwest::Method::GET, url)).await?;
            items.extend(page.items);

            match page.next_page {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(items),
            }
        }
    }
}

#[async_trait::async_trait]
impl Provider for ApiClient {
    async fn list_instances(
        &self,
        selector: &InstanceSelector,
        page_token: Option<String>,
    ) -> Result<Page<Instance>, ProviderError> {
        let url = self.instances_url(selector, page_token.as_deref())?;
        self.send(self.request(reqwest::Method::GET, url)).await
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Instance, ProviderError> {
        let url = self.url(&["instances", instance_id])?;
        self.send(self.request(reqwest::Method::GET, url)).await
    }

    async fn list_volumes(&self, instance_id: &str) -> Result<Vec<Volume>, ProviderError> {
        self.get_all(&["instances", instance_id, "volumes"]).await
    }

    async fn list_snapshots(&self, volume_id: &str) -> Result<Vec<Snapshot>, ProviderError> {
        self.get_all(&["volumes", volume_id, "snapshots"]).await
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<(), ProviderError> {
        let url = self.url(&["instances", instance_id, "stop"])?;
        self.send_empty(self.request(reqwest::Method::POST, url)).await
    }

    async fn start_instance(&self, instance_id: &str) -> Result<(), ProviderError> {
        let url = self.url(&["instances", instance_id, "start"])?;
        self.send_empty(self.request(reqwest::Method::POST, url)).await
    }

    async fn create_snapshot(
        &self,
        volume_id: &str,
        description: &str,
        client_token: &str,
    ) -> Result<Snapshot, ProviderError> {
        let url = self.url(&["volumes", volume_id, "snapshots"])?;
        let body = SnapshotCreate {
            description,
            client_token,
        };

        self.send(self.request(reqwest::Method::POST, url).json(&body)).await
    }
}
