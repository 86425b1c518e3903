//! Gateway admin API client implementation.
//!
//! This module provides the HTTP client for the Kong-compatible admin API
//! (`/upstreams`, `/upstreams/{upstream}/targets`, `/services`, `/routes`).

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::AdminSettings;
use crate::error::{AdminError, ConfigError, GatesyncError, Result};

use super::api::AdminApi;
use super::types::{split_target_key, Resource, ResourceKind, Route, Service, Target, Upstream};

/// Header carrying the admin token for the gateway's RBAC plugin.
const ADMIN_TOKEN_HEADER: &str = "Kong-Admin-Token";

/// Maximum number of body characters quoted in an invalid-response error.
const SNIPPET_LEN: usize = 256;

/// Gateway admin API client.
#[derive(Debug, Clone)]
pub struct AdminClient {
    /// HTTP client.
    client: Client,
    /// Base URL, including the workspace prefix when one is set.
    base: Url,
    /// Base URL as configured, for display.
    base_url: String,
    /// Admin token.
    token: Option<String>,
}

/// One page of a list endpoint.
#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    offset: Option<String>,
}

impl AdminClient {
    /// Creates a new admin API client from resolved settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the admin URL is not a valid base URL or the HTTP
    /// client cannot be created.
    pub fn new(settings: &AdminSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(settings.tls_skip_verify)
            .build()
            .map_err(|e| AdminError::network(format!("Failed to create HTTP client: {e}")))?;

        let mut base_url = settings.admin_url.trim_end_matches('/').to_string();
        let mut base = Url::parse(&base_url)
            .map_err(|e| ConfigError::validation(format!("invalid admin URL '{base_url}': {e}"), "admin_url"))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::validation(
                format!("admin URL '{base_url}' cannot carry a path"),
                "admin_url",
            )
            .into());
        }

        if let Some(workspace) = settings.workspace.as_deref().filter(|w| !w.is_empty()) {
            base_url.push('/');
            base_url.push_str(workspace);
            if let Ok(mut segments) = base.path_segments_mut() {
                segments.pop_if_empty().push(workspace);
            }
        }

        debug!("Admin API client targeting {base_url}");

        Ok(Self {
            client,
            base,
            base_url,
            token: settings.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds an endpoint URL; every segment is percent-encoded on its own.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Builds a request with authentication headers.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        trace!("{method} {url}");

        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder
                .header(ADMIN_TOKEN_HEADER, token)
                .header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
    }

    /// Sends a request, mapping transport failures.
    async fn send(builder: RequestBuilder) -> Result<Response> {
        builder.send().await.map_err(transport_error)
    }

    /// Fetches a single object, treating 404 as absent.
    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = Self::send(self.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    /// Sends a JSON body and decodes the returned object.
    async fn write<T: Serialize + DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &T,
    ) -> Result<T> {
        let builder = self
            .request(method, url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);
        decode(Self::send(builder).await?).await
    }

    /// Fetches one page of a list endpoint; a missing collection is an empty page.
    async fn page<T: DeserializeOwned>(&self, segments: &[&str], offset: Option<&str>) -> Result<Page<T>> {
        let mut url = self.endpoint(segments);
        if let Some(offset) = offset {
            url.query_pairs_mut().append_pair("offset", offset);
        }
        Ok(self.fetch::<Page<T>>(url).await?.unwrap_or(Page {
            data: Vec::new(),
            offset: None,
        }))
    }

    /// Collects every element of a list endpoint.
    async fn list_all<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page = self.page::<T>(segments, offset.as_deref()).await?;
            items.extend(page.data);

            match page.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => return Ok(items),
            }
        }
    }

    /// Lists the targets of one upstream.
    async fn upstream_targets(&self, upstream: &str) -> Result<Vec<Target>> {
        let mut targets = self
            .list_all::<Target>(&["upstreams", upstream, "targets"])
            .await?;
        for target in &mut targets {
            target.upstream = upstream.to_string();
        }
        Ok(targets)
    }

    /// Finds a target by address under an upstream, following list pagination.
    async fn find_target(&self, upstream: &str, address: &str) -> Result<Option<Target>> {
        let mut offset: Option<String> = None;

        loop {
            let page = self
                .page::<Target>(&["upstreams", upstream, "targets"], offset.as_deref())
                .await?;

            if let Some(mut found) = page.data.into_iter().find(|t| t.target == address) {
                found.upstream = upstream.to_string();
                return Ok(Some(found));
            }

            match page.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl AdminApi for AdminClient {
    async fn get_by_name(&self, kind: ResourceKind, name: &str) -> Result<Option<Resource>> {
        debug!("Looking up {kind} '{name}'");

        let found = match kind {
            ResourceKind::Upstream => self
                .fetch::<Upstream>(self.endpoint(&["upstreams", name]))
                .await?
                .map(Resource::Upstream),
            ResourceKind::Service => self
                .fetch::<Service>(self.endpoint(&["services", name]))
                .await?
                .map(Resource::Service),
            ResourceKind::Route => self
                .fetch::<Route>(self.endpoint(&["routes", name]))
                .await?
                .map(Resource::Route),
            ResourceKind::Target => {
                let (upstream, address) = target_parts(name)?;
                self.find_target(upstream, address)
                    .await?
                    .map(Resource::Target)
            }
        };

        Ok(found)
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<Resource>> {
        debug!("Listing {kind}s");

        let listed = match kind {
            ResourceKind::Upstream => self
                .list_all::<Upstream>(&["upstreams"])
                .await?
                .into_iter()
                .map(Resource::Upstream)
                .collect(),
            ResourceKind::Service => self
                .list_all::<Service>(&["services"])
                .await?
                .into_iter()
                .map(Resource::Service)
                .collect(),
            ResourceKind::Route => self
                .list_all::<Route>(&["routes"])
                .await?
                .into_iter()
                .map(Resource::Route)
                .collect(),
            ResourceKind::Target => {
                let mut targets = Vec::new();
                for upstream in self.list_all::<Upstream>(&["upstreams"]).await? {
                    let listed = self.upstream_targets(&upstream.name).await?;
                    targets.extend(listed.into_iter().map(Resource::Target));
                }
                targets
            }
        };

        Ok(listed)
    }

    async fn create(&self, payload: &Resource) -> Result<Resource> {
        debug!("Creating {} '{}'", payload.kind(), payload.name());

        let created = match payload {
            Resource::Upstream(u) => {
                Resource::Upstream(self.write(Method::POST, self.endpoint(&["upstreams"]), u).await?)
            }
            Resource::Service(s) => {
                Resource::Service(self.write(Method::POST, self.endpoint(&["services"]), s).await?)
            }
            Resource::Route(r) => {
                Resource::Route(self.write(Method::POST, self.endpoint(&["routes"]), r).await?)
            }
            Resource::Target(t) => {
                let url = self.endpoint(&["upstreams", &t.upstream, "targets"]);
                let mut target = self.write(Method::POST, url, t).await?;
                target.upstream.clone_from(&t.upstream);
                Resource::Target(target)
            }
        };

        Ok(created)
    }

    async fn patch(&self, name: &str, payload: &Resource) -> Result<Resource> {
        debug!("Updating {} '{name}'", payload.kind());

        let updated = match payload {
            Resource::Upstream(u) => Resource::Upstream(
                self.write(Method::PATCH, self.endpoint(&["upstreams", name]), u)
                    .await?,
            ),
            Resource::Service(s) => Resource::Service(
                self.write(Method::PATCH, self.endpoint(&["services", name]), s)
                    .await?,
            ),
            Resource::Route(r) => Resource::Route(
                self.write(Method::PATCH, self.endpoint(&["routes", name]), r)
                    .await?,
            ),
            Resource::Target(t) => {
                let (upstream, address) = target_parts(name)?;
                let url = self.endpoint(&["upstreams", upstream, "targets", address]);
                let mut target = self.write(Method::PATCH, url, t).await?;
                target.upstream = upstream.to_string();
                Resource::Target(target)
            }
        };

        Ok(updated)
    }
}

/// Splits a target name, rejecting malformed ones.
fn target_parts(name: &str) -> Result<(&str, &str)> {
    split_target_key(name)
        .ok_or_else(|| GatesyncError::internal(format!("malformed target name '{name}'")))
}

/// Maps a transport failure to an admin error.
fn transport_error(e: reqwest::Error) -> GatesyncError {
    if e.is_timeout() {
        AdminError::Timeout {
            message: e.to_string(),
        }
        .into()
    } else {
        AdminError::network(format!("Request failed: {e}")).into()
    }
}

/// Decodes a response body, mapping error statuses and non-JSON bodies.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response.text().await.map_err(transport_error)?;
    let body = body.trim();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AdminError::AuthenticationFailed {
            message: format!("HTTP {}: {}", status.as_u16(), snippet(body)),
        }
        .into());
    }

    if !status.is_success() {
        return Err(AdminError::api_error(status.as_u16(), body).into());
    }

    let declared_other = !content_type.is_empty() && !content_type.to_lowercase().contains("json");
    if declared_other || body.starts_with('<') {
        return Err(AdminError::invalid_response(format!(
            "response is not JSON (Content-Type={content_type}); check that the admin URL points at the admin API. Body: {}",
            snippet(body)
        ))
        .into());
    }

    serde_json::from_str(body).map_err(|e| {
        GatesyncError::from(AdminError::invalid_response(format!(
            "failed to decode JSON: {e}. Body: {}",
            snippet(body)
        )))
    })
}

/// Truncates a body for inclusion in an error message.
fn snippet(body: &str) -> String {
    if body.chars().count() <= SNIPPET_LEN {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(SNIPPET_LEN).collect();
    cut.push_str("...");
    cut
}
