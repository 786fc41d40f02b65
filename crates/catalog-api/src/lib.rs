//! Typed Rust client for the image and network catalogs consulted while
//! launching a server.
//!
//! Only the read side is covered: available images for a project and the
//! networks a project can attach to.

mod types;

pub use types::*;

use std::collections::HashSet;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("catalog api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("catalog api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the image and network REST APIs, bound to one user token.
#[derive(Clone)]
pub struct CatalogClient {
    image_url: String,
    network_url: String,
    token: String,
    http: reqwest::Client,
}

impl CatalogClient {
    pub fn new(
        http: reqwest::Client,
        image_url: impl Into<String>,
        network_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            image_url: image_url.into().trim_end_matches('/').to_string(),
            network_url: network_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        }
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                endpoint,
                status,
                body,
            });
        }
        Ok(resp)
    }

    // ── Images ──────────────────────────────────────────────────────

    /// Active images visible to `project_id`: public ones plus those the
    /// project owns. Follows `next` links until the listing is exhausted.
    pub async fn available_images(&self, project_id: &str) -> Result<Vec<Image>> {
        let mut images = Vec::new();
        let mut req = self
            .http
            .get(format!("{}/v2/images", self.image_url))
            .query(&[("status", "active")]);

        loop {
            let resp = req.header("X-Auth-Token", &self.token).send().await?;
            let page: ImageList = Self::check(resp, "list images").await?.json().await?;
            images.extend(page.images);

            match page.next {
                Some(next) => req = self.http.get(self.page_url(&next)),
                None => break,
            }
        }

        let mut seen = HashSet::new();
        Ok(images
            .into_iter()
            .filter(|img| {
                img.visibility.as_deref() == Some("public")
                    || img.owner.as_deref() == Some(project_id)
            })
            .filter(|img| seen.insert(img.id.clone()))
            .collect())
    }

    fn page_url(&self, next: &str) -> String {
        if next.starts_with("http://") || next.starts_with("https://") {
            next.to_string()
        } else {
            format!("{}/{}", self.image_url, next.trim_start_matches('/'))
        }
    }

    // ── Networks ────────────────────────────────────────────────────

    async fn list_networks(&self, query: &[(&str, &str)]) -> Result<Vec<Network>> {
        let resp = self
            .http
            .get(format!("{}/v2.0/networks", self.network_url))
            .header("X-Auth-Token", &self.token)
            .query(query)
            .send()
            .await?;

        let list: NetworkList = Self::check(resp, "list networks").await?.json().await?;
        Ok(list.networks)
    }

    /// Networks owned by the project followed by shared networks, without
    /// duplicates, sorted by display name.
    pub async fn project_networks(&self, project_id: &str) -> Result<Vec<Network>> {
        let mut networks = self.list_networks(&[("tenant_id", project_id)]).await?;
        networks.extend(self.list_networks(&[("shared", "true")]).await?);

        let mut seen = HashSet::new();
        networks.retain(|n| seen.insert(n.id.clone()));
        networks.sort_by(|a, b| a.label().cmp(b.label()));
        Ok(networks)
    }
}
