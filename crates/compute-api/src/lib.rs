//! Typed Rust client for the bare-metal compute REST API.
//!
//! Covers the subset the dashboard consumes: servers (list, get, create,
//! delete, power state, serial console), key pairs, flavors and
//! availability zones.

mod types;

pub use types::*;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use urlencoding::encode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("compute api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("compute api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

impl Error {
    /// True when the service answered 404 for the addressed resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status == reqwest::StatusCode::NOT_FOUND)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// TLS settings shared by every client built from one HTTP pool.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    pub insecure: bool,
    pub ca_cert_pem: Option<Vec<u8>>,
}

/// Build the pooled HTTP client. It carries no credentials, so one instance
/// can back every per-request [`ComputeClient`].
pub fn build_http(tls: &TlsOptions) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(tls.insecure);
    if let Some(pem) = &tls.ca_cert_pem {
        builder = builder.add_root_certificate(reqwest::Certificate::from_pem(pem)?);
    }
    Ok(builder.build()?)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CreatedServers {
    Many { servers: Vec<Server> },
    One(Server),
}

/// Client for the bare-metal compute REST API, bound to one user token.
#[derive(Clone)]
pub struct ComputeClient {
    base_url: String,
    token: String,
    project_id: String,
    http: reqwest::Client,
}

impl ComputeClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self::with_http(reqwest::Client::new(), base_url, token, project_id)
    }

    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            project_id: project_id.into(),
            http,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let request_id = format!("req-{}", uuid::Uuid::new_v4());
        tracing::debug!(%method, path, %request_id, "compute api request");
        self.http
            .request(method, self.url(path))
            .header("X-Auth-Token", &self.token)
            .header("X-OpenStack-Request-ID", request_id)
            .header("Accept", "application/json")
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    // ── Servers ──────────────────────────────────────────────────────

    pub async fn list_servers(&self, detailed: bool, all_projects: bool) -> Result<Vec<Server>> {
        let path = if detailed { "/servers/detail" } else { "/servers" };
        let mut req = self.request(reqwest::Method::GET, path);
        if all_projects {
            req = req.query(&[("all_tenants", "True")]);
        }
        let resp = req.send().await?;

        let list: ServerList = Self::check(resp, "list servers").await?.json().await?;
        Ok(list.servers)
    }

    pub async fn get_server(&self, server_id: &str) -> Result<Server> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/servers/{}", encode(server_id)))
            .send()
            .await?;

        Self::check(resp, "get server")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    /// Create one or more servers. `user_data` in the request is the plain
    /// script; it is base64-encoded on the wire.
    pub async fn create_server(&self, req: &CreateServerRequest) -> Result<Vec<Server>> {
        let mut body = req.clone();
        body.user_data = req.user_data.as_ref().map(|s| STANDARD.encode(s.as_bytes()));

        let resp = self
            .request(reqwest::Method::POST, "/servers")
            .json(&body)
            .send()
            .await?;

        let created: CreatedServers = Self::check(resp, "create server").await?.json().await?;
        Ok(match created {
            CreatedServers::Many { servers } => servers,
            CreatedServers::One(server) => vec![server],
        })
    }

    pub async fn delete_server(&self, server_id: &str) -> Result<()> {
        let resp = self
            .request(reqwest::Method::DELETE, &format!("/servers/{}", encode(server_id)))
            .send()
            .await?;

        Self::check(resp, "delete server").await?;
        Ok(())
    }

    pub async fn set_power_state(&self, server_id: &str, target: PowerTarget) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!("/servers/{}/states/power", encode(server_id)),
            )
            .json(&PowerStateRequest { target })
            .send()
            .await?;

        Self::check(resp, "set power state").await?;
        Ok(())
    }

    pub async fn serial_console(&self, server_id: &str) -> Result<SerialConsole> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/servers/{}/serial_console", encode(server_id)),
            )
            .send()
            .await?;

        let envelope: ConsoleEnvelope = Self::check(resp, "get serial console").await?.json().await?;
        Ok(envelope.console)
    }

    // ── Key pairs ────────────────────────────────────────────────────

    pub async fn list_keypairs(&self) -> Result<Vec<KeyPair>> {
        let resp = self.request(reqwest::Method::GET, "/keypairs").send().await?;

        let list: KeyPairList = Self::check(resp, "list keypairs").await?.json().await?;
        Ok(list.keypairs)
    }

    pub async fn get_keypair(&self, name: &str) -> Result<KeyPair> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/keypairs/{}", encode(name)))
            .send()
            .await?;

        Self::check(resp, "get keypair")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    /// Create a key pair. Without a public key the service generates one and
    /// returns the private key exactly once.
    pub async fn create_keypair(&self, req: &CreateKeyPairRequest) -> Result<KeyPair> {
        let resp = self
            .request(reqwest::Method::POST, "/keypairs")
            .json(req)
            .send()
            .await?;

        Self::check(resp, "create keypair")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn delete_keypair(&self, name: &str) -> Result<()> {
        let resp = self
            .request(reqwest::Method::DELETE, &format!("/keypairs/{}", encode(name)))
            .send()
            .await?;

        Self::check(resp, "delete keypair").await?;
        Ok(())
    }

    // ── Flavors / availability zones ─────────────────────────────────

    pub async fn list_flavors(&self) -> Result<Vec<Flavor>> {
        let resp = self.request(reqwest::Method::GET, "/flavors").send().await?;

        let list: FlavorList = Self::check(resp, "list flavors").await?.json().await?;
        Ok(list.flavors)
    }

    pub async fn get_flavor(&self, flavor_id: &str) -> Result<Flavor> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/flavors/{}", encode(flavor_id)))
            .send()
            .await?;

        Self::check(resp, "get flavor")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn list_availability_zones(&self) -> Result<Vec<String>> {
        let resp = self
            .request(reqwest::Method::GET, "/availability_zones")
            .send()
            .await?;

        let list: AvailabilityZoneList =
            Self::check(resp, "list availability zones").await?.json().await?;
        Ok(list.availability_zones)
    }
}
