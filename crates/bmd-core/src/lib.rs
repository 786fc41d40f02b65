pub mod batch;
pub mod catalog;
pub mod compute;
pub mod gate;
pub mod keypair;
pub mod listing;
pub mod notice;
pub mod types;
pub mod workflow;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use types::{Flavor, Image, KeyPair, Network, PowerTarget, Server, ServerCreate, ServerId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("compute service error: {0}")]
    Compute(#[from] compute_api::Error),

    #[error("catalog error: {0}")]
    Catalog(#[from] catalog_api::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("unknown workflow step: {0}")]
    UnknownStep(String),

    #[error("workflow context is missing {0}")]
    MissingContext(&'static str),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl Error {
    /// True when the remote service reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Compute(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The authenticated caller of one request.
#[derive(Clone)]
pub struct Identity {
    pub token: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub project_id: String,
    pub project_name: Option<String>,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Operations of the bare-metal compute service the dashboard relies on.
///
/// Every read goes to the remote service; implementations keep no copy of
/// the resources they return.
#[async_trait]
pub trait ComputeService: Send + Sync + 'static {
    async fn list_servers(&self, detailed: bool, all_projects: bool) -> Result<Vec<Server>>;

    async fn get_server(&self, id: &ServerId) -> Result<Server>;

    /// Issue one creation request. `min_count`/`max_count` come from the request.
    async fn create_server(&self, req: &ServerCreate) -> Result<Vec<Server>>;

    async fn delete_server(&self, id: &ServerId) -> Result<()>;

    async fn set_power_state(&self, id: &ServerId, target: PowerTarget) -> Result<()>;

    async fn serial_console_url(&self, id: &ServerId) -> Result<String>;

    async fn list_keypairs(&self) -> Result<Vec<KeyPair>>;

    async fn get_keypair(&self, name: &str) -> Result<KeyPair>;

    /// Create a key pair, or import one when `public_key` is given.
    async fn create_keypair(&self, name: &str, public_key: Option<&str>) -> Result<KeyPair>;

    async fn delete_keypair(&self, name: &str) -> Result<()>;

    async fn list_flavors(&self) -> Result<Vec<Flavor>>;

    async fn get_flavor(&self, id: &str) -> Result<Flavor>;

    async fn list_availability_zones(&self) -> Result<Vec<String>>;
}

/// Source of bootable images.
#[async_trait]
pub trait ImageCatalog: Send + Sync + 'static {
    async fn available_images(&self, project_id: &str) -> Result<Vec<Image>>;
}

/// Source of attachable networks.
#[async_trait]
pub trait NetworkCatalog: Send + Sync + 'static {
    async fn project_networks(&self, project_id: &str) -> Result<Vec<Network>>;
}

/// Collaborators bound to one caller's credentials.
#[derive(Clone)]
pub struct Backends {
    pub compute: Arc<dyn ComputeService>,
    pub images: Arc<dyn ImageCatalog>,
    pub networks: Arc<dyn NetworkCatalog>,
}

/// Builds a fresh [`Backends`] for each incoming request.
pub trait BackendFactory: Send + Sync + 'static {
    fn connect(&self, identity: &Identity) -> Backends;
}

/// Remote service endpoints.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub compute_url: String,
    pub image_url: String,
    pub network_url: String,
}

/// Factory for the real REST collaborators.
///
/// Holds the pooled HTTP client; credentials are bound per call to `connect`.
pub struct RemoteBackendFactory {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl RemoteBackendFactory {
    pub fn new(endpoints: Endpoints, tls: &compute_api::TlsOptions) -> Result<Self> {
        let http = compute_api::build_http(tls)?;
        Ok(Self { http, endpoints })
    }
}

impl BackendFactory for RemoteBackendFactory {
    fn connect(&self, identity: &Identity) -> Backends {
        let compute = compute_api::ComputeClient::with_http(
            self.http.clone(),
            self.endpoints.compute_url.clone(),
            identity.token.clone(),
            identity.project_id.clone(),
        );
        let catalog = catalog_api::CatalogClient::new(
            self.http.clone(),
            self.endpoints.image_url.clone(),
            self.endpoints.network_url.clone(),
            identity.token.clone(),
        );
        let catalog = Arc::new(catalog::RemoteCatalog::new(catalog));

        Backends {
            compute: Arc::new(compute::RemoteCompute::new(compute)),
            images: catalog.clone(),
            networks: catalog,
        }
    }
}
