use async_trait::async_trait;

use crate::types::{Image, Network};
use crate::{ImageCatalog, NetworkCatalog, Result};

/// Image and network catalogs backed by their REST APIs.
pub struct RemoteCatalog {
    client: catalog_api::CatalogClient,
}

impl RemoteCatalog {
    pub fn new(client: catalog_api::CatalogClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageCatalog for RemoteCatalog {
    async fn available_images(&self, project_id: &str) -> Result<Vec<Image>> {
        let images = self.client.available_images(project_id).await?;
        Ok(images
            .into_iter()
            .map(|img| Image {
                is_snapshot: img.is_snapshot(),
                size_bytes: img.bytes(),
                min_disk_gb: img.min_disk,
                id: img.id,
                name: img.name,
            })
            .collect())
    }
}

#[async_trait]
impl NetworkCatalog for RemoteCatalog {
    async fn project_networks(&self, project_id: &str) -> Result<Vec<Network>> {
        let networks = self.client.project_networks(project_id).await?;
        Ok(networks
            .into_iter()
            .map(|net| Network {
                name: net.label().to_string(),
                id: net.id,
            })
            .collect())
    }
}
