use async_trait::async_trait;
use tracing::info;

use crate::types::{
    Flavor, KeyPair, Nic, PowerState, PowerTarget, Server, ServerCreate, ServerId, ServerStatus,
};
use crate::{ComputeService, Result};

/// Compute service backed by the REST API.
///
/// Delegates to `compute_api::ComputeClient` for all HTTP calls.
pub struct RemoteCompute {
    client: compute_api::ComputeClient,
}

impl RemoteCompute {
    pub fn new(client: compute_api::ComputeClient) -> Self {
        Self { client }
    }

    fn to_server(raw: compute_api::Server) -> Server {
        Server {
            id: ServerId(raw.uuid),
            name: raw.name,
            description: raw.description,
            image_id: raw.image_uuid,
            flavor_id: raw.flavor_uuid,
            status: ServerStatus::parse(&raw.status),
            power_state: PowerState::parse(raw.power_state.as_deref().unwrap_or_default()),
            availability_zone: raw.availability_zone,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            nics: raw
                .nics
                .into_iter()
                .map(|nic| Nic {
                    network_id: nic.network_id,
                    port_id: nic.port_id,
                    mac_address: nic.mac_address,
                    fixed_ips: nic.fixed_ips.into_iter().map(|ip| ip.ip_address).collect(),
                    floating_ip: nic.floating_ip,
                })
                .collect(),
            flavor: None,
        }
    }

    fn to_keypair(raw: compute_api::KeyPair) -> KeyPair {
        KeyPair {
            name: raw.name,
            fingerprint: raw.fingerprint,
            public_key: raw.public_key,
            private_key: raw.private_key,
        }
    }

    fn to_flavor(raw: compute_api::Flavor) -> Flavor {
        Flavor {
            id: raw.uuid,
            name: raw.name,
            description: raw.description,
        }
    }
}

#[async_trait]
impl ComputeService for RemoteCompute {
    async fn list_servers(&self, detailed: bool, all_projects: bool) -> Result<Vec<Server>> {
        let servers = self.client.list_servers(detailed, all_projects).await?;
        Ok(servers.into_iter().map(Self::to_server).collect())
    }

    async fn get_server(&self, id: &ServerId) -> Result<Server> {
        Ok(Self::to_server(self.client.get_server(&id.0).await?))
    }

    async fn create_server(&self, req: &ServerCreate) -> Result<Vec<Server>> {
        let networks = req.nics.as_ref().map(|nics| {
            nics.iter()
                .map(|nic| compute_api::NetworkRequest {
                    net_id: nic.net_id.clone(),
                    fixed_ip: Some(nic.v4_fixed_ip.clone()).filter(|ip| !ip.is_empty()),
                })
                .collect()
        });

        let created = self
            .client
            .create_server(&compute_api::CreateServerRequest {
                name: req.name.clone(),
                image_uuid: req.image_id.clone(),
                flavor_uuid: req.flavor_id.clone(),
                availability_zone: req.availability_zone.clone(),
                networks,
                user_data: req.user_data.clone(),
                key_name: req.key_name.clone(),
                min_count: req.min_count,
                max_count: req.max_count,
            })
            .await?;

        info!(
            project_id = %self.client.project_id(),
            created = created.len(),
            "compute: server creation requested"
        );
        Ok(created.into_iter().map(Self::to_server).collect())
    }

    async fn delete_server(&self, id: &ServerId) -> Result<()> {
        self.client.delete_server(&id.0).await?;
        info!(server_id = %id, "compute: server deletion scheduled");
        Ok(())
    }

    async fn set_power_state(&self, id: &ServerId, target: PowerTarget) -> Result<()> {
        self.client.set_power_state(&id.0, target).await?;
        info!(server_id = %id, target = target.as_str(), "compute: power state requested");
        Ok(())
    }

    async fn serial_console_url(&self, id: &ServerId) -> Result<String> {
        Ok(self.client.serial_console(&id.0).await?.url)
    }

    async fn list_keypairs(&self) -> Result<Vec<KeyPair>> {
        let keypairs = self.client.list_keypairs().await?;
        Ok(keypairs.into_iter().map(Self::to_keypair).collect())
    }

    async fn get_keypair(&self, name: &str) -> Result<KeyPair> {
        Ok(Self::to_keypair(self.client.get_keypair(name).await?))
    }

    async fn create_keypair(&self, name: &str, public_key: Option<&str>) -> Result<KeyPair> {
        let keypair = self
            .client
            .create_keypair(&compute_api::CreateKeyPairRequest {
                name: name.to_string(),
                public_key: public_key.map(str::to_string),
            })
            .await?;
        info!(keypair = name, imported = public_key.is_some(), "compute: keypair created");
        Ok(Self::to_keypair(keypair))
    }

    async fn delete_keypair(&self, name: &str) -> Result<()> {
        self.client.delete_keypair(name).await?;
        info!(keypair = name, "compute: keypair deleted");
        Ok(())
    }

    async fn list_flavors(&self) -> Result<Vec<Flavor>> {
        let flavors = self.client.list_flavors().await?;
        Ok(flavors.into_iter().map(Self::to_flavor).collect())
    }

    async fn get_flavor(&self, id: &str) -> Result<Flavor> {
        Ok(Self::to_flavor(self.client.get_flavor(id).await?))
    }

    async fn list_availability_zones(&self) -> Result<Vec<String>> {
        Ok(self.client.list_availability_zones().await?)
    }
}
