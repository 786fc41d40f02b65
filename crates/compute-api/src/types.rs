use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Server types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Server {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_uuid: Option<String>,
    #[serde(default)]
    pub flavor_uuid: Option<String>,
    pub status: String,
    #[serde(default)]
    pub power_state: Option<String>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub nics: Vec<ServerNic>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerNic {
    pub network_id: String,
    #[serde(default)]
    pub port_id: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
    #[serde(default)]
    pub floating_ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FixedIp {
    pub ip_address: String,
    #[serde(default)]
    pub subnet_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerList {
    pub servers: Vec<Server>,
}

/// Body of `POST /servers`.
///
/// `user_data` is sent base64-encoded; callers pass the plain script to
/// [`crate::ComputeClient::create_server`].
#[derive(Debug, Clone, Serialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub image_uuid: String,
    pub flavor_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<NetworkRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    pub min_count: u32,
    pub max_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkRequest {
    pub net_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_ip: Option<String>,
}

/// Target of a power state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerTarget {
    On,
    Off,
    Reboot,
    SoftReboot,
}

impl PowerTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Reboot => "reboot",
            Self::SoftReboot => "soft_reboot",
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PowerStateRequest {
    pub target: PowerTarget,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialConsole {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConsoleEnvelope {
    pub console: SerialConsole,
}

// ── Key pair types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyPair {
    pub name: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default, rename = "type")]
    pub key_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KeyPairList {
    pub keypairs: Vec<KeyPair>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateKeyPairRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

// ── Flavor / availability zone types ─────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Flavor {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub disabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlavorList {
    pub flavors: Vec<Flavor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailabilityZoneList {
    pub availability_zones: Vec<String>,
}
