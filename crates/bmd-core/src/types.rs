use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use compute_api::PowerTarget;

/// Opaque server identifier assigned by the compute service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(pub String);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status reported for a server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServerStatus {
    Active,
    Stopped,
    Error,
    Rebuilding,
    Building,
    PoweringOn,
    PoweringOff,
    Rebooting,
    Deleting,
    SoftPoweringOff,
    SoftRebooting,
    Maintenance,
    /// A status this dashboard does not know about yet.
    Unknown(String),
}

/// How the live-refresh mechanism treats a row in a given status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    /// Settled in a healthy state; stop polling.
    Ok,
    /// Settled in a failed state; stop polling.
    Error,
    /// Still transitioning; keep polling.
    Pending,
}

impl ServerStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "stopped" => Self::Stopped,
            "error" => Self::Error,
            "rebuilding" => Self::Rebuilding,
            "building" => Self::Building,
            "powering-on" => Self::PoweringOn,
            "powering-off" => Self::PoweringOff,
            "rebooting" => Self::Rebooting,
            "deleting" => Self::Deleting,
            "soft-powering-off" => Self::SoftPoweringOff,
            "soft-rebooting" => Self::SoftRebooting,
            "maintenance" => Self::Maintenance,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Rebuilding => "rebuilding",
            Self::Building => "building",
            Self::PoweringOn => "powering-on",
            Self::PoweringOff => "powering-off",
            Self::Rebooting => "rebooting",
            Self::Deleting => "deleting",
            Self::SoftPoweringOff => "soft-powering-off",
            Self::SoftRebooting => "soft-rebooting",
            Self::Maintenance => "maintenance",
            Self::Unknown(raw) => raw,
        }
    }

    /// Human-readable label shown in the status column.
    pub fn display_name(&self) -> String {
        match self {
            Self::Active => "Active".into(),
            Self::Stopped => "Stopped".into(),
            Self::Error => "Error".into(),
            Self::Rebuilding => "Rebuilding".into(),
            Self::Building => "Building".into(),
            Self::PoweringOn => "Powering On".into(),
            Self::PoweringOff => "Powering Off".into(),
            Self::Rebooting => "Rebooting".into(),
            Self::Deleting => "Deleting".into(),
            Self::SoftPoweringOff => "Soft Powering Off".into(),
            Self::SoftRebooting => "Soft Rebooting".into(),
            Self::Maintenance => "Maintenance".into(),
            Self::Unknown(raw) => title_case(&raw.replace('_', " ")),
        }
    }

    pub fn row_status(&self) -> RowStatus {
        match self {
            Self::Active | Self::Stopped => RowStatus::Ok,
            Self::Error | Self::Maintenance => RowStatus::Error,
            _ => RowStatus::Pending,
        }
    }
}

impl From<String> for ServerStatus {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ServerStatus> for String {
    fn from(status: ServerStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Power state reported alongside the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PowerState {
    PowerOn,
    PowerOff,
    /// Transitional or unrecognised value, kept verbatim.
    Other(String),
}

impl PowerState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "power on" => Self::PowerOn,
            "power off" => Self::PowerOff,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::PowerOn => "power on",
            Self::PowerOff => "power off",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for PowerState {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<PowerState> for String {
    fn from(state: PowerState) -> Self {
        state.as_str().to_string()
    }
}

/// A network interface attached to a server.
#[derive(Debug, Clone, Serialize)]
pub struct Nic {
    pub network_id: String,
    pub port_id: Option<String>,
    pub mac_address: Option<String>,
    pub fixed_ips: Vec<String>,
    pub floating_ip: Option<String>,
}

/// Addresses of one network, split the way the IP column shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IpGroup {
    pub floating: Vec<String>,
    pub non_floating: Vec<String>,
}

/// A bare-metal server as seen through the compute service.
#[derive(Debug, Clone, Serialize)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    pub description: Option<String>,
    pub image_id: Option<String>,
    pub flavor_id: Option<String>,
    pub status: ServerStatus,
    pub power_state: PowerState,
    pub availability_zone: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub nics: Vec<Nic>,
    /// Attached by a separate lookup on detail pages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<Flavor>,
}

impl Server {
    pub fn ip_groups(&self) -> BTreeMap<String, IpGroup> {
        let mut groups: BTreeMap<String, IpGroup> = BTreeMap::new();
        for nic in &self.nics {
            let group = groups.entry(nic.network_id.clone()).or_default();
            if let Some(ip) = &nic.floating_ip {
                group.floating.push(ip.clone());
            }
            group.non_floating.extend(nic.fixed_ips.iter().cloned());
        }
        groups
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// An SSH key pair, identified by its name.
#[derive(Debug, Clone, Serialize)]
pub struct KeyPair {
    pub name: String,
    pub fingerprint: Option<String>,
    pub public_key: Option<String>,
    /// Only present in the response that generated the key.
    #[serde(skip_serializing)]
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub id: String,
    pub name: Option<String>,
    pub is_snapshot: bool,
    pub size_bytes: Option<u64>,
    pub min_disk_gb: u64,
}

impl Image {
    pub fn label(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Network {
    pub id: String,
    pub name: String,
}

/// One NIC in a creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NicRequest {
    #[serde(rename = "net-id")]
    pub net_id: String,
    /// Always empty from the launch workflow; the service picks the address.
    #[serde(rename = "v4-fixed-ip")]
    pub v4_fixed_ip: String,
}

/// Everything the launch workflow sends in its single creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerCreate {
    pub name: String,
    pub image_id: String,
    pub flavor_id: String,
    pub nics: Option<Vec<NicRequest>>,
    pub availability_zone: Option<String>,
    pub user_data: Option<String>,
    pub key_name: Option<String>,
    pub min_count: u32,
    pub max_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_known_and_unknown_values() {
        assert_eq!(ServerStatus::parse("soft-powering-off"), ServerStatus::SoftPoweringOff);
        assert_eq!(ServerStatus::parse("DELETING"), ServerStatus::Deleting);
        let odd = ServerStatus::parse("rescued_mode");
        assert_eq!(odd.as_str(), "rescued_mode");
        assert_eq!(odd.display_name(), "Rescued Mode");
    }

    #[test]
    fn row_status_groups_statuses() {
        assert_eq!(ServerStatus::Active.row_status(), RowStatus::Ok);
        assert_eq!(ServerStatus::Stopped.row_status(), RowStatus::Ok);
        assert_eq!(ServerStatus::Maintenance.row_status(), RowStatus::Error);
        assert_eq!(ServerStatus::Building.row_status(), RowStatus::Pending);
        assert_eq!(ServerStatus::PoweringOn.row_status(), RowStatus::Pending);
    }

    #[test]
    fn ip_groups_split_floating_addresses() {
        let server = Server {
            id: ServerId("s-1".into()),
            name: "web01".into(),
            description: None,
            image_id: None,
            flavor_id: None,
            status: ServerStatus::Active,
            power_state: PowerState::PowerOn,
            availability_zone: None,
            created_at: None,
            updated_at: None,
            nics: vec![
                Nic {
                    network_id: "net-1".into(),
                    port_id: None,
                    mac_address: None,
                    fixed_ips: vec!["10.0.0.5".into()],
                    floating_ip: Some("172.24.4.10".into()),
                },
                Nic {
                    network_id: "net-2".into(),
                    port_id: None,
                    mac_address: None,
                    fixed_ips: vec!["192.168.1.4".into(), "fd00::4".into()],
                    floating_ip: None,
                },
            ],
            flavor: None,
        };

        let groups = server.ip_groups();
        assert_eq!(groups["net-1"].floating, vec!["172.24.4.10"]);
        assert_eq!(groups["net-1"].non_floating, vec!["10.0.0.5"]);
        assert_eq!(groups["net-2"].non_floating.len(), 2);
        assert!(groups["net-2"].floating.is_empty());
    }

    #[test]
    fn nic_request_uses_dashed_keys() {
        let nic = NicRequest {
            net_id: "net-1".into(),
            v4_fixed_ip: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&nic).unwrap(),
            serde_json::json!({"net-id": "net-1", "v4-fixed-ip": ""})
        );
    }
}
