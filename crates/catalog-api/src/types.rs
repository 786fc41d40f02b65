use serde::{Deserialize, Serialize};

// ── Images ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub virtual_size: Option<u64>,
    #[serde(default)]
    pub min_disk: u64,
    /// Set to `"snapshot"` on images captured from a running server.
    #[serde(default)]
    pub image_type: Option<String>,
}

impl Image {
    pub fn is_snapshot(&self) -> bool {
        self.image_type.as_deref() == Some("snapshot")
    }

    /// Size in bytes, preferring the virtual size when the image reports one.
    pub fn bytes(&self) -> Option<u64> {
        self.virtual_size.filter(|s| *s > 0).or(self.size)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageList {
    pub images: Vec<Image>,
    /// Link to the following page, relative to the service root.
    #[serde(default)]
    pub next: Option<String>,
}

// ── Networks ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl Network {
    /// Display name, falling back to the id for unnamed networks.
    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NetworkList {
    pub networks: Vec<Network>,
}
