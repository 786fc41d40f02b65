//! Server-side filtering for the server and key pair tables.

use serde::Deserialize;

use crate::types::{KeyPair, Server};

/// Filter applied to the server table. Empty fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerFilter {
    pub name: Option<String>,
    pub status: Option<String>,
    pub availability_zone: Option<String>,
}

impl ServerFilter {
    pub fn matches(&self, server: &Server) -> bool {
        if let Some(name) = non_empty(&self.name)
            && !server.name.to_lowercase().contains(&name.to_lowercase())
        {
            return false;
        }
        if let Some(status) = non_empty(&self.status)
            && !server.status.as_str().eq_ignore_ascii_case(status)
        {
            return false;
        }
        if let Some(zone) = non_empty(&self.availability_zone)
            && server.availability_zone.as_deref() != Some(zone)
        {
            return false;
        }
        true
    }

    pub fn apply(&self, servers: Vec<Server>) -> Vec<Server> {
        servers.into_iter().filter(|s| self.matches(s)).collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Naive case-insensitive search over key pair names.
pub fn filter_keypairs(keypairs: Vec<KeyPair>, query: &str) -> Vec<KeyPair> {
    let query = query.to_lowercase();
    keypairs
        .into_iter()
        .filter(|kp| kp.name.to_lowercase().contains(&query))
        .collect()
}
