//! Table actions applied to several selected rows at once.
//!
//! Each object is handled independently and attempted exactly once; one
//! failure does not stop the rest of the batch.

use serde::Serialize;

use crate::gate::{KeyPairAction, ServerAction};
use crate::notice::Notices;
use crate::types::ServerId;
use crate::{ComputeService, Error, Result};

/// Per-object results of a batch action, with the notifications to show.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub denied: Vec<String>,
    pub failed: Vec<String>,
    pub messages: Notices,
}

impl BatchReport {
    fn finish(mut self, present: impl Fn(usize) -> &'static str, past: impl Fn(usize) -> &'static str) -> Self {
        if !self.denied.is_empty() {
            let msg = format!(
                "You are not allowed to {}: {}",
                present(self.denied.len()).to_lowercase(),
                self.denied.join(", ")
            );
            self.messages.error(msg);
        }
        if !self.failed.is_empty() {
            let msg = format!(
                "Unable to {}: {}",
                present(self.failed.len()).to_lowercase(),
                self.failed.join(", ")
            );
            self.messages.error(msg);
        }
        if !self.succeeded.is_empty() {
            let msg = format!("{}: {}", past(self.succeeded.len()), self.succeeded.join(", "));
            self.messages.success(msg);
        }
        self
    }

    pub fn all_succeeded(&self) -> bool {
        self.denied.is_empty() && self.failed.is_empty()
    }
}

/// Apply `action` to every server in `ids`.
///
/// Each server is re-fetched so the gate sees its current status.
pub async fn run_server_action(
    compute: &dyn ComputeService,
    action: ServerAction,
    ids: &[ServerId],
) -> Result<BatchReport> {
    if action == ServerAction::Launch {
        return Err(Error::InvalidAction(action.as_str().to_string()));
    }

    let mut report = BatchReport::default();
    for id in ids {
        let server = match compute.get_server(id).await {
            Ok(server) => server,
            Err(e) => {
                tracing::warn!(server_id = %id, error = %e, action = %action, "server lookup failed");
                report.failed.push(id.to_string());
                continue;
            }
        };
        let label = if server.name.is_empty() { id.to_string() } else { server.name.clone() };

        if !action.is_allowed_for(&server) {
            report.denied.push(label);
            continue;
        }

        let outcome = match action.power_target() {
            Some(target) => compute.set_power_state(id, target).await,
            None => compute.delete_server(id).await,
        };
        match outcome {
            Ok(()) => report.succeeded.push(label),
            Err(e) => {
                tracing::warn!(server_id = %id, error = %e, action = %action, "server action failed");
                report.failed.push(label);
            }
        }
    }

    Ok(report.finish(|n| action.present(n), |n| action.past(n)))
}

/// Delete every key pair in `names`.
pub async fn delete_keypairs(compute: &dyn ComputeService, names: &[String]) -> BatchReport {
    let mut report = BatchReport::default();
    for name in names {
        match compute.delete_keypair(name).await {
            Ok(()) => report.succeeded.push(name.clone()),
            Err(e) => {
                tracing::warn!(keypair = %name, error = %e, "keypair deletion failed");
                report.failed.push(name.clone());
            }
        }
    }

    let action = KeyPairAction::Delete;
    report.finish(|n| action.present(n), |n| action.past(n))
}
