//! Which operations a resource offers given its current state.
//!
//! Every check here is a pure predicate: it reads the status it is handed and
//! never fails. Fetching the resource to learn its status is the caller's job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{PowerState, PowerTarget, Server, ServerStatus};
use crate::{Error, Result};

/// Operations on a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerAction {
    Launch,
    Delete,
    Start,
    Stop,
    Reboot,
    SoftReboot,
}

impl ServerAction {
    /// Row actions in the order they are listed.
    pub const ROW_ACTIONS: [ServerAction; 5] = [
        ServerAction::Start,
        ServerAction::Stop,
        ServerAction::Reboot,
        ServerAction::SoftReboot,
        ServerAction::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Launch => "launch",
            Self::Delete => "delete",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reboot => "reboot",
            Self::SoftReboot => "soft_reboot",
        }
    }

    /// Whether the action may be requested for a server in this state.
    ///
    /// Launch is never gated locally; quota enforcement belongs to the
    /// compute service. Reboots are always offered and may be refused
    /// downstream. Error servers stay deletable even while deleting.
    pub fn is_allowed(&self, status: &ServerStatus, power_state: &PowerState) -> bool {
        match self {
            Self::Launch | Self::Reboot | Self::SoftReboot => true,
            Self::Delete => *status == ServerStatus::Error || *status != ServerStatus::Deleting,
            Self::Start => *status == ServerStatus::Stopped,
            Self::Stop => *power_state == PowerState::PowerOn && *status != ServerStatus::Deleting,
        }
    }

    pub fn is_allowed_for(&self, server: &Server) -> bool {
        self.is_allowed(&server.status, &server.power_state)
    }

    /// Row actions currently offered for `server`.
    pub fn allowed_for(server: &Server) -> Vec<ServerAction> {
        Self::ROW_ACTIONS
            .into_iter()
            .filter(|action| action.is_allowed_for(server))
            .collect()
    }

    /// The power state change this action maps to, if any.
    pub fn power_target(&self) -> Option<PowerTarget> {
        match self {
            Self::Start => Some(PowerTarget::On),
            Self::Stop => Some(PowerTarget::Off),
            Self::Reboot => Some(PowerTarget::Reboot),
            Self::SoftReboot => Some(PowerTarget::SoftReboot),
            Self::Launch | Self::Delete => None,
        }
    }

    /// Label of the button, pluralised on the number of selected servers.
    pub fn present(&self, count: usize) -> &'static str {
        let one = count == 1;
        match self {
            Self::Launch => "Launch Server",
            Self::Delete if one => "Delete Server",
            Self::Delete => "Delete Servers",
            Self::Start if one => "Start Server",
            Self::Start => "Start Servers",
            Self::Stop if one => "Shut Off Server",
            Self::Stop => "Shut Off Servers",
            Self::Reboot if one => "Hard Reboot Server",
            Self::Reboot => "Hard Reboot Servers",
            Self::SoftReboot if one => "Soft Reboot Server",
            Self::SoftReboot => "Soft Reboot Servers",
        }
    }

    /// Past-tense form used in the success notification.
    pub fn past(&self, count: usize) -> &'static str {
        let one = count == 1;
        match self {
            Self::Launch if one => "Launched Server",
            Self::Launch => "Launched Servers",
            Self::Delete if one => "Scheduled deletion of Server",
            Self::Delete => "Scheduled deletion of Servers",
            Self::Start if one => "Started Server",
            Self::Start => "Started Servers",
            Self::Stop if one => "Shut Off Server",
            Self::Stop => "Shut Off Servers",
            Self::Reboot if one => "Hard Rebooted Server",
            Self::Reboot => "Hard Rebooted Servers",
            Self::SoftReboot if one => "Soft Rebooted Server",
            Self::SoftReboot => "Soft Rebooted Servers",
        }
    }

    pub fn help_text(&self) -> Option<&'static str> {
        match self {
            Self::Delete => Some("Deleted servers are not recoverable."),
            Self::Stop => Some("The server(s) will be shut off."),
            Self::Reboot | Self::SoftReboot => {
                Some("Restarted servers will lose any data not saved in persistent storage.")
            }
            Self::Launch | Self::Start => None,
        }
    }
}

impl fmt::Display for ServerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "launch" => Ok(Self::Launch),
            "delete" => Ok(Self::Delete),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "reboot" => Ok(Self::Reboot),
            "soft_reboot" => Ok(Self::SoftReboot),
            other => Err(Error::InvalidAction(other.to_string())),
        }
    }
}

/// Operations on a key pair. None of them depend on key pair state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPairAction {
    Create,
    Import,
    Delete,
}

impl KeyPairAction {
    pub fn is_allowed(&self) -> bool {
        true
    }

    pub fn present(&self, count: usize) -> &'static str {
        match self {
            Self::Create => "Create Server Key Pair",
            Self::Import => "Import Server Key Pair",
            Self::Delete if count == 1 => "Delete Server Key Pair",
            Self::Delete => "Delete Server Key Pairs",
        }
    }

    pub fn past(&self, count: usize) -> &'static str {
        match self {
            Self::Create => "Created Server Key Pair",
            Self::Import => "Imported Server Key Pair",
            Self::Delete if count == 1 => "Deleted Server Key Pair",
            Self::Delete => "Deleted Server Key Pairs",
        }
    }

    pub fn help_text(&self) -> Option<&'static str> {
        match self {
            Self::Delete => Some(
                "Removing a key pair can leave servers orphaned. You should not remove a key \
                 pair unless you are certain it is not being used anywhere.",
            ),
            Self::Create | Self::Import => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [ServerStatus; 12] = [
        ServerStatus::Active,
        ServerStatus::Stopped,
        ServerStatus::Error,
        ServerStatus::Rebuilding,
        ServerStatus::Building,
        ServerStatus::PoweringOn,
        ServerStatus::PoweringOff,
        ServerStatus::Rebooting,
        ServerStatus::Deleting,
        ServerStatus::SoftPoweringOff,
        ServerStatus::SoftRebooting,
        ServerStatus::Maintenance,
    ];

    fn power_states() -> Vec<PowerState> {
        vec![
            PowerState::PowerOn,
            PowerState::PowerOff,
            PowerState::Other("powering on".into()),
        ]
    }

    #[test]
    fn delete_blocked_only_while_deleting() {
        for status in ALL_STATUSES {
            for power in power_states() {
                let allowed = ServerAction::Delete.is_allowed(&status, &power);
                assert_eq!(allowed, status != ServerStatus::Deleting, "{status}");
            }
        }
        assert!(ServerAction::Delete.is_allowed(&ServerStatus::Error, &PowerState::PowerOff));
    }

    #[test]
    fn start_only_when_stopped() {
        for status in ALL_STATUSES {
            for power in power_states() {
                assert_eq!(
                    ServerAction::Start.is_allowed(&status, &power),
                    status == ServerStatus::Stopped,
                );
            }
        }
        let unknown = ServerStatus::Unknown("shelved".into());
        assert!(!ServerAction::Start.is_allowed(&unknown, &PowerState::PowerOff));
    }

    #[test]
    fn stop_requires_power_on_and_not_deleting() {
        for status in ALL_STATUSES {
            for power in power_states() {
                let expected = power == PowerState::PowerOn && status != ServerStatus::Deleting;
                assert_eq!(ServerAction::Stop.is_allowed(&status, &power), expected);
            }
        }
        // The error exemption applies to delete only.
        assert!(ServerAction::Stop.is_allowed(&ServerStatus::Error, &PowerState::PowerOn));
        assert!(!ServerAction::Start.is_allowed(&ServerStatus::Error, &PowerState::PowerOff));
    }

    #[test]
    fn launch_and_reboots_always_offered() {
        for status in ALL_STATUSES {
            for power in power_states() {
                assert!(ServerAction::Launch.is_allowed(&status, &power));
                assert!(ServerAction::Reboot.is_allowed(&status, &power));
                assert!(ServerAction::SoftReboot.is_allowed(&status, &power));
            }
        }
    }

    #[test]
    fn repeated_checks_agree() {
        for action in ServerAction::ROW_ACTIONS {
            for status in ALL_STATUSES {
                for power in power_states() {
                    let first = action.is_allowed(&status, &power);
                    for _ in 0..3 {
                        assert_eq!(action.is_allowed(&status, &power), first);
                    }
                }
            }
        }
    }

    #[test]
    fn action_names_parse_back() {
        for action in ServerAction::ROW_ACTIONS {
            assert_eq!(action.as_str().parse::<ServerAction>().unwrap(), action);
        }
        assert!("rebuild".parse::<ServerAction>().is_err());
    }

    #[test]
    fn verbs_pluralise() {
        assert_eq!(ServerAction::Delete.present(1), "Delete Server");
        assert_eq!(ServerAction::Delete.past(2), "Scheduled deletion of Servers");
        assert_eq!(KeyPairAction::Delete.past(3), "Deleted Server Key Pairs");
    }
}
