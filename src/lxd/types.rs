use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub(crate) const RESPONSE_TYPE_ERROR: &str = "error";
pub(crate) const ADDRESS_FAMILY_INET: &str = "inet";

/// Standard envelope of every `/1.0` response.
#[derive(Debug, Deserialize)]
pub(crate) struct ResponseEnvelope {
    #[serde(rename = "type", default)]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) error_code: u16,
    #[serde(default)]
    pub(crate) error: String,
    #[serde(default)]
    pub(crate) operation: String,
    #[serde(default)]
    pub(crate) metadata: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub auth: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub auth_methods: Vec<String>,
}

impl ServerInfo {
    #[must_use]
    pub fn is_trusted(&self) -> bool {
        self.auth == "trusted"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Running,
    Stopped,
    Frozen,
    Other(String),
}

impl From<&str> for InstanceStatus {
    fn from(value: &str) -> Self {
        match value {
            "Running" => InstanceStatus::Running,
            "Stopped" => InstanceStatus::Stopped,
            "Frozen" => InstanceStatus::Frozen,
            other => InstanceStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Running => f.write_str("Running"),
            InstanceStatus::Stopped => f.write_str("Stopped"),
            InstanceStatus::Frozen => f.write_str("Frozen"),
            InstanceStatus::Other(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "type", default)]
    pub instance_type: String,
    #[serde(default)]
    pub location: String,
}

impl Instance {
    #[must_use]
    pub fn status(&self) -> InstanceStatus {
        InstanceStatus::from(self.status.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub network: Option<HashMap<String, NetworkState>>,
}

impl InstanceState {
    /// First IPv4 address of `interface`, falling back to its first address.
    #[must_use]
    pub fn address(&self, interface: &str) -> Option<String> {
        let addresses = &self.network.as_ref()?.get(interface)?.addresses;
        addresses
            .iter()
            .find(|addr| addr.family == ADDRESS_FAMILY_INET)
            .or_else(|| addresses.first())
            .map(|addr| addr.address.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkState {
    #[serde(default)]
    pub addresses: Vec<NetworkAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkAddress {
    pub family: String,
    pub address: String,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub err: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl Operation {
    #[must_use]
    pub fn failed(&self) -> bool {
        self.status_code >= 400 || !self.err.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecMetadata {
    #[serde(rename = "return", default)]
    pub(crate) return_code: i32,
    #[serde(default)]
    pub(crate) output: HashMap<String, String>,
}

/// Result of a command run inside an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateAction {
    Start,
    Stop,
    Freeze,
    Unfreeze,
}

#[derive(Debug, Serialize)]
pub(crate) struct StateRequest {
    pub(crate) action: StateAction,
    pub(crate) timeout: i64,
    pub(crate) force: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct CopyInstanceRequest<'a> {
    pub(crate) name: &'a str,
    pub(crate) source: CopySource<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CopySource<'a> {
    #[serde(rename = "type")]
    pub(crate) source_type: &'a str,
    pub(crate) source: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExecRequest<'a> {
    pub(crate) command: &'a [String],
    pub(crate) environment: HashMap<String, String>,
    #[serde(rename = "wait-for-websocket")]
    pub(crate) wait_for_websocket: bool,
    pub(crate) interactive: bool,
    #[serde(rename = "record-output")]
    pub(crate) record_output: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct CertificateRequest<'a> {
    #[serde(rename = "type")]
    pub(crate) cert_type: &'a str,
    pub(crate) password: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_prefers_ipv4() {
        let state: InstanceState = serde_json::from_value(serde_json::json!({
            "status": "Running",
            "network": {
                "eth0": {
                    "addresses": [
                        {"family": "inet6", "address": "fd42::1", "scope": "global"},
                        {"family": "inet", "address": "10.0.3.17", "scope": "global"}
                    ]
                }
            }
        }))
        .unwrap();
        assert_eq!(state.address("eth0").as_deref(), Some("10.0.3.17"));
        assert!(state.address("eth1").is_none());
    }

    #[test]
    fn test_address_missing_network() {
        let state: InstanceState =
            serde_json::from_value(serde_json::json!({"status": "Stopped", "network": null}))
                .unwrap();
        assert!(state.address("eth0").is_none());
    }

    #[test]
    fn test_instance_status_mapping() {
        assert_eq!(InstanceStatus::from("Frozen"), InstanceStatus::Frozen);
        assert_eq!(
            InstanceStatus::from("Error"),
            InstanceStatus::Other("Error".to_string())
        );
        assert_eq!(InstanceStatus::Running.to_string(), "Running");
    }

    #[test]
    fn test_state_request_shape() {
        let body = serde_json::to_value(StateRequest {
            action: StateAction::Unfreeze,
            timeout: 30,
            force: false,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"action": "unfreeze", "timeout": 30, "force": false})
        );
    }
}
