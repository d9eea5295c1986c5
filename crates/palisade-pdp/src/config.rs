//! Decision point configuration.

use palisade_authentication::CryptoConfig;
use palisade_authorization::{AccessPolicy, STATIC_DECISION_VALIDITY};
use palisade_core::{
    AccessDecision, AccessRequestPattern, Action, PalisadeError, Result, Timestamp,
};
use palisade_transport::{UdpOptions, MESSAGE_EGRESS_PORT, MESSAGE_INGRESS_PORT};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

fn default_validity_ms() -> u64 {
    STATIC_DECISION_VALIDITY.as_millis() as u64
}

/// A rule that holds for as long as the decision point runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDecision {
    /// Traffic the rule applies to
    pub pattern: AccessRequestPattern,
    /// Verdict
    pub action: Action,
    /// Downstream enforcement point; required for GRANT
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop: Option<IpAddr>,
    /// Validity granted on every renewal, in milliseconds
    #[serde(default = "default_validity_ms")]
    pub validity_ms: u64,
}

impl StaticDecision {
    /// Validity granted on every renewal.
    pub fn validity(&self) -> Duration {
        Duration::from_millis(self.validity_ms)
    }

    /// The decision, not yet valid; renewal sets its expiry.
    pub fn decision(&self) -> Result<AccessDecision> {
        if self.action == Action::Grant && self.next_hop.is_none() {
            return Err(PalisadeError::invalid(format!(
                "static GRANT for {} has no next hop",
                self.pattern
            )));
        }
        Ok(AccessDecision::new(
            self.pattern.clone(),
            self.action,
            self.next_hop,
            Timestamp::EPOCH,
        ))
    }
}

/// Everything a decision point needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdpConfig {
    /// Address the message sockets bind to
    pub bind: IpAddr,
    /// Host whose key is fetched at startup
    pub authentication: Option<IpAddr>,
    /// Port control messages are received on, here and at every peer
    pub message_ingress_port: u16,
    /// Port control messages are sent from
    pub message_egress_port: u16,
    /// Socket options
    pub udp: UdpOptions,
    /// Signature scheme and pinned keys
    pub crypto: CryptoConfig,
    /// Rules renewed in the background
    pub static_decisions: Vec<StaticDecision>,
    /// Attribute policies
    pub policies: Vec<AccessPolicy>,
    /// Hosts polled for the attributes the policies read
    pub attribute_sources: Vec<IpAddr>,
    /// Attribute polling period in milliseconds
    pub attribute_interval_ms: u64,
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            authentication: None,
            message_ingress_port: MESSAGE_INGRESS_PORT,
            message_egress_port: MESSAGE_EGRESS_PORT,
            udp: UdpOptions::default(),
            crypto: CryptoConfig::default(),
            static_decisions: Vec::new(),
            policies: Vec::new(),
            attribute_sources: Vec::new(),
            attribute_interval_ms: 1_000,
        }
    }
}

impl PdpConfig {
    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse TOML configuration text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PalisadeError::serialization(e.to_string()))
    }

    /// Attribute polling period, never zero.
    pub fn attribute_interval(&self) -> Duration {
        Duration::from_millis(self.attribute_interval_ms.max(1))
    }

    /// Check every rule and port before anything is started.
    pub fn validate(&self) -> Result<()> {
        if self.message_ingress_port != 0 && self.message_ingress_port == self.message_egress_port
        {
            return Err(PalisadeError::invalid(format!(
                "message ingress and egress both use port {}",
                self.message_ingress_port
            )));
        }
        for rule in &self.static_decisions {
            rule.decision()?;
        }
        Ok(())
    }
}
