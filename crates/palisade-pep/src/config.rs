//! Enforcement point configuration.
//!
//! Read from a TOML file; every field has a default so a file only needs to
//! name what differs. Command-line flags are applied on top.

use crate::bridge::BridgeConfig;
use palisade_authentication::{CryptoConfig, RequestConfig};
use palisade_core::{PalisadeError, Result};
use palisade_transport::{BypassPredicate, UdpOptions, MESSAGE_EGRESS_PORT, MESSAGE_INGRESS_PORT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;

/// One side of a frame tunnel, written `bind=peer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TunnelEndpoint {
    /// Local address frames are received on
    pub bind: SocketAddr,
    /// Remote address frames are sent to
    pub peer: SocketAddr,
}

impl FromStr for TunnelEndpoint {
    type Err = PalisadeError;

    fn from_str(text: &str) -> Result<Self> {
        let (bind, peer) = text
            .split_once('=')
            .ok_or_else(|| PalisadeError::invalid(format!("expected bind=peer, got '{text}'")))?;
        let parse = |address: &str| {
            address
                .trim()
                .parse::<SocketAddr>()
                .map_err(|e| PalisadeError::invalid(format!("'{address}': {e}")))
        };
        Ok(Self {
            bind: parse(bind)?,
            peer: parse(peer)?,
        })
    }
}

impl TryFrom<String> for TunnelEndpoint {
    type Error = PalisadeError;

    fn try_from(text: String) -> Result<Self> {
        text.parse()
    }
}

impl From<TunnelEndpoint> for String {
    fn from(endpoint: TunnelEndpoint) -> Self {
        endpoint.to_string()
    }
}

impl fmt::Display for TunnelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.bind, self.peer)
    }
}

/// Everything an enforcement point needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PepConfig {
    /// Own address; decisions naming it as next hop are incoming grants
    pub scope: Option<IpAddr>,
    /// Decision point
    pub authorization: Option<IpAddr>,
    /// Host whose key is fetched at startup
    pub authentication: Option<IpAddr>,
    /// Forward frames without access control
    pub forward_only: bool,
    /// Tunnel towards the protected segment
    pub secure: Option<TunnelEndpoint>,
    /// Tunnel towards the untrusted segment
    pub insecure: Option<TunnelEndpoint>,
    /// Port control messages are received on
    pub message_ingress_port: u16,
    /// Port control messages are sent from
    pub message_egress_port: u16,
    /// Socket options
    pub udp: UdpOptions,
    /// Retry budget for access requests
    pub requests: RequestConfig,
    /// Signature scheme and pinned keys
    pub crypto: CryptoConfig,
    /// Frames that skip access control
    pub bypass: BypassPredicate,
}

impl Default for PepConfig {
    fn default() -> Self {
        Self {
            scope: None,
            authorization: None,
            authentication: None,
            forward_only: false,
            secure: None,
            insecure: None,
            message_ingress_port: MESSAGE_INGRESS_PORT,
            message_egress_port: MESSAGE_EGRESS_PORT,
            udp: UdpOptions::default(),
            requests: RequestConfig::default(),
            crypto: CryptoConfig::default(),
            bypass: BypassPredicate::standard(),
        }
    }
}

impl PepConfig {
    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse TOML configuration text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PalisadeError::serialization(e.to_string()))
    }

    /// Both tunnel endpoints, or an error naming the missing one.
    pub fn tunnels(&self) -> Result<(TunnelEndpoint, TunnelEndpoint)> {
        let secure = self
            .secure
            .ok_or_else(|| PalisadeError::invalid("secure interface not configured"))?;
        let insecure = self
            .insecure
            .ok_or_else(|| PalisadeError::invalid("insecure interface not configured"))?;
        Ok((secure, insecure))
    }

    /// Check that the configuration can start an enforcement point.
    pub fn validate(&self) -> Result<()> {
        self.tunnels()?;
        if !self.forward_only {
            self.bridge_config()?;
        }
        Ok(())
    }

    /// Settings for a [`NetworkBridge`](crate::NetworkBridge).
    pub fn bridge_config(&self) -> Result<BridgeConfig> {
        let scope = self
            .scope
            .ok_or_else(|| PalisadeError::invalid("scope not configured"))?;
        let authority = self
            .authorization
            .ok_or_else(|| PalisadeError::invalid("authorization host not configured"))?;
        Ok(BridgeConfig {
            scope,
            authority,
            authentication: self.authentication,
            message_ingress_port: self.message_ingress_port,
            message_egress_port: self.message_egress_port,
            udp: self.udp,
            requests: self.requests,
            crypto: self.crypto.clone(),
            bypass: self.bypass.clone(),
        })
    }
}
