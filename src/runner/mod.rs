//! Compose engine access
//!
//! The [`ComposeRunner`] trait is the seam between the reconciler and the
//! container engine. [`DockerCli`] drives the real `docker` binary.

pub mod docker;

use crate::error::RunError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub use docker::DockerCli;

/// Network protocol of a published port
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Parse a protocol suffix as used in `80/tcp`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// A host port forwarded into a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublishedPort {
    pub port: u16,
    pub protocol: Protocol,
}

impl PublishedPort {
    pub fn new(port: u16, protocol: Protocol) -> Self {
        Self { port, protocol }
    }
}

impl std::fmt::Display for PublishedPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// Set of published ports, ordered for stable output
pub type PortSet = BTreeSet<PublishedPort>;

/// One host-side binding of a container port, as reported by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HostBinding {
    #[serde(rename = "HostIp", default)]
    pub host_ip: String,
    #[serde(rename = "HostPort", default)]
    pub host_port: String,
}

impl HostBinding {
    pub fn new(host_ip: &str, host_port: &str) -> Self {
        Self {
            host_ip: host_ip.to_string(),
            host_port: host_port.to_string(),
        }
    }
}

/// Raw port map of a container: `"80/tcp"` to its host bindings.
///
/// A `None` value means the port is exposed but not forwarded.
pub type PortBindings = BTreeMap<String, Option<Vec<HostBinding>>>;

/// Derive the published port set from a container's raw port map
///
/// Bindings that differ only in host IP collapse into one entry. Unknown
/// protocols and unparsable ports are skipped.
pub fn published_ports(bindings: &PortBindings) -> PortSet {
    let mut ports = PortSet::new();

    for (key, forwards) in bindings {
        let Some(forwards) = forwards else {
            continue;
        };

        let protocol = match key.split_once('/') {
            Some((_, proto)) => Protocol::parse(proto),
            None => Some(Protocol::Tcp),
        };
        let Some(protocol) = protocol else {
            tracing::debug!("skipping port binding {} with unsupported protocol", key);
            continue;
        };

        for forward in forwards {
            match forward.host_port.parse::<u16>() {
                Ok(port) => {
                    ports.insert(PublishedPort::new(port, protocol));
                }
                Err(_) => {
                    tracing::debug!(
                        "skipping binding of {} with host port '{}'",
                        key,
                        forward.host_port
                    );
                }
            }
        }
    }

    ports
}

/// A running container and the ports it publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSnapshot {
    pub name: String,
    pub published_ports: PortSet,
}

impl ContainerSnapshot {
    /// Build a snapshot from a container name and its raw port map
    pub fn from_bindings(name: &str, bindings: &PortBindings) -> Self {
        Self {
            name: name.trim_start_matches('/').to_string(),
            published_ports: published_ports(bindings),
        }
    }
}

/// Union of the published ports of all containers
pub fn port_set(containers: &[ContainerSnapshot]) -> PortSet {
    containers
        .iter()
        .flat_map(|c| c.published_ports.iter().copied())
        .collect()
}

/// Operations the reconciler needs from the compose engine
#[async_trait]
pub trait ComposeRunner: Send + Sync {
    /// Bring the services of a compose file up in detached mode
    async fn up(&self, compose_file: &Path) -> Result<(), RunError>;

    /// List running containers with their published ports
    async fn list_containers(&self) -> Result<Vec<ContainerSnapshot>, RunError>;

    /// Version reported by the engine
    async fn version(&self) -> Result<String, RunError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(entries: &[(&str, Option<Vec<HostBinding>>)]) -> PortBindings {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_ipv4_and_ipv6_bindings_collapse() {
        let raw = bindings(&[(
            "80/tcp",
            Some(vec![
                HostBinding::new("0.0.0.0", "8080"),
                HostBinding::new("::", "8080"),
            ]),
        )]);

        let ports = published_ports(&raw);
        assert_eq!(ports.len(), 1);
        assert!(ports.contains(&PublishedPort::new(8080, Protocol::Tcp)));
    }

    #[test]
    fn test_absent_and_empty_bindings_are_tolerated() {
        let raw = bindings(&[
            ("443/tcp", None),
            ("53/udp", Some(vec![])),
            ("80/tcp", Some(vec![HostBinding::new("0.0.0.0", "8080")])),
        ]);

        let ports = published_ports(&raw);
        assert_eq!(ports.into_iter().collect::<Vec<_>>(), vec![PublishedPort::new(8080, Protocol::Tcp)]);

        let none = ContainerSnapshot::from_bindings("/idle", &PortBindings::new());
        assert_eq!(none.name, "idle");
        assert!(none.published_ports.is_empty());
    }

    #[test]
    fn test_same_port_different_protocols_are_distinct() {
        let raw = bindings(&[
            ("53/tcp", Some(vec![HostBinding::new("0.0.0.0", "5353")])),
            ("53/udp", Some(vec![HostBinding::new("0.0.0.0", "5353")])),
        ]);

        let ports = published_ports(&raw);
        assert_eq!(ports.len(), 2);
    }

    #[test]
    fn test_one_internal_port_to_many_host_ports() {
        let raw = bindings(&[(
            "80/tcp",
            Some(vec![
                HostBinding::new("127.0.0.1", "8080"),
                HostBinding::new("0.0.0.0", "9090"),
            ]),
        )]);

        assert_eq!(published_ports(&raw).len(), 2);
    }

    #[test]
    fn test_unsupported_entries_are_skipped() {
        let raw = bindings(&[
            ("9/sctp", Some(vec![HostBinding::new("0.0.0.0", "9999")])),
            ("81/tcp", Some(vec![HostBinding::new("0.0.0.0", "")])),
        ]);

        assert!(published_ports(&raw).is_empty());
    }

    #[test]
    fn test_port_set_unions_containers() {
        let web = ContainerSnapshot::from_bindings(
            "web",
            &bindings(&[("80/tcp", Some(vec![HostBinding::new("0.0.0.0", "8080")]))]),
        );
        let proxy = ContainerSnapshot::from_bindings(
            "proxy",
            &bindings(&[
                ("80/tcp", Some(vec![HostBinding::new("::", "8080")])),
                ("53/udp", Some(vec![HostBinding::new("0.0.0.0", "53")])),
            ]),
        );

        let ports = port_set(&[web, proxy]);
        assert_eq!(
            ports.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["53/udp", "8080/tcp"]
        );
    }
}
