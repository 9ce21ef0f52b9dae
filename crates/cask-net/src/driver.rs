//! Network model types and the driver seam.
//!
//! A [`Network`] is what gets persisted under the runtime's network config
//! directory (one JSON file per network, named after the network). An
//! [`Endpoint`] is the transient attachment of one container to one network;
//! endpoints are not persisted.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use cask_common::error::Result;

/// How many characters of the endpoint id name the veth devices.
const DEVICE_NAME_LEN: usize = 5;

/// Prefix for the container-side veth leg.
const PEER_PREFIX: &str = "cif-";

/// A named virtual network managed by one driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// User-chosen name, also the name of the bridge device and the
    /// config file on disk.
    pub name: String,
    /// Gateway address carrying the subnet prefix, e.g. `192.168.1.1/24`.
    /// The address part is the gateway, not the network address.
    pub ip_range: Ipv4Network,
    /// Name of the driver that created this network.
    pub driver: String,
}

/// One container's attachment to one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `<container-id>-<network-name>`.
    pub id: String,
    /// Address allocated to the container inside the network's subnet.
    pub ip: Ipv4Addr,
    /// Host-side veth leg, enslaved to the bridge.
    pub host_device: String,
    /// Container-side veth leg, moved into the container's netns.
    pub peer_device: String,
    /// `host:container` port publications requested for this container.
    pub port_mappings: Vec<String>,
}

impl Endpoint {
    /// Builds an endpoint for `container_id` joining `network_name`.
    ///
    /// Device names are derived from the first characters of the endpoint
    /// id so that the host and container legs of one veth pair can be
    /// matched up when debugging with `ip link`.
    pub fn new(
        container_id: &str,
        network_name: &str,
        ip: Ipv4Addr,
        port_mappings: Vec<String>,
    ) -> Self {
        let id = format!("{container_id}-{network_name}");
        let short: String = id.chars().take(DEVICE_NAME_LEN).collect();
        Self {
            id,
            ip,
            host_device: short.clone(),
            peer_device: format!("{PEER_PREFIX}{short}"),
            port_mappings,
        }
    }
}

/// Capability seam between the network manager and a concrete backend.
///
/// The manager owns allocation and persistence; drivers own the devices.
pub trait NetworkDriver {
    /// Driver name as referenced by `Network::driver`.
    fn name(&self) -> &'static str;

    /// Creates the backing devices for a network. `ip_range` carries the
    /// gateway address with the subnet prefix.
    fn create(&self, ip_range: Ipv4Network, name: &str) -> Result<Network>;

    /// Tears down the backing devices. Fails if they are already gone.
    fn delete(&self, network: &Network) -> Result<()>;

    /// Wires an endpoint's host side into the network. Moving the peer
    /// into the container is the manager's job.
    fn connect(&self, network: &Network, endpoint: &Endpoint) -> Result<()>;

    /// Detaches an endpoint. Drivers may treat this as a no-op when the
    /// devices die with the container's namespace anyway.
    fn disconnect(&self, network: &Network, endpoint: &Endpoint) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_derives_device_names_from_id() {
        let ep = Endpoint::new(
            "1a2b3c4d5e",
            "testnet",
            Ipv4Addr::new(192, 168, 1, 2),
            vec!["8080:80".to_string()],
        );
        assert_eq!(ep.id, "1a2b3c4d5e-testnet");
        assert_eq!(ep.host_device, "1a2b3");
        assert_eq!(ep.peer_device, "cif-1a2b3");
    }

    #[test]
    fn endpoint_tolerates_short_ids() {
        let ep = Endpoint::new("ab", "n", Ipv4Addr::new(10, 0, 0, 2), Vec::new());
        assert_eq!(ep.host_device, "ab-n");
        assert_eq!(ep.peer_device, "cif-ab-n");
    }

    #[test]
    fn network_round_trips_through_json() {
        let network = Network {
            name: "testnet".to_string(),
            ip_range: "192.168.1.1/24".parse().unwrap(),
            driver: "bridge".to_string(),
        };
        let json = serde_json::to_string(&network).unwrap();
        assert!(json.contains("\"192.168.1.1/24\""));
        let back: Network = serde_json::from_str(&json).unwrap();
        assert_eq!(back, network);
    }
}
