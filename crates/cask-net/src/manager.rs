//! Network lifecycle orchestration.
//!
//! The manager owns the address allocator and the on-disk network
//! configuration, and delegates device work to a [`NetworkDriver`]. Each
//! network is persisted as one JSON file named after the network inside
//! the runtime's network config directory.

use std::collections::BTreeMap;
use std::fs;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use ipnetwork::Ipv4Network;
use tracing::{error, info, warn};

use cask_common::config::RuntimePaths;
use cask_common::error::{CaskError, Result};

use crate::bridge::BridgeDriver;
use crate::driver::{Endpoint, Network, NetworkDriver};
use crate::firewall;
use crate::ipam::Ipam;
use crate::netlink::NetlinkHandle;
use crate::netns::{open_netns, NetnsGuard};

/// Manages named networks and container attachments.
pub struct NetworkManager {
    config_dir: PathBuf,
    ipam: Ipam,
    drivers: Vec<Box<dyn NetworkDriver>>,
    networks: BTreeMap<String, Network>,
}

impl std::fmt::Debug for NetworkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkManager")
            .field("config_dir", &self.config_dir)
            .field("networks", &self.networks)
            .finish_non_exhaustive()
    }
}

impl NetworkManager {
    /// Loads all persisted networks from the runtime directories. Files
    /// that cannot be read or parsed are skipped with a warning so one
    /// corrupt entry does not block every other network.
    pub fn new(paths: &RuntimePaths) -> Result<Self> {
        let config_dir = paths.network_dir();
        fs::create_dir_all(&config_dir).map_err(|err| CaskError::Io {
            path: config_dir.clone(),
            source: err,
        })?;
        let networks = load_networks(&config_dir)?;
        Ok(Self {
            config_dir,
            ipam: Ipam::new(paths.ipam_file()),
            drivers: vec![Box::new(BridgeDriver)],
            networks,
        })
    }

    /// Creates a network on `subnet` using the named driver. The first
    /// address of the subnet is allocated as the gateway.
    pub fn create(&mut self, driver_name: &str, subnet: Ipv4Network, name: &str) -> Result<Network> {
        let driver = self.driver(driver_name)?;
        let gateway = self.ipam.allocate(subnet)?;
        let ip_range =
            Ipv4Network::new(gateway, subnet.prefix()).map_err(|err| CaskError::Network {
                message: format!("invalid gateway range: {err}"),
            })?;
        let network = driver.create(ip_range, name)?;
        self.persist(&network)?;
        let _ = self.networks.insert(name.to_string(), network.clone());
        info!(network = name, subnet = %subnet, gateway = %gateway, "network created");
        Ok(network)
    }

    /// Deletes a network: releases the gateway address, tears down the
    /// devices and removes the config file.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let network = self
            .networks
            .get(name)
            .cloned()
            .ok_or_else(|| no_such_network(name))?;
        self.ipam
            .release(network.ip_range, network.ip_range.ip())?;
        self.driver(&network.driver)?.delete(&network)?;

        let path = self.config_dir.join(&network.name);
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                return Err(CaskError::Io { path, source: err });
            }
        }
        let _ = self.networks.remove(name);
        info!(network = name, "network deleted");
        Ok(())
    }

    /// All known networks, sorted by name.
    pub fn list(&self) -> Vec<&Network> {
        self.networks.values().collect()
    }

    /// Attaches a running container to a network: allocates an address,
    /// creates the veth pair, configures the container side of it inside
    /// the container's network namespace and applies port publications.
    pub fn connect(
        &self,
        network_name: &str,
        container_id: &str,
        pid: i32,
        port_mappings: &[String],
    ) -> Result<()> {
        let network = self
            .networks
            .get(network_name)
            .ok_or_else(|| no_such_network(network_name))?;
        let ip = self.ipam.allocate(network.ip_range)?;
        let endpoint = Endpoint::new(container_id, network_name, ip, port_mappings.to_vec());

        self.driver(&network.driver)?.connect(network, &endpoint)?;
        configure_endpoint(network, &endpoint, pid)?;
        apply_port_mappings(&endpoint);

        info!(
            network = network_name,
            container = container_id,
            ip = %ip,
            "container connected"
        );
        Ok(())
    }

    fn driver(&self, name: &str) -> Result<&dyn NetworkDriver> {
        self.drivers
            .iter()
            .find(|driver| driver.name() == name)
            .map(AsRef::as_ref)
            .ok_or_else(|| CaskError::NotFound {
                kind: "network driver",
                id: name.to_string(),
            })
    }

    fn persist(&self, network: &Network) -> Result<()> {
        let path = self.config_dir.join(&network.name);
        let data = serde_json::to_string(network)?;
        fs::write(&path, data).map_err(|err| CaskError::Io { path, source: err })
    }
}

fn no_such_network(name: &str) -> CaskError {
    CaskError::NotFound {
        kind: "network",
        id: name.to_string(),
    }
}

fn load_networks(config_dir: &Path) -> Result<BTreeMap<String, Network>> {
    let mut networks = BTreeMap::new();
    let entries = fs::read_dir(config_dir).map_err(|err| CaskError::Io {
        path: config_dir.to_path_buf(),
        source: err,
    })?;
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable network config");
                continue;
            }
        };
        match serde_json::from_str::<Network>(&data) {
            Ok(network) => {
                let _ = networks.insert(network.name.clone(), network);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping corrupt network config");
            }
        }
    }
    Ok(networks)
}

/// Moves the container leg of the veth pair into the container's network
/// namespace and configures address, link state and default route there.
fn configure_endpoint(network: &Network, endpoint: &Endpoint, pid: i32) -> Result<()> {
    let mut host_handle = NetlinkHandle::new()?;
    let peer = host_handle.get_ifindex(&endpoint.peer_device)?;
    let ns = open_netns(pid)?;
    host_handle.move_link_to_netns(peer, ns.as_fd())?;

    let _guard = NetnsGuard::enter(&ns)?;
    // Netlink sockets stay bound to the namespace they were opened in, so
    // everything from here on needs a fresh handle.
    let mut ns_handle = NetlinkHandle::new()?;
    let peer = ns_handle.get_ifindex(&endpoint.peer_device)?;
    let address = Ipv4Network::new(endpoint.ip, network.ip_range.prefix()).map_err(|err| {
        CaskError::Network {
            message: format!("invalid endpoint address: {err}"),
        }
    })?;
    ns_handle.add_address(peer, address)?;
    ns_handle.set_link_up(peer)?;
    let lo = ns_handle.get_ifindex("lo")?;
    ns_handle.set_link_up(lo)?;
    ns_handle.add_default_route(network.ip_range.ip(), peer)?;
    Ok(())
}

/// Applies `host:container` DNAT rules. Malformed mappings and iptables
/// failures are logged and skipped so a bad rule never strands a container
/// that is already wired up.
fn apply_port_mappings(endpoint: &Endpoint) {
    for mapping in &endpoint.port_mappings {
        let parts: Vec<&str> = mapping.split(':').collect();
        let [host_port, container_port] = parts.as_slice() else {
            error!(mapping, "port mapping is not in host:container format");
            continue;
        };
        if let Err(err) = firewall::append_port_forward(host_port, endpoint.ip, container_port) {
            error!(mapping, error = %err, "failed to apply port mapping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths(dir: &TempDir) -> RuntimePaths {
        RuntimePaths::rooted(dir.path())
    }

    fn sample_network(name: &str, range: &str) -> Network {
        Network {
            name: name.to_string(),
            ip_range: range.parse().unwrap(),
            driver: "bridge".to_string(),
        }
    }

    #[test]
    fn starts_empty_on_a_fresh_directory() {
        let dir = TempDir::new().unwrap();
        let manager = NetworkManager::new(&paths(&dir)).unwrap();
        assert!(manager.list().is_empty());
    }

    #[test]
    fn loads_persisted_networks_by_name() {
        let dir = TempDir::new().unwrap();
        let runtime_paths = paths(&dir);
        {
            let manager = NetworkManager::new(&runtime_paths).unwrap();
            manager.persist(&sample_network("alpha", "10.1.0.1/24")).unwrap();
            manager.persist(&sample_network("beta", "10.2.0.1/24")).unwrap();
        }
        let manager = NetworkManager::new(&runtime_paths).unwrap();
        let names: Vec<&str> = manager.list().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn corrupt_config_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let runtime_paths = paths(&dir);
        {
            let manager = NetworkManager::new(&runtime_paths).unwrap();
            manager.persist(&sample_network("good", "10.3.0.1/24")).unwrap();
        }
        std::fs::write(runtime_paths.network_dir().join("broken"), "not json").unwrap();

        let manager = NetworkManager::new(&runtime_paths).unwrap();
        let names: Vec<&str> = manager.list().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);
    }

    #[test]
    fn connect_to_unknown_network_fails() {
        let dir = TempDir::new().unwrap();
        let manager = NetworkManager::new(&paths(&dir)).unwrap();
        let err = manager.connect("nope", "abc123", 1, &[]).unwrap_err();
        assert!(matches!(err, CaskError::NotFound { kind: "network", .. }));
    }

    #[test]
    fn delete_unknown_network_fails() {
        let dir = TempDir::new().unwrap();
        let mut manager = NetworkManager::new(&paths(&dir)).unwrap();
        let err = manager.delete("nope").unwrap_err();
        assert!(matches!(err, CaskError::NotFound { kind: "network", .. }));
    }

    #[test]
    fn unknown_driver_fails() {
        let dir = TempDir::new().unwrap();
        let mut manager = NetworkManager::new(&paths(&dir)).unwrap();
        let err = manager
            .create("overlay", "10.4.0.0/24".parse().unwrap(), "nope")
            .unwrap_err();
        assert!(matches!(err, CaskError::NotFound { kind: "network driver", .. }));
    }

    #[test]
    fn create_and_delete_round_trip() {
        if unsafe { libc::geteuid() } != 0 {
            eprintln!("skipping create_and_delete_round_trip: requires root");
            return;
        }
        let dir = TempDir::new().unwrap();
        let runtime_paths = paths(&dir);
        let mut manager = NetworkManager::new(&runtime_paths).unwrap();
        let network = manager
            .create("bridge", "10.78.0.0/24".parse().unwrap(), "casktnet2")
            .unwrap();
        assert_eq!(network.ip_range.to_string(), "10.78.0.1/24");
        assert!(runtime_paths.network_dir().join("casktnet2").exists());

        manager.delete("casktnet2").unwrap();
        assert!(!runtime_paths.network_dir().join("casktnet2").exists());
        assert!(manager.list().is_empty());
    }
}
