//! The bridge network driver.
//!
//! Each network is a Linux bridge named after the network. The gateway
//! address lives on the bridge; containers join through veth pairs whose
//! host leg is enslaved to the bridge at creation time.

use std::thread;
use std::time::Duration;

use ipnetwork::Ipv4Network;
use tracing::{debug, error, info};

use cask_common::error::{CaskError, Result};

use crate::driver::{Endpoint, Network, NetworkDriver};
use crate::firewall;
use crate::netlink::NetlinkHandle;

pub const DRIVER_NAME: &str = "bridge";

/// Attempts to find a freshly created bridge before giving up.
const LOOKUP_RETRIES: u32 = 2;
const LOOKUP_DELAY: Duration = Duration::from_secs(2);

/// Driver backing networks with a Linux bridge per network.
#[derive(Debug, Default)]
pub struct BridgeDriver;

impl NetworkDriver for BridgeDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn create(&self, ip_range: Ipv4Network, name: &str) -> Result<Network> {
        let mut handle = NetlinkHandle::new()?;
        ensure_bridge(&mut handle, name)?;
        let index = lookup_with_retry(&handle, name)?;
        handle.add_address(index, ip_range)?;
        handle.set_link_up(index)?;

        // Egress NAT is best effort; a missing iptables binary should not
        // take the whole network down.
        let subnet = Ipv4Network::new(ip_range.network(), ip_range.prefix())
            .map_err(|err| CaskError::Network {
                message: format!("invalid subnet: {err}"),
            })?;
        if let Err(err) = firewall::append_masquerade(subnet, name) {
            error!(network = name, error = %err, "failed to set up masquerade rule");
        }

        info!(network = name, ip_range = %ip_range, "bridge created");
        Ok(Network {
            name: name.to_string(),
            ip_range,
            driver: DRIVER_NAME.to_string(),
        })
    }

    fn delete(&self, network: &Network) -> Result<()> {
        let mut handle = NetlinkHandle::new()?;
        let index = handle.get_ifindex(&network.name)?;
        handle.delete_link(index)?;
        info!(network = %network.name, "bridge deleted");
        Ok(())
    }

    fn connect(&self, network: &Network, endpoint: &Endpoint) -> Result<()> {
        let mut handle = NetlinkHandle::new()?;
        let bridge = handle.get_ifindex(&network.name)?;
        handle.create_veth(&endpoint.host_device, &endpoint.peer_device, Some(bridge))?;
        let host_leg = handle.get_ifindex(&endpoint.host_device)?;
        handle.set_link_up(host_leg)?;
        debug!(
            network = %network.name,
            host = %endpoint.host_device,
            peer = %endpoint.peer_device,
            "veth pair attached to bridge"
        );
        Ok(())
    }

    fn disconnect(&self, _network: &Network, _endpoint: &Endpoint) -> Result<()> {
        // The veth pair dies with the container's network namespace.
        Ok(())
    }
}

/// Creates the bridge device unless a device with that name already
/// exists, in which case it is reused as is.
fn ensure_bridge(handle: &mut NetlinkHandle, name: &str) -> Result<()> {
    if handle.get_ifindex(name).is_ok() {
        debug!(bridge = name, "bridge already exists, reusing");
        return Ok(());
    }
    handle.create_bridge(name)
}

/// Looks the bridge up again after creation. Device registration can lag
/// the netlink ack, so a couple of delayed retries are allowed.
fn lookup_with_retry(handle: &NetlinkHandle, name: &str) -> Result<i32> {
    let mut last_err = None;
    for attempt in 0..=LOOKUP_RETRIES {
        match handle.get_ifindex(name) {
            Ok(index) => return Ok(index),
            Err(err) => {
                debug!(bridge = name, attempt, error = %err, "bridge not visible yet");
                last_err = Some(err);
                if attempt < LOOKUP_RETRIES {
                    thread::sleep(LOOKUP_DELAY);
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| CaskError::Network {
        message: format!("bridge {name} never appeared"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn is_root() -> bool {
        unsafe { libc::geteuid() == 0 }
    }

    #[test]
    fn driver_reports_its_name() {
        assert_eq!(BridgeDriver.name(), "bridge");
    }

    #[test]
    fn disconnect_is_a_no_op() {
        let network = Network {
            name: "testnet".to_string(),
            ip_range: "192.168.9.1/24".parse().unwrap(),
            driver: DRIVER_NAME.to_string(),
        };
        let endpoint = Endpoint::new("abc", "testnet", Ipv4Addr::new(192, 168, 9, 2), Vec::new());
        assert!(BridgeDriver.disconnect(&network, &endpoint).is_ok());
    }

    #[test]
    fn create_connect_delete_round_trip() {
        if !is_root() {
            eprintln!("skipping create_connect_delete_round_trip: requires root");
            return;
        }
        let driver = BridgeDriver;
        let ip_range: Ipv4Network = "10.77.0.1/24".parse().unwrap();
        let network = driver.create(ip_range, "casktnet0").unwrap();
        assert_eq!(network.driver, "bridge");

        // Creating again must reuse the existing bridge.
        driver.create(ip_range, "casktnet0").unwrap();

        let endpoint = Endpoint::new(
            "f00dfeed11",
            "casktnet0",
            Ipv4Addr::new(10, 77, 0, 2),
            Vec::new(),
        );
        driver.connect(&network, &endpoint).unwrap();

        let mut handle = NetlinkHandle::new().unwrap();
        let host_leg = handle.get_ifindex(&endpoint.host_device).unwrap();
        handle.delete_link(host_leg).unwrap();
        driver.delete(&network).unwrap();
        assert!(driver.delete(&network).is_err());
    }
}
