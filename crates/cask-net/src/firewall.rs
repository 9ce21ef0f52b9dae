//! iptables NAT rules for egress masquerading and port publishing.
//!
//! Rules are applied by shelling out to the system `iptables` binary, the
//! same way the long-standing container runtimes do. The argument vectors
//! are built by pure functions so the exact rules stay testable without
//! touching the kernel.

use std::net::Ipv4Addr;
use std::process::Command;

use ipnetwork::Ipv4Network;

use cask_common::error::{CaskError, Result};

/// Source NAT for traffic leaving `subnet` through any device other than
/// the bridge itself.
pub fn append_masquerade(subnet: Ipv4Network, bridge: &str) -> Result<()> {
    run_iptables(&masquerade_args(subnet, bridge))
}

/// DNAT from `host_port` on the host to `dest_ip:dest_port` inside a
/// container.
pub fn append_port_forward(host_port: &str, dest_ip: Ipv4Addr, dest_port: &str) -> Result<()> {
    run_iptables(&port_forward_args(host_port, dest_ip, dest_port))
}

fn masquerade_args(subnet: Ipv4Network, bridge: &str) -> Vec<String> {
    [
        "-t",
        "nat",
        "-A",
        "POSTROUTING",
        "-s",
        &subnet.to_string(),
        "!",
        "-o",
        bridge,
        "-j",
        "MASQUERADE",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn port_forward_args(host_port: &str, dest_ip: Ipv4Addr, dest_port: &str) -> Vec<String> {
    [
        "-t",
        "nat",
        "-A",
        "PREROUTING",
        "-p",
        "tcp",
        "-m",
        "tcp",
        "--dport",
        host_port,
        "-j",
        "DNAT",
        "--to-destination",
        &format!("{dest_ip}:{dest_port}"),
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn run_iptables(args: &[String]) -> Result<()> {
    let output = Command::new("iptables")
        .args(args)
        .output()
        .map_err(|err| CaskError::Network {
            message: format!("running iptables: {err}"),
        })?;
    if !output.status.success() {
        return Err(CaskError::Network {
            message: format!(
                "iptables {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masquerade_rule_excludes_the_bridge() {
        let args = masquerade_args("192.168.1.0/24".parse().unwrap(), "testnet");
        assert_eq!(
            args,
            vec![
                "-t",
                "nat",
                "-A",
                "POSTROUTING",
                "-s",
                "192.168.1.0/24",
                "!",
                "-o",
                "testnet",
                "-j",
                "MASQUERADE",
            ]
        );
    }

    #[test]
    fn port_forward_rule_targets_container_address() {
        let args = port_forward_args("8080", Ipv4Addr::new(192, 168, 1, 2), "80");
        assert_eq!(
            args,
            vec![
                "-t",
                "nat",
                "-A",
                "PREROUTING",
                "-p",
                "tcp",
                "-m",
                "tcp",
                "--dport",
                "8080",
                "-j",
                "DNAT",
                "--to-destination",
                "192.168.1.2:80",
            ]
        );
    }
}
