//! End-to-end allocator behavior over a real state file.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::Ipv4Addr;

use tempfile::TempDir;

use cask_common::config::RuntimePaths;
use cask_net::{Ipam, NetworkManager};

fn subnet(s: &str) -> ipnetwork::Ipv4Network {
    s.parse().unwrap()
}

#[test]
fn gateway_then_container_addresses() {
    let dir = TempDir::new().unwrap();
    let ipam = Ipam::new(dir.path().join("subnets.json"));
    let net = subnet("192.168.1.0/24");

    // The first allocation is the gateway, containers follow.
    assert_eq!(ipam.allocate(net).unwrap(), Ipv4Addr::new(192, 168, 1, 1));
    assert_eq!(ipam.allocate(net).unwrap(), Ipv4Addr::new(192, 168, 1, 2));
    assert_eq!(ipam.allocate(net).unwrap(), Ipv4Addr::new(192, 168, 1, 3));

    // A released address becomes the next allocation again.
    ipam.release(net, Ipv4Addr::new(192, 168, 1, 2)).unwrap();
    assert_eq!(ipam.allocate(net).unwrap(), Ipv4Addr::new(192, 168, 1, 2));
}

#[test]
fn state_file_uses_canonical_subnet_keys_and_bitmaps() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("subnets.json");
    let ipam = Ipam::new(path.clone());

    ipam.allocate(subnet("192.168.1.77/24")).unwrap();
    ipam.allocate(subnet("192.168.1.0/24")).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: std::collections::BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
    let bitmap = parsed.get("192.168.1.0/24").unwrap();
    assert_eq!(bitmap.len(), 256);
    assert!(bitmap.starts_with("11"));
    assert!(bitmap[2..].chars().all(|c| c == '0'));
}

#[test]
fn release_restores_the_state_file_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("subnets.json");
    let ipam = Ipam::new(path.clone());
    let net = subnet("10.1.0.0/24");

    ipam.allocate(net).unwrap();
    let before = std::fs::read(&path).unwrap();

    let ip = ipam.allocate(net).unwrap();
    ipam.release(net, ip).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn every_address_is_distinct_until_the_subnet_is_full() {
    let dir = TempDir::new().unwrap();
    let ipam = Ipam::new(dir.path().join("subnets.json"));
    let net = subnet("10.0.0.0/29");

    let mut seen = std::collections::HashSet::new();
    for _ in 0..8 {
        let ip = ipam.allocate(net).unwrap();
        assert!(seen.insert(ip), "duplicate address {ip}");
    }
    assert!(ipam.allocate(net).is_err());
}

#[test]
fn allocations_survive_process_restarts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("subnets.json");
    let net = subnet("172.20.0.0/24");

    let first = Ipam::new(path.clone()).allocate(net).unwrap();
    let second = Ipam::new(path.clone()).allocate(net).unwrap();
    let third = Ipam::new(path).allocate(net).unwrap();
    assert_eq!(first, Ipv4Addr::new(172, 20, 0, 1));
    assert_eq!(second, Ipv4Addr::new(172, 20, 0, 2));
    assert_eq!(third, Ipv4Addr::new(172, 20, 0, 3));
}

#[test]
fn manager_reloads_networks_written_by_a_previous_run() {
    let dir = TempDir::new().unwrap();
    let paths = RuntimePaths::rooted(dir.path());

    // Seed a config file the way a previous run would have left it.
    std::fs::create_dir_all(paths.network_dir()).unwrap();
    std::fs::write(
        paths.network_dir().join("webnet"),
        r#"{"name":"webnet","ip_range":"192.168.5.1/24","driver":"bridge"}"#,
    )
    .unwrap();

    let manager = NetworkManager::new(&paths).unwrap();
    let networks = manager.list();
    assert_eq!(networks.len(), 1);
    assert_eq!(networks[0].name, "webnet");
    assert_eq!(networks[0].ip_range.ip(), Ipv4Addr::new(192, 168, 5, 1));
    assert_eq!(networks[0].driver, "bridge");
}
