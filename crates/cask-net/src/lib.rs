//! # cask-net
//!
//! Container networking for the cask runtime: bitmap IPAM with on-disk
//! persistence, a raw rtnetlink layer for bridge and veth plumbing, a
//! bridge network driver, scoped network-namespace entry, and iptables NAT
//! rules for egress and port publishing.

pub mod bridge;
pub mod driver;
pub mod firewall;
pub mod ipam;
pub mod manager;
pub mod netlink;
pub mod netns;

pub use driver::{Endpoint, Network, NetworkDriver};
pub use ipam::Ipam;
pub use manager::NetworkManager;
