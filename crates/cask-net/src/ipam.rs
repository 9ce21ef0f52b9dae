//! Bitmap IP address allocation with JSON persistence.
//!
//! One allocator file maps canonical subnet strings to allocation bitmaps.
//! A bitmap is a string of `'0'`/`'1'` characters, one per address in the
//! subnet; index `i` stands for network address + i + 1, so index 0 is the
//! first usable host address. Every operation loads the file, mutates the
//! map and writes it straight back, keeping the file the single source of
//! truth between invocations.

use std::collections::BTreeMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use ipnetwork::Ipv4Network;
use tracing::debug;

use cask_common::error::{CaskError, Result};

/// Subnet key to allocation bitmap.
type SubnetMap = BTreeMap<String, String>;

/// Persistent per-subnet address allocator.
#[derive(Debug)]
pub struct Ipam {
    allocator_path: PathBuf,
}

impl Ipam {
    /// Creates an allocator backed by the given file. The file does not
    /// need to exist yet.
    pub fn new(allocator_path: PathBuf) -> Self {
        Self { allocator_path }
    }

    /// Allocates the lowest free address in `subnet`.
    ///
    /// The subnet is canonicalized first, so `192.168.1.5/24` and
    /// `192.168.1.0/24` share one bitmap. Returns an error when every
    /// address has been handed out.
    pub fn allocate(&self, subnet: Ipv4Network) -> Result<Ipv4Addr> {
        let subnet = canonical(subnet)?;
        let key = subnet.to_string();
        let mut subnets = self.load()?;

        let host_bits = 32 - u32::from(subnet.prefix());
        let bitmap = subnets
            .entry(key.clone())
            .or_insert_with(|| "0".repeat(1 << host_bits));

        let Some(index) = bitmap.find('0') else {
            return Err(CaskError::Network {
                message: format!("subnet {key} has no free addresses"),
            });
        };
        bitmap.replace_range(index..=index, "1");
        let ip = address_at(subnet.network(), index);

        self.dump(&subnets)?;
        debug!(subnet = %key, ip = %ip, "allocated address");
        Ok(ip)
    }

    /// Returns `ip` to the free pool of `subnet`.
    ///
    /// Releasing an address that was never allocated is accepted; releasing
    /// into a subnet the allocator has never seen is an error.
    pub fn release(&self, subnet: Ipv4Network, ip: Ipv4Addr) -> Result<()> {
        let subnet = canonical(subnet)?;
        let key = subnet.to_string();
        let mut subnets = self.load()?;

        let bitmap = subnets.get_mut(&key).ok_or_else(|| CaskError::Network {
            message: format!("no allocations recorded for subnet {key}"),
        })?;
        let index = index_of(subnet.network(), ip);
        if index >= bitmap.len() {
            return Err(CaskError::Network {
                message: format!("address {ip} is outside subnet {key}"),
            });
        }
        bitmap.replace_range(index..=index, "0");

        self.dump(&subnets)?;
        debug!(subnet = %key, ip = %ip, "released address");
        Ok(())
    }

    /// Reads the allocator file. A missing file is an empty map; anything
    /// unparsable is an error rather than a silent reset.
    fn load(&self) -> Result<SubnetMap> {
        let data = match fs::read_to_string(&self.allocator_path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SubnetMap::new());
            }
            Err(err) => {
                return Err(CaskError::Io {
                    path: self.allocator_path.clone(),
                    source: err,
                });
            }
        };
        Ok(serde_json::from_str(&data)?)
    }

    /// Writes the allocator file, creating parent directories as needed.
    fn dump(&self, subnets: &SubnetMap) -> Result<()> {
        if let Some(parent) = self.allocator_path.parent() {
            fs::create_dir_all(parent).map_err(|err| CaskError::Io {
                path: parent.to_path_buf(),
                source: err,
            })?;
        }
        let data = serde_json::to_string(subnets)?;
        fs::write(&self.allocator_path, data).map_err(|err| CaskError::Io {
            path: self.allocator_path.clone(),
            source: err,
        })
    }
}

/// Normalizes a subnet so the address part is the network address.
fn canonical(subnet: Ipv4Network) -> Result<Ipv4Network> {
    Ipv4Network::new(subnet.network(), subnet.prefix()).map_err(|err| CaskError::Network {
        message: format!("invalid subnet: {err}"),
    })
}

/// Address at bitmap position `index`: network address + index + 1.
fn address_at(network: Ipv4Addr, index: usize) -> Ipv4Addr {
    let mut octets = network.octets();
    for (i, octet) in octets.iter_mut().enumerate() {
        *octet = octet.wrapping_add((index >> ((3 - i) * 8)) as u8);
    }
    octets[3] = octets[3].wrapping_add(1);
    Ipv4Addr::from(octets)
}

/// Inverse of [`address_at`]. Addresses below the first host address wrap
/// around and land outside any plausible bitmap.
fn index_of(network: Ipv4Addr, ip: Ipv4Addr) -> usize {
    let net = network.octets();
    let mut octets = ip.octets();
    octets[3] = octets[3].wrapping_sub(1);
    let mut index = 0usize;
    for i in 0..4 {
        index += usize::from(octets[i].wrapping_sub(net[i])) << ((3 - i) * 8);
    }
    index
}
