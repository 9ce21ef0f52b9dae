//! Minimal rtnetlink client for the device operations the bridge driver
//! needs: creating bridges and veth pairs, flipping links up, assigning
//! IPv4 addresses, installing a default route and moving a link into
//! another network namespace.
//!
//! Messages are built by hand against the `NETLINK_ROUTE` wire format and
//! sent over a raw socket. Every request carries `NLM_F_ACK` and the reply
//! is checked for an `NLMSG_ERROR` payload, so failures surface as the
//! kernel's errno rather than silence.

// Raw netlink requires libc socket calls and C-layout struct serialization.
#![allow(unsafe_code)]

use std::ffi::CString;
use std::io;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};

use ipnetwork::Ipv4Network;

use cask_common::error::{CaskError, Result};

const NETLINK_ROUTE: i32 = 0;

const RTM_NEWLINK: u16 = 16;
const RTM_DELLINK: u16 = 17;
const RTM_NEWADDR: u16 = 20;
const RTM_NEWROUTE: u16 = 24;
const NLMSG_ERROR: u16 = 2;

const NLM_F_REQUEST: u16 = 0x0001;
const NLM_F_ACK: u16 = 0x0004;
const NLM_F_EXCL: u16 = 0x0200;
const NLM_F_CREATE: u16 = 0x0400;

const IFF_UP: u32 = 0x1;

const IFLA_IFNAME: u16 = 3;
const IFLA_MASTER: u16 = 10;
const IFLA_LINKINFO: u16 = 18;
const IFLA_NET_NS_FD: u16 = 28;
const IFLA_INFO_KIND: u16 = 1;
const IFLA_INFO_DATA: u16 = 2;
const VETH_INFO_PEER: u16 = 1;

const IFA_ADDRESS: u16 = 1;
const IFA_LOCAL: u16 = 2;

const RTA_OIF: u16 = 4;
const RTA_GATEWAY: u16 = 5;

const RT_TABLE_MAIN: u8 = 254;
const RTPROT_BOOT: u8 = 3;
const RT_SCOPE_UNIVERSE: u8 = 0;
const RTN_UNICAST: u8 = 1;

const NLA_F_NESTED: u16 = 1 << 15;
const NLA_HDR_LEN: usize = 4;

#[repr(C)]
struct NlMsgHdr {
    nlmsg_len: u32,
    nlmsg_type: u16,
    nlmsg_flags: u16,
    nlmsg_seq: u32,
    nlmsg_pid: u32,
}

#[repr(C)]
struct IfInfoMsg {
    ifi_family: u8,
    _pad: u8,
    ifi_type: u16,
    ifi_index: i32,
    ifi_flags: u32,
    ifi_change: u32,
}

#[repr(C)]
struct IfAddrMsg {
    ifa_family: u8,
    ifa_prefixlen: u8,
    ifa_flags: u8,
    ifa_scope: u8,
    ifa_index: u32,
}

#[repr(C)]
struct RtMsg {
    rtm_family: u8,
    rtm_dst_len: u8,
    rtm_src_len: u8,
    rtm_tos: u8,
    rtm_table: u8,
    rtm_protocol: u8,
    rtm_scope: u8,
    rtm_type: u8,
    rtm_flags: u32,
}

#[repr(C)]
struct NlAttr {
    nla_len: u16,
    nla_type: u16,
}

/// A bound `NETLINK_ROUTE` socket.
///
/// Netlink sockets belong to the network namespace they were created in;
/// after entering another namespace a fresh handle must be opened to talk
/// to that namespace's devices.
#[derive(Debug)]
pub struct NetlinkHandle {
    fd: OwnedFd,
    seq: u32,
}

impl NetlinkHandle {
    /// Opens and binds a route socket in the current network namespace.
    pub fn new() -> Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                NETLINK_ROUTE,
            )
        };
        if fd < 0 {
            return Err(net_err("opening netlink socket", &io::Error::last_os_error()));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let mut addr: libc::sockaddr_nl = unsafe { std::mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                std::ptr::from_ref(&addr).cast::<libc::sockaddr>(),
                std::mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(net_err("binding netlink socket", &io::Error::last_os_error()));
        }
        Ok(Self { fd, seq: 0 })
    }

    /// Resolves an interface name to its index in the current namespace.
    pub fn get_ifindex(&self, name: &str) -> Result<i32> {
        let cname = CString::new(name).map_err(|_| CaskError::Network {
            message: format!("interface name {name:?} contains a nul byte"),
        })?;
        let index = unsafe { libc::if_nametoindex(cname.as_ptr()) };
        if index == 0 {
            return Err(CaskError::Network {
                message: format!("no such interface: {name}"),
            });
        }
        Ok(index as i32)
    }

    /// Creates a bridge device. Fails with `EEXIST` if the name is taken.
    pub fn create_bridge(&mut self, name: &str) -> Result<()> {
        let mut msg = self.begin(RTM_NEWLINK, NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL);
        push_struct(&mut msg, &if_info_msg(0, 0, 0));
        add_attr_string(&mut msg, IFLA_IFNAME, name);
        let linkinfo = nest_start(&mut msg, IFLA_LINKINFO);
        add_attr_string(&mut msg, IFLA_INFO_KIND, "bridge");
        nest_end(&mut msg, linkinfo);
        self.send_and_ack(msg)
            .map_err(|err| net_err(&format!("creating bridge {name}"), &err))
    }

    /// Creates a veth pair. `name` is the local leg, `peer` the other end;
    /// when `master` is given the local leg is enslaved to that device in
    /// the same request.
    pub fn create_veth(&mut self, name: &str, peer: &str, master: Option<i32>) -> Result<()> {
        let mut msg = self.begin(RTM_NEWLINK, NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL);
        push_struct(&mut msg, &if_info_msg(0, 0, 0));
        add_attr_string(&mut msg, IFLA_IFNAME, name);
        if let Some(master) = master {
            add_attr_u32(&mut msg, IFLA_MASTER, master as u32);
        }
        let linkinfo = nest_start(&mut msg, IFLA_LINKINFO);
        add_attr_string(&mut msg, IFLA_INFO_KIND, "veth");
        let info_data = nest_start(&mut msg, IFLA_INFO_DATA);
        // The peer is described by a full ifinfomsg plus its own attributes,
        // nested inside VETH_INFO_PEER.
        let peer_attr = nest_start(&mut msg, VETH_INFO_PEER);
        push_struct(&mut msg, &if_info_msg(0, 0, 0));
        add_attr_string(&mut msg, IFLA_IFNAME, peer);
        nest_end(&mut msg, peer_attr);
        nest_end(&mut msg, info_data);
        nest_end(&mut msg, linkinfo);
        self.send_and_ack(msg)
            .map_err(|err| net_err(&format!("creating veth pair {name}/{peer}"), &err))
    }

    /// Deletes a link by index.
    pub fn delete_link(&mut self, ifindex: i32) -> Result<()> {
        let mut msg = self.begin(RTM_DELLINK, NLM_F_REQUEST | NLM_F_ACK);
        push_struct(&mut msg, &if_info_msg(ifindex, 0, 0));
        self.send_and_ack(msg)
            .map_err(|err| net_err(&format!("deleting link index {ifindex}"), &err))
    }

    /// Brings a link administratively up.
    pub fn set_link_up(&mut self, ifindex: i32) -> Result<()> {
        let mut msg = self.begin(RTM_NEWLINK, NLM_F_REQUEST | NLM_F_ACK);
        push_struct(&mut msg, &if_info_msg(ifindex, IFF_UP, IFF_UP));
        self.send_and_ack(msg)
            .map_err(|err| net_err(&format!("bringing up link index {ifindex}"), &err))
    }

    /// Assigns an IPv4 address with the given prefix length to a link.
    pub fn add_address(&mut self, ifindex: i32, addr: Ipv4Network) -> Result<()> {
        let mut msg = self.begin(RTM_NEWADDR, NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL);
        push_struct(
            &mut msg,
            &IfAddrMsg {
                ifa_family: libc::AF_INET as u8,
                ifa_prefixlen: addr.prefix(),
                ifa_flags: 0,
                ifa_scope: 0,
                ifa_index: ifindex as u32,
            },
        );
        add_attr_bytes(&mut msg, IFA_LOCAL, &addr.ip().octets());
        add_attr_bytes(&mut msg, IFA_ADDRESS, &addr.ip().octets());
        self.send_and_ack(msg)
            .map_err(|err| net_err(&format!("assigning {addr} to link index {ifindex}"), &err))
    }

    /// Installs a default IPv4 route via `gateway` through `ifindex` into
    /// the main routing table.
    pub fn add_default_route(&mut self, gateway: Ipv4Addr, ifindex: i32) -> Result<()> {
        let mut msg = self.begin(RTM_NEWROUTE, NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL);
        push_struct(
            &mut msg,
            &RtMsg {
                rtm_family: libc::AF_INET as u8,
                rtm_dst_len: 0,
                rtm_src_len: 0,
                rtm_tos: 0,
                rtm_table: RT_TABLE_MAIN,
                rtm_protocol: RTPROT_BOOT,
                rtm_scope: RT_SCOPE_UNIVERSE,
                rtm_type: RTN_UNICAST,
                rtm_flags: 0,
            },
        );
        add_attr_bytes(&mut msg, RTA_GATEWAY, &gateway.octets());
        add_attr_u32(&mut msg, RTA_OIF, ifindex as u32);
        self.send_and_ack(msg)
            .map_err(|err| net_err(&format!("adding default route via {gateway}"), &err))
    }

    /// Moves a link into the network namespace behind `netns`, an open
    /// `/proc/<pid>/ns/net` descriptor. The link keeps its name but loses
    /// its addresses and state.
    pub fn move_link_to_netns(&mut self, ifindex: i32, netns: BorrowedFd<'_>) -> Result<()> {
        let mut msg = self.begin(RTM_NEWLINK, NLM_F_REQUEST | NLM_F_ACK);
        push_struct(&mut msg, &if_info_msg(ifindex, 0, 0));
        add_attr_u32(&mut msg, IFLA_NET_NS_FD, netns.as_raw_fd() as u32);
        self.send_and_ack(msg)
            .map_err(|err| net_err(&format!("moving link index {ifindex} into namespace"), &err))
    }

    fn begin(&mut self, msg_type: u16, flags: u16) -> Vec<u8> {
        self.seq = self.seq.wrapping_add(1);
        let mut msg = Vec::with_capacity(128);
        push_struct(
            &mut msg,
            &NlMsgHdr {
                nlmsg_len: 0,
                nlmsg_type: msg_type,
                nlmsg_flags: flags,
                nlmsg_seq: self.seq,
                nlmsg_pid: 0,
            },
        );
        msg
    }

    /// Finalizes the message length, sends it and waits for the kernel's
    /// ack, translating an error ack into the corresponding errno.
    fn send_and_ack(&self, mut msg: Vec<u8>) -> std::result::Result<(), io::Error> {
        let total = msg.len() as u32;
        msg[..4].copy_from_slice(&total.to_ne_bytes());

        let sent = unsafe {
            libc::send(self.fd.as_raw_fd(), msg.as_ptr().cast(), msg.len(), 0)
        };
        if sent < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut buf = [0u8; 4096];
        let received = unsafe {
            libc::recv(self.fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len(), 0)
        };
        if received < 0 {
            return Err(io::Error::last_os_error());
        }
        let received = received as usize;
        if received < std::mem::size_of::<NlMsgHdr>() + 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "short netlink reply",
            ));
        }

        let msg_type = u16::from_ne_bytes([buf[4], buf[5]]);
        if msg_type == NLMSG_ERROR {
            // The error code sits right after the reply header.
            let code = i32::from_ne_bytes([buf[16], buf[17], buf[18], buf[19]]);
            if code != 0 {
                return Err(io::Error::from_raw_os_error(-code));
            }
        }
        Ok(())
    }
}

fn if_info_msg(index: i32, flags: u32, change: u32) -> IfInfoMsg {
    IfInfoMsg {
        ifi_family: libc::AF_UNSPEC as u8,
        _pad: 0,
        ifi_type: 0,
        ifi_index: index,
        ifi_flags: flags,
        ifi_change: change,
    }
}

fn net_err(context: &str, err: &io::Error) -> CaskError {
    CaskError::Network {
        message: format!("{context}: {err}"),
    }
}

fn push_struct<T>(msg: &mut Vec<u8>, value: &T) {
    let bytes = unsafe {
        std::slice::from_raw_parts(std::ptr::from_ref(value).cast::<u8>(), std::mem::size_of::<T>())
    };
    msg.extend_from_slice(bytes);
}

/// Appends an attribute with a raw payload, padding to 4-byte alignment.
/// `nla_len` covers the header and payload but not the padding.
fn add_attr_bytes(msg: &mut Vec<u8>, nla_type: u16, payload: &[u8]) {
    push_struct(
        msg,
        &NlAttr {
            nla_len: (NLA_HDR_LEN + payload.len()) as u16,
            nla_type,
        },
    );
    msg.extend_from_slice(payload);
    pad_to_align(msg);
}

fn add_attr_string(msg: &mut Vec<u8>, nla_type: u16, value: &str) {
    let mut payload = value.as_bytes().to_vec();
    payload.push(0);
    add_attr_bytes(msg, nla_type, &payload);
}

fn add_attr_u32(msg: &mut Vec<u8>, nla_type: u16, value: u32) {
    add_attr_bytes(msg, nla_type, &value.to_ne_bytes());
}

/// Opens a nested attribute and returns its offset; the length is patched
/// in by [`nest_end`] once the children are in place.
fn nest_start(msg: &mut Vec<u8>, nla_type: u16) -> usize {
    let start = msg.len();
    push_struct(
        msg,
        &NlAttr {
            nla_len: 0,
            nla_type: nla_type | NLA_F_NESTED,
        },
    );
    start
}

fn nest_end(msg: &mut Vec<u8>, start: usize) {
    let len = (msg.len() - start) as u16;
    msg[start..start + 2].copy_from_slice(&len.to_ne_bytes());
}

fn pad_to_align(msg: &mut Vec<u8>) {
    while msg.len() % 4 != 0 {
        msg.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_root() -> bool {
        unsafe { libc::geteuid() == 0 }
    }

    #[test]
    fn opens_and_binds_a_route_socket() {
        let handle = NetlinkHandle::new().unwrap();
        assert!(handle.fd.as_raw_fd() >= 0);
    }

    #[test]
    fn resolves_loopback_index() {
        let handle = NetlinkHandle::new().unwrap();
        assert!(handle.get_ifindex("lo").unwrap() > 0);
    }

    #[test]
    fn unknown_interface_is_an_error() {
        let handle = NetlinkHandle::new().unwrap();
        assert!(handle.get_ifindex("no-such-dev0").is_err());
    }

    #[test]
    fn attributes_are_padded_to_four_bytes() {
        let mut msg = Vec::new();
        add_attr_string(&mut msg, IFLA_IFNAME, "ab");
        // 4 header bytes + "ab\0" payload, padded from 7 to 8.
        assert_eq!(msg.len(), 8);
        assert_eq!(u16::from_ne_bytes([msg[0], msg[1]]), 7);
        assert_eq!(&msg[4..7], b"ab\0");
        assert_eq!(msg[7], 0);
    }

    #[test]
    fn nested_attribute_length_covers_children() {
        let mut msg = Vec::new();
        let outer = nest_start(&mut msg, IFLA_LINKINFO);
        add_attr_string(&mut msg, IFLA_INFO_KIND, "veth");
        nest_end(&mut msg, outer);
        let nla_len = u16::from_ne_bytes([msg[0], msg[1]]);
        assert_eq!(usize::from(nla_len), msg.len());
        let nla_type = u16::from_ne_bytes([msg[2], msg[3]]);
        assert_eq!(nla_type, IFLA_LINKINFO | NLA_F_NESTED);
    }

    #[test]
    fn bridge_lifecycle() {
        if !is_root() {
            eprintln!("skipping bridge_lifecycle: requires root");
            return;
        }
        let mut handle = NetlinkHandle::new().unwrap();
        let name = "casktbr0";
        handle.create_bridge(name).unwrap();
        let index = handle.get_ifindex(name).unwrap();
        handle.set_link_up(index).unwrap();
        handle.delete_link(index).unwrap();
        assert!(handle.get_ifindex(name).is_err());
    }

    #[test]
    fn veth_pair_enslaved_to_bridge() {
        if !is_root() {
            eprintln!("skipping veth_pair_enslaved_to_bridge: requires root");
            return;
        }
        let mut handle = NetlinkHandle::new().unwrap();
        handle.create_bridge("casktbr1").unwrap();
        let bridge = handle.get_ifindex("casktbr1").unwrap();
        handle
            .create_veth("casktve0", "casktve1", Some(bridge))
            .unwrap();
        let host_leg = handle.get_ifindex("casktve0").unwrap();
        assert!(handle.get_ifindex("casktve1").unwrap() > 0);
        // Deleting one leg removes the pair.
        handle.delete_link(host_leg).unwrap();
        handle.delete_link(bridge).unwrap();
    }
}
