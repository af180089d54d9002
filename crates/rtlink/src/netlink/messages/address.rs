//! Strongly-typed address message.

use std::net::IpAddr;

use crate::netlink::parse::{
    FromNetlink, PResult, parse_attrs, parse_header, parse_ip_addr, parse_string_from_bytes,
};
use crate::netlink::types::addr::{IFA_ADDRESS, IFA_BROADCAST, IFA_LABEL, IFA_LOCAL, IfAddrMsg};

/// Address message with all attributes the bridge reads.
#[derive(Debug, Clone, Default)]
pub struct AddressMessage {
    /// Fixed-size header.
    pub header: IfAddrMsg,
    /// Address (IFA_ADDRESS). Peer address on point-to-point links.
    pub address: Option<IpAddr>,
    /// Local address (IFA_LOCAL).
    pub local: Option<IpAddr>,
    /// Label (IFA_LABEL).
    pub label: Option<String>,
    /// Broadcast address (IFA_BROADCAST).
    pub broadcast: Option<IpAddr>,
}

impl AddressMessage {
    /// Get the interface index.
    pub fn ifindex(&self) -> u32 {
        self.header.ifa_index
    }

    /// Get the prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.header.ifa_prefixlen
    }

    /// The address assigned to this host: local if present, else address.
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.local.or(self.address)
    }
}

impl FromNetlink for AddressMessage {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header: IfAddrMsg = parse_header(input)?;
        let mut msg = AddressMessage {
            header,
            ..Default::default()
        };

        for (kind, data) in parse_attrs(input) {
            match kind {
                IFA_ADDRESS => msg.address = parse_ip_addr(data, header.ifa_family).ok(),
                IFA_LOCAL => msg.local = parse_ip_addr(data, header.ifa_family).ok(),
                IFA_BROADCAST => msg.broadcast = parse_ip_addr(data, header.ifa_family).ok(),
                IFA_LABEL => msg.label = Some(parse_string_from_bytes(data)),
                _ => {}
            }
        }

        Ok(msg)
    }
}
