//! Strongly-typed route message.

use std::net::IpAddr;

use crate::netlink::parse::{
    FromNetlink, PResult, parse_attrs, parse_header, parse_ip_addr, parse_u32_ne,
};
use crate::netlink::types::route::{
    RTA_DST, RTA_GATEWAY, RTA_OIF, RTA_SRC, RTA_TABLE, RouteProtocol, RouteScope, RouteType, RtMsg,
};

/// Route message with the attributes the bridge tracks.
#[derive(Debug, Clone, Default)]
pub struct RouteMessage {
    /// Fixed-size header.
    pub header: RtMsg,
    /// Destination address (RTA_DST).
    pub destination: Option<IpAddr>,
    /// Source address (RTA_SRC).
    pub source: Option<IpAddr>,
    /// Gateway address (RTA_GATEWAY).
    pub gateway: Option<IpAddr>,
    /// Output interface index (RTA_OIF).
    pub oif: Option<u32>,
    /// Routing table ID (RTA_TABLE).
    pub table: Option<u32>,
}

impl RouteMessage {
    /// Get the address family.
    pub fn family(&self) -> u8 {
        self.header.rtm_family
    }

    pub fn is_ipv4(&self) -> bool {
        self.header.rtm_family == libc::AF_INET as u8
    }

    pub fn is_ipv6(&self) -> bool {
        self.header.rtm_family == libc::AF_INET6 as u8
    }

    /// Get the destination prefix length.
    pub fn dst_len(&self) -> u8 {
        self.header.rtm_dst_len
    }

    /// Get the source prefix length.
    pub fn src_len(&self) -> u8 {
        self.header.rtm_src_len
    }

    pub fn route_type(&self) -> RouteType {
        RouteType::from(self.header.rtm_type)
    }

    pub fn protocol(&self) -> RouteProtocol {
        RouteProtocol::from(self.header.rtm_protocol)
    }

    pub fn scope(&self) -> RouteScope {
        RouteScope::from(self.header.rtm_scope)
    }

    /// Get the routing table ID. RTA_TABLE wins over the 8-bit header field.
    pub fn table_id(&self) -> u32 {
        self.table.unwrap_or(self.header.rtm_table as u32)
    }
}

impl FromNetlink for RouteMessage {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header: RtMsg = parse_header(input)?;
        let mut msg = RouteMessage {
            header,
            ..Default::default()
        };

        for (kind, data) in parse_attrs(input) {
            match kind {
                RTA_DST => msg.destination = parse_ip_addr(data, header.rtm_family).ok(),
                RTA_SRC => msg.source = parse_ip_addr(data, header.rtm_family).ok(),
                RTA_GATEWAY => msg.gateway = parse_ip_addr(data, header.rtm_family).ok(),
                RTA_OIF => msg.oif = parse_u32_ne(data),
                RTA_TABLE => msg.table = parse_u32_ne(data),
                _ => {}
            }
        }

        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::fixtures::route_payload;

    #[test]
    fn test_parse_route_with_gateway() {
        let payload = route_payload(
            "10.147.17.0/24".parse().unwrap(),
            Some("10.147.17.1".parse().unwrap()),
            Some(7),
        );
        let route = RouteMessage::from_bytes(&payload).unwrap();
        assert!(route.is_ipv4());
        assert_eq!(route.dst_len(), 24);
        assert_eq!(route.destination, Some("10.147.17.0".parse().unwrap()));
        assert_eq!(route.gateway, Some("10.147.17.1".parse().unwrap()));
        assert_eq!(route.oif, Some(7));
        assert_eq!(route.table_id(), 254);
        assert_eq!(route.protocol(), RouteProtocol::Static);
    }

    #[test]
    fn test_default_route_has_no_destination() {
        let payload = route_payload("::/0".parse().unwrap(), None, Some(2));
        let route = RouteMessage::from_bytes(&payload).unwrap();
        assert!(route.is_ipv6());
        assert_eq!(route.destination, None);
        assert_eq!(route.dst_len(), 0);
    }
}
