//! Strongly-typed link message.

use crate::netlink::parse::{
    FromNetlink, PResult, parse_attrs, parse_header, parse_string_from_bytes, parse_u32_ne,
};
use crate::netlink::types::link::{IFLA_ADDRESS, IFLA_IFNAME, IFLA_MTU, IFNAMSIZ, IfInfoMsg};

/// Link message with the attributes the bridge tracks.
#[derive(Debug, Clone, Default)]
pub struct LinkMessage {
    /// Fixed-size header.
    pub header: IfInfoMsg,
    /// Interface name (IFLA_IFNAME).
    pub name: Option<String>,
    /// Hardware address (IFLA_ADDRESS), any length.
    pub address: Option<Vec<u8>>,
    /// MTU (IFLA_MTU).
    pub mtu: Option<u32>,
}

impl LinkMessage {
    /// Get the interface index.
    pub fn ifindex(&self) -> u32 {
        self.header.ifi_index as u32
    }

    /// Get the hardware address as a 6-byte MAC.
    ///
    /// Addresses of any other length (loopback, tun, ip6tnl) read as all
    /// zeros.
    pub fn mac(&self) -> [u8; 6] {
        self.address
            .as_deref()
            .filter(|a| a.len() == 6)
            .and_then(|a| a.try_into().ok())
            .unwrap_or([0; 6])
    }
}

impl FromNetlink for LinkMessage {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header: IfInfoMsg = parse_header(input)?;
        let mut msg = LinkMessage {
            header,
            ..Default::default()
        };

        for (kind, data) in parse_attrs(input) {
            match kind {
                IFLA_IFNAME => {
                    let mut name = parse_string_from_bytes(data);
                    if name.len() >= IFNAMSIZ {
                        let mut end = IFNAMSIZ - 1;
                        while !name.is_char_boundary(end) {
                            end -= 1;
                        }
                        name.truncate(end);
                    }
                    msg.name = Some(name);
                }
                IFLA_ADDRESS => msg.address = Some(data.to_vec()),
                IFLA_MTU => msg.mtu = parse_u32_ne(data),
                _ => {}
            }
        }

        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::fixtures::link_payload;

    #[test]
    fn test_parse_link() {
        let payload = link_payload(3, "zt0", Some([0x02, 0, 0, 0xaa, 0xbb, 0xcc]), 2800);
        let link = LinkMessage::from_bytes(&payload).unwrap();
        assert_eq!(link.ifindex(), 3);
        assert_eq!(link.name.as_deref(), Some("zt0"));
        assert_eq!(link.mac(), [0x02, 0, 0, 0xaa, 0xbb, 0xcc]);
        assert_eq!(link.mtu, Some(2800));
    }

    #[test]
    fn test_link_without_hardware_address() {
        let payload = link_payload(1, "lo", None, 65536);
        let link = LinkMessage::from_bytes(&payload).unwrap();
        assert_eq!(link.mac(), [0; 6]);
    }

    #[test]
    fn test_overlong_name_is_bounded() {
        let payload = link_payload(9, "averyveryverylongname", None, 1500);
        let link = LinkMessage::from_bytes(&payload).unwrap();
        assert_eq!(link.name.as_deref(), Some("averyveryverylo"));
    }

    #[test]
    fn test_truncated_header_is_rejected() {
        assert!(LinkMessage::from_bytes(&[0u8; 8]).is_err());
    }
}
