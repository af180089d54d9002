//! Netlink attribute (rtattr) encoding and decoding.

use super::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4;

/// Total space taken by an attribute with a payload of `payload_len` bytes,
/// padding included.
#[inline]
pub const fn nla_space(payload_len: usize) -> usize {
    nla_align(NLA_HDRLEN + payload_len)
}

/// Netlink attribute header (mirrors struct rtattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

impl NlAttr {
    /// Create a new attribute header.
    pub fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// Get the attribute type without flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Append one attribute to `buf`, zero-padding the payload to alignment.
///
/// The header length covers header and payload but not the padding.
pub fn write_attr(buf: &mut Vec<u8>, attr_type: u16, data: &[u8]) {
    let attr = NlAttr::new(attr_type, data.len());
    buf.extend_from_slice(attr.as_bytes());
    buf.extend_from_slice(data);
    let aligned = nla_align(buf.len());
    buf.resize(aligned, 0);
}

/// Encode a list of attributes into a contiguous buffer.
pub fn encode(attrs: &[(u16, &[u8])]) -> Vec<u8> {
    let size = attrs.iter().map(|(_, data)| nla_space(data.len())).sum();
    let mut buf = Vec::with_capacity(size);
    for (attr_type, data) in attrs {
        write_attr(&mut buf, *attr_type, data);
    }
    buf
}

/// Iterator over netlink attributes in a buffer.
///
/// Stops at the first remainder too short for a header or for the payload
/// its header declares.
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    /// Create a new attribute iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    /// Returns (attribute type, payload data).
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLA_HDRLEN {
            return None;
        }

        let attr = match NlAttr::from_bytes(self.data) {
            Ok(a) => a,
            Err(_) => return None,
        };

        let len = attr.nla_len as usize;
        if len < NLA_HDRLEN || len > self.data.len() {
            self.data = &[];
            return None;
        }

        let payload = &self.data[NLA_HDRLEN..len];
        let aligned_len = nla_align(len);

        // The last attribute may omit its trailing padding
        if aligned_len >= self.data.len() {
            self.data = &[];
        } else {
            self.data = &self.data[aligned_len..];
        }

        Some((attr.kind(), payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::types::route::{RTA_DST, RTA_GATEWAY, RTA_OIF};

    #[test]
    fn test_encode_pads_to_alignment() {
        let buf = encode(&[(3, b"eth0\0")]);
        // 4 header + 5 payload = 9, padded to 12
        assert_eq!(buf.len(), 12);
        assert_eq!(u16::from_ne_bytes([buf[0], buf[1]]), 9);
        assert_eq!(u16::from_ne_bytes([buf[2], buf[3]]), 3);
        assert_eq!(&buf[9..], &[0, 0, 0]);
    }

    #[test]
    fn test_route_attrs_decode_in_order() {
        let dst = [10u8, 147, 17, 0];
        let gw = [10u8, 147, 17, 1];
        let oif = 7i32.to_ne_bytes();
        let buf = encode(&[(RTA_DST, &dst), (RTA_GATEWAY, &gw), (RTA_OIF, &oif)]);

        let attrs: Vec<_> = AttrIter::new(&buf).collect();
        assert_eq!(
            attrs,
            vec![
                (RTA_DST, &dst[..]),
                (RTA_GATEWAY, &gw[..]),
                (RTA_OIF, &oif[..]),
            ]
        );
    }

    #[test]
    fn test_ipv6_attr_needs_no_padding() {
        let addr = [0xfdu8; 16];
        let buf = encode(&[(RTA_DST, &addr)]);
        assert_eq!(buf.len(), 20);
        let (kind, payload) = AttrIter::new(&buf).next().unwrap();
        assert_eq!(kind, RTA_DST);
        assert_eq!(payload, &addr);
    }

    #[test]
    fn test_truncated_payload_stops_iteration() {
        let mut buf = encode(&[(1, &[1, 2, 3, 4]), (2, &[5, 6, 7, 8])]);
        buf.truncate(buf.len() - 2);

        let attrs: Vec<_> = AttrIter::new(&buf).collect();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].0, 1);
    }

    #[test]
    fn test_short_header_and_bogus_length_stop_iteration() {
        assert_eq!(AttrIter::new(&[8, 0]).count(), 0);
        // Declared length below header size
        assert_eq!(AttrIter::new(&[2, 0, 1, 0, 0, 0, 0, 0]).count(), 0);
    }

    #[test]
    fn test_flags_are_masked() {
        let buf = encode(&[(5 | NLA_F_NESTED, &[0; 4])]);
        let (kind, _) = AttrIter::new(&buf).next().unwrap();
        assert_eq!(kind, 5);
    }
}
