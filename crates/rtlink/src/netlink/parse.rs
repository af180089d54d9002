//! Parser combinators and the `FromNetlink` trait for typed message decoding.
//!
//! Message decoders take the fixed kernel header off the front of the
//! payload with [`parse_header`], then walk the attribute region with
//! [`parse_attrs`] until it runs out or turns malformed.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use super::attr::AttrIter;
use super::error::{Error, Result};

/// Result type for winnow parsers.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Trait for types that can be parsed from netlink wire format.
pub trait FromNetlink: Sized {
    /// Parse from a mutable byte slice reference.
    /// The slice is advanced past the consumed bytes.
    fn parse(input: &mut &[u8]) -> PResult<Self>;

    /// Parse from a complete message payload.
    fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut input = data;
        Self::parse(&mut input).map_err(|e| Error::Parse(format!("{}", e)))
    }
}

fn cut() -> ErrMode<ContextError> {
    ErrMode::Cut(ContextError::new())
}

/// Take a fixed-size kernel header off the front of the input.
pub fn parse_header<T>(input: &mut &[u8]) -> PResult<T>
where
    T: FromBytes + KnownLayout + Immutable + Copy,
{
    let size = std::mem::size_of::<T>();
    if input.len() < size {
        return Err(cut());
    }
    let bytes: &[u8] = take(size).parse_next(input)?;
    T::read_from_bytes(bytes).map_err(|_| cut())
}

/// Consume the rest of the input as an attribute region.
///
/// Iteration stops at the first malformed attribute; what follows it is
/// dropped along with the rest of the input.
pub fn parse_attrs<'a>(input: &mut &'a [u8]) -> AttrIter<'a> {
    AttrIter::new(std::mem::take(input))
}

/// Parse a u32 attribute payload in native endian.
pub fn parse_u32_ne(data: &[u8]) -> Option<u32> {
    data.get(..4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_ne_bytes)
}

/// Parse a string from a fixed-size buffer (null-terminated or not).
pub fn parse_string_from_bytes(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Parse an IP address based on address family.
pub fn parse_ip_addr(data: &[u8], family: u8) -> Result<IpAddr> {
    match family as i32 {
        libc::AF_INET => {
            let octets: [u8; 4] = data
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .ok_or(Error::Truncated {
                    expected: 4,
                    actual: data.len(),
                })?;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        libc::AF_INET6 => {
            let octets: [u8; 16] = data
                .get(..16)
                .and_then(|b| b.try_into().ok())
                .ok_or(Error::Truncated {
                    expected: 16,
                    actual: data.len(),
                })?;
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => Err(Error::InvalidMessage(format!(
            "unknown address family: {}",
            family
        ))),
    }
}

/// Format a MAC address as a string.
pub fn format_mac_addr(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}
