//! Request encoders for the operations a session issues.
//!
//! Each builder sizes its buffer once for the largest attribute set the
//! request kind can carry.

use std::net::IpAddr;

use ipnet::IpNet;

use super::attr::nla_space;
use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{NLM_F_DUMP, NLM_F_REQUEST, NlMsgType};
use super::socket::rtnetlink_groups::{
    RTMGRP_IPV4_IFADDR, RTMGRP_IPV4_ROUTE, RTMGRP_IPV6_IFADDR, RTMGRP_IPV6_ROUTE,
};
use super::types::addr::{
    IFA_ADDRESS, IFA_BROADCAST, IFA_LABEL, IFA_LOCAL, IfAddrMsg, ifa_flags,
};
use super::types::link::{IFNAMSIZ, IfInfoMsg};
use super::types::route::{
    RT_TABLE_MAIN, RTA_DST, RTA_GATEWAY, RTA_OIF, RTA_SRC, RouteProtocol, RouteScope, RouteType,
    RtMsg,
};

/// A route to install in or remove from the main table.
///
/// ```ignore
/// use rtlink::Route;
///
/// let route = Route::new()
///     .destination("10.147.17.0/24".parse()?)
///     .gateway("10.147.17.1".parse()?)
///     .interface("zt0");
/// session.add_route(&route).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    /// Target prefix. A route without one is never sent.
    pub destination: Option<IpNet>,
    /// Next hop. Takes precedence over `source`.
    pub gateway: Option<IpAddr>,
    /// Source prefix, used only without a gateway.
    pub source: Option<IpNet>,
    /// Output interface name; ignored when it does not resolve.
    pub interface: Option<String>,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn destination(mut self, destination: IpNet) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn gateway(mut self, gateway: IpAddr) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn source(mut self, source: IpNet) -> Self {
        self.source = Some(source);
        self
    }

    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interface = Some(name.into());
        self
    }

    /// Encode a route request for `destination`.
    ///
    /// Attribute order is RTA_DST, then RTA_GATEWAY or RTA_SRC, then
    /// RTA_OIF when `oif` is known.
    pub(crate) fn build(
        &self,
        destination: IpNet,
        msg_type: u16,
        flags: u16,
        oif: Option<u32>,
    ) -> Result<MessageBuilder> {
        let family = family_of(destination.addr());
        // Gateway wins over source
        let source = match self.gateway {
            Some(gateway) if family_of(gateway) != family => {
                return Err(Error::InvalidAttribute(format!(
                    "gateway {} does not match destination family",
                    gateway
                )));
            }
            Some(_) => None,
            None => self.source,
        };
        if let Some(source) = source.filter(|s| family_of(s.addr()) != family) {
            return Err(Error::InvalidAttribute(format!(
                "source {} does not match destination family",
                source
            )));
        }

        let addr_len = octets(destination.addr()).len();
        let mut builder = MessageBuilder::with_capacity(
            msg_type,
            flags,
            RtMsg::SIZE + 2 * nla_space(addr_len) + nla_space(4),
        );

        let mut header = RtMsg::new()
            .with_family(family)
            .with_dst_len(destination.prefix_len())
            .with_table(RT_TABLE_MAIN)
            .with_protocol(RouteProtocol::Static)
            .with_scope(RouteScope::Universe)
            .with_type(RouteType::Unicast);
        if let Some(source) = source {
            header = header.with_src_len(source.prefix_len());
        }
        builder.append(&header);

        builder.append_attr(RTA_DST, &octets(destination.addr()));
        if let Some(gateway) = self.gateway {
            builder.append_attr(RTA_GATEWAY, &octets(gateway));
        } else if let Some(source) = source {
            builder.append_attr(RTA_SRC, &octets(source.addr()));
        }
        if let Some(oif) = oif {
            builder.append_attr_u32(RTA_OIF, oif);
        }

        Ok(builder)
    }
}

/// Encode an address request against interface `index`.
///
/// IPv4 carries IFA_LOCAL alongside IFA_ADDRESS, plus IFA_BROADCAST below
/// /31. The label is the interface name without a terminator.
pub(crate) fn address_request(
    msg_type: u16,
    flags: u16,
    address: IpNet,
    index: u32,
    label: &str,
) -> MessageBuilder {
    let bytes = octets(address.addr());
    let mut builder = MessageBuilder::with_capacity(
        msg_type,
        flags,
        IfAddrMsg::SIZE + 3 * nla_space(bytes.len()) + nla_space(IFNAMSIZ),
    );

    let header = IfAddrMsg::new()
        .with_family(family_of(address.addr()))
        .with_prefixlen(address.prefix_len())
        .with_flags(ifa_flags::PERMANENT)
        .with_index(index);
    builder.append(&header);

    builder.append_attr(IFA_ADDRESS, &bytes);
    if let IpNet::V4(v4) = address {
        builder.append_attr(IFA_LOCAL, &bytes);
        if v4.prefix_len() < 31 {
            builder.append_attr(IFA_BROADCAST, &v4.broadcast().octets());
        }
    }
    builder.append_attr_string(IFA_LABEL, label);

    builder
}

/// Dump every link.
pub(crate) fn link_dump() -> MessageBuilder {
    let mut builder = MessageBuilder::with_capacity(
        NlMsgType::RTM_GETLINK,
        NLM_F_REQUEST | NLM_F_DUMP,
        IfInfoMsg::SIZE,
    );
    builder.append(&IfInfoMsg::new().with_family(libc::AF_UNSPEC as u8));
    builder
}

/// Dump every route of one family.
pub(crate) fn route_dump(family: u8) -> MessageBuilder {
    let mut builder = MessageBuilder::with_capacity(
        NlMsgType::RTM_GETROUTE,
        NLM_F_REQUEST | NLM_F_DUMP,
        RtMsg::SIZE,
    );
    builder.append(&RtMsg::new().with_family(family));
    builder
}

/// Address notification group for the family of `addr`.
pub(crate) fn ifaddr_group(addr: IpAddr) -> u32 {
    match addr {
        IpAddr::V4(_) => RTMGRP_IPV4_IFADDR,
        IpAddr::V6(_) => RTMGRP_IPV6_IFADDR,
    }
}

/// Route notification group for `family`.
pub(crate) fn route_group(family: u8) -> u32 {
    if family == libc::AF_INET6 as u8 {
        RTMGRP_IPV6_ROUTE
    } else {
        RTMGRP_IPV4_ROUTE
    }
}

pub(crate) fn family_of(addr: IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => libc::AF_INET as u8,
        IpAddr::V6(_) => libc::AF_INET6 as u8,
    }
}

fn octets(addr: IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}
