//! Interface and route caches fed by decoded kernel records.
//!
//! Each table sits behind its own `RwLock`, held for one mutation or one
//! scan and never across an `.await`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ipnet::IpNet;

use super::messages::{LinkMessage, RouteMessage};
use super::parse::format_mac_addr;
use super::types::route::{RouteProtocol, RouteScope, RouteType};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A network interface as last reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterfaceEntry {
    pub index: u32,
    pub name: String,
    /// All zeros for links without a 6-byte hardware address.
    pub mac: [u8; 6],
    /// `mac` as `aa:bb:cc:dd:ee:ff`.
    pub mac_str: String,
    pub mtu: u32,
}

impl InterfaceEntry {
    pub fn from_message(msg: &LinkMessage) -> Self {
        let mac = msg.mac();
        Self {
            index: msg.ifindex(),
            name: msg.name.clone().unwrap_or_default(),
            mac,
            mac_str: format_mac_addr(&mac),
            mtu: msg.mtu.unwrap_or(0),
        }
    }
}

/// Interface index to descriptor.
#[derive(Debug, Default)]
pub struct InterfaceTable {
    entries: RwLock<HashMap<u32, InterfaceEntry>>,
}

impl InterfaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for its index.
    pub fn upsert(&self, entry: InterfaceEntry) {
        write(&self.entries).insert(entry.index, entry);
    }

    /// Remove an entry. Unknown indexes are ignored.
    pub fn remove(&self, index: u32) -> Option<InterfaceEntry> {
        write(&self.entries).remove(&index)
    }

    pub fn get(&self, index: u32) -> Option<InterfaceEntry> {
        read(&self.entries).get(&index).cloned()
    }

    /// Index of the interface named exactly `name`.
    pub fn index_of(&self, name: &str) -> Option<u32> {
        read(&self.entries)
            .values()
            .find(|entry| entry.name == name)
            .map(|entry| entry.index)
    }

    /// Owned copy of every entry, sorted by index.
    pub fn snapshot(&self) -> Vec<InterfaceEntry> {
        let mut entries: Vec<_> = read(&self.entries).values().cloned().collect();
        entries.sort_by_key(|entry| entry.index);
        entries
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A kernel route as last reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteEntry {
    /// Destination prefix; the unspecified address when the kernel sent none.
    pub destination: IpNet,
    pub gateway: Option<IpAddr>,
    pub source: Option<IpAddr>,
    /// Output interface index, zero when absent.
    pub oif: u32,
    pub family: u8,
    pub table: u32,
    pub protocol: u8,
    pub scope: u8,
    pub route_type: u8,
}

impl RouteEntry {
    /// Build an entry from a decoded route record.
    ///
    /// Returns `None` for families other than IPv4 and IPv6 and for prefix
    /// lengths the family cannot hold.
    pub fn from_message(msg: &RouteMessage) -> Option<Self> {
        let unspecified: IpAddr = if msg.is_ipv4() {
            IpAddr::from([0u8; 4])
        } else if msg.is_ipv6() {
            IpAddr::from([0u8; 16])
        } else {
            return None;
        };
        let addr = msg.destination.unwrap_or(unspecified);
        let destination = IpNet::new(addr, msg.dst_len()).ok()?;

        Some(Self {
            destination,
            gateway: msg.gateway,
            source: msg.source,
            oif: msg.oif.unwrap_or(0),
            family: msg.family(),
            table: msg.table_id(),
            protocol: msg.header.rtm_protocol,
            scope: msg.header.rtm_scope,
            route_type: msg.header.rtm_type,
        })
    }

    /// Whether `other` names the same kernel route.
    pub fn same_route(&self, other: &RouteEntry) -> bool {
        self.destination == other.destination
            && self.table == other.table
            && self.gateway == other.gateway
            && self.oif == other.oif
    }

    pub fn protocol(&self) -> RouteProtocol {
        RouteProtocol::from(self.protocol)
    }

    pub fn scope(&self) -> RouteScope {
        RouteScope::from(self.scope)
    }

    pub fn route_type(&self) -> RouteType {
        RouteType::from(self.route_type)
    }
}

/// Route snapshot for one address family.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: RwLock<Vec<RouteEntry>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route, replacing an existing entry for the same route.
    pub fn upsert(&self, entry: RouteEntry) {
        let mut routes = write(&self.routes);
        match routes.iter_mut().find(|r| r.same_route(&entry)) {
            Some(existing) => *existing = entry,
            None => routes.push(entry),
        }
    }

    /// Remove the entry for the same route, if any.
    pub fn remove(&self, entry: &RouteEntry) -> bool {
        let mut routes = write(&self.routes);
        let before = routes.len();
        routes.retain(|r| !r.same_route(entry));
        routes.len() != before
    }

    /// Drop every route through interface `oif`; returns how many went.
    pub fn remove_oif(&self, oif: u32) -> usize {
        let mut routes = write(&self.routes);
        let before = routes.len();
        routes.retain(|r| r.oif != oif);
        before - routes.len()
    }

    /// Owned copy of the current routes.
    pub fn snapshot(&self) -> Vec<RouteEntry> {
        read(&self.routes).clone()
    }

    pub fn len(&self) -> usize {
        read(&self.routes).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
