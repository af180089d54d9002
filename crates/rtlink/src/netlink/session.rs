//! The kernel routing session.
//!
//! A [`Session`] owns one long-lived channel subscribed to link, address
//! and route notifications, and a background task that drains it into the
//! caches. Every request (route and address changes, dumps) goes out on
//! its own transient channel, so replies never mix with notifications or
//! with other callers' replies.
//!
//! # Example
//!
//! ```ignore
//! use rtlink::{Route, Session, SessionConfig};
//!
//! let session = Session::open(SessionConfig::default()).await?;
//!
//! session.add_address("10.147.17.5/24".parse()?, "zt0").await?;
//! session
//!     .add_route(
//!         &Route::new()
//!             .destination("10.147.0.0/16".parse()?)
//!             .interface("zt0"),
//!     )
//!     .await?;
//!
//! for route in session.ipv4_routes() {
//!     println!("{} dev {}", route.destination, route.oif);
//! }
//!
//! session.close().await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use ipnet::IpNet;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::builder::MessageBuilder;
use super::cache::{InterfaceEntry, InterfaceTable, RouteEntry, RouteTable};
use super::channel::{Channel, Endpoint, Transport};
use super::config::SessionConfig;
use super::error::{Error, Result};
use super::events::{EventStream, NetworkEvent};
use super::framer::{Dispatch, Frame, Framer};
use super::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgHdr, NlMsgType};
use super::request::{
    address_request, family_of, ifaddr_group, link_dump, route_dump, route_group,
};
use super::socket::KernelTransport;
use super::socket::rtnetlink_groups::RTMGRP_LINK;

pub use super::request::Route;

/// State shared between the session handle and its background task.
struct Shared<T: Transport> {
    transport: T,
    config: SessionConfig,
    interfaces: InterfaceTable,
    ipv4_routes: RouteTable,
    ipv6_routes: RouteTable,
    seq: AtomicU32,
    running: AtomicBool,
    events: broadcast::Sender<NetworkEvent>,
}

impl<T: Transport> Shared<T> {
    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn routes_for(&self, family: u8) -> Option<&RouteTable> {
        match family as i32 {
            libc::AF_INET => Some(&self.ipv4_routes),
            libc::AF_INET6 => Some(&self.ipv6_routes),
            _ => None,
        }
    }

    /// Apply a decoded event to the caches, then publish it.
    fn apply(&self, event: NetworkEvent) {
        match &event {
            NetworkEvent::NewLink(link) => {
                let entry = InterfaceEntry::from_message(link);
                debug!(index = entry.index, name = %entry.name, mtu = entry.mtu, "link up");
                self.interfaces.upsert(entry);
            }
            NetworkEvent::DelLink(link) => {
                let index = link.ifindex();
                if let Some(entry) = self.interfaces.remove(index) {
                    debug!(index = entry.index, name = %entry.name, "link removed");
                }
                // The kernel flushes IPv4 routes of a dead link without
                // announcing them
                let flushed =
                    self.ipv4_routes.remove_oif(index) + self.ipv6_routes.remove_oif(index);
                if flushed > 0 {
                    debug!(index, flushed, "routes of removed link dropped");
                }
            }
            NetworkEvent::NewAddress(addr) | NetworkEvent::DelAddress(addr) => {
                debug!(
                    action = event.action(),
                    index = addr.ifindex(),
                    address = ?addr.primary_address(),
                    prefix = addr.prefix_len(),
                    label = ?addr.label,
                    "address"
                );
            }
            NetworkEvent::NewRoute(route) => {
                let table = self.routes_for(route.family());
                if let (Some(table), Some(entry)) = (table, RouteEntry::from_message(route)) {
                    debug!(destination = %entry.destination, oif = entry.oif, "route added");
                    table.upsert(entry);
                }
            }
            NetworkEvent::DelRoute(route) => {
                let table = self.routes_for(route.family());
                if let (Some(table), Some(entry)) = (table, RouteEntry::from_message(route)) {
                    debug!(destination = %entry.destination, oif = entry.oif, "route removed");
                    table.remove(&entry);
                }
            }
        }
        // No subscribers is not an error
        self.events.send(event).ok();
    }

    /// Send one request on a fresh channel and drain its reply.
    ///
    /// Kernel errors come back as `Err` with `operation` as context.
    async fn exchange(
        &self,
        groups: u32,
        mut request: MessageBuilder,
        operation: &str,
    ) -> Result<Frame> {
        let channel = self
            .transport
            .open(Endpoint::with_groups(groups))
            .inspect_err(|e| warn!(operation, error = %e, "cannot open request channel"))?;

        let seq = self.next_seq();
        request.set_seq(seq);
        channel.send(&request.finish()).await?;

        let mut framer = Framer::new();
        let frame = framer
            .drain(&channel, self.config.recv_timeout, Some(seq), self)
            .await?;

        match frame {
            Frame::Failed(errno) => {
                let err = Error::from_errno(-errno).with_context(operation);
                warn!(error = %err, "kernel rejected request");
                Err(err)
            }
            Frame::Overrun => Err(Error::Overrun),
            frame => {
                debug!(operation, seq, ?frame, "request complete");
                Ok(frame)
            }
        }
    }

    async fn dump_links(&self) -> Result<()> {
        self.exchange(RTMGRP_LINK, link_dump(), "dumping links")
            .await
            .map(|_| ())
    }

    async fn dump_routes(&self, family: u8) -> Result<()> {
        let operation = if family == libc::AF_INET6 as u8 {
            "dumping IPv6 routes"
        } else {
            "dumping IPv4 routes"
        };
        self.exchange(route_group(family), route_dump(family), operation)
            .await
            .map(|_| ())
    }
}

impl<T: Transport> Dispatch for Shared<T> {
    fn dispatch(&self, header: &NlMsgHdr, payload: &[u8]) {
        match NetworkEvent::from_record(header.nlmsg_type, payload) {
            Ok(Some(event)) => self.apply(event),
            Ok(None) => debug!(msg_type = header.nlmsg_type, "ignoring record"),
            Err(e) => warn!(msg_type = header.nlmsg_type, error = %e, "undecodable record"),
        }
    }
}

/// Drain the long-lived channel until the session stops.
async fn ingest<T: Transport>(shared: Arc<Shared<T>>, channel: T::Channel) {
    let mut framer = Framer::new();
    while shared.running.load(Ordering::Acquire) {
        let productive = match framer
            .drain(&channel, shared.config.recv_timeout, None, &*shared)
            .await
        {
            Ok(frame) => frame.is_productive(),
            Err(e) => {
                warn!(error = %e, "notification receive failed");
                false
            }
        };
        if !productive {
            tokio::time::sleep(shared.config.poll_interval).await;
        }
    }
    debug!("ingestion loop stopped");
}

/// A running rtnetlink session.
pub struct Session<T: Transport = KernelTransport> {
    shared: Arc<Shared<T>>,
    task: Option<JoinHandle<()>>,
}

impl Session<KernelTransport> {
    /// Open a session against the running kernel.
    ///
    /// Fails if the notification channel cannot be bound. Warm-up dump
    /// failures are logged and leave the affected cache empty.
    pub async fn open(config: SessionConfig) -> Result<Self> {
        let transport = KernelTransport::new(config.recv_buffer_size);
        Self::with_transport(transport, config).await
    }
}

impl<T: Transport> Session<T> {
    /// Open a session over any transport.
    pub async fn with_transport(transport: T, config: SessionConfig) -> Result<Self> {
        let channel = transport
            .open(Endpoint::with_groups(config.groups))
            .inspect_err(|e| error!(error = %e, "cannot bind notification channel"))?;

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let shared = Arc::new(Shared {
            transport,
            config,
            interfaces: InterfaceTable::new(),
            ipv4_routes: RouteTable::new(),
            ipv6_routes: RouteTable::new(),
            seq: AtomicU32::new(1),
            running: AtomicBool::new(false),
            events,
        });

        let mut session = Self {
            shared: shared.clone(),
            task: None,
        };
        session.warm_up().await;

        shared.running.store(true, Ordering::Release);
        info!(
            interfaces = shared.interfaces.len(),
            ipv4_routes = shared.ipv4_routes.len(),
            ipv6_routes = shared.ipv6_routes.len(),
            "rtnetlink session running"
        );
        session.task = Some(tokio::spawn(ingest(shared, channel)));

        Ok(session)
    }

    async fn warm_up(&self) {
        if let Err(e) = self.shared.dump_links().await {
            warn!(error = %e, "link dump failed");
        }
        if let Err(e) = self.shared.dump_routes(libc::AF_INET as u8).await {
            warn!(error = %e, "IPv4 route dump failed");
        }
        if let Err(e) = self.shared.dump_routes(libc::AF_INET6 as u8).await {
            warn!(error = %e, "IPv6 route dump failed");
        }
    }

    /// Re-dump links and routes into the caches.
    ///
    /// Entries the kernel no longer reports are not pruned; use this to
    /// pick up state missed after an overrun.
    pub async fn refresh(&self) -> Result<()> {
        self.shared.dump_links().await?;
        self.shared.dump_routes(libc::AF_INET as u8).await?;
        self.shared.dump_routes(libc::AF_INET6 as u8).await
    }

    /// Install a route in the main table.
    ///
    /// A route without a destination is ignored.
    pub async fn add_route(&self, route: &Route) -> Result<()> {
        let Some(destination) = route.destination else {
            debug!("add_route without destination ignored");
            return Ok(());
        };
        let operation = format!("adding route {}", destination);
        let request = route.build(
            destination,
            NlMsgType::RTM_NEWROUTE,
            NLM_F_REQUEST | NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK,
            self.resolve_oif(route),
        )?;

        match self.shared.exchange(0, request, &operation).await? {
            Frame::Timeout => Err(Error::Timeout { operation }),
            _ => Ok(()),
        }
    }

    /// Remove a route from the main table.
    ///
    /// A route without a destination is ignored.
    pub async fn del_route(&self, route: &Route) -> Result<()> {
        let Some(destination) = route.destination else {
            debug!("del_route without destination ignored");
            return Ok(());
        };
        let operation = format!("deleting route {}", destination);
        let request = route.build(
            destination,
            NlMsgType::RTM_DELROUTE,
            NLM_F_REQUEST,
            self.resolve_oif(route),
        )?;

        self.shared.exchange(0, request, &operation).await.map(|_| ())
    }

    fn resolve_oif(&self, route: &Route) -> Option<u32> {
        let name = route.interface.as_deref()?;
        let index = self.interface_index(name);
        if index.is_none() {
            debug!(interface = name, "route interface unknown, omitting RTA_OIF");
        }
        index
    }

    /// Assign `address` to interface `ifname`.
    ///
    /// Waits for the interface to show up for up to
    /// `resolve_attempts * resolve_interval` before failing with
    /// [`Error::InterfaceNotFound`].
    pub async fn add_address(&self, address: IpNet, ifname: &str) -> Result<()> {
        let index = self.resolve_with_retry(ifname).await?;
        let operation = format!("adding address {} to {}", address, ifname);
        let request = address_request(
            NlMsgType::RTM_NEWADDR,
            NLM_F_REQUEST | NLM_F_CREATE | NLM_F_EXCL,
            address,
            index,
            ifname,
        );
        self.shared
            .exchange(ifaddr_group(address.addr()), request, &operation)
            .await
            .map(|_| ())
    }

    /// Remove `address` from interface `ifname`.
    pub async fn remove_address(&self, address: IpNet, ifname: &str) -> Result<()> {
        let index = self
            .interface_index(ifname)
            .ok_or_else(|| Error::InterfaceNotFound {
                name: ifname.to_string(),
            })?;
        let operation = format!("removing address {} from {}", address, ifname);
        let request = address_request(
            NlMsgType::RTM_DELADDR,
            NLM_F_REQUEST,
            address,
            index,
            ifname,
        );
        self.shared
            .exchange(ifaddr_group(address.addr()), request, &operation)
            .await
            .map(|_| ())
    }

    async fn resolve_with_retry(&self, ifname: &str) -> Result<u32> {
        let mut retries = 0;
        loop {
            if let Some(index) = self.interface_index(ifname) {
                return Ok(index);
            }
            if retries >= self.shared.config.resolve_attempts {
                warn!(interface = ifname, retries, "interface never appeared");
                return Err(Error::InterfaceNotFound {
                    name: ifname.to_string(),
                });
            }
            retries += 1;
            tokio::time::sleep(self.shared.config.resolve_interval).await;
        }
    }

    /// Index of the interface named exactly `name`.
    pub fn interface_index(&self, name: &str) -> Option<u32> {
        self.shared.interfaces.index_of(name)
    }

    /// Cached interface by index.
    pub fn interface(&self, index: u32) -> Option<InterfaceEntry> {
        self.shared.interfaces.get(index)
    }

    /// Every cached interface, sorted by index.
    pub fn interfaces(&self) -> Vec<InterfaceEntry> {
        self.shared.interfaces.snapshot()
    }

    /// Snapshot of the IPv4 route cache.
    pub fn ipv4_routes(&self) -> Vec<RouteEntry> {
        self.shared.ipv4_routes.snapshot()
    }

    /// Snapshot of the IPv6 route cache.
    pub fn ipv6_routes(&self) -> Vec<RouteEntry> {
        self.shared.ipv6_routes.snapshot()
    }

    /// Routes for the family of `addr`.
    pub fn routes_for(&self, addr: std::net::IpAddr) -> Vec<RouteEntry> {
        self.shared
            .routes_for(family_of(addr))
            .map(RouteTable::snapshot)
            .unwrap_or_default()
    }

    /// Subscribe to decoded kernel events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.shared.events.subscribe())
    }

    /// Whether the background task is still ingesting.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
            && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the background task and wait for it to finish its current
    /// receive.
    pub async fn close(mut self) -> Result<()> {
        self.shared.running.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| Error::Io(std::io::Error::other(e)))?;
        }
        info!("rtnetlink session closed");
        Ok(())
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
    }
}
