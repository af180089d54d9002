//! The seam between protocol logic and the kernel socket.
//!
//! [`Session`](super::Session) and [`Framer`](super::Framer) only see these
//! traits, so tests drive them with a scripted transport instead of a
//! real `NETLINK_ROUTE` socket.

use std::future::Future;
use std::time::Duration;

use super::error::Result;

/// Where a channel is bound: its port id and multicast group mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Endpoint {
    /// Local port id. Zero lets the kernel assign a unique one.
    pub pid: u32,
    /// Legacy `RTMGRP_*` bitmask of notification groups to join.
    pub groups: u32,
}

impl Endpoint {
    /// A kernel-assigned endpoint joined to `groups`.
    pub fn with_groups(groups: u32) -> Self {
        Self { pid: 0, groups }
    }
}

/// One bound datagram channel to the kernel.
pub trait Channel: Send + Sync + 'static {
    /// Send one complete request datagram.
    fn send(&self, msg: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Receive one datagram, waiting at most `timeout`.
    ///
    /// `Ok(None)` means the wait expired with nothing to read.
    fn recv(&self, timeout: Duration) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;
}

/// Factory for channels.
pub trait Transport: Send + Sync + 'static {
    type Channel: Channel;

    /// Open and bind a new channel.
    fn open(&self, endpoint: Endpoint) -> Result<Self::Channel>;
}
