//! Async `NETLINK_ROUTE` socket and the kernel transport.

use std::time::Duration;

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

use super::channel::{Channel, Endpoint, Transport};
use super::error::Result;

/// Legacy rtnetlink multicast group bits (`RTMGRP_*`), joined at bind time.
pub mod rtnetlink_groups {
    pub const RTMGRP_LINK: u32 = 0x1;
    pub const RTMGRP_NOTIFY: u32 = 0x2;
    pub const RTMGRP_IPV4_IFADDR: u32 = 0x10;
    pub const RTMGRP_IPV4_ROUTE: u32 = 0x40;
    pub const RTMGRP_IPV6_IFADDR: u32 = 0x100;
    pub const RTMGRP_IPV6_ROUTE: u32 = 0x400;

    /// Everything the session subscribes to.
    pub const SESSION: u32 = RTMGRP_LINK
        | RTMGRP_IPV4_IFADDR
        | RTMGRP_IPV6_IFADDR
        | RTMGRP_IPV4_ROUTE
        | RTMGRP_IPV6_ROUTE
        | RTMGRP_NOTIFY;
}

/// Async rtnetlink socket.
pub struct NetlinkSocket {
    fd: AsyncFd<Socket>,
    pid: u32,
    buffer_size: usize,
}

impl NetlinkSocket {
    /// Create a socket bound to `endpoint`.
    pub fn bind(endpoint: Endpoint, buffer_size: usize) -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE)?;
        socket.set_non_blocking(true)?;

        let mut addr = SocketAddr::new(endpoint.pid, endpoint.groups);
        socket.bind(&addr)?;
        socket.get_address(&mut addr)?;
        let pid = addr.port_number();

        // Extended ACK is optional
        socket.set_ext_ack(true).ok();

        let fd = AsyncFd::new(socket)?;

        Ok(Self {
            fd,
            pid,
            buffer_size,
        })
    }

    /// Get the local port ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Send a message.
    pub async fn send(&self, msg: &[u8]) -> Result<()> {
        loop {
            let mut guard = self.fd.ready(Interest::WRITABLE).await?;

            match guard.try_io(|inner| inner.get_ref().send(msg, 0)) {
                Ok(result) => {
                    result?;
                    return Ok(());
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive one datagram.
    pub async fn recv_msg(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(self.buffer_size);

        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            match guard.try_io(|inner| inner.get_ref().recv(&mut buf, 0)) {
                Ok(result) => {
                    result?;
                    return Ok(buf.to_vec());
                }
                Err(_would_block) => continue,
            }
        }
    }
}

impl Channel for NetlinkSocket {
    async fn send(&self, msg: &[u8]) -> Result<()> {
        NetlinkSocket::send(self, msg).await
    }

    async fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        match tokio::time::timeout(timeout, self.recv_msg()).await {
            Ok(data) => data.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }
}

/// Opens real kernel sockets.
#[derive(Debug, Clone, Copy)]
pub struct KernelTransport {
    buffer_size: usize,
}

impl KernelTransport {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }
}

impl Default for KernelTransport {
    fn default() -> Self {
        Self::new(32768)
    }
}

impl Transport for KernelTransport {
    type Channel = NetlinkSocket;

    fn open(&self, endpoint: Endpoint) -> Result<NetlinkSocket> {
        NetlinkSocket::bind(endpoint, self.buffer_size)
    }
}
