//! Netlink message fixtures and a scripted transport for testing.
//!
//! Record builders return `Vec<u8>` laid out exactly as the kernel sends
//! them, so the framer and decoders see real wire bytes. [`FakeTransport`]
//! stands in for the kernel socket: every channel it opens replays the
//! datagrams scripted for it and records what was sent.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ipnet::IpNet;
use tokio::sync::mpsc;
use zerocopy::IntoBytes;

use super::attr::encode;
use super::channel::{Channel, Endpoint, Transport};
use super::error::{Error, Result};
use super::message::{NLM_F_MULTI, NLMSG_HDRLEN, NlMsgHdr, NlMsgType, nlmsg_align};
use super::types::link::{IFLA_ADDRESS, IFLA_IFNAME, IFLA_MTU, IfInfoMsg};
use super::types::route::{
    RT_TABLE_MAIN, RTA_DST, RTA_GATEWAY, RTA_OIF, RouteProtocol, RouteScope, RouteType, RtMsg,
};

/// One netlink record, padded to alignment.
pub fn record(msg_type: u16, flags: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
    let mut header = NlMsgHdr::new(msg_type, flags);
    header.nlmsg_len = (NLMSG_HDRLEN + payload.len()) as u32;
    header.nlmsg_seq = seq;
    let mut buf = header.as_bytes().to_vec();
    buf.extend_from_slice(payload);
    buf.resize(nlmsg_align(buf.len()), 0);
    buf
}

/// End-of-dump record.
pub fn done(seq: u32) -> Vec<u8> {
    done_with_error(seq, 0)
}

/// End-of-dump record for a dump the kernel aborted with `errno`.
pub fn done_with_error(seq: u32, errno: i32) -> Vec<u8> {
    record(NlMsgType::DONE, NLM_F_MULTI, seq, &(-errno).to_ne_bytes())
}

/// Error record carrying `-errno` (zero is a bare acknowledgment).
pub fn nl_error(seq: u32, errno: i32) -> Vec<u8> {
    let mut payload = (-errno).to_ne_bytes().to_vec();
    let mut original = NlMsgHdr::new(NlMsgType::RTM_NEWROUTE, 0);
    original.nlmsg_seq = seq;
    payload.extend_from_slice(original.as_bytes());
    record(NlMsgType::ERROR, 0, seq, &payload)
}

/// Acknowledgment record.
pub fn ack(seq: u32) -> Vec<u8> {
    nl_error(seq, 0)
}

/// Kernel data-loss record.
pub fn overrun(seq: u32) -> Vec<u8> {
    record(NlMsgType::OVERRUN, 0, seq, &[])
}

/// Payload of an RTM_NEWLINK record.
pub fn link_payload(index: i32, name: &str, mac: Option<[u8; 6]>, mtu: u32) -> Vec<u8> {
    let header = IfInfoMsg {
        ifi_index: index,
        ..Default::default()
    };
    let mut ifname = name.as_bytes().to_vec();
    ifname.push(0);
    let mtu = mtu.to_ne_bytes();

    let mut attrs: Vec<(u16, &[u8])> = vec![(IFLA_IFNAME, &ifname)];
    if let Some(mac) = mac.as_ref() {
        attrs.push((IFLA_ADDRESS, mac));
    }
    attrs.push((IFLA_MTU, &mtu));

    let mut payload = header.as_bytes().to_vec();
    payload.extend(encode(&attrs));
    payload
}

/// Payload of an RTM_NEWROUTE record in the main table.
///
/// A zero-length unspecified destination is sent without RTA_DST, like the
/// kernel does for default routes.
pub fn route_payload(destination: IpNet, gateway: Option<IpAddr>, oif: Option<u32>) -> Vec<u8> {
    let family = match destination {
        IpNet::V4(_) => libc::AF_INET,
        IpNet::V6(_) => libc::AF_INET6,
    };
    let header = RtMsg::new()
        .with_family(family as u8)
        .with_dst_len(destination.prefix_len())
        .with_table(RT_TABLE_MAIN)
        .with_protocol(RouteProtocol::Static)
        .with_scope(RouteScope::Universe)
        .with_type(RouteType::Unicast);

    let dst = ip_bytes(destination.addr());
    let gw = gateway.map(ip_bytes);
    let oif = oif.map(u32::to_ne_bytes);

    let mut attrs: Vec<(u16, &[u8])> = Vec::new();
    if destination.prefix_len() != 0 || !destination.addr().is_unspecified() {
        attrs.push((RTA_DST, &dst));
    }
    if let Some(gw) = gw.as_ref() {
        attrs.push((RTA_GATEWAY, gw));
    }
    if let Some(oif) = oif.as_ref() {
        attrs.push((RTA_OIF, oif));
    }

    let mut payload = header.as_bytes().to_vec();
    payload.extend(encode(&attrs));
    payload
}

fn ip_bytes(addr: IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

/// Link message for loopback interface.
/// Captured from: ip link show lo (little-endian host)
#[cfg(target_endian = "little")]
pub fn link_loopback() -> Vec<u8> {
    vec![
        0x00, 0x00, // family, pad
        0x04, 0x03, // type = 772 (ARPHRD_LOOPBACK)
        0x01, 0x00, 0x00, 0x00, // index = 1
        0x49, 0x00, 0x00, 0x00, // flags = IFF_UP | IFF_LOOPBACK | IFF_RUNNING
        0x00, 0x00, 0x00, 0x00, // change = 0
        // IFLA_IFNAME = "lo"
        0x07, 0x00, 0x03, 0x00, b'l', b'o', 0x00, 0x00,
        // IFLA_MTU = 65536
        0x08, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01, 0x00,
        // IFLA_TXQLEN = 1000
        0x08, 0x00, 0x0d, 0x00, 0xe8, 0x03, 0x00, 0x00,
        // IFLA_ADDRESS = 00:00:00:00:00:00
        0x0a, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ]
}

#[derive(Default)]
struct FakeState {
    opens: Vec<Endpoint>,
    sent: Vec<Vec<u8>>,
    scripts: VecDeque<Vec<Vec<u8>>>,
    inboxes: Vec<mpsc::UnboundedSender<Vec<u8>>>,
    fail_opens: usize,
}

/// Scripted stand-in for the kernel.
///
/// Channels are handed scripts in the order they are opened; a channel
/// with nothing left to deliver times out.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the datagrams the next opened channel will deliver.
    pub fn script(&self, datagrams: Vec<Vec<u8>>) -> &Self {
        self.state.lock().unwrap().scripts.push_back(datagrams);
        self
    }

    /// Make the next `count` opens fail with EADDRINUSE.
    pub fn fail_next_opens(&self, count: usize) {
        self.state.lock().unwrap().fail_opens = count;
    }

    /// Deliver a datagram to the `channel`-th opened channel.
    pub fn push(&self, channel: usize, datagram: Vec<u8>) {
        self.state.lock().unwrap().inboxes[channel]
            .send(datagram)
            .unwrap();
    }

    /// Endpoints of every successful open, in order.
    pub fn opens(&self) -> Vec<Endpoint> {
        self.state.lock().unwrap().opens.clone()
    }

    /// Every datagram sent on any channel, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().sent.clone()
    }
}

impl Transport for FakeTransport {
    type Channel = FakeChannel;

    fn open(&self, endpoint: Endpoint) -> Result<FakeChannel> {
        let mut state = self.state.lock().unwrap();
        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            return Err(Error::Io(std::io::Error::from_raw_os_error(libc::EADDRINUSE)));
        }
        state.opens.push(endpoint);

        let (tx, rx) = mpsc::unbounded_channel();
        for datagram in state.scripts.pop_front().unwrap_or_default() {
            tx.send(datagram).unwrap();
        }
        // The sender stays here so the inbox never closes
        state.inboxes.push(tx);

        Ok(FakeChannel {
            inbox: tokio::sync::Mutex::new(rx),
            state: self.state.clone(),
        })
    }
}

pub struct FakeChannel {
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    state: Arc<Mutex<FakeState>>,
}

impl Channel for FakeChannel {
    async fn send(&self, msg: &[u8]) -> Result<()> {
        self.state.lock().unwrap().sent.push(msg.to_vec());
        Ok(())
    }

    async fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let mut inbox = self.inbox.lock().await;
        Ok(tokio::time::timeout(timeout, inbox.recv())
            .await
            .ok()
            .flatten())
    }
}
