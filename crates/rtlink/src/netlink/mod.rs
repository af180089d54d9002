//! rtnetlink protocol implementation for the routing bridge.
//!
//! The layers, leaf first:
//!
//! - [`attr`] and [`builder`] encode and decode type-length-value attributes
//! - [`message`] frames `nlmsghdr` records and walks datagrams
//! - [`framer`] reassembles multi-part replies and classifies terminal records
//! - [`cache`] holds the interface table and the per-family route tables
//! - `request` encodes the route, address and dump requests
//! - [`session`] owns the subscription channel, the background ingestion
//!   task and the request/reply helper behind every public operation
//!
//! # Quick Start
//!
//! ```ignore
//! use rtlink::netlink::{Session, SessionConfig};
//!
//! let session = Session::open(SessionConfig::default()).await?;
//!
//! if let Some(index) = session.interface_index("eth0") {
//!     println!("eth0 is ifindex {index}");
//! }
//!
//! for route in session.ipv4_routes() {
//!     println!("{} via {:?}", route.destination, route.gateway);
//! }
//! ```
//!
//! # Event Monitoring
//!
//! ```ignore
//! use rtlink::netlink::events::NetworkEvent;
//! use tokio_stream::StreamExt;
//!
//! let mut events = session.subscribe();
//! while let Some(event) = events.next().await {
//!     if let NetworkEvent::NewLink(link) = event {
//!         println!("link {} appeared", link.name.as_deref().unwrap_or("?"));
//!     }
//! }
//! ```

pub mod attr;
mod builder;
pub mod cache;
pub mod channel;
pub mod config;
mod error;
pub mod events;
#[cfg(test)]
mod fixtures;
pub mod framer;
pub mod message;
pub mod messages;
pub mod parse;
mod request;
pub mod session;
mod socket;
pub mod types;

pub use attr::{AttrIter, NlAttr};
pub use builder::MessageBuilder;
pub use cache::{InterfaceEntry, InterfaceTable, RouteEntry, RouteTable};
pub use channel::{Channel, Endpoint, Transport};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use framer::{Dispatch, Frame, Framer};
pub use message::{MessageIter, NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
pub use parse::FromNetlink;
pub use session::{Route, Session};
pub use socket::{KernelTransport, NetlinkSocket, rtnetlink_groups};
