//! Typed kernel events published by a running session.
//!
//! Every link, address and route record the session decodes, from the
//! background loop or from a request reply, is broadcast to subscribers
//! after the caches have been updated.
//!
//! ```ignore
//! use rtlink::netlink::events::NetworkEvent;
//! use tokio_stream::StreamExt;
//!
//! let mut events = session.subscribe();
//! while let Some(event) = events.next().await {
//!     match event {
//!         NetworkEvent::NewRoute(route) => println!("route {:?}", route.destination),
//!         NetworkEvent::DelLink(link) => println!("link {} gone", link.ifindex()),
//!         _ => {}
//!     }
//! }
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use super::error::Result;
use super::message::NlMsgType;
use super::messages::{AddressMessage, LinkMessage, RouteMessage};
use super::parse::FromNetlink;

/// Network events that can be received from the kernel.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// A new link was created or an existing link changed.
    NewLink(LinkMessage),
    /// A link was deleted.
    DelLink(LinkMessage),
    /// A new address was added.
    NewAddress(AddressMessage),
    /// An address was removed.
    DelAddress(AddressMessage),
    /// A new route was added.
    NewRoute(RouteMessage),
    /// A route was removed.
    DelRoute(RouteMessage),
}

impl NetworkEvent {
    /// Decode a data record into an event.
    ///
    /// Returns `Ok(None)` for message types the session does not track.
    pub fn from_record(msg_type: u16, payload: &[u8]) -> Result<Option<Self>> {
        let event = match msg_type {
            NlMsgType::RTM_NEWLINK => Self::NewLink(LinkMessage::from_bytes(payload)?),
            NlMsgType::RTM_DELLINK => Self::DelLink(LinkMessage::from_bytes(payload)?),
            NlMsgType::RTM_NEWADDR => Self::NewAddress(AddressMessage::from_bytes(payload)?),
            NlMsgType::RTM_DELADDR => Self::DelAddress(AddressMessage::from_bytes(payload)?),
            NlMsgType::RTM_NEWROUTE => Self::NewRoute(RouteMessage::from_bytes(payload)?),
            NlMsgType::RTM_DELROUTE => Self::DelRoute(RouteMessage::from_bytes(payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Returns true if this is a "new" event (add or change).
    pub fn is_new(&self) -> bool {
        matches!(
            self,
            NetworkEvent::NewLink(_) | NetworkEvent::NewAddress(_) | NetworkEvent::NewRoute(_)
        )
    }

    /// Returns true if this is a "delete" event.
    pub fn is_del(&self) -> bool {
        !self.is_new()
    }

    /// Returns "new" or "del" based on the event type.
    pub fn action(&self) -> &'static str {
        if self.is_new() { "new" } else { "del" }
    }

    /// Returns the interface index associated with this event, if any.
    pub fn ifindex(&self) -> Option<u32> {
        match self {
            NetworkEvent::NewLink(m) | NetworkEvent::DelLink(m) => Some(m.ifindex()),
            NetworkEvent::NewAddress(m) | NetworkEvent::DelAddress(m) => Some(m.ifindex()),
            NetworkEvent::NewRoute(m) | NetworkEvent::DelRoute(m) => m.oif,
        }
    }

    pub fn as_link(&self) -> Option<&LinkMessage> {
        match self {
            NetworkEvent::NewLink(m) | NetworkEvent::DelLink(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&AddressMessage> {
        match self {
            NetworkEvent::NewAddress(m) | NetworkEvent::DelAddress(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_route(&self) -> Option<&RouteMessage> {
        match self {
            NetworkEvent::NewRoute(m) | NetworkEvent::DelRoute(m) => Some(m),
            _ => None,
        }
    }
}

/// Stream of events from one session.
///
/// A subscriber that falls more than the configured capacity behind loses
/// the oldest events; the gap is logged and the stream continues.
pub struct EventStream {
    inner: BroadcastStream<NetworkEvent>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<NetworkEvent>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }
}

impl Stream for EventStream {
    type Item = NetworkEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
