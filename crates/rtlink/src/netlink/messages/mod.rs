//! Strongly-typed rtnetlink message structures.
//!
//! ```ignore
//! use rtlink::netlink::messages::RouteMessage;
//! use rtlink::netlink::parse::FromNetlink;
//!
//! let route = RouteMessage::from_bytes(payload)?;
//! println!("{:?}/{} via {:?}", route.destination, route.dst_len(), route.gateway);
//! ```

mod address;
mod link;
mod route;

pub use address::*;
pub use link::*;
pub use route::*;
