//! Kernel routing bridge for Linux.
//!
//! This crate speaks rtnetlink from scratch: it keeps a long-lived
//! subscription to link, address and route notifications, mirrors the
//! kernel's interface table and route tables in local caches, and applies
//! route and address changes decided elsewhere.
//!
//! # Features
//!
//! - `serde` - `Serialize`/`Deserialize` for cache entries and [`SessionConfig`]
//! - `integration` - enable tests that talk to the real kernel
//!
//! # Example
//!
//! ```ignore
//! use rtlink::netlink::{Route, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> rtlink::Result<()> {
//!     let session = Session::open(SessionConfig::default()).await?;
//!
//!     for iface in session.interfaces() {
//!         println!("{}: {} mtu {}", iface.index, iface.name, iface.mtu);
//!     }
//!
//!     let route = Route::new()
//!         .destination("10.147.17.0/24".parse().unwrap())
//!         .interface("zt0");
//!     session.add_route(&route).await?;
//!
//!     session.close().await
//! }
//! ```

pub mod netlink;

// Re-export common types at crate root for convenience
pub use netlink::{Error, Result, Route, Session, SessionConfig};
