//! Fixed-size rtnetlink headers and protocol constants.

pub mod addr;
pub mod link;
pub mod route;
