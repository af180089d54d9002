//! Session tunables.

use std::time::Duration;

use super::socket::rtnetlink_groups;

/// Configuration for a [`Session`](super::Session).
///
/// ```ignore
/// use std::time::Duration;
/// use rtlink::SessionConfig;
///
/// let config = SessionConfig::default()
///     .with_recv_timeout(Duration::from_millis(500))
///     .with_resolve_attempts(20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Longest single wait for a datagram.
    pub recv_timeout: Duration,
    /// Background loop back-off after an idle or failed cycle.
    pub poll_interval: Duration,
    /// Extra interface-name lookups `add_address` makes before giving up.
    pub resolve_attempts: u32,
    /// Wait between those lookups.
    pub resolve_interval: Duration,
    /// `RTMGRP_*` mask the long-lived channel joins.
    pub groups: u32,
    /// Receive buffer per datagram.
    pub recv_buffer_size: usize,
    /// Events buffered per subscriber before the oldest are dropped.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            resolve_attempts: 10,
            resolve_interval: Duration::from_millis(100),
            groups: rtnetlink_groups::SESSION,
            recv_buffer_size: 32768,
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_resolve_attempts(mut self, attempts: u32) -> Self {
        self.resolve_attempts = attempts;
        self
    }

    pub fn with_resolve_interval(mut self, interval: Duration) -> Self {
        self.resolve_interval = interval;
        self
    }

    pub fn with_groups(mut self, groups: u32) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Set the per-subscriber event buffer. Zero is raised to one.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}
