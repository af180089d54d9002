//! Datagram reassembly and terminal-record classification.
//!
//! The kernel answers a dump with any number of `NLM_F_MULTI` datagrams
//! closed by an `NLMSG_DONE` record, and answers everything else with a
//! single datagram or an `NLMSG_ERROR` acknowledgment. The [`Framer`]
//! accumulates the former and classifies each datagram into a [`Frame`].

use std::time::Duration;

use tracing::{debug, warn};

use super::channel::Channel;
use super::error::Result;
use super::message::{MessageIter, NLMSG_HDRLEN, NlMsgError, NlMsgHdr};

/// Receives every data record the framer decodes.
pub trait Dispatch {
    fn dispatch(&self, header: &NlMsgHdr, payload: &[u8]);
}

/// Outcome of classifying one datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// A complete batch was dispatched; holds the number of data records.
    Batch(usize),
    /// Bare acknowledgment.
    Ack,
    /// The kernel rejected the request with this (positive) errno.
    Failed(i32),
    /// Nothing to do (NOOP or an unparseable datagram).
    Empty,
    /// The kernel dropped messages before they were read.
    Overrun,
    /// The receive wait expired.
    Timeout,
}

impl Frame {
    /// Whether this cycle dispatched at least one record.
    pub fn is_productive(&self) -> bool {
        matches!(self, Frame::Batch(n) if *n > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Idle,
    Accumulating,
}

/// Per-channel reassembly state.
#[derive(Debug, Default)]
pub struct Framer {
    state: State,
    pending: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether part of a multi-part reply is buffered.
    pub fn is_accumulating(&self) -> bool {
        self.state == State::Accumulating
    }

    /// Bytes currently buffered.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.pending.clear();
    }

    /// Classify one datagram.
    ///
    /// Returns `None` while a multi-part reply is still incomplete.
    pub fn feed<D: Dispatch + ?Sized>(&mut self, datagram: &[u8], dispatcher: &D) -> Option<Frame> {
        let header = match NlMsgHdr::from_bytes(datagram) {
            Ok(header) => *header,
            Err(e) => {
                debug!(len = datagram.len(), error = %e, "discarding short datagram");
                return Some(Frame::Empty);
            }
        };

        if header.is_error() {
            self.reset();
            let payload = datagram.get(NLMSG_HDRLEN..).unwrap_or_default();
            return match NlMsgError::from_bytes(payload) {
                Ok(err) if err.is_ack() => Some(Frame::Ack),
                Ok(err) => Some(Frame::Failed(-err.error)),
                Err(e) => {
                    warn!(error = %e, "malformed error record");
                    Some(Frame::Empty)
                }
            };
        }

        if header.is_noop() {
            self.reset();
            return Some(Frame::Empty);
        }

        if header.is_overrun() {
            if self.is_accumulating() {
                debug!(pending = self.pending.len(), "discarding partial batch");
            }
            self.reset();
            warn!("netlink overrun: data lost");
            return Some(Frame::Overrun);
        }

        if header.is_multi() || header.is_done() {
            self.pending.extend_from_slice(datagram);
            let Some(status) = done_status(datagram) else {
                self.state = State::Accumulating;
                return None;
            };
            if status < 0 {
                // The dump was cut short; its records are incomplete
                debug!(pending = self.pending.len(), "discarding failed dump");
                self.reset();
                warn!(errno = -status, "dump ended with an error");
                return Some(Frame::Failed(-status));
            }
            let batch = std::mem::take(&mut self.pending);
            self.reset();
            return Some(Frame::Batch(dispatch_all(&batch, dispatcher)));
        }

        Some(Frame::Batch(dispatch_all(datagram, dispatcher)))
    }

    /// Receive and classify datagrams until one yields a terminal frame.
    ///
    /// With `expected_seq` set, datagrams carrying another sequence number
    /// are not part of the reply; their records are dispatched as
    /// notifications and the wait goes on.
    pub async fn drain<C, D>(
        &mut self,
        channel: &C,
        timeout: Duration,
        expected_seq: Option<u32>,
        dispatcher: &D,
    ) -> Result<Frame>
    where
        C: Channel,
        D: Dispatch + ?Sized,
    {
        loop {
            let datagram = match channel.recv(timeout).await {
                Ok(Some(datagram)) => datagram,
                Ok(None) => {
                    self.reset();
                    return Ok(Frame::Timeout);
                }
                Err(e) => {
                    self.reset();
                    return Err(e);
                }
            };

            if let Some(expected) = expected_seq {
                let seq = NlMsgHdr::from_bytes(&datagram).map(|h| h.nlmsg_seq);
                if matches!(seq, Ok(seq) if seq != expected) {
                    debug!(?seq, expected, "foreign datagram during request");
                    dispatch_all(&datagram, dispatcher);
                    continue;
                }
            }

            if let Some(frame) = self.feed(&datagram, dispatcher) {
                return Ok(frame);
            }
        }
    }
}

/// Status code of the first DONE record in the datagram, if any.
///
/// A DONE without a 4-byte payload counts as success.
fn done_status(datagram: &[u8]) -> Option<i32> {
    MessageIter::new(datagram)
        .filter_map(|r| r.ok())
        .find(|(header, _)| header.is_done())
        .map(|(_, payload)| {
            payload
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .map_or(0, i32::from_ne_bytes)
        })
}

/// Hand every well-formed data record to the dispatcher.
fn dispatch_all<D: Dispatch + ?Sized>(data: &[u8], dispatcher: &D) -> usize {
    let mut count = 0;
    for record in MessageIter::new(data) {
        match record {
            Ok((header, payload)) => {
                if header.is_control() {
                    continue;
                }
                dispatcher.dispatch(header, payload);
                count += 1;
            }
            Err(e) => {
                warn!(error = %e, "stopping at malformed record");
                break;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::netlink::channel::{Endpoint, Transport};
    use crate::netlink::fixtures::{
        FakeTransport, ack, done, done_with_error, link_payload, nl_error, overrun, record,
    };
    use crate::netlink::message::{NLM_F_MULTI, NlMsgType};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(u16, u32)>>,
    }

    impl Dispatch for Recorder {
        fn dispatch(&self, header: &NlMsgHdr, _payload: &[u8]) {
            self.seen
                .lock()
                .unwrap()
                .push((header.nlmsg_type, header.nlmsg_seq));
        }
    }

    fn link(seq: u32, index: i32) -> Vec<u8> {
        record(
            NlMsgType::RTM_NEWLINK,
            NLM_F_MULTI,
            seq,
            &link_payload(index, "eth0", None, 1500),
        )
    }

    #[test]
    fn test_multi_then_done_dispatches_once() {
        let mut framer = Framer::new();
        let recorder = Recorder::default();

        let mut first = link(1, 1);
        first.extend(link(1, 2));
        assert_eq!(framer.feed(&first, &recorder), None);
        assert!(framer.is_accumulating());
        assert!(recorder.seen.lock().unwrap().is_empty());

        assert_eq!(framer.feed(&done(1), &recorder), Some(Frame::Batch(2)));
        assert!(!framer.is_accumulating());
        assert_eq!(framer.pending_len(), 0);
        assert_eq!(recorder.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_done_in_same_datagram_completes() {
        let mut framer = Framer::new();
        let recorder = Recorder::default();

        let mut datagram = link(4, 1);
        datagram.extend(done(4));
        assert_eq!(framer.feed(&datagram, &recorder), Some(Frame::Batch(1)));
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_overrun_discards_accumulation() {
        let mut framer = Framer::new();
        let recorder = Recorder::default();

        assert_eq!(framer.feed(&link(1, 1), &recorder), None);
        assert_eq!(framer.feed(&overrun(1), &recorder), Some(Frame::Overrun));
        assert_eq!(framer.pending_len(), 0);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_done_with_errno_fails_the_dump() {
        let mut framer = Framer::new();
        let recorder = Recorder::default();

        assert_eq!(framer.feed(&link(1, 1), &recorder), None);
        assert_eq!(
            framer.feed(&done_with_error(1, libc::EINTR), &recorder),
            Some(Frame::Failed(libc::EINTR))
        );
        assert!(!framer.is_accumulating());
        assert_eq!(framer.pending_len(), 0);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_error_and_ack() {
        let mut framer = Framer::new();
        let recorder = Recorder::default();

        assert_eq!(framer.feed(&ack(3), &recorder), Some(Frame::Ack));
        assert_eq!(
            framer.feed(&nl_error(3, libc::EEXIST), &recorder),
            Some(Frame::Failed(libc::EEXIST))
        );
    }

    #[test]
    fn test_single_notification_is_a_batch() {
        let mut framer = Framer::new();
        let recorder = Recorder::default();

        let datagram = record(
            NlMsgType::RTM_DELLINK,
            0,
            0,
            &link_payload(5, "zt0", None, 2800),
        );
        assert_eq!(framer.feed(&datagram, &recorder), Some(Frame::Batch(1)));
        assert_eq!(
            recorder.seen.lock().unwrap().as_slice(),
            &[(NlMsgType::RTM_DELLINK, 0)]
        );
    }

    #[test]
    fn test_noop_and_runt_are_empty() {
        let mut framer = Framer::new();
        let recorder = Recorder::default();

        let noop = record(NlMsgType::NOOP, 0, 0, &[]);
        assert_eq!(framer.feed(&noop, &recorder), Some(Frame::Empty));
        assert_eq!(framer.feed(&[1, 2, 3], &recorder), Some(Frame::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_reassembles_across_datagrams() {
        let transport = FakeTransport::new();
        let mut second = link(7, 2);
        second.extend(done(7));
        transport.script(vec![link(7, 1), second]);
        let channel = transport.open(Endpoint::default()).unwrap();

        let recorder = Recorder::default();
        let mut framer = Framer::new();
        let frame = framer
            .drain(&channel, Duration::from_secs(1), Some(7), &recorder)
            .await
            .unwrap();
        assert_eq!(frame, Frame::Batch(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_diverts_foreign_sequence() {
        let transport = FakeTransport::new();
        let notification = record(
            NlMsgType::RTM_NEWLINK,
            0,
            0,
            &link_payload(9, "zt1", None, 2800),
        );
        transport.script(vec![notification, ack(12)]);
        let channel = transport.open(Endpoint::default()).unwrap();

        let recorder = Recorder::default();
        let mut framer = Framer::new();
        let frame = framer
            .drain(&channel, Duration::from_secs(1), Some(12), &recorder)
            .await
            .unwrap();
        assert_eq!(frame, Frame::Ack);
        assert_eq!(
            recorder.seen.lock().unwrap().as_slice(),
            &[(NlMsgType::RTM_NEWLINK, 0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_times_out_and_resets() {
        let transport = FakeTransport::new();
        transport.script(vec![link(2, 1)]);
        let channel = transport.open(Endpoint::default()).unwrap();

        let recorder = Recorder::default();
        let mut framer = Framer::new();
        let frame = framer
            .drain(&channel, Duration::from_secs(1), None, &recorder)
            .await
            .unwrap();
        assert_eq!(frame, Frame::Timeout);
        assert_eq!(framer.pending_len(), 0);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }
}
