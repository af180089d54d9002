//! Message builder for constructing netlink requests.

use zerocopy::{Immutable, IntoBytes};

use super::attr::{nla_space, write_attr};
use super::message::{NLMSG_HDRLEN, NlMsgHdr, nlmsg_align};

/// Builder for constructing netlink messages.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    buf: Vec<u8>,
}

impl MessageBuilder {
    /// Create a new message builder with the given type and flags.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self::with_capacity(msg_type, flags, 0)
    }

    /// Create a builder with room for `payload` bytes after the header.
    ///
    /// Requests know their maximum attribute set up front, so sizing the
    /// buffer once avoids regrowth while attributes are appended.
    pub fn with_capacity(msg_type: u16, flags: u16, payload: usize) -> Self {
        let header = NlMsgHdr::new(msg_type, flags);
        let mut buf = Vec::with_capacity(NLMSG_HDRLEN + payload);
        buf.extend_from_slice(header.as_bytes());
        buf.resize(NLMSG_HDRLEN, 0);
        Self { buf }
    }

    /// Get the current message length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the message is empty (header only).
    pub fn is_empty(&self) -> bool {
        self.buf.len() == NLMSG_HDRLEN
    }

    /// Append raw bytes to the message (with alignment padding).
    pub fn append_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        let aligned = nlmsg_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    /// Append a fixed-size kernel header struct to the message.
    pub fn append<T: IntoBytes + Immutable>(&mut self, data: &T) {
        self.append_bytes(data.as_bytes());
    }

    /// Append an attribute with the given type and data.
    pub fn append_attr(&mut self, attr_type: u16, data: &[u8]) {
        self.buf.reserve(nla_space(data.len()));
        write_attr(&mut self.buf, attr_type, data);
    }

    /// Append a u32 attribute (native endian).
    pub fn append_attr_u32(&mut self, attr_type: u16, value: u32) {
        self.append_attr(attr_type, &value.to_ne_bytes());
    }

    /// Append a string attribute without null terminator.
    pub fn append_attr_string(&mut self, attr_type: u16, value: &str) {
        self.append_attr(attr_type, value.as_bytes());
    }

    /// Set the sequence number.
    pub fn set_seq(&mut self, seq: u32) {
        self.buf[8..12].copy_from_slice(&seq.to_ne_bytes());
    }

    /// Finalize and return the message bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let len = self.buf.len() as u32;
        self.buf[0..4].copy_from_slice(&len.to_ne_bytes());
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::{AttrIter, NLA_HDRLEN};
    use crate::netlink::message::{NLM_F_REQUEST, NlMsgType};
    use crate::netlink::types::route::RtMsg;

    #[test]
    fn test_simple_message() {
        let msg = MessageBuilder::new(NlMsgType::RTM_GETLINK, NLM_F_REQUEST).finish();
        assert_eq!(msg.len(), NLMSG_HDRLEN);

        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_len as usize, NLMSG_HDRLEN);
        assert_eq!(header.nlmsg_type, NlMsgType::RTM_GETLINK);
        assert_eq!(header.nlmsg_flags, NLM_F_REQUEST);
    }

    #[test]
    fn test_length_covers_header_struct_and_attrs() {
        let mut builder = MessageBuilder::with_capacity(NlMsgType::RTM_NEWROUTE, NLM_F_REQUEST, 64);
        builder.append(&RtMsg::new());
        builder.append_attr_u32(4, 3);
        builder.set_seq(9);
        let msg = builder.finish();

        assert_eq!(msg.len(), NLMSG_HDRLEN + RtMsg::SIZE + NLA_HDRLEN + 4);
        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_len as usize, msg.len());
        assert_eq!(header.nlmsg_seq, 9);

        let attrs: Vec<_> = AttrIter::new(&msg[NLMSG_HDRLEN + RtMsg::SIZE..]).collect();
        assert_eq!(attrs, vec![(4, &3u32.to_ne_bytes()[..])]);
    }

    #[test]
    fn test_unterminated_string_attr() {
        let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWADDR, NLM_F_REQUEST);
        builder.append_attr_string(3, "zt0");
        let msg = builder.finish();
        let (_, label) = AttrIter::new(&msg[NLMSG_HDRLEN..]).next().unwrap();
        assert_eq!(label, b"zt0");
    }
}
