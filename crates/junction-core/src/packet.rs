//! Opaque protocol packet buffers.
//!
//! A [`Packet`] carries one or more protocol messages as an owned byte
//! buffer. It is either a single contiguous buffer or a chain of segments,
//! so a coalescing protocol layer can hand several wire messages downstream
//! without copying. The routing chain never inspects packet contents; only
//! the protocol decoder and the query classifier do.

use bytes::{Bytes, BytesMut};

/// An owned, possibly chained byte buffer holding one or more protocol
/// messages.
///
/// Ownership transfers to the callee on `route_query`/`client_reply`.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    segments: Vec<Bytes>,
}

impl Packet {
    /// Create an empty packet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a packet from a single contiguous buffer.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        if data.is_empty() {
            return Self::new();
        }
        Self {
            segments: vec![data],
        }
    }

    /// Append a segment to the chain.
    pub fn chain(&mut self, data: impl Into<Bytes>) {
        let data = data.into();
        if !data.is_empty() {
            self.segments.push(data);
        }
    }

    /// Total byte length across all segments.
    pub fn len(&self) -> usize {
        self.segments.iter().map(Bytes::len).sum()
    }

    /// True if the packet holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if the packet is a single contiguous buffer (or empty).
    pub fn is_contiguous(&self) -> bool {
        self.segments.len() <= 1
    }

    /// Iterate over the segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &Bytes> {
        self.segments.iter()
    }

    /// Collapse the chain into one contiguous buffer.
    ///
    /// Cheap when the packet already holds zero or one segment.
    pub fn into_contiguous(self) -> Bytes {
        match self.segments.len() {
            0 => Bytes::new(),
            1 => self.segments.into_iter().next().unwrap(),
            _ => {
                let mut buf = BytesMut::with_capacity(self.len());
                for seg in &self.segments {
                    buf.extend_from_slice(seg);
                }
                buf.freeze()
            }
        }
    }
}

impl From<&'static [u8]> for Packet {
    fn from(data: &'static [u8]) -> Self {
        Self::from_bytes(Bytes::from_static(data))
    }
}

impl From<Vec<u8>> for Packet {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(Bytes::from(data))
    }
}
