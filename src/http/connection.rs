//! The connection collaborator.
//!
//! The socket layer owns every connection. The dispatch core only sees this
//! trait: it queues writes, asks for a disconnect and tells the transport
//! how to frame the next read. Per-connection state in the core is keyed by
//! [`ConnectionId`] and must be dropped on disconnect, before the id can be
//! handed out again.

use std::fmt;

use bytes::{Bytes, BytesMut};

/// Stable identity of a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How the transport should cut the next read event out of its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFraming {
    /// One line, up to and including `\n`.
    Line,
    /// Up to this many bytes; fewer if that is all that has arrived.
    Length(usize),
    /// Whatever is buffered.
    Stream,
}

impl ReadFraming {
    /// Splits the next read event off `buf`, or `None` if it has not arrived yet.
    pub fn split(&self, buf: &mut BytesMut) -> Option<Bytes> {
        if buf.is_empty() {
            return None;
        }

        match *self {
            ReadFraming::Line => {
                let end = buf.iter().position(|&b| b == b'\n')?;
                Some(buf.split_to(end + 1).freeze())
            }
            ReadFraming::Length(0) => None,
            ReadFraming::Length(n) => {
                let n = n.min(buf.len());
                Some(buf.split_to(n).freeze())
            }
            ReadFraming::Stream => Some(buf.split().freeze()),
        }
    }
}

/// A network endpoint owned by the socket layer.
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Queues bytes for writing. Never blocks.
    fn write(&self, bytes: Bytes);

    /// Closes the connection once queued writes are flushed.
    fn disconnect(&self);

    fn set_read_framing(&self, framing: ReadFraming);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_framing_waits_for_newline() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHost"[..]);

        let line = ReadFraming::Line.split(&mut buf).unwrap();
        assert_eq!(&line[..], b"GET / HTTP/1.1\r\n");
        assert!(ReadFraming::Line.split(&mut buf).is_none());
        assert_eq!(&buf[..], b"Host");
    }

    #[test]
    fn length_framing_hands_out_partial_reads() {
        let mut buf = BytesMut::from(&b"abc"[..]);

        let first = ReadFraming::Length(5).split(&mut buf).unwrap();
        assert_eq!(&first[..], b"abc");
        assert!(ReadFraming::Length(2).split(&mut buf).is_none());
    }
}
