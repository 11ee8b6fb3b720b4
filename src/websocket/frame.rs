//! WebSocket frame codec (RFC 6455 section 5).
//!
//! The decoder buffers partial reads and yields whole frames with the mask
//! removed. Frames from clients must be masked; frames we send never are.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Largest payload accepted from a client.
pub const MAX_PAYLOAD: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("reserved opcode {0:#x}")]
    ReservedOpcode(u8),
    #[error("reserved bits set")]
    ReservedBits,
    #[error("client frame is not masked")]
    Unmasked,
    #[error("control frame is fragmented or too long")]
    InvalidControl,
    #[error("payload of {0} bytes exceeds limit")]
    TooLarge(u64),
    #[error("continuation frame without a message to continue")]
    UnexpectedContinuation,
    #[error("new message started before the previous one finished")]
    InterleavedMessage,
    #[error("text message is not valid UTF-8")]
    InvalidUtf8,
}

impl FrameError {
    /// Close status code to send back for this error.
    pub fn close_code(&self) -> u16 {
        match self {
            FrameError::TooLarge(_) => 1009,
            FrameError::InvalidUtf8 => 1007,
            _ => 1002,
        }
    }
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Buffered bytes not yet decoded.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Decodes the next buffered frame, or `None` if it is incomplete.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.buf.len() < 2 {
            return Ok(None);
        }

        let b1 = self.buf[0];
        let b2 = self.buf[1];

        if b1 & 0x70 != 0 {
            return Err(FrameError::ReservedBits);
        }
        let fin = b1 & 0x80 != 0;
        let opcode = Opcode::from_u8(b1 & 0x0f).ok_or(FrameError::ReservedOpcode(b1 & 0x0f))?;

        if b2 & 0x80 == 0 {
            return Err(FrameError::Unmasked);
        }

        let (len, header_len) = match b2 & 0x7f {
            126 => {
                if self.buf.len() < 4 {
                    return Ok(None);
                }
                (u16::from_be_bytes([self.buf[2], self.buf[3]]) as u64, 4)
            }
            127 => {
                if self.buf.len() < 10 {
                    return Ok(None);
                }
                let mut ext = [0u8; 8];
                ext.copy_from_slice(&self.buf[2..10]);
                (u64::from_be_bytes(ext), 10)
            }
            n => (n as u64, 2),
        };

        if opcode.is_control() && (!fin || len > 125) {
            return Err(FrameError::InvalidControl);
        }
        if len > MAX_PAYLOAD {
            return Err(FrameError::TooLarge(len));
        }

        let len = len as usize;
        let total = header_len + 4 + len;
        if self.buf.len() < total {
            return Ok(None);
        }

        self.buf.advance(header_len);
        let mut mask = [0u8; 4];
        mask.copy_from_slice(&self.buf[..4]);
        self.buf.advance(4);

        let mut payload = self.buf.split_to(len);
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }

        Ok(Some(Frame {
            fin,
            opcode,
            payload: payload.freeze(),
        }))
    }
}

/// Encodes a single unmasked, final frame.
pub fn encode(opcode: Opcode, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + 10);
    buf.put_u8(0x80 | opcode.as_u8());

    match payload.len() {
        n if n < 126 => buf.put_u8(n as u8),
        n if n <= u16::MAX as usize => {
            buf.put_u8(126);
            buf.put_u16(n as u16);
        }
        n => {
            buf.put_u8(127);
            buf.put_u64(n as u64);
        }
    }

    buf.put_slice(payload);
    buf.freeze()
}

/// Encodes a close frame carrying a status code.
pub fn encode_close(code: u16) -> Bytes {
    encode(Opcode::Close, &code.to_be_bytes())
}

#[cfg(test)]
pub(crate) fn mask_frame(fin: bool, opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mask = [0x37, 0xfa, 0x21, 0x3d];
    let mut out = vec![(if fin { 0x80 } else { 0 }) | opcode.as_u8()];

    match payload.len() {
        n if n < 126 => out.push(0x80 | n as u8),
        n => {
            out.push(0x80 | 126);
            out.extend_from_slice(&(n as u16).to_be_bytes());
        }
    }
    out.extend_from_slice(&mask);
    out.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_rfc_masked_hello() {
        // RFC 6455 5.7: single-frame masked text message "Hello".
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58]);

        let frame = decoder.next_frame().unwrap().unwrap();
        assert!(frame.fin);
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(&frame.payload[..], b"Hello");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn waits_for_the_whole_frame() {
        let bytes = mask_frame(true, Opcode::Binary, &[1, 2, 3, 4, 5, 6]);
        let mut decoder = FrameDecoder::new();

        decoder.push(&bytes[..5]);
        assert_eq!(decoder.next_frame().unwrap(), None);

        decoder.push(&bytes[5..]);
        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(&frame.payload[..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn rejects_unmasked_client_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&encode(Opcode::Text, b"hi"));
        assert_eq!(decoder.next_frame(), Err(FrameError::Unmasked));
    }

    #[test]
    fn extended_length_encoding() {
        let payload = vec![0u8; 300];
        let frame = encode(Opcode::Binary, &payload);
        assert_eq!(&frame[..4], &[0x82, 126, 0x01, 0x2c]);
        assert_eq!(frame.len(), 304);
    }
}
