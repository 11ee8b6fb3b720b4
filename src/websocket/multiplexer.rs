use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::http::connection::{Connection, ConnectionId};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::websocket::frame::{self, FrameDecoder, FrameError, MAX_PAYLOAD, Opcode};
use crate::websocket::handshake;

/// A decoded WebSocket message, one variant per data or control opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
    /// Close with the peer's status code, if it sent one.
    Close(Option<u16>),
    Ping(Bytes),
    Pong(Bytes),
}

/// Application callback for upgraded connections.
///
/// Invoked inline on the thread delivering the read event. Pings have
/// already been answered and closes are echoed after the callback returns.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, message: Message, socket: &WebSocket<'_>);
}

/// Echoes text and binary messages back to the sender.
#[derive(Debug, Default)]
pub struct EchoSocket;

impl MessageHandler for EchoSocket {
    fn on_message(&self, message: Message, socket: &WebSocket<'_>) {
        match message {
            Message::Text(text) => socket.send_text(&text),
            Message::Binary(data) => socket.send_binary(&data),
            _ => {}
        }
    }
}

/// Write side of an upgraded connection.
pub struct WebSocket<'a> {
    conn: &'a dyn Connection,
}

impl<'a> WebSocket<'a> {
    pub fn new(conn: &'a dyn Connection) -> Self {
        Self { conn }
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    pub fn send_text(&self, text: &str) {
        self.conn.write(frame::encode(Opcode::Text, text.as_bytes()));
    }

    pub fn send_binary(&self, data: &[u8]) {
        self.conn.write(frame::encode(Opcode::Binary, data));
    }

    pub fn ping(&self, data: &[u8]) {
        self.conn.write(frame::encode(Opcode::Ping, data));
    }

    /// Sends a close frame and disconnects.
    pub fn close(&self, code: u16) {
        self.conn.write(frame::encode_close(code));
        self.conn.disconnect();
    }
}

/// Per-connection protocol state.
#[derive(Debug, Default)]
struct Protocol {
    decoder: FrameDecoder,
    fragments: Option<(Opcode, BytesMut)>,
    closed: bool,
}

impl Protocol {
    /// Decodes every complete frame in `data` into messages. Stops at the
    /// first close frame or error.
    fn decode(&mut self, data: &[u8]) -> (Vec<Message>, Option<FrameError>) {
        let mut messages = Vec::new();
        if self.closed {
            return (messages, None);
        }
        self.decoder.push(data);

        loop {
            match self.next_message() {
                Ok(Some(message)) => {
                    let is_close = matches!(message, Message::Close(_));
                    messages.push(message);
                    if is_close {
                        self.closed = true;
                        return (messages, None);
                    }
                }
                Ok(None) => return (messages, None),
                Err(e) => {
                    self.closed = true;
                    return (messages, Some(e));
                }
            }
        }
    }

    fn next_message(&mut self) -> Result<Option<Message>, FrameError> {
        while let Some(frame) = self.decoder.next_frame()? {
            match frame.opcode {
                Opcode::Close => {
                    let code = (frame.payload.len() >= 2)
                        .then(|| u16::from_be_bytes([frame.payload[0], frame.payload[1]]));
                    return Ok(Some(Message::Close(code)));
                }
                Opcode::Ping => return Ok(Some(Message::Ping(frame.payload))),
                Opcode::Pong => return Ok(Some(Message::Pong(frame.payload))),
                Opcode::Continuation => {
                    let (opcode, mut buf) = self
                        .fragments
                        .take()
                        .ok_or(FrameError::UnexpectedContinuation)?;
                    buf.extend_from_slice(&frame.payload);
                    if buf.len() as u64 > MAX_PAYLOAD {
                        return Err(FrameError::TooLarge(buf.len() as u64));
                    }
                    if frame.fin {
                        return message(opcode, buf.freeze()).map(Some);
                    }
                    self.fragments = Some((opcode, buf));
                }
                Opcode::Text | Opcode::Binary => {
                    if self.fragments.is_some() {
                        return Err(FrameError::InterleavedMessage);
                    }
                    if frame.fin {
                        return message(frame.opcode, frame.payload).map(Some);
                    }
                    self.fragments = Some((frame.opcode, BytesMut::from(&frame.payload[..])));
                }
            }
        }
        Ok(None)
    }
}

fn message(opcode: Opcode, payload: Bytes) -> Result<Message, FrameError> {
    match opcode {
        Opcode::Text => String::from_utf8(payload.to_vec())
            .map(Message::Text)
            .map_err(|_| FrameError::InvalidUtf8),
        _ => Ok(Message::Binary(payload)),
    }
}

/// Tracks upgraded connections and routes their reads to the frame decoder.
pub struct WebSocketMultiplexer {
    handler: Arc<dyn MessageHandler>,
    sockets: DashMap<ConnectionId, Protocol>,
}

impl WebSocketMultiplexer {
    pub fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            handler,
            sockets: DashMap::new(),
        }
    }

    /// Completes the upgrade handshake if `request` asks for one.
    ///
    /// On success the connection is registered as upgraded and the
    /// `101 Switching Protocols` response is returned. Any missing or invalid
    /// header yields `None` so ordinary routing can take over.
    pub fn try_upgrade(&self, request: &Request, conn: &dyn Connection) -> Option<Response> {
        let key = handshake::validate(request)?;

        self.sockets.insert(conn.id(), Protocol::default());
        debug!(conn = %conn.id(), uri = %request.uri, "WebSocket upgrade accepted");

        Some(handshake::switching_protocols(key))
    }

    pub fn is_upgraded(&self, id: ConnectionId) -> bool {
        self.sockets.contains_key(&id)
    }

    /// Number of upgraded connections.
    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    /// Decodes a read event from an upgraded connection and dispatches every
    /// complete message. Returns `false` if the connection is not upgraded.
    pub fn on_data(&self, data: &[u8], conn: &dyn Connection) -> bool {
        let (messages, error) = match self.sockets.get_mut(&conn.id()) {
            Some(mut protocol) => protocol.decode(data),
            None => return false,
        };

        let socket = WebSocket::new(conn);

        for message in messages {
            match &message {
                Message::Ping(payload) => conn.write(frame::encode(Opcode::Pong, payload)),
                Message::Close(code) => {
                    debug!(conn = %conn.id(), code = ?code, "WebSocket close received");
                    self.handler.on_message(message.clone(), &socket);
                    socket.close(code.unwrap_or(1000));
                    return true;
                }
                _ => {}
            }
            self.handler.on_message(message, &socket);
        }

        if let Some(e) = error {
            warn!(conn = %conn.id(), error = %e, "WebSocket protocol error");
            socket.close(e.close_code());
        }

        true
    }

    /// Forgets a connection. Called from the disconnect path.
    pub fn release(&self, id: ConnectionId) -> bool {
        self.sockets.remove(&id).is_some()
    }
}
