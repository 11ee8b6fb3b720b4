#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Bytes, BytesMut};
use portico::config::Config;
use portico::handler::Handler;
use portico::http::connection::{Connection, ConnectionId, ReadFraming};
use portico::http::response::Response;
use portico::routing::{Route, RouteContext};

/// Connection double that records everything the core asks of it.
pub struct MockConnection {
    id: ConnectionId,
    writes: Mutex<Vec<Bytes>>,
    framing: Mutex<ReadFraming>,
    closed: AtomicBool,
}

impl MockConnection {
    pub fn new(id: u64) -> Self {
        Self {
            id: ConnectionId::new(id),
            writes: Mutex::new(Vec::new()),
            framing: Mutex::new(ReadFraming::Line),
            closed: AtomicBool::new(false),
        }
    }

    pub fn writes(&self) -> Vec<Bytes> {
        self.writes.lock().unwrap().clone()
    }

    /// Everything written so far, as text.
    pub fn text(&self) -> String {
        let all: Vec<u8> = self.writes().iter().flat_map(|b| b.iter().copied()).collect();
        String::from_utf8_lossy(&all).into_owned()
    }

    pub fn clear(&self) {
        self.writes.lock().unwrap().clear();
    }

    pub fn framing(&self) -> ReadFraming {
        *self.framing.lock().unwrap()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn write(&self, bytes: Bytes) {
        self.writes.lock().unwrap().push(bytes);
    }

    fn disconnect(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn set_read_framing(&self, framing: ReadFraming) {
        *self.framing.lock().unwrap() = framing;
    }
}

/// Feeds `input` to the handler the way the socket layer would, honoring
/// the framing the core asks for after every event.
pub fn drive(handler: &Handler, conn: &MockConnection, input: &[u8]) {
    let mut buf = BytesMut::from(input);
    while let Some(event) = conn.framing().split(&mut buf) {
        handler.on_data(&event, conn);
    }
}

/// Route that answers GET with `<name>:<remaining segments>`.
pub struct Named(pub &'static str);

impl Route for Named {
    fn get(&self, ctx: &mut RouteContext<'_>) -> Option<Response> {
        Some(Response::ok(format!("{}:{}", self.0, ctx.remaining.join("/"))))
    }
}

/// Route that only answers POST.
pub struct PostOnly(pub &'static str);

impl Route for PostOnly {
    fn post(&self, ctx: &mut RouteContext<'_>) -> Option<Response> {
        let body = ctx.request.body().map(|b| b.to_vec()).unwrap_or_default();
        let mut out = format!("{}:", self.0).into_bytes();
        out.extend_from_slice(&body);
        Some(Response::ok(out))
    }
}

/// A fresh directory under the system temp dir, with a `static/` child.
pub fn static_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("portico-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(root.join("static")).unwrap();
    root
}

/// Config whose static root points at an empty, existing directory.
pub fn config(name: &str) -> Config {
    let mut cfg = Config::default();
    cfg.static_files.root = static_root(name);
    cfg
}

/// Status code of the first response in `text`.
pub fn status(text: &str) -> u16 {
    text.split(' ').nth(1).and_then(|s| s.parse().ok()).unwrap_or(0)
}

/// Body of the last response in `text`.
pub fn body(text: &str) -> &str {
    text.rsplit("\r\n\r\n").next().unwrap_or("")
}

/// The session id from a `Set-Cookie` header in `text`, if any.
pub fn session_cookie(text: &str, key: &str) -> Option<String> {
    let marker = format!("Set-Cookie: {}=", key);
    let start = text.find(&marker)? + marker.len();
    let rest = &text[start..];
    Some(rest[..rest.find(';')?].to_string())
}

/// Client-side (masked) WebSocket frame.
pub fn client_frame(fin: bool, opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mask = [0x11, 0x22, 0x33, 0x44];
    let mut out = vec![(if fin { 0x80 } else { 0 }) | opcode];
    assert!(payload.len() < 126);
    out.push(0x80 | payload.len() as u8);
    out.extend_from_slice(&mask);
    out.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
    out
}

pub const UPGRADE_REQUEST: &str = "GET /chat HTTP/1.1\r\n\
Host: example.com\r\n\
Upgrade: websocket\r\n\
Connection: keep-alive, Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 13\r\n\
Sec-WebSocket-Extensions: permessage-deflate\r\n\
\r\n";
