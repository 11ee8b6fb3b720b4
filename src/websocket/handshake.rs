use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest, Sha1};

use crate::http::request::Request;
use crate::http::response::{Response, ResponseBuilder, StatusCode};

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// `Sec-WebSocket-Accept` for a client key: base64(sha1(key + GUID)).
pub fn accept_key(sec_websocket_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(sec_websocket_key.as_bytes());
    hasher.update(GUID.as_bytes());
    let digest = hasher.finalize();

    STANDARD.encode(digest)
}

/// Checks the upgrade headers and returns the client key when they are valid.
///
/// Requires `Connection: Upgrade`, `Upgrade: websocket`, a key that decodes
/// to 16 bytes, version 13 and a `Sec-WebSocket-Extensions` header.
pub fn validate(request: &Request) -> Option<&str> {
    if !request.headers.has_token("Connection", "upgrade") {
        return None;
    }

    let upgrade = request.header("Upgrade")?;
    if !upgrade.trim().eq_ignore_ascii_case("websocket") {
        return None;
    }

    let key = request.header("Sec-WebSocket-Key")?.trim();
    match STANDARD.decode(key) {
        Ok(nonce) if nonce.len() == 16 => {}
        _ => return None,
    }

    if request.header("Sec-WebSocket-Version")?.trim() != "13" {
        return None;
    }

    request.header("Sec-WebSocket-Extensions")?;

    Some(key)
}

/// The `101 Switching Protocols` answer to a valid handshake.
pub fn switching_protocols(key: &str) -> Response {
    ResponseBuilder::new(StatusCode::SwitchingProtocols)
        .header("Upgrade", "websocket")
        .header("Connection", "Upgrade")
        .header("Sec-WebSocket-Accept", accept_key(key))
        .build()
}
