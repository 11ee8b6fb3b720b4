//! WebSocket upgrade and per-connection message dispatch.
//!
//! # Data Flow
//! ```text
//! HTTP request ──► handshake::validate ──► 101 Switching Protocols
//!                                              │
//!        reads on the upgraded connection ◄────┘
//!                 │
//!                 ▼
//!         FrameDecoder ──► Message::{Text, Binary, Close, Ping, Pong}
//!                                   │
//!                                   ▼
//!                        MessageHandler::on_message
//! ```

pub mod frame;
pub mod handshake;
pub mod multiplexer;

pub use multiplexer::{EchoSocket, Message, MessageHandler, WebSocket, WebSocketMultiplexer};
