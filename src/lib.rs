//! Portico - HTTP/WebSocket request dispatch
//!
//! Core library: incremental request assembly, sessions, middleware,
//! routing and WebSocket multiplexing over a pluggable connection layer.

pub mod config;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod resource;
pub mod routing;
pub mod server;
pub mod session;
pub mod websocket;

pub use handler::{Handler, HandlerBuilder};
