//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.1 side of the dispatch core.
//!
//! # Architecture
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`connection`**: The connection collaborator the socket layer implements
//! - **`assembler`**: Per-connection state machine turning read events into requests
//! - **`parser`**: Decodes request lines, header lines and chunk-size lines
//! - **`headers`**: Ordered, case-insensitive header multimap
//! - **`request`**: HTTP request representation
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Serializes responses to wire bytes
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Read Framing
//!
//! The transport cuts its input into read events according to the framing
//! the core last asked for:
//!
//! ```text
//!        ┌─────────────┐
//!        │    Line     │ ← request line, one header per event
//!        └──────┬──────┘
//!               │ blank line, body announced
//!               ▼
//!        ┌──────────────────┐
//!        │   Length(n)      │ ← body bytes, possibly split across events
//!        └──────┬───────────┘
//!               │ body complete, response written
//!               ├─ HTTP → Line (same connection)
//!               └─ 101 Switching Protocols → Stream (WebSocket frames)
//! ```

pub mod assembler;
pub mod connection;
pub mod headers;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
