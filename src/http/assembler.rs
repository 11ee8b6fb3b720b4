//! Incremental request assembly.
//!
//! One [`RequestAssembler`] lives per HTTP connection. Each read event the
//! transport delivers is fed in; the assembler answers with the framing it
//! wants for the next read, an interim `100 Continue`, or the finished
//! request.
//!
//! ```text
//!   RequestLine ──► Headers ──┬─► Complete                (no body)
//!                             ├─► Body(n) ──► Complete    (Content-Length)
//!                             └─► ChunkSize ◄─► ChunkData
//!                                     │
//!                                     └─► Trailers ──► Complete
//! ```
//!
//! Headers are read one line per event. A malformed line fails the request
//! with a [`ParseError`]; the assembler then resets so the connection can
//! carry the next request.

use bytes::BytesMut;

use crate::http::connection::ReadFraming;
use crate::http::parser::{self, ParseError};
use crate::http::request::Request;

/// Default cap on a request body, declared or chunked.
pub const DEFAULT_MAX_BODY: usize = 8 * 1024 * 1024;

/// Most bytes reserved up front from a client-declared length.
const PREALLOC_LIMIT: usize = 64 * 1024;

/// What the transport should do after a read event has been consumed.
#[derive(Debug)]
pub enum Assembly {
    /// Keep reading with this framing.
    Read(ReadFraming),
    /// Send an interim `100 Continue`, then read with this framing.
    Continue(ReadFraming),
    /// The request is complete.
    Complete(Request),
}

#[derive(Debug, Default)]
enum State {
    #[default]
    RequestLine,
    Headers(Request),
    Body {
        request: Request,
        remaining: usize,
        body: BytesMut,
    },
    ChunkSize {
        request: Request,
        body: BytesMut,
    },
    ChunkData {
        request: Request,
        body: BytesMut,
        chunk: BytesMut,
        remaining: usize,
    },
    Trailers {
        request: Request,
        body: BytesMut,
    },
}

/// Per-connection request framing state machine.
#[derive(Debug)]
pub struct RequestAssembler {
    state: State,
    continued: bool,
    max_body: usize,
}

impl Default for RequestAssembler {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_BODY)
    }
}

impl RequestAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// An assembler that rejects bodies larger than `max_body` bytes.
    pub fn with_limit(max_body: usize) -> Self {
        Self {
            state: State::RequestLine,
            continued: false,
            max_body,
        }
    }

    pub fn max_body(&self) -> usize {
        self.max_body
    }

    /// True while no request is in flight.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::RequestLine)
    }

    /// True while the body of a request acknowledged with `100 Continue` is pending.
    pub fn awaiting_continuation(&self) -> bool {
        self.continued
    }

    /// Drops any partially assembled request.
    pub fn reset(&mut self) {
        self.state = State::RequestLine;
        self.continued = false;
    }

    /// Consumes one read event.
    ///
    /// On error the in-flight request is discarded and the assembler is
    /// ready for a new request line.
    pub fn feed(&mut self, data: &[u8]) -> Result<Assembly, ParseError> {
        let state = std::mem::take(&mut self.state);

        match self.advance(state, data) {
            Ok((next, assembly)) => {
                self.state = next;
                if matches!(assembly, Assembly::Complete(_)) {
                    self.continued = false;
                }
                Ok(assembly)
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    fn advance(&mut self, state: State, data: &[u8]) -> Result<(State, Assembly), ParseError> {
        let read_line = Assembly::Read(ReadFraming::Line);

        match state {
            State::RequestLine => {
                // Stray CRLFs between requests are ignored.
                if parser::is_blank_line(data) {
                    return Ok((State::RequestLine, read_line));
                }

                let line = parser::decode_request_line(data)?;
                let (uri, query) = parser::normalize_uri(&line.target)?;

                let mut request = Request::new(line.method, uri, line.version);
                request.query = query;

                tracing::trace!(method = %request.method, uri = %request.uri, "Request line read");
                Ok((State::Headers(request), read_line))
            }

            State::Headers(mut request) => {
                if parser::is_blank_line(data) {
                    return self.end_of_headers(request);
                }

                let (key, value) = parser::decode_header(data)?;
                request.headers.append(key, value);
                Ok((State::Headers(request), read_line))
            }

            State::Body {
                request,
                remaining,
                mut body,
            } => {
                let take = remaining.min(data.len());
                body.extend_from_slice(&data[..take]);
                let remaining = remaining - take;

                if remaining == 0 {
                    Ok((State::RequestLine, finish(request, body)))
                } else {
                    Ok((
                        State::Body {
                            request,
                            remaining,
                            body,
                        },
                        Assembly::Read(ReadFraming::Length(remaining)),
                    ))
                }
            }

            State::ChunkSize { request, body } => {
                let size = parser::decode_chunk_size(data)?;

                if size == 0 {
                    return Ok((State::Trailers { request, body }, read_line));
                }

                if size > self.max_body.saturating_sub(body.len()) {
                    return Err(ParseError::BodyTooLarge);
                }

                // Chunk data is followed by its own CRLF.
                let remaining = size.checked_add(2).ok_or(ParseError::InvalidChunkSize)?;
                Ok((
                    State::ChunkData {
                        request,
                        body,
                        chunk: BytesMut::with_capacity(remaining.min(PREALLOC_LIMIT)),
                        remaining,
                    },
                    Assembly::Read(ReadFraming::Length(remaining)),
                ))
            }

            State::ChunkData {
                request,
                mut body,
                mut chunk,
                remaining,
            } => {
                let take = remaining.min(data.len());
                chunk.extend_from_slice(&data[..take]);
                let remaining = remaining - take;

                if remaining > 0 {
                    return Ok((
                        State::ChunkData {
                            request,
                            body,
                            chunk,
                            remaining,
                        },
                        Assembly::Read(ReadFraming::Length(remaining)),
                    ));
                }

                if !chunk.ends_with(b"\r\n") {
                    return Err(ParseError::InvalidChunk);
                }
                chunk.truncate(chunk.len() - 2);
                body.extend_from_slice(&chunk);

                Ok((State::ChunkSize { request, body }, read_line))
            }

            State::Trailers { mut request, body } => {
                if parser::is_blank_line(data) {
                    return Ok((State::RequestLine, finish(request, body)));
                }

                let (key, value) = parser::decode_header(data)?;
                request.headers.append(key, value);
                Ok((State::Trailers { request, body }, read_line))
            }
        }
    }

    fn end_of_headers(&mut self, request: Request) -> Result<(State, Assembly), ParseError> {
        let expects_continue = request.expects_continue();

        let (state, framing) = if request.is_chunked() {
            (
                State::ChunkSize {
                    request,
                    body: BytesMut::new(),
                },
                ReadFraming::Line,
            )
        } else {
            let length = request.content_length();
            if length == 0 {
                return Ok((State::RequestLine, finish(request, BytesMut::new())));
            }
            if length > self.max_body {
                return Err(ParseError::BodyTooLarge);
            }
            (
                State::Body {
                    request,
                    remaining: length,
                    body: BytesMut::with_capacity(length.min(PREALLOC_LIMIT)),
                },
                ReadFraming::Length(length),
            )
        };

        if expects_continue && !self.continued {
            self.continued = true;
            Ok((state, Assembly::Continue(framing)))
        } else {
            Ok((state, Assembly::Read(framing)))
        }
    }
}

fn finish(mut request: Request, body: BytesMut) -> Assembly {
    if !body.is_empty() {
        request.attach_body(body.freeze());
    }
    request.mark_complete();
    Assembly::Complete(request)
}
