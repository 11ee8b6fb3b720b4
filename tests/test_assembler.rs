use bytes::BytesMut;
use portico::http::assembler::{Assembly, DEFAULT_MAX_BODY, RequestAssembler};
use portico::http::connection::ReadFraming;
use portico::http::parser::ParseError;
use portico::http::request::{Method, Request};

/// Delivers `input` to the assembler `piece` bytes at a time, the way a
/// socket might, and collects every completed request.
fn assemble_in_pieces(input: &[u8], piece: usize) -> (Vec<Request>, usize) {
    let mut assembler = RequestAssembler::new();
    let mut framing = ReadFraming::Line;
    let mut buf = BytesMut::new();
    let mut requests = Vec::new();
    let mut continues = 0;

    for part in input.chunks(piece) {
        buf.extend_from_slice(part);
        while let Some(event) = framing.split(&mut buf) {
            match assembler.feed(&event).unwrap() {
                Assembly::Read(next) => framing = next,
                Assembly::Continue(next) => {
                    continues += 1;
                    framing = next;
                }
                Assembly::Complete(request) => {
                    requests.push(request);
                    framing = ReadFraming::Line;
                }
            }
        }
    }

    (requests, continues)
}

#[test]
fn test_body_is_identical_for_any_delivery_split() {
    let body: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let mut input = b"POST /upload HTTP/1.1\r\nContent-Length: 1000\r\n\r\n".to_vec();
    input.extend_from_slice(&body);

    for piece in [1, 2, 3, 7, 64, 999, 4096] {
        let (requests, _) = assemble_in_pieces(&input, piece);
        assert_eq!(requests.len(), 1, "piece size {}", piece);
        assert_eq!(requests[0].body().map(|b| b.to_vec()), Some(body.clone()));
    }
}

#[test]
fn test_zero_content_length_completes_without_body_read() {
    let mut assembler = RequestAssembler::new();

    assembler.feed(b"POST /api HTTP/1.1\r\n").unwrap();
    assembler.feed(b"Content-Length: 0\r\n").unwrap();
    let outcome = assembler.feed(b"\r\n").unwrap();

    match outcome {
        Assembly::Complete(request) => assert!(request.body().is_none()),
        other => panic!("expected completion, got {:?}", other),
    }
    assert!(assembler.is_idle());
}

#[test]
fn test_expect_continue_is_signalled_once() {
    let input = b"POST /upload HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 4\r\n\r\nbody";

    for piece in [1, 3, input.len()] {
        let (requests, continues) = assemble_in_pieces(input, piece);
        assert_eq!(continues, 1);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body().map(|b| &b[..]), Some(&b"body"[..]));
    }
}

#[test]
fn test_continue_state_clears_on_completion() {
    let mut assembler = RequestAssembler::new();

    assembler.feed(b"PUT /f HTTP/1.1\r\n").unwrap();
    assembler.feed(b"Expect: 100-continue\r\n").unwrap();
    assembler.feed(b"Content-Length: 2\r\n").unwrap();
    assert!(matches!(
        assembler.feed(b"\r\n").unwrap(),
        Assembly::Continue(ReadFraming::Length(2))
    ));
    assert!(assembler.awaiting_continuation());

    assert!(matches!(assembler.feed(b"ok").unwrap(), Assembly::Complete(_)));
    assert!(!assembler.awaiting_continuation());
}

#[test]
fn test_expect_continue_without_body_completes() {
    let (requests, continues) =
        assemble_in_pieces(b"POST /x HTTP/1.1\r\nExpect: 100-continue\r\n\r\n", 16);

    assert_eq!(requests.len(), 1);
    assert_eq!(continues, 0);
}

#[test]
fn test_chunked_body_is_joined() {
    let input = b"POST /chunked HTTP/1.1\r\n\
Transfer-Encoding: chunked\r\n\
\r\n\
5\r\nHello\r\n\
7;ext=1\r\n, world\r\n\
0\r\n\
X-Trailer: yes\r\n\
\r\n";

    for piece in [1, 5, input.len()] {
        let (requests, _) = assemble_in_pieces(input, piece);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body().map(|b| &b[..]), Some(&b"Hello, world"[..]));
    }

    let (requests, _) =
        assemble_in_pieces(b"POST /c HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n", 4);
    assert!(requests[0].body().is_none());
}

#[test]
fn test_chunked_takes_precedence_over_content_length() {
    let input = b"POST /c HTTP/1.1\r\nContent-Length: 100\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nok\r\n0\r\n\r\n";
    let (requests, _) = assemble_in_pieces(input, 8);

    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body().map(|b| &b[..]), Some(&b"ok"[..]));
}

#[test]
fn test_bad_chunk_terminator_is_rejected() {
    let mut assembler = RequestAssembler::new();

    assembler.feed(b"POST /c HTTP/1.1\r\n").unwrap();
    assembler.feed(b"Transfer-Encoding: chunked\r\n").unwrap();
    assembler.feed(b"\r\n").unwrap();
    assembler.feed(b"2\r\n").unwrap();

    assert_eq!(assembler.feed(b"okXX").unwrap_err(), ParseError::InvalidChunk);
    assert!(assembler.is_idle());
}

#[test]
fn test_pipelined_requests() {
    let input = b"GET /one HTTP/1.1\r\n\r\nPOST /two HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /three HTTP/1.1\r\n\r\n";
    let (requests, _) = assemble_in_pieces(input, 11);

    let uris: Vec<&str> = requests.iter().map(|r| r.uri.as_str()).collect();
    assert_eq!(uris, vec!["/one", "/two", "/three"]);
    assert_eq!(requests[1].method, Method::POST);
    assert_eq!(requests[1].body().map(|b| &b[..]), Some(&b"abc"[..]));
}

#[test]
fn test_leading_blank_lines_are_skipped() {
    let (requests, _) = assemble_in_pieces(b"\r\n\r\nGET / HTTP/1.1\r\n\r\n", 4);
    assert_eq!(requests.len(), 1);
}

#[test]
fn test_malformed_header_resets_for_next_request() {
    let mut assembler = RequestAssembler::new();

    assembler.feed(b"GET / HTTP/1.1\r\n").unwrap();
    assert_eq!(
        assembler.feed(b"BrokenHeader\r\n").unwrap_err(),
        ParseError::InvalidHeader
    );
    assert!(assembler.is_idle());

    assembler.feed(b"GET /again HTTP/1.1\r\n").unwrap();
    match assembler.feed(b"\r\n").unwrap() {
        Assembly::Complete(request) => assert_eq!(request.uri, "/again"),
        other => panic!("expected completion, got {:?}", other),
    }
}

#[test]
fn test_invalid_method_is_rejected() {
    let mut assembler = RequestAssembler::new();
    assert_eq!(
        assembler.feed(b"BREW /pot HTTP/1.1\r\n").unwrap_err(),
        ParseError::InvalidMethod
    );
}

fn feed_headers(assembler: &mut RequestAssembler, lines: &[&str]) -> Result<Assembly, ParseError> {
    let mut last = Err(ParseError::InvalidRequest);
    for line in lines {
        last = assembler.feed(line.as_bytes());
        if last.is_err() {
            break;
        }
    }
    last
}

#[test]
fn test_huge_content_length_is_rejected() {
    let mut assembler = RequestAssembler::new();
    assert_eq!(assembler.max_body(), DEFAULT_MAX_BODY);

    let outcome = feed_headers(
        &mut assembler,
        &["POST /x HTTP/1.1\r\n", "Content-Length: 18446744073709551615\r\n", "\r\n"],
    );

    assert_eq!(outcome.unwrap_err(), ParseError::BodyTooLarge);
    assert!(assembler.is_idle());

    assembler.feed(b"GET /next HTTP/1.1\r\n").unwrap();
    assert!(matches!(assembler.feed(b"\r\n").unwrap(), Assembly::Complete(_)));
}

#[test]
fn test_content_length_at_limit_is_accepted() {
    let mut assembler = RequestAssembler::with_limit(10);

    let outcome = feed_headers(
        &mut assembler,
        &["POST /x HTTP/1.1\r\n", "Content-Length: 10\r\n", "\r\n"],
    );
    assert!(matches!(outcome.unwrap(), Assembly::Read(ReadFraming::Length(10))));
    assert!(matches!(assembler.feed(b"0123456789").unwrap(), Assembly::Complete(_)));

    let outcome = feed_headers(
        &mut assembler,
        &["POST /x HTTP/1.1\r\n", "Content-Length: 11\r\n", "\r\n"],
    );
    assert_eq!(outcome.unwrap_err(), ParseError::BodyTooLarge);
}

#[test]
fn test_huge_chunk_size_is_rejected() {
    let headers = ["POST /c HTTP/1.1\r\n", "Transfer-Encoding: chunked\r\n", "\r\n"];

    let mut assembler = RequestAssembler::new();
    feed_headers(&mut assembler, &headers).unwrap();
    assert_eq!(
        assembler.feed(b"ffffffffffffffff\r\n").unwrap_err(),
        ParseError::BodyTooLarge
    );
    assert!(assembler.is_idle());

    // Without a practical limit the CRLF allowance itself would overflow.
    let mut unlimited = RequestAssembler::with_limit(usize::MAX);
    feed_headers(&mut unlimited, &headers).unwrap();
    assert_eq!(
        unlimited.feed(b"ffffffffffffffff\r\n").unwrap_err(),
        ParseError::InvalidChunkSize
    );
    assert!(unlimited.is_idle());
}

#[test]
fn test_chunked_total_is_limited() {
    let mut assembler = RequestAssembler::with_limit(8);
    feed_headers(
        &mut assembler,
        &["POST /c HTTP/1.1\r\n", "Transfer-Encoding: chunked\r\n", "\r\n"],
    )
    .unwrap();

    assembler.feed(b"5\r\n").unwrap();
    assembler.feed(b"hello\r\n").unwrap();
    assert_eq!(assembler.feed(b"5\r\n").unwrap_err(), ParseError::BodyTooLarge);
}
