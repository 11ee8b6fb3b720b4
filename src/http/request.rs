use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::http::headers::Headers;

/// HTTP request methods.
///
/// Represents the HTTP method/verb of a request. Route handlers expose one
/// operation per verb, selected through [`Method::verb`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// # Arguments
    ///
    /// * `s` - String representation of the method (case-sensitive, typically uppercase)
    ///
    /// # Returns
    ///
    /// `Some(Method)` if the string matches a known method, `None` otherwise.
    ///
    /// # Example
    ///
    /// ```
    /// # use portico::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    /// Uppercase wire form of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
        }
    }

    /// Lowercase verb, the name of the route operation that serves it.
    ///
    /// ```
    /// # use portico::http::request::Method;
    /// assert_eq!(Method::PATCH.verb(), "patch");
    /// ```
    pub fn verb(&self) -> &'static str {
        match self {
            Method::GET => "get",
            Method::POST => "post",
            Method::PUT => "put",
            Method::DELETE => "delete",
            Method::HEAD => "head",
            Method::OPTIONS => "options",
            Method::PATCH => "patch",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents an HTTP request read from a client.
///
/// A request is filled in incrementally by the
/// [`RequestAssembler`](crate::http::assembler::RequestAssembler): the request
/// line creates it, headers are appended one at a time, the body is attached
/// at most once and the request is marked complete exactly once.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Normalized request path (e.g. "/index.html"), without the query string
    pub uri: String,
    /// Query string, if the request target carried one
    pub query: Option<String>,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers in arrival order
    pub headers: Headers,
    /// Session ids attached to this request, keyed by session family name
    pub session_ids: HashMap<String, String>,
    body: Option<Bytes>,
    complete: bool,
    started: Instant,
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<Method>,
    uri: Option<String>,
    query: Option<String>,
    version: Option<String>,
    headers: Headers,
    body: Option<Bytes>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            uri: None,
            query: None,
            version: None,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Builds a complete request.
    pub fn build(self) -> Result<Request, &'static str> {
        let mut request = Request::new(
            self.method.ok_or("method missing")?,
            self.uri.ok_or("uri missing")?,
            self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
        );
        request.query = self.query;
        request.headers = self.headers;
        if let Some(body) = self.body {
            request.attach_body(body);
        }
        request.mark_complete();
        Ok(request)
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// Starts a new, incomplete request. The elapsed-time clock starts here.
    pub fn new(method: Method, uri: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            query: None,
            version: version.into(),
            headers: Headers::new(),
            session_ids: HashMap::new(),
            body: None,
            complete: false,
            started: Instant::now(),
        }
    }

    /// Retrieves the first header value by name, ignoring case.
    ///
    /// # Arguments
    ///
    /// * `key` - Header name to look up
    ///
    /// # Returns
    ///
    /// `Some(&str)` with the header value if present, `None` otherwise.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Retrieves the Content-Length header value and parses it as a usize.
    ///
    /// Returns 0 if the header is missing or not a valid number.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Whether the body is sent with `Transfer-Encoding: chunked`.
    pub fn is_chunked(&self) -> bool {
        self.headers.has_token("Transfer-Encoding", "chunked")
    }

    /// Whether the client asked for an interim `100 Continue`.
    pub fn expects_continue(&self) -> bool {
        self.header("Expect")
            .map(|v| v.trim().eq_ignore_ascii_case("100-continue"))
            .unwrap_or(false)
    }

    /// Determines whether the connection should be closed after the response.
    ///
    /// Only an explicit `Connection: close` ends the connection; HTTP/1.1
    /// defaults to keep-alive.
    pub fn wants_close(&self) -> bool {
        self.headers.has_token("Connection", "close")
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Attaches the body. A request carries at most one body; a second call is ignored.
    pub fn attach_body(&mut self, body: impl Into<Bytes>) {
        if self.body.is_none() {
            self.body = Some(body.into());
        }
    }

    /// Session id for the given session family, if one was attached.
    pub fn session_id(&self, key: &str) -> Option<&str> {
        self.session_ids.get(key).map(|v| v.as_str())
    }

    /// Marks the request complete. Returns `false` if it already was.
    pub fn mark_complete(&mut self) -> bool {
        !std::mem::replace(&mut self.complete, true)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Time since the request line was read.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
