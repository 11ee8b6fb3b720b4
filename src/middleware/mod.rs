//! Middleware layer.
//!
//! Middleware run before route resolution and may answer a request
//! themselves (authentication, redirects, maintenance pages). They are
//! registered by name at startup and mounted on path prefixes; a name that
//! resolves to nothing is a configuration error.

pub mod chain;

use std::collections::HashMap;
use std::sync::Arc;

use crate::http::request::Request;
use crate::http::response::Response;
use crate::resource::Resource;
use crate::session::SessionRef;

pub use chain::MiddlewareChain;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MiddlewareError {
    #[error("unknown middleware `{0}`")]
    Unknown(String),
}

/// What a middleware sees of the request.
pub struct MiddlewareContext<'a> {
    pub uri: &'a str,
    pub request: &'a Request,
    pub resource: Option<&'a mut Resource>,
    pub session: &'a SessionRef<'a>,
}

pub trait Middleware: Send + Sync {
    /// Returns a response to answer the request, or `None` to pass.
    fn handle(&self, ctx: &mut MiddlewareContext<'_>) -> Option<Response>;
}

/// Middleware implementations by name.
#[derive(Default, Clone)]
pub struct MiddlewareRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, middleware: impl Middleware + 'static) {
        self.entries.insert(name.into(), Arc::new(middleware));
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Middleware>, MiddlewareError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| MiddlewareError::Unknown(name.to_string()))
    }
}
