use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::{MiddlewareConfig, MiddlewarePolicy};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::middleware::{Middleware, MiddlewareContext, MiddlewareError, MiddlewareRegistry};
use crate::resource::Resource;
use crate::session::SessionRef;

struct Mount {
    prefix: String,
    middleware: Vec<(String, Arc<dyn Middleware>)>,
}

impl Mount {
    /// Registered prefixes may end in `/*` or `/`; both are ignored when
    /// matching. Matching respects segment boundaries: `/api` scopes `/api`
    /// and `/api/v1`, not `/apiary`.
    fn matches(&self, uri: &str) -> bool {
        let prefix = self.prefix.trim_end_matches("/*").trim_end_matches('/');
        match uri.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Ordered, prefix-scoped middleware. Read-only once requests flow.
pub struct MiddlewareChain {
    policy: MiddlewarePolicy,
    mounts: Vec<Mount>,
}

impl MiddlewareChain {
    pub fn new(policy: MiddlewarePolicy) -> Self {
        Self {
            policy,
            mounts: Vec::new(),
        }
    }

    pub fn from_config(
        config: &MiddlewareConfig,
        registry: &MiddlewareRegistry,
    ) -> Result<Self, MiddlewareError> {
        let mut chain = Self::new(config.policy);
        for entry in &config.chains {
            chain.mount(&entry.prefix, entry.middleware.as_slice(), registry)?;
        }
        Ok(chain)
    }

    /// Mounts the named middleware on `prefix`, in order.
    pub fn mount<S: AsRef<str>>(
        &mut self,
        prefix: &str,
        names: &[S],
        registry: &MiddlewareRegistry,
    ) -> Result<(), MiddlewareError> {
        let middleware = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                registry.get(name).map(|m| (name.to_string(), m))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.mounts.push(Mount {
            prefix: prefix.to_string(),
            middleware,
        });
        Ok(())
    }

    pub fn policy(&self) -> MiddlewarePolicy {
        self.policy
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Runs the chain and returns the response to adopt, if any.
    ///
    /// A mount applies to a request when its prefix matches whole path
    /// segments of the URI.
    ///
    /// With [`MiddlewarePolicy::LastMatchWins`] every middleware runs and a
    /// later prefix-matching response replaces an earlier one. With
    /// [`MiddlewarePolicy::FirstMatch`] only prefix-matching middleware run
    /// and the first response ends the chain.
    pub fn run(
        &self,
        request: &Request,
        mut resource: Option<&mut Resource>,
        session: &SessionRef<'_>,
    ) -> Option<Response> {
        let mut adopted = None;

        for mount in &self.mounts {
            let matches = mount.matches(&request.uri);
            if self.policy == MiddlewarePolicy::FirstMatch && !matches {
                continue;
            }

            for (name, middleware) in &mount.middleware {
                let mut ctx = MiddlewareContext {
                    uri: &request.uri,
                    request,
                    resource: resource.as_deref_mut(),
                    session,
                };

                let Some(response) = middleware.handle(&mut ctx) else {
                    continue;
                };

                if !matches {
                    trace!(middleware = %name, prefix = %mount.prefix, "Ignoring response outside prefix");
                    continue;
                }

                debug!(
                    middleware = %name,
                    prefix = %mount.prefix,
                    status = response.status.as_u16(),
                    "Middleware answered request"
                );

                match self.policy {
                    MiddlewarePolicy::FirstMatch => return Some(response),
                    MiddlewarePolicy::LastMatchWins => adopted = Some(response),
                }
            }
        }

        adopted
    }
}
