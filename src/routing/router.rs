use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::config::StaticFilesConfig;
use crate::http::connection::Connection;
use crate::http::mime;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::resource::Resource;
use crate::routing::cache::{CachePolicy, CachedFile, StaticCache};
use crate::routing::table::{RouteTable, segments};
use crate::routing::{Route, RouteContext, Stage, call};
use crate::session::SessionRef;
use crate::websocket::WebSocketMultiplexer;

/// Upper bound on how many prefixes are tried for one request.
pub const MAX_ROUTE_DEPTH: usize = 10;

/// A response and the stage that produced it.
#[derive(Debug)]
pub struct Resolution {
    pub stage: Stage,
    pub response: Response,
}

impl Resolution {
    fn new(stage: Stage, response: Response) -> Self {
        Self { stage, response }
    }
}

pub struct Router {
    static_files: StaticFilesConfig,
    cache: Option<StaticCache>,
    root: Option<Arc<dyn Route>>,
    routes: RouteTable,
    websocket: Arc<WebSocketMultiplexer>,
}

impl Router {
    pub fn new(
        static_files: StaticFilesConfig,
        root: Option<Arc<dyn Route>>,
        routes: RouteTable,
        websocket: Arc<WebSocketMultiplexer>,
    ) -> Self {
        let cache = static_files.cache.enabled.then(|| {
            StaticCache::new(match static_files.cache.max_entries {
                Some(max) => CachePolicy::MaxEntries(max),
                None => CachePolicy::Unbounded,
            })
        });

        Self {
            static_files,
            cache,
            root,
            routes,
            websocket,
        }
    }

    pub fn cache(&self) -> Option<&StaticCache> {
        self.cache.as_ref()
    }

    /// Resolves a request to a response. The first stage that answers wins.
    pub fn resolve(
        &self,
        request: &Request,
        connection: &dyn Connection,
        mut resource: Option<&mut Resource>,
        session: &SessionRef<'_>,
    ) -> Resolution {
        if let Some(response) = self.from_cache(request) {
            return Resolution::new(Stage::Cache, response);
        }

        if let Some(response) = self.websocket.try_upgrade(request, connection) {
            return Resolution::new(Stage::Upgrade, response);
        }

        if let Some(response) = self.from_static(request) {
            return Resolution::new(Stage::Static, response);
        }

        if let Some(response) = self.from_root(request, connection, resource.as_deref_mut(), session) {
            return Resolution::new(Stage::Root, response);
        }

        if let Some(response) = self.from_routes(request, connection, resource, session) {
            return Resolution::new(Stage::Route, response);
        }

        trace!(method = %request.method, uri = %request.uri, "No route matched");
        Resolution::new(Stage::NotFound, Response::not_found())
    }

    fn from_cache(&self, request: &Request) -> Option<Response> {
        if request.method != Method::GET {
            return None;
        }
        let cached = self.cache.as_ref()?.get(&request.uri)?;
        Some(self.static_response(cached))
    }

    fn from_static(&self, request: &Request) -> Option<Response> {
        if request.method != Method::GET {
            return None;
        }

        let (path, body) = self.read_static(&request.uri)?;
        let file = CachedFile {
            body: Bytes::from(body),
            content_type: mime::from_path(&path),
        };

        debug!(uri = %request.uri, path = %path.display(), "Serving static file");

        if let Some(cache) = &self.cache {
            cache.insert(&request.uri, file.clone());
        }
        Some(self.static_response(file))
    }

    /// Tries `<root>/static<uri>`, then `<root>/static/<uri>/<index>`.
    fn read_static(&self, uri: &str) -> Option<(PathBuf, Vec<u8>)> {
        let base = self.static_files.root.join("static");

        let direct = base.join(uri.trim_start_matches('/'));
        if let Some(body) = read_file(&direct) {
            return Some((direct, body));
        }

        let trimmed = uri.trim_matches('/');
        let index = if trimmed.is_empty() {
            base.join(&self.static_files.index)
        } else {
            base.join(trimmed).join(&self.static_files.index)
        };
        read_file(&index).map(|body| (index, body))
    }

    fn static_response(&self, file: CachedFile) -> Response {
        ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", file.content_type)
            .header("Cache-Control", self.static_files.cache_control.as_str())
            .body(file.body.to_vec())
            .build()
    }

    fn from_root(
        &self,
        request: &Request,
        connection: &dyn Connection,
        resource: Option<&mut Resource>,
        session: &SessionRef<'_>,
    ) -> Option<Response> {
        if request.uri != "/" {
            return None;
        }
        let root = self.root.as_ref()?;

        let mut ctx = RouteContext {
            request,
            remaining: &[],
            connection,
            resource,
            session,
        };
        call(root.as_ref(), request.method, &mut ctx)
    }

    /// Longest-prefix match over the path segments.
    ///
    /// Starts from the full segment chain and moves the last segment into
    /// `remaining` after each miss, for at most [`MAX_ROUTE_DEPTH`] attempts.
    /// A route whose verb operation returns `None` counts as a miss.
    fn from_routes(
        &self,
        request: &Request,
        connection: &dyn Connection,
        mut resource: Option<&mut Resource>,
        session: &SessionRef<'_>,
    ) -> Option<Response> {
        let mut chain = segments(&request.uri);
        let mut popped: Vec<String> = Vec::new();

        for _ in 0..MAX_ROUTE_DEPTH {
            if chain.is_empty() {
                break;
            }

            if let Some(route) = self.routes.get(&chain) {
                let remaining: Vec<String> = popped.iter().rev().cloned().collect();
                let mut ctx = RouteContext {
                    request,
                    remaining: &remaining,
                    connection,
                    resource: resource.as_deref_mut(),
                    session,
                };

                if let Some(response) = call(route.as_ref(), request.method, &mut ctx) {
                    debug!(
                        route = %chain.join("/"),
                        remaining = ?remaining,
                        method = request.method.verb(),
                        "Route matched"
                    );
                    return Some(response);
                }
            }

            if let Some(last) = chain.pop() {
                popped.push(last);
            }
        }

        None
    }
}

fn read_file(path: &Path) -> Option<Vec<u8>> {
    if !path.is_file() {
        return None;
    }
    std::fs::read(path).ok()
}
