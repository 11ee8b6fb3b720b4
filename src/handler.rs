//! The dispatch orchestrator.
//!
//! [`Handler`] receives the socket layer's events for every connection and
//! wires the request assembler, session store, middleware chain, router and
//! WebSocket multiplexer together:
//!
//! ```text
//! read event ──► upgraded? ──yes──► WebSocketMultiplexer
//!                   │no
//!                   ▼
//!            RequestAssembler ──► session ──► middleware ──► router
//!                                                             │
//!                          write ◄── Set-Cookie decoration ◄──┘
//! ```
//!
//! Per-connection state is keyed by [`ConnectionId`] and removed on
//! disconnect. Shared state (sessions, cache) is safe to use from several
//! connection tasks at once.

use std::sync::Arc;

use anyhow::Context;
use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::http::assembler::{Assembly, RequestAssembler};
use crate::http::connection::{Connection, ConnectionId, ReadFraming};
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::writer;
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareRegistry};
use crate::resource::{PooledResource, ResourcePool};
use crate::routing::{Resolution, Route, RouteTable, Router, Stage};
use crate::session::SessionStore;
use crate::websocket::{EchoSocket, MessageHandler, WebSocketMultiplexer};

pub struct Handler {
    assemblers: DashMap<ConnectionId, RequestAssembler>,
    sessions: SessionStore,
    middleware: MiddlewareChain,
    router: Router,
    websocket: Arc<WebSocketMultiplexer>,
    pool: Option<Arc<dyn ResourcePool>>,
    max_body: usize,
}

impl Handler {
    pub fn builder(config: Config) -> HandlerBuilder {
        HandlerBuilder::new(config)
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn websocket(&self) -> &WebSocketMultiplexer {
        &self.websocket
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Number of connections with HTTP state.
    pub fn pending_connections(&self) -> usize {
        self.assemblers.len()
    }

    pub fn on_connected(&self, conn: &dyn Connection) {
        self.assemblers
            .insert(conn.id(), RequestAssembler::with_limit(self.max_body));
        conn.set_read_framing(ReadFraming::Line);
        debug!(conn = %conn.id(), "Connection registered");
    }

    /// Handles one read event.
    pub fn on_data(&self, data: &[u8], conn: &dyn Connection) {
        let id = conn.id();

        if self.websocket.on_data(data, conn) {
            return;
        }

        // The entry guard must be released before dispatch: an upgrade
        // removes this connection's assembler.
        let outcome = self
            .assemblers
            .entry(id)
            .or_insert_with(|| RequestAssembler::with_limit(self.max_body))
            .feed(data);

        match outcome {
            Ok(Assembly::Read(framing)) => conn.set_read_framing(framing),
            Ok(Assembly::Continue(framing)) => {
                debug!(conn = %id, "Sending 100 Continue");
                conn.write(writer::encode(&Response::interim_continue()));
                conn.set_read_framing(framing);
            }
            Ok(Assembly::Complete(request)) => self.respond(request, conn),
            Err(e) => {
                warn!(conn = %id, error = %e, "Dropping malformed request");
                conn.set_read_framing(ReadFraming::Line);
            }
        }
    }

    pub fn on_disconnected(&self, conn: &dyn Connection) {
        let id = conn.id();
        let pending = self
            .assemblers
            .remove(&id)
            .map(|(_, a)| !a.is_idle())
            .unwrap_or(false);
        let upgraded = self.websocket.release(id);

        info!(conn = %id, upgraded, discarded_request = pending, "Connection closed");
    }

    pub fn on_write_failed(&self, conn: &dyn Connection, err: &std::io::Error) {
        warn!(conn = %conn.id(), error = %err, "Write failed");
    }

    /// Timer entry point: drops expired sessions.
    pub fn sweep_sessions(&self) -> usize {
        self.sessions.sweep()
    }

    fn respond(&self, mut request: Request, conn: &dyn Connection) {
        let id = conn.id();

        let resolution = self.dispatch(&mut request, conn).unwrap_or_else(|e| {
            error!(conn = %id, uri = %request.uri, error = ?e, "Request failed");
            Resolution {
                stage: Stage::Error,
                response: Response::internal_error(),
            }
        });
        let status = resolution.response.status;

        conn.write(writer::encode(&resolution.response));

        info!(
            conn = %id,
            method = %request.method,
            uri = %request.uri,
            status = status.as_u16(),
            stage = %resolution.stage,
            elapsed_ms = request.elapsed().as_secs_f64() * 1000.0,
            "Request handled"
        );

        if status == StatusCode::SwitchingProtocols {
            self.assemblers.remove(&id);
            conn.set_read_framing(ReadFraming::Stream);
            return;
        }

        conn.set_read_framing(ReadFraming::Line);
        if request.wants_close() {
            conn.disconnect();
        }
    }

    /// Runs a complete request through session lookup, middleware and the
    /// router.
    ///
    /// The pooled resource is borrowed before the middleware run and handed
    /// back when this returns, whichever stage answered.
    pub fn dispatch(&self, request: &mut Request, conn: &dyn Connection) -> anyhow::Result<Resolution> {
        let session = self
            .sessions
            .find_or_create(request)
            .context("session lookup failed")?;

        let mut resource = match &self.pool {
            Some(pool) => Some(PooledResource::acquire(pool.as_ref()).context("resource pool exhausted")?),
            None => None,
        };

        let request: &Request = request;

        let mut resolution = match self.middleware.run(request, resource.as_deref_mut(), &session) {
            Some(response) => Resolution {
                stage: Stage::Middleware,
                response,
            },
            None => self
                .router
                .resolve(request, conn, resource.as_deref_mut(), &session),
        };

        if resolution.stage != Stage::NotFound {
            session.decorate(&mut resolution.response);
        }

        Ok(resolution)
    }
}

/// Assembles a [`Handler`] from configuration plus registered routes,
/// middleware and WebSocket callbacks.
pub struct HandlerBuilder {
    config: Config,
    root: Option<Arc<dyn Route>>,
    routes: Vec<(String, Arc<dyn Route>)>,
    registry: MiddlewareRegistry,
    mounts: Vec<(String, Vec<String>)>,
    sockets: Arc<dyn MessageHandler>,
    pool: Option<Arc<dyn ResourcePool>>,
}

impl HandlerBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            root: None,
            routes: Vec::new(),
            registry: MiddlewareRegistry::new(),
            mounts: Vec::new(),
            sockets: Arc::new(EchoSocket),
            pool: None,
        }
    }

    /// Handler for `/`.
    pub fn root(mut self, route: impl Route + 'static) -> Self {
        self.root = Some(Arc::new(route));
        self
    }

    pub fn route(mut self, path: &str, route: impl Route + 'static) -> Self {
        self.routes.push((path.to_string(), Arc::new(route)));
        self
    }

    /// Makes a middleware available under `name`.
    pub fn middleware(mut self, name: &str, middleware: impl Middleware + 'static) -> Self {
        self.registry.register(name, middleware);
        self
    }

    /// Mounts named middleware on a prefix, after those from configuration.
    pub fn mount(mut self, prefix: &str, names: &[&str]) -> Self {
        self.mounts.push((
            prefix.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        ));
        self
    }

    pub fn websocket(mut self, handler: impl MessageHandler + 'static) -> Self {
        self.sockets = Arc::new(handler);
        self
    }

    pub fn pool(mut self, pool: Arc<dyn ResourcePool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Fails if a route path is invalid or a mounted middleware name is unknown.
    pub fn build(self) -> anyhow::Result<Handler> {
        let mut table = RouteTable::new();
        for (path, route) in self.routes {
            table.insert(&path, route)?;
        }

        let mut middleware = MiddlewareChain::from_config(&self.config.middleware, &self.registry)?;
        for (prefix, names) in &self.mounts {
            middleware.mount(prefix, names.as_slice(), &self.registry)?;
        }

        let websocket = Arc::new(WebSocketMultiplexer::new(self.sockets));
        let router = Router::new(self.config.static_files, self.root, table, websocket.clone());

        Ok(Handler {
            assemblers: DashMap::new(),
            sessions: SessionStore::new(self.config.session),
            middleware,
            router,
            websocket,
            pool: self.pool,
            max_body: self.config.server.max_body_bytes,
        })
    }
}
