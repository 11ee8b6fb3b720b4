//! Request routing.
//!
//! A request is resolved by trying, in order: the static-file cache, a
//! WebSocket upgrade, static files, the root route, path-registered routes
//! (longest registered prefix first) and finally 404.

pub mod cache;
pub mod router;
pub mod table;

use std::fmt;

use crate::http::connection::Connection;
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::resource::Resource;
use crate::session::SessionRef;

pub use router::{MAX_ROUTE_DEPTH, Resolution, Router};
pub use table::{RouteError, RouteTable};

/// Everything a route handler receives for one request.
pub struct RouteContext<'a> {
    pub request: &'a Request,
    /// Path segments after the registered prefix that matched.
    pub remaining: &'a [String],
    pub connection: &'a dyn Connection,
    pub resource: Option<&'a mut Resource>,
    pub session: &'a SessionRef<'a>,
}

/// A handler bound to a path.
///
/// One operation per HTTP verb. The default implementations return `None`,
/// which means "not my request": resolution carries on with a shorter prefix.
pub trait Route: Send + Sync {
    fn get(&self, _ctx: &mut RouteContext<'_>) -> Option<Response> {
        None
    }

    fn post(&self, _ctx: &mut RouteContext<'_>) -> Option<Response> {
        None
    }

    fn put(&self, _ctx: &mut RouteContext<'_>) -> Option<Response> {
        None
    }

    fn delete(&self, _ctx: &mut RouteContext<'_>) -> Option<Response> {
        None
    }

    fn patch(&self, _ctx: &mut RouteContext<'_>) -> Option<Response> {
        None
    }

    fn head(&self, _ctx: &mut RouteContext<'_>) -> Option<Response> {
        None
    }

    fn options(&self, _ctx: &mut RouteContext<'_>) -> Option<Response> {
        None
    }
}

/// Invokes the operation named after `method`.
pub(crate) fn call(route: &dyn Route, method: Method, ctx: &mut RouteContext<'_>) -> Option<Response> {
    match method {
        Method::GET => route.get(ctx),
        Method::POST => route.post(ctx),
        Method::PUT => route.put(ctx),
        Method::DELETE => route.delete(ctx),
        Method::PATCH => route.patch(ctx),
        Method::HEAD => route.head(ctx),
        Method::OPTIONS => route.options(ctx),
    }
}

/// Which resolution step produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Middleware,
    Cache,
    Upgrade,
    Static,
    Root,
    Route,
    NotFound,
    /// Dispatch failed before any stage answered.
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Middleware => "middleware",
            Stage::Cache => "cache",
            Stage::Upgrade => "upgrade",
            Stage::Static => "static",
            Stage::Root => "root",
            Stage::Route => "route",
            Stage::NotFound => "not_found",
            Stage::Error => "error",
        })
    }
}
