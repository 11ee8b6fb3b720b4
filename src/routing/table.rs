use std::collections::HashMap;
use std::sync::Arc;

use crate::routing::Route;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid route path `{0}`")]
    InvalidPath(String),
    #[error("route `{0}` registered twice")]
    Duplicate(String),
}

/// Splits a URI path into its non-empty segments.
pub fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Routes keyed by their path-segment chain.
///
/// Built once at startup. Paths are `/`-separated, non-empty and dot-free:
/// a segment containing `.` names a file, never a route.
#[derive(Default, Clone)]
pub struct RouteTable {
    routes: HashMap<Vec<String>, Arc<dyn Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, route: Arc<dyn Route>) -> Result<(), RouteError> {
        let chain = segments(path);
        if chain.is_empty() || chain.iter().any(|s| s.contains('.')) {
            return Err(RouteError::InvalidPath(path.to_string()));
        }
        if self.routes.contains_key(&chain) {
            return Err(RouteError::Duplicate(path.to_string()));
        }

        self.routes.insert(chain, route);
        Ok(())
    }

    pub fn get(&self, chain: &[String]) -> Option<&Arc<dyn Route>> {
        self.routes.get(chain)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
