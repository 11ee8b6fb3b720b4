//! In-memory cache of static file bodies, keyed by request URI.
//!
//! Unbounded by default: every distinct static URI served stays resident
//! for the life of the process. `MaxEntries` evicts oldest-inserted first.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    Unbounded,
    MaxEntries(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    pub body: Bytes,
    pub content_type: &'static str,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CachedFile>,
    order: VecDeque<String>,
}

#[derive(Debug)]
pub struct StaticCache {
    policy: CachePolicy,
    inner: Mutex<Inner>,
}

impl StaticCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn get(&self, uri: &str) -> Option<CachedFile> {
        self.lock().entries.get(uri).cloned()
    }

    pub fn insert(&self, uri: &str, file: CachedFile) {
        let mut inner = self.lock();

        if inner.entries.insert(uri.to_string(), file).is_none() {
            inner.order.push_back(uri.to_string());
        }

        if let CachePolicy::MaxEntries(max) = self.policy {
            while inner.entries.len() > max {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
