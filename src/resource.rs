//! Borrowed per-request resources.
//!
//! A pool (typically database connections) lends one [`Resource`] to each
//! request. [`PooledResource`] hands it back when dropped, so the handle is
//! released exactly once on every exit path.

use std::any::Any;
use std::ops::{Deref, DerefMut};

/// Type-erased resource handle.
pub struct Resource(Box<dyn Any + Send>);

impl Resource {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut()
    }

    pub fn into_inner<T: Any>(self) -> Result<T, Self> {
        self.0.downcast().map(|b| *b).map_err(Self)
    }

    fn placeholder() -> Self {
        Self(Box::new(()))
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource").finish_non_exhaustive()
    }
}

pub trait ResourcePool: Send + Sync {
    fn acquire(&self) -> anyhow::Result<Resource>;

    fn release(&self, resource: Resource);
}

/// A resource on loan from a pool.
pub struct PooledResource<'a> {
    pool: &'a dyn ResourcePool,
    resource: Resource,
}

impl<'a> PooledResource<'a> {
    pub fn acquire(pool: &'a dyn ResourcePool) -> anyhow::Result<Self> {
        let resource = pool.acquire()?;
        Ok(Self { pool, resource })
    }
}

impl Deref for PooledResource<'_> {
    type Target = Resource;

    fn deref(&self) -> &Resource {
        &self.resource
    }
}

impl DerefMut for PooledResource<'_> {
    fn deref_mut(&mut self) -> &mut Resource {
        &mut self.resource
    }
}

impl Drop for PooledResource<'_> {
    fn drop(&mut self) {
        let resource = std::mem::replace(&mut self.resource, Resource::placeholder());
        self.pool.release(resource);
    }
}
