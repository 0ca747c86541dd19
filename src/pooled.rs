//! [`PooledRef`]: the custody token handed to a borrower.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Weak;

use crate::error::ReleaseError;
use crate::manager::Manager;
use crate::pool::PoolInner;

/// One borrowed resource, on loan from a [`crate::Pool`].
///
/// A `PooledRef` is in exactly one of three logical locations at any time
/// (spec §3): sitting in the pool's available queue, out on loan to a
/// borrower, or destroyed. This type only ever represents the "on loan"
/// state; the available queue stores bare resources and wraps them back
/// into a `PooledRef` at hand-out time.
#[must_use = "a PooledRef must be released (or dropped) to return its resource to the pool"]
pub struct PooledRef<M: Manager> {
    pub(crate) inner: Option<Slot<M>>,
}

pub(crate) struct Slot<M: Manager> {
    pub(crate) resource: M::Resource,
    pub(crate) pool: Weak<PoolInner<M>>,
}

impl<M: Manager> fmt::Debug for PooledRef<M>
where
    M::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledRef")
            .field("resource", &self.inner.as_ref().map(|s| &s.resource))
            .finish()
    }
}

impl<M: Manager> PooledRef<M> {
    pub(crate) fn new(resource: M::Resource, pool: Weak<PoolInner<M>>) -> Self {
        Self {
            inner: Some(Slot { resource, pool }),
        }
    }

    /// Borrow the underlying resource.
    pub fn poolable(&self) -> &M::Resource {
        &self.inner.as_ref().expect("PooledRef used after release").resource
    }

    /// Mutably borrow the underlying resource.
    pub fn poolable_mut(&mut self) -> &mut M::Resource {
        &mut self.inner.as_mut().expect("PooledRef used after release").resource
    }

    /// Return this resource to the pool it came from (spec §4.4).
    ///
    /// Runs the invalidation predicate, then — if the resource is healthy —
    /// the manager's release handler, before making the resource available
    /// to the next pending borrower. If the release handler fails, the
    /// error surfaces here *and* the resource is destroyed rather than
    /// recycled (spec §4.4, §7): a broken cleaner never leaks a resource
    /// back into the pool.
    ///
    /// Idempotent in the sense spec §4.4 requires: the resource is taken
    /// out of this `PooledRef` synchronously, before any `await` point, so
    /// a second path (e.g. this value's `Drop` impl, if the returned
    /// future is abandoned before being polled at all) can never act on it
    /// twice. Per spec §5, cancelling a release mid-flight is not a
    /// supported operation — once polled, this future should be driven to
    /// completion.
    pub async fn release(mut self) -> Result<(), ReleaseError<M::Error>> {
        let Some(slot) = self.inner.take() else {
            return Ok(());
        };
        let Some(pool) = slot.pool.upgrade() else {
            // The pool itself is gone; nothing to return to.
            return Ok(());
        };
        pool.release_resource(slot.resource).await
    }
}

impl<M: Manager> Deref for PooledRef<M> {
    type Target = M::Resource;
    fn deref(&self) -> &M::Resource {
        self.poolable()
    }
}

impl<M: Manager> DerefMut for PooledRef<M> {
    fn deref_mut(&mut self) -> &mut M::Resource {
        self.poolable_mut()
    }
}

impl<M: Manager> Drop for PooledRef<M> {
    fn drop(&mut self) {
        let Some(slot) = self.inner.take() else {
            return;
        };
        let Some(pool) = slot.pool.upgrade() else {
            return;
        };
        pool.reclaim(Self { inner: Some(slot) });
    }
}
