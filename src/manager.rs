//! The allocator / release-handler / invalidation-predicate contract.
//!
//! spec.md models these as three independent fields of `PoolConfig`. The
//! idiomatic Rust shape for "three operations a user supplies over one
//! resource type" is a single trait implemented once per resource, the way
//! `deadpool::managed::Manager` does it — so `Manager::create` is the
//! allocator, `Manager::release` is the release handler, and
//! `Manager::is_invalid` is the invalidation predicate.

use async_trait::async_trait;

/// Creates new resources and decides what happens to them when they come
/// back from a borrower.
#[async_trait]
pub trait Manager: Send + Sync + 'static {
    /// The resource type this manager produces.
    type Resource: Send;
    /// The error type [`Manager::create`] and [`Manager::release`] can fail
    /// with.
    type Error: Send;

    /// The allocator: produce one fresh resource.
    ///
    /// Called by the drainer whenever a pending borrower needs a resource
    /// that the available queue can't supply and `live < max_size`. A
    /// failure here fails exactly the one borrower that triggered the
    /// allocation (spec §4.3, §7); it never counts toward `live`.
    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// The release handler: run cleanup on a healthy, returning resource.
    ///
    /// Called once per release, only after [`Manager::is_invalid`] returned
    /// `false`. A failure here surfaces to the releaser *and* the resource
    /// is destroyed rather than recycled (spec §4.4, §7) — a broken
    /// cleaner must never leak the resource back into the available queue.
    async fn release(&self, resource: &mut Self::Resource) -> Result<(), Self::Error>;

    /// The invalidation predicate: classify a returning resource as
    /// unhealthy.
    ///
    /// Pure and synchronous per spec §3. The default accepts every
    /// resource (nothing is ever invalidated), which is the right default
    /// for resources with no notion of health.
    fn is_invalid(&self, _resource: &Self::Resource) -> bool {
        false
    }

    /// The "closeable" capability query from spec §3/§4.5, realized as a
    /// manager hook rather than runtime type introspection (Rust has no
    /// stable vtable query for "does `T` implement trait `X`" outside of
    /// `dyn` objects known ahead of time).
    ///
    /// Called exactly once per destroyed resource, after it leaves the
    /// pool for good (invalidated on release, dropped on shutdown, or
    /// released past `max_size`). The default does nothing, which is
    /// correct for resources with no external handle to tear down.
    /// Managers whose resource implements [`AsyncClose`] should override
    /// this with [`close_and_log`].
    async fn destroy(&self, _resource: &mut Self::Resource) {}
}

/// Optional teardown capability a resource may implement.
///
/// spec §3 and §4.5 describe destruction as: if the resource exposes a
/// "closeable" capability, invoke its `close`, log (never propagate)
/// failures, and otherwise just drop the value.
#[async_trait]
pub trait AsyncClose {
    /// The error `close` can fail with. Failures are logged at `WARN` and
    /// never propagated (spec §4.5, §7).
    type Error: std::fmt::Debug;

    /// Tear down this resource's external handle (socket, file descriptor,
    /// connection, ...) ahead of it being dropped.
    async fn close(&mut self) -> Result<(), Self::Error>;
}

/// Close `resource` and log (never propagate) a failure.
///
/// Intended to be called from [`Manager::destroy`] overrides for resources
/// that implement [`AsyncClose`]; centralizes the fixed log message so
/// every caller gets the same wording spec §4.5 requires.
pub async fn close_and_log<R: AsyncClose + Send>(resource: &mut R) {
    if let Err(err) = resource.close().await {
        log::warn!("released Poolable that is Closeable: {:?}", err);
    }
}
