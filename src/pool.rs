//! [`Pool`]: the public facade, and [`PoolInner`], the state it shares
//! across clones, borrowers and releasers.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;
use tokio::sync::oneshot;

use crate::config::{PoolConfig, Status};
use crate::error::PoolError;
use crate::manager::Manager;
use crate::pooled::PooledRef;

pub(crate) const OPEN: u8 = 0;
pub(crate) const DISPOSED: u8 = 1;

/// One borrower waiting in [`PoolInner::pending`].
///
/// `cancelled` is flipped by a drop guard owned by the borrowing future
/// (see [`Pool::borrow`]) the moment that future is dropped without having
/// received a value — whether because the caller cancelled it or because
/// it already completed. The drainer treats a flipped flag as "skip this
/// entry", satisfying spec §3's "no further callback is invoked" rule.
pub(crate) struct PendingBorrower<M: Manager> {
    pub(crate) tx: oneshot::Sender<Result<PooledRef<M>, PoolError<M::Error>>>,
    pub(crate) cancelled: Arc<AtomicBool>,
}

pub(crate) struct PoolInner<M: Manager> {
    pub(crate) manager: M,
    pub(crate) config: PoolConfig,
    pub(crate) available: SegQueue<M::Resource>,
    pub(crate) pending: SegQueue<PendingBorrower<M>>,
    pub(crate) live: AtomicUsize,
    pub(crate) available_count: AtomicUsize,
    pub(crate) pending_count: AtomicUsize,
    pub(crate) state: AtomicU8,
    pub(crate) drain_tickets: AtomicUsize,
}

/// A generic, reactive object and connection pool.
///
/// Cloning a `Pool` is cheap; all clones share the same underlying state
/// (spec §2: the `Pool` facade owns the available/pending queues and the
/// `live`/`pendingCount` counters) through an `Arc`.
pub struct Pool<M: Manager> {
    pub(crate) inner: Arc<PoolInner<M>>,
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: Manager> Pool<M> {
    /// Build a new pool, synchronously pre-warming `config.min_size()`
    /// resources (spec §4.1).
    ///
    /// # Errors
    ///
    /// If any pre-warm allocation fails, the already-allocated resources
    /// from this attempt are torn down and the constructor itself fails
    /// with that error: no partial pool is ever exposed.
    pub async fn new(manager: M, config: PoolConfig) -> Result<Self, M::Error> {
        let mut warmed = Vec::with_capacity(config.min_size());
        for _ in 0..config.min_size() {
            match manager.create().await {
                Ok(resource) => warmed.push(resource),
                Err(err) => {
                    for mut resource in warmed {
                        manager.destroy(&mut resource).await;
                    }
                    return Err(err);
                }
            }
        }
        let live = warmed.len();
        let available = SegQueue::new();
        for resource in warmed {
            available.push(resource);
        }
        let inner = Arc::new(PoolInner {
            manager,
            config,
            available,
            pending: SegQueue::new(),
            live: AtomicUsize::new(live),
            available_count: AtomicUsize::new(live),
            pending_count: AtomicUsize::new(0),
            state: AtomicU8::new(OPEN),
            drain_tickets: AtomicUsize::new(0),
        });
        Ok(Self { inner })
    }

    /// Acquire a resource, waiting for one to become available if
    /// necessary (spec §4.1, §6).
    ///
    /// # Errors
    ///
    /// Fails with [`PoolError::Shutdown`] if the pool is disposed, either
    /// before this call started or while it was waiting. Fails with
    /// [`PoolError::Allocator`] if an allocation triggered by this borrow
    /// failed.
    pub async fn borrow(&self) -> Result<PooledRef<M>, PoolError<M::Error>> {
        if self.inner.state.load(Ordering::Acquire) == DISPOSED {
            return Err(PoolError::Shutdown);
        }

        let (tx, rx) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        self.inner.pending.push(PendingBorrower {
            tx,
            cancelled: cancelled.clone(),
        });
        self.inner.pending_count.fetch_add(1, Ordering::AcqRel);
        self.inner.schedule_drain();

        // Flips `cancelled` the instant this future is dropped, whether
        // that's because the caller cancelled the borrow (spec §4.1) or
        // simply because `rx` resolved and we're tearing down normally.
        // Either way nothing further should be delivered to this entry.
        struct CancelOnDrop(Arc<AtomicBool>);
        impl Drop for CancelOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::Release);
            }
        }
        let _guard = CancelOnDrop(cancelled);

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(PoolError::Shutdown),
        }
    }

    /// Acquire a resource, run `user` over it, and guarantee exactly one
    /// release on every terminal signal: normal completion, an error
    /// surfaced through `T`, or this future being dropped/cancelled
    /// mid-flight (spec §4.1).
    ///
    /// Cancellation safety falls out of [`PooledRef`]'s own `Drop` impl:
    /// if this future is dropped while `user`'s future is still running,
    /// the in-scope `PooledRef` is dropped with it and its `Drop`
    /// implementation reclaims the resource through the same release path
    /// used by an explicit [`PooledRef::release`].
    pub async fn borrow_in_scope<F, Fut, T>(&self, user: F) -> Result<T, PoolError<M::Error>>
    where
        F: FnOnce(&mut M::Resource) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut pooled = self.borrow().await?;
        let result = user(&mut pooled).await;
        let _ = pooled.release().await;
        Ok(result)
    }

    /// Shut the pool down.
    ///
    /// Idempotent (spec §4.1, §8): a second call observes the same
    /// terminal state and does nothing further. Resources currently on
    /// loan are left untouched; they are destroyed by their own release
    /// once the borrower returns them.
    pub async fn dispose(&self) {
        self.inner.dispose().await;
    }

    /// `true` once [`Pool::dispose`] has completed.
    pub fn is_disposed(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == DISPOSED
    }

    /// A point-in-time snapshot of pool occupancy.
    pub fn status(&self) -> Status {
        Status {
            max_size: self.inner.config.max_size(),
            size: self.inner.live.load(Ordering::Relaxed),
            available: self.inner.available_count.load(Ordering::Relaxed),
            pending: self.inner.pending_count.load(Ordering::Relaxed),
        }
    }
}
