//! The drainer: pairs available resources with pending borrowers.
//!
//! This is the non-reentrant, serialised loop of spec §4.3, realized with
//! a ticket counter: the thread that bumps `drain_tickets` from `0` to `1`
//! runs `drain_pass` in a loop; every other caller just bumps the counter
//! and returns, trusting the runner to notice and run another pass on
//! their behalf. `drain_pass` itself never `.await`s anything — allocating
//! a new resource and reclaiming a resource that lost the cancel-vs-delivery
//! race are both detached onto `tokio::spawn`, which is what lets the pass
//! stay a purely synchronous, lock-free state-machine step.
//!
//! Disposal is folded into this same loop rather than handled as a one-shot
//! side effect of `dispose()`: every push to `available` or `pending` is
//! always followed by a `schedule_drain()` call, and `drain_pass` itself
//! checks `state` fresh on every invocation. So a push that lands after
//! `dispose()`'s own drain has already emptied both queues still triggers
//! at least one more `drain_pass`, under the ticket protocol's guarantee
//! that an increment observed during a running pass is answered by another
//! pass before the loop exits — and that pass finds `state == DISPOSED` and
//! cleans the straggler up itself. No entry is ever stranded.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::{PoolError, ReleaseError};
use crate::manager::Manager;
use crate::pool::{PendingBorrower, PoolInner, DISPOSED, OPEN};
use crate::pooled::PooledRef;

impl<M: Manager> PoolInner<M> {
    /// Entry point called by `borrow()`, `release()`, `dispose()`, and the
    /// detached allocator/reclaim tasks. See the module docs for the
    /// ticket-counter protocol.
    pub(crate) fn schedule_drain(self: &Arc<Self>) {
        if self.drain_tickets.fetch_add(1, Ordering::AcqRel) == 0 {
            loop {
                self.drain_pass();
                if self.drain_tickets.fetch_sub(1, Ordering::AcqRel) == 1 {
                    break;
                }
            }
        }
    }

    fn drain_pass(self: &Arc<Self>) {
        log::trace!("drain: starting pass");

        if self.state.load(Ordering::Acquire) == DISPOSED {
            self.drain_disposed();
            return;
        }

        loop {
            if let Some(resource) = self.available.pop() {
                self.available_count.fetch_sub(1, Ordering::AcqRel);
                match self.pop_next_live_borrower() {
                    Some(borrower) => {
                        self.deliver(resource, borrower);
                        continue;
                    }
                    None => {
                        // No one to hand it to right now; put it back and
                        // stop — matches the "(ref, none): break" case.
                        self.available.push(resource);
                        self.available_count.fetch_add(1, Ordering::AcqRel);
                        break;
                    }
                }
            } else if self.pending_count.load(Ordering::Acquire) > 0 {
                if self.try_reserve_slot() {
                    self.spawn_allocate();
                    break;
                } else {
                    break;
                }
            } else {
                break;
            }
        }
    }

    /// Drain whatever currently sits in `available`/`pending` under a
    /// disposed pool: destroy every available resource, fail every
    /// non-cancelled pending borrower with [`PoolError::Shutdown`]. Reached
    /// both from `dispose()`'s own first pass and from every later
    /// `drain_pass` invocation, which is what catches entries pushed after
    /// `dispose()` already returned (spec §4.1, §8: no resource is ever
    /// leaked, and every acquisition handle completes exactly once).
    fn drain_disposed(self: &Arc<Self>) {
        while let Some(resource) = self.available.pop() {
            self.available_count.fetch_sub(1, Ordering::AcqRel);
            let pool = self.clone();
            tokio::spawn(async move {
                pool.destroy(resource).await;
                pool.live.fetch_sub(1, Ordering::AcqRel);
            });
        }

        while let Some(borrower) = self.pending.pop() {
            self.pending_count.fetch_sub(1, Ordering::AcqRel);
            if !borrower.cancelled.load(Ordering::Acquire) {
                let _ = borrower.tx.send(Err(PoolError::Shutdown));
            }
        }
    }

    /// Pop borrowers off the pending queue until one that hasn't observed
    /// cancellation is found (spec §4.3: "case (ref, none): break" implies
    /// cancelled entries are simply skipped, never matched).
    fn pop_next_live_borrower(&self) -> Option<PendingBorrower<M>> {
        loop {
            let borrower = self.pending.pop()?;
            self.pending_count.fetch_sub(1, Ordering::AcqRel);
            if borrower.cancelled.load(Ordering::Acquire) {
                continue;
            }
            return Some(borrower);
        }
    }

    /// CAS `live` up by one, capped at `max_size` (spec §4.3, §5: `live`
    /// never exceeds `max_size` under contention).
    fn try_reserve_slot(&self) -> bool {
        let max_size = self.config.max_size();
        let mut current = self.live.load(Ordering::Acquire);
        loop {
            if current >= max_size {
                return false;
            }
            match self.live.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Deliver `resource` to `borrower`, honoring the delivery-thread
    /// contract of spec §4.3: scheduled on `config.delivery_context` when
    /// set, otherwise sent inline on whichever thread ran this pass.
    fn deliver(self: &Arc<Self>, resource: M::Resource, borrower: PendingBorrower<M>) {
        let pooled = PooledRef::new(resource, Arc::downgrade(self));
        match self.config.delivery_context() {
            Some(runtime) => {
                let pool = self.clone();
                let tx = borrower.tx;
                runtime.spawn(async move {
                    if let Err(Ok(leftover)) = tx.send(Ok(pooled)) {
                        pool.reclaim(leftover);
                    }
                });
            }
            None => {
                if let Err(Ok(leftover)) = borrower.tx.send(Ok(pooled)) {
                    self.reclaim(leftover);
                }
            }
        }
    }

    fn spawn_allocate(self: &Arc<Self>) {
        log::trace!("drain: spawning allocation");
        let pool = self.clone();
        tokio::spawn(async move {
            match pool.manager.create().await {
                Ok(resource) => {
                    pool.available.push(resource);
                    pool.available_count.fetch_add(1, Ordering::AcqRel);
                    pool.schedule_drain();
                }
                Err(err) => {
                    log::debug!("pool allocator failed, failing the waiting borrower");
                    pool.live.fetch_sub(1, Ordering::AcqRel);
                    if let Some(borrower) = pool.pop_next_live_borrower() {
                        let _ = borrower.tx.send(Err(PoolError::Allocator(err)));
                    }
                    pool.schedule_drain();
                }
            }
        });
    }

    /// Reclaim a [`PooledRef`] that either was never explicitly released
    /// (spec §4.4's fallback: the pool owner dropped it) or lost the
    /// cancel-vs-delivery race of spec §4.4's borrower-cancel-after-delivery
    /// path. Both cases run the same detached release path.
    pub(crate) fn reclaim(self: &Arc<Self>, mut pooled: PooledRef<M>) {
        let Some(slot) = pooled.inner.take() else {
            return;
        };
        let pool = self.clone();
        tokio::spawn(async move {
            let _ = pool.release_resource(slot.resource).await;
        });
    }

    /// The full release protocol of spec §4.4: invalidation check, then
    /// the release handler, then either requeue or destroy.
    ///
    /// The requeue path pushes to `available` and then unconditionally
    /// calls `schedule_drain()`, same as every other producer; that is what
    /// lets a release racing a concurrent `dispose()` self-correct through
    /// `drain_pass`'s `drain_disposed` branch instead of stranding the
    /// resource in an available queue nobody drains again.
    pub(crate) async fn release_resource(
        self: &Arc<Self>,
        mut resource: M::Resource,
    ) -> Result<(), ReleaseError<M::Error>> {
        if self.state.load(Ordering::Acquire) == DISPOSED {
            self.destroy(resource).await;
            self.live.fetch_sub(1, Ordering::AcqRel);
            return Ok(());
        }

        if self.manager.is_invalid(&resource) {
            log::debug!("released resource failed is_invalid, destroying instead of recycling");
            self.destroy(resource).await;
            self.live.fetch_sub(1, Ordering::AcqRel);
            self.schedule_drain();
            return Ok(());
        }

        match self.manager.release(&mut resource).await {
            Ok(()) => {
                self.available.push(resource);
                self.available_count.fetch_add(1, Ordering::AcqRel);
                self.schedule_drain();
                Ok(())
            }
            Err(err) => {
                self.destroy(resource).await;
                self.live.fetch_sub(1, Ordering::AcqRel);
                self.schedule_drain();
                Err(ReleaseError(err))
            }
        }
    }

    async fn destroy(&self, mut resource: M::Resource) {
        self.manager.destroy(&mut resource).await;
    }

    /// The body of `Pool::dispose()` (spec §4.1). Transitions the pool to
    /// `DISPOSED`, no-op on a second call, then drains both queues:
    /// destroys every available resource, fails every non-cancelled
    /// pending borrower with [`PoolError::Shutdown`]. Resources on loan
    /// are left alone; their own release will find `state == DISPOSED`
    /// and destroy them (spec §4.4).
    ///
    /// The final `schedule_drain()` call is not a no-op: it is what catches
    /// a `borrow()` or `release_resource()` push that raced the two drain
    /// loops above and landed after they already observed both queues
    /// empty (see the module docs).
    pub(crate) async fn dispose(self: &Arc<Self>) {
        if self.state.swap(DISPOSED, Ordering::AcqRel) == DISPOSED {
            return;
        }

        while let Some(resource) = self.available.pop() {
            self.available_count.fetch_sub(1, Ordering::AcqRel);
            self.destroy(resource).await;
            self.live.fetch_sub(1, Ordering::AcqRel);
        }

        while let Some(borrower) = self.pending.pop() {
            self.pending_count.fetch_sub(1, Ordering::AcqRel);
            if !borrower.cancelled.load(Ordering::Acquire) {
                let _ = borrower.tx.send(Err(PoolError::Shutdown));
            }
        }

        self.schedule_drain();
    }
}

#[allow(dead_code)]
const _ASSERT_STATE_CONSTANTS_DISTINCT: () = assert!(OPEN != DISPOSED);
