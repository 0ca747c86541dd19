//! Error taxonomy for the pool engine.
//!
//! Errors are reported only to the party that can act on them: a borrower
//! sees [`PoolError::Shutdown`] or [`PoolError::Allocator`], a releaser sees
//! [`PoolError::Release`]. Failures of a resource's teardown hook during
//! destruction never surface here at all — they are logged at `WARN` and
//! swallowed (see [`crate::manager::AsyncClose`]).

use std::fmt;

use thiserror::Error;

/// The fixed message a borrow sees once the pool has been disposed.
///
/// Part of the external contract (spec §6): both `borrow()` on a disposed
/// pool and pending borrowers at `dispose()` time fail with exactly this
/// text.
pub const SHUTDOWN_MESSAGE: &str = "Pool has been shut down";

/// Errors a borrower can observe while acquiring a [`crate::PooledRef`].
#[derive(Debug, Error)]
pub enum PoolError<E> {
    /// The pool has been disposed, either before this borrow started or
    /// while it was pending.
    #[error("{}", SHUTDOWN_MESSAGE)]
    Shutdown,

    /// [`crate::manager::Manager::create`] failed while allocating the
    /// resource this borrower was waiting on.
    #[error("pool allocator failed: {0}")]
    Allocator(#[source] E),
}

/// Errors a releaser can observe while returning a [`crate::PooledRef`].
///
/// Carries the underlying resource's own error type. Receiving this error
/// does not mean the resource leaked: the pool always destroys the
/// resource when its release handler fails (spec §4.4, §7).
#[derive(Debug, Error)]
#[error("pool release handler failed: {0}")]
pub struct ReleaseError<E>(#[source] pub E);

impl<E: fmt::Debug> PoolError<E> {
    /// `true` if this error is [`PoolError::Shutdown`].
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}
