//! Runtime abstraction used by [`flowpool`](https://crates.io/crates/flowpool)
//! to spawn detached tasks and apply timeouts without hard-coding a single
//! async runtime.
//!
//! The pool engine itself never blocks a thread and never calls a runtime's
//! `spawn` unconditionally; it only reaches for [`Runtime`] when it needs to
//! run a piece of work *off* the calling task — detaching an allocator
//! subscription so the drain pass stays non-blocking, or handing a borrower's
//! completion to a configured delivery context.
#![warn(missing_docs)]

use std::future::Future;
use std::time::Duration;

/// Enumeration of the async runtimes supported by this crate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum Runtime {
    /// Use `tokio` for spawning tasks and timeouts.
    #[cfg(feature = "tokio_1")]
    Tokio1,
    /// Use `async-std` for spawning tasks and timeouts.
    #[cfg(feature = "async-std_1")]
    AsyncStd1,
}

impl Runtime {
    /// Spawn a future onto this runtime, detaching it.
    ///
    /// The spawned task is fire-and-forget: its output is discarded. Callers
    /// that need the result communicate it back out-of-band (e.g. through a
    /// `tokio::sync::oneshot` channel closed over by `future`).
    pub fn spawn<F>(self, future: F)
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match self {
            #[cfg(feature = "tokio_1")]
            Self::Tokio1 => {
                tokio_1::spawn(future);
            }
            #[cfg(feature = "async-std_1")]
            Self::AsyncStd1 => {
                async_std_1::task::spawn(future);
            }
        }
    }

    /// Wait for `future` to resolve, or until `duration` elapses.
    ///
    /// Returns `None` if the timeout elapsed first.
    pub async fn timeout<F: Future>(self, duration: Duration, future: F) -> Option<F::Output> {
        match self {
            #[cfg(feature = "tokio_1")]
            Self::Tokio1 => tokio_1::time::timeout(duration, future).await.ok(),
            #[cfg(feature = "async-std_1")]
            Self::AsyncStd1 => async_std_1::future::timeout(duration, future).await.ok(),
        }
    }
}

#[cfg(all(test, feature = "tokio_1"))]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn spawn_runs_detached() {
        let done = Arc::new(AtomicBool::new(false));
        let done2 = done.clone();
        Runtime::Tokio1.spawn(async move {
            done2.store(true, Ordering::SeqCst);
        });
        // give the spawned task a chance to run
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn timeout_elapses() {
        let result = Runtime::Tokio1
            .timeout(Duration::from_millis(5), async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            })
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn timeout_completes() {
        let result = Runtime::Tokio1.timeout(Duration::from_secs(5), async { 42 }).await;
        assert_eq!(result, Some(42));
    }
}
