//! Flowpool is a reactive, lock-free async object pool.
//!
//! A [`Pool`] hands out [`PooledRef`] values — borrowed resources on loan —
//! to any number of concurrent borrowers, creating resources lazily up to a
//! configured ceiling and reusing them once released. Borrowers that arrive
//! while the pool is at capacity wait in FIFO order for the next resource to
//! become available, whether that resource comes back from another borrower
//! or is freshly allocated.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use flowpool::{Manager, Pool, PoolConfig};
//!
//! #[derive(Debug, thiserror::Error)]
//! enum Error {
//!     #[error("connection failed")]
//!     Fail,
//! }
//!
//! struct Connection;
//!
//! struct ConnectionManager;
//!
//! #[async_trait]
//! impl Manager for ConnectionManager {
//!     type Resource = Connection;
//!     type Error = Error;
//!
//!     async fn create(&self) -> Result<Connection, Error> {
//!         Ok(Connection)
//!     }
//!
//!     async fn release(&self, _conn: &mut Connection) -> Result<(), Error> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PoolConfig::builder(16).build()?;
//! let pool = Pool::new(ConnectionManager, config).await?;
//!
//! let conn = pool.borrow().await?;
//! conn.release().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! | Feature | Description | Extra dependencies | Default |
//! | --- | --- | --- | --- |
//! | `rt_tokio_1` | Enable support for the Tokio runtime in `PoolConfig::delivery_context` | `flowpool-runtime/tokio_1` | no |
//! | `rt_async-std_1` | Enable support for the async-std runtime in `PoolConfig::delivery_context` | `flowpool-runtime/async-std_1` | no |
//!
//! Delivering a resource to the borrower that triggered its allocation and
//! detaching the allocator task itself both rely on the crate's own
//! unconditional `tokio` dependency regardless of which (if any) of the
//! features above is enabled; they only govern the *optional* configured
//! [`PoolConfig::delivery_context`].
#![warn(missing_docs)]

mod drain;

pub mod config;
pub mod error;
pub mod manager;
mod pool;
mod pooled;

pub use config::{ConfigError, PoolConfig, PoolConfigBuilder, Status};
pub use error::{PoolError, ReleaseError, SHUTDOWN_MESSAGE};
pub use manager::{close_and_log, AsyncClose, Manager};
pub use pool::Pool;
pub use pooled::PooledRef;

pub use flowpool_runtime::Runtime;
