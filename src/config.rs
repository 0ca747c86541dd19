//! Pool configuration.
//!
//! Mirrors the builder shape of `deadpool::managed::PoolBuilder` (the
//! managed-pool module of this lineage): the only way to build a
//! [`PoolConfig`] is through [`PoolConfig::builder`].

use flowpool_runtime::Runtime;

/// Immutable pool parameters (spec §3, §4.1, §6).
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolConfig {
    pub(crate) min_size: usize,
    pub(crate) max_size: usize,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) delivery_context: Option<Runtime>,
}

// `PoolConfig` is only ever constructed through `PoolConfigBuilder::build`,
// which enforces spec §3's `max_size >= max(1, min_size)`. Deriving
// `Deserialize` directly on this struct would let external data skip that
// check entirely, so deserialization instead reads the same two numeric
// fields into a private shadow struct and funnels them through `build()`.
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PoolConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(rename = "PoolConfig")]
        struct Raw {
            #[serde(default)]
            min_size: usize,
            max_size: usize,
        }

        let raw = Raw::deserialize(deserializer)?;
        PoolConfig::builder(raw.max_size)
            .min_size(raw.min_size)
            .build()
            .map_err(serde::de::Error::custom)
    }
}

impl PoolConfig {
    /// Start building a [`PoolConfig`] for a pool with room for up to
    /// `max_size` live resources.
    pub fn builder(max_size: usize) -> PoolConfigBuilder {
        PoolConfigBuilder {
            min_size: 0,
            max_size,
            delivery_context: None,
        }
    }

    /// Count of resources allocated synchronously at construction.
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Hard upper bound on concurrent live resources.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// The execution context borrower delivery is scheduled on, if any.
    pub fn delivery_context(&self) -> Option<Runtime> {
        self.delivery_context
    }
}

/// Builder for [`PoolConfig`].
#[derive(Clone, Copy, Debug)]
pub struct PoolConfigBuilder {
    min_size: usize,
    max_size: usize,
    delivery_context: Option<Runtime>,
}

impl PoolConfigBuilder {
    /// Count of resources allocated synchronously at construction
    /// (spec §4.1). Defaults to `0`.
    pub fn min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    /// Execution context on which to hand the resource to the borrower
    /// (spec §4.3). When unset, delivery happens on whichever thread ran
    /// the matching drain pass.
    pub fn delivery_context(mut self, runtime: Runtime) -> Self {
        self.delivery_context = Some(runtime);
        self
    }

    /// Validate and build the immutable [`PoolConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MaxSizeTooSmall`] if `max_size` is `0` or
    /// smaller than `min_size` (spec §3: `maxSize ≥ max(1, minSize)`).
    pub fn build(self) -> Result<PoolConfig, ConfigError> {
        if self.max_size == 0 || self.max_size < self.min_size {
            return Err(ConfigError::MaxSizeTooSmall {
                max_size: self.max_size,
                min_size: self.min_size,
            });
        }
        Ok(PoolConfig {
            min_size: self.min_size,
            max_size: self.max_size,
            delivery_context: self.delivery_context,
        })
    }
}

/// Error building a [`PoolConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `max_size` must be at least `1` and at least `min_size`.
    #[error("max_size ({max_size}) must be >= 1 and >= min_size ({min_size})")]
    MaxSizeTooSmall {
        /// The offending `max_size`.
        max_size: usize,
        /// The configured `min_size`.
        min_size: usize,
    },
}

/// A point-in-time snapshot of pool occupancy (ambient, see SPEC_FULL §2/§6
/// — every pool facade in this lineage exposes one).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Status {
    /// Configured maximum number of live resources.
    pub max_size: usize,
    /// Resources currently owned by the pool, available or on loan.
    pub size: usize,
    /// Resources currently sitting in the available queue.
    pub available: usize,
    /// Borrowers currently waiting for a resource.
    pub pending: usize,
}
