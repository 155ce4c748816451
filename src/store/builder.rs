//! Cache configuration and builder.
//!
//! ## Example
//!
//! ```rust
//! use stashkit::store::CacheBuilder;
//! use stashkit::strategy::{IdleStrategy, TidyStrategy};
//!
//! let cache = CacheBuilder::<String>::new(100)
//!     .max_total_size(1 << 20)
//!     .strategy(TidyStrategy)
//!     .strategy(IdleStrategy)
//!     .build();
//! assert_eq!(cache.capacity(), 100);
//! ```

use crate::error::{CacheError, Result};
use crate::store::CacheStore;
use crate::strategy::{AgeStrategy, EvictionStrategy, TidyStrategy};
use crate::traits::CacheItem;

/// Store-wide limits, set once at construction and read-only afterwards.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum entry count.
    pub capacity: usize,
    /// Maximum total declared size across all entries.
    pub max_total_size: i64,
    /// Maximum declared size of a single entry.
    pub max_item_size: i64,
    /// Fraction of either limit that triggers an eviction scan, in (0, 1].
    pub eviction_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            max_total_size: i64::MAX,
            max_item_size: i64::MAX,
            eviction_threshold: 1.0,
        }
    }
}

/// Builder for [`CacheStore`] instances.
///
/// Strategies appended via [`strategy`](Self::strategy) form the eviction
/// chain in call order; an empty chain gets the default `[Tidy, Age]`.
pub struct CacheBuilder<V: CacheItem> {
    config: CacheConfig,
    strategies: Vec<Box<dyn EvictionStrategy<V>>>,
}

impl<V: CacheItem> CacheBuilder<V> {
    /// Start a builder with the given entry-count capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            config: CacheConfig {
                capacity,
                ..CacheConfig::default()
            },
            strategies: Vec::new(),
        }
    }

    /// Cap the total declared size across all entries.
    pub fn max_total_size(mut self, max: i64) -> Self {
        self.config.max_total_size = max;
        self
    }

    /// Cap the declared size of a single entry.
    pub fn max_item_size(mut self, max: i64) -> Self {
        self.config.max_item_size = max;
        self
    }

    /// Set the fraction of either limit that triggers an eviction scan.
    pub fn eviction_threshold(mut self, threshold: f64) -> Self {
        self.config.eviction_threshold = threshold;
        self
    }

    /// Append a strategy to the eviction chain.
    pub fn strategy(mut self, strategy: impl EvictionStrategy<V> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Validate the configuration and build the store.
    pub fn try_build(self) -> Result<CacheStore<V>> {
        let config = self.config;
        if config.capacity == 0 {
            return Err(CacheError::Config("capacity must be > 0".to_string()));
        }
        if config.max_total_size <= 0 {
            return Err(CacheError::Config(
                "max_total_size must be > 0".to_string(),
            ));
        }
        if config.max_item_size <= 0 {
            return Err(CacheError::Config("max_item_size must be > 0".to_string()));
        }
        if !(config.eviction_threshold > 0.0 && config.eviction_threshold <= 1.0) {
            return Err(CacheError::Config(
                "eviction_threshold must be in (0, 1]".to_string(),
            ));
        }

        let strategies = if self.strategies.is_empty() {
            vec![
                Box::new(TidyStrategy) as Box<dyn EvictionStrategy<V>>,
                Box::new(AgeStrategy) as Box<dyn EvictionStrategy<V>>,
            ]
        } else {
            self.strategies
        };

        Ok(CacheStore::with_parts(config, strategies))
    }

    /// Build the store, panicking on an invalid configuration.
    ///
    /// Use [`try_build`](Self::try_build) for user-supplied parameters.
    pub fn build(self) -> CacheStore<V> {
        match self.try_build() {
            Ok(store) => store,
            Err(err) => panic!("invalid cache configuration: {err}"),
        }
    }
}
