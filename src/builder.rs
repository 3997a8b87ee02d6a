//! Fluent configuration for [`Cache`].
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use polycache::builder::{CacheBuilder, CachePolicy};
//! use polycache::Expiration;
//!
//! let cache = CacheBuilder::new(100)
//!     .policy("arc".parse::<CachePolicy>().unwrap())
//!     .expiration(Duration::from_secs(30))
//!     .loader(|key: &u64| Ok(format!("value-{key}")))
//!     .build();
//!
//! assert_eq!(cache.get(&7).unwrap(), "value-7");
//! cache.set(8, "eight".to_string(), Expiration::Never).unwrap();
//! assert_eq!(cache.policy(), CachePolicy::Arc);
//! ```

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::cache::{Cache, CacheParts, Hooks, Loader};
use crate::clock::{Clock, SystemClock};
use crate::error::{ConfigError, LoadError};
use crate::policy::PolicyStore;

/// Available eviction policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CachePolicy {
    /// Least Recently Used.
    #[default]
    Lru,
    /// Least Frequently Used (bucket-based).
    Lfu,
    /// Adaptive Replacement Cache.
    Arc,
    /// Unordered map bounded mainly by expiration; size `0` means unbounded.
    Simple,
}

impl CachePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicy::Lru => "lru",
            CachePolicy::Lfu => "lfu",
            CachePolicy::Arc => "arc",
            CachePolicy::Simple => "simple",
        }
    }

    /// `false` only for [`CachePolicy::Simple`], which accepts size `0`.
    pub fn requires_size(&self) -> bool {
        !matches!(self, CachePolicy::Simple)
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CachePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(CachePolicy::Lru),
            "lfu" => Ok(CachePolicy::Lfu),
            "arc" => Ok(CachePolicy::Arc),
            "simple" => Ok(CachePolicy::Simple),
            other => Err(ConfigError::new(format!("unknown cache policy: {other:?}"))),
        }
    }
}

/// Builder for [`Cache`].
///
/// Defaults: LRU, no expiration, no callbacks, no loader, no janitor,
/// [`SystemClock`].
pub struct CacheBuilder<K, V> {
    size: usize,
    policy: CachePolicy,
    expiration: Option<Duration>,
    hooks: Hooks<K, V>,
    loader: Option<Loader<K, V>>,
    janitor: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a builder for a cache holding at most `size` entries.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            policy: CachePolicy::default(),
            expiration: None,
            hooks: Hooks::default(),
            loader: None,
            janitor: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn lru(self) -> Self {
        self.policy(CachePolicy::Lru)
    }

    pub fn lfu(self) -> Self {
        self.policy(CachePolicy::Lfu)
    }

    pub fn arc(self) -> Self {
        self.policy(CachePolicy::Arc)
    }

    pub fn simple(self) -> Self {
        self.policy(CachePolicy::Simple)
    }

    /// Loader run on `get` misses. Loaded values get the default expiration.
    pub fn loader<F>(mut self, f: F) -> Self
    where
        F: Fn(&K) -> Result<V, LoadError> + Send + Sync + 'static,
    {
        self.loader = Some(Loader::Plain(Arc::new(f)));
        self
    }

    /// Loader that also returns a TTL for the loaded value. `None` falls back
    /// to the default expiration.
    pub fn loader_with_expiration<F>(mut self, f: F) -> Self
    where
        F: Fn(&K) -> Result<(V, Option<Duration>), LoadError> + Send + Sync + 'static,
    {
        self.loader = Some(Loader::WithExpiration(Arc::new(f)));
        self
    }

    pub fn evicted<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.hooks.evicted = Some(Arc::new(f));
        self
    }

    pub fn added<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.hooks.added = Some(Arc::new(f));
        self
    }

    pub fn purge_visitor<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.hooks.purge_visitor = Some(Arc::new(f));
        self
    }

    /// Default TTL applied by `Expiration::Default`. A zero duration means
    /// no default.
    pub fn expiration(mut self, ttl: Duration) -> Self {
        self.expiration = (!ttl.is_zero()).then_some(ttl);
        self
    }

    /// Purge expired entries in the background every `interval`.
    pub fn janitor(mut self, interval: Duration) -> Self {
        self.janitor = Some(interval);
        self
    }

    /// Time source for expiration, [`SystemClock`] by default.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the cache, reporting invalid configuration as an error.
    pub fn try_build(self) -> Result<Cache<K, V>, ConfigError> {
        if self.size == 0 && self.policy.requires_size() {
            return Err(ConfigError::new(format!(
                "size must be greater than 0 for {} policy",
                self.policy
            )));
        }
        if self.janitor.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::new("janitor interval must be greater than 0"));
        }

        let cache = Cache::from_parts(CacheParts {
            store: PolicyStore::new(self.policy, self.size),
            expiration: self.expiration,
            hooks: self.hooks,
            loader: self.loader,
            clock: self.clock,
        });
        if let Some(interval) = self.janitor {
            cache
                .start_janitor(interval)
                .map_err(|e| ConfigError::new(format!("failed to start janitor: {e}")))?;
        }

        debug!(
            "built {} cache: size={}, expiration={:?}, janitor={:?}",
            self.policy, self.size, self.expiration, self.janitor
        );
        Ok(cache)
    }

    /// Build the cache.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid, most commonly a size of `0`
    /// for LRU, LFU or ARC. Use [`try_build`](Self::try_build) to handle
    /// that as an error.
    pub fn build(self) -> Cache<K, V> {
        match self.try_build() {
            Ok(cache) => cache,
            Err(err) => panic!("invalid cache configuration: {err}"),
        }
    }
}
