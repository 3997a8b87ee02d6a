//! Item model and expiration sentinels shared by every policy.

use std::time::{Duration, Instant};

/// Expiration requested for a single `set`.
///
/// | Variant        | Deadline                                  |
/// |----------------|-------------------------------------------|
/// | `Never`        | none, the entry never expires             |
/// | `Default`      | `now + default` if the cache has a default |
/// | `After(d)`     | `now + d`                                 |
///
/// `Duration::ZERO` converts to `Default`, so `set(k, v, Duration::ZERO)`
/// behaves like passing the default sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    Never,
    #[default]
    Default,
    After(Duration),
}

impl Expiration {
    /// Absolute deadline for an entry written at `now`.
    ///
    /// Deadlines that would overflow `Instant` are treated as no deadline.
    pub fn deadline(self, now: Instant, default: Option<Duration>) -> Option<Instant> {
        let ttl = match self {
            Expiration::Never => None,
            Expiration::After(d) if !d.is_zero() => Some(d),
            Expiration::After(_) | Expiration::Default => default,
        };
        ttl.and_then(|d| now.checked_add(d))
    }
}

impl From<Duration> for Expiration {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Expiration::Default
        } else {
            Expiration::After(d)
        }
    }
}

impl From<Option<Duration>> for Expiration {
    fn from(d: Option<Duration>) -> Self {
        d.map_or(Expiration::Default, Expiration::from)
    }
}

/// A cached value together with its key and absolute deadline.
#[derive(Debug, Clone)]
pub struct Item<K, V> {
    pub key: K,
    pub value: V,
    pub expires_at: Option<Instant>,
}

impl<K, V> Item<K, V> {
    pub fn new(key: K, value: V, expires_at: Option<Instant>) -> Self {
        Self {
            key,
            value,
            expires_at,
        }
    }

    /// `true` once `now` has reached the deadline.
    ///
    /// An entry is alive only while `now` is strictly before its deadline.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => deadline <= now,
            None => false,
        }
    }

    /// Overwrites value and deadline in place.
    #[inline]
    pub fn update(&mut self, value: V, expires_at: Option<Instant>) {
        self.value = value;
        self.expires_at = expires_at;
    }

    #[inline]
    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}
