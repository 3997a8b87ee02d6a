pub use crate::builder::{CacheBuilder, CachePolicy};
pub use crate::cache::{Cache, EntryFn, ExpiringLoaderFn, Hooks, LoaderFn};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::error::{CacheError, ConfigError, LoadError};
pub use crate::item::{Expiration, Item};
pub use crate::policy::{ArcStore, LfuStore, LruStore, PolicyStore, SimpleStore};
pub use crate::stats::{Stats, StatsSnapshot};
pub use crate::store::{Evicted, Store};
