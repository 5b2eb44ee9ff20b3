pub use crate::builder::CarCacheBuilder;
pub use crate::ds::{Liveness, WeakKey};
pub use crate::error::{ComputeError, ConfigError, InvariantError};
#[cfg(feature = "metrics")]
pub use crate::metrics::{CarMetricsSnapshot, MetricsSnapshotProvider};
pub use crate::policy::car::{CarCache, CarDump};
#[cfg(feature = "concurrency")]
pub use crate::policy::sharded::{ShardStats, ShardedCarCache};
pub use crate::traits::{ComputeCache, ConcurrentCache, ValueComputer};
