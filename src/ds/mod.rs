pub mod clock_list;
pub mod eviction_set;
pub mod liveness;
pub mod shard;

pub use clock_list::ClockList;
pub use eviction_set::OrderedEvictionSet;
pub use liveness::{Liveness, WeakKey};
pub use shard::ShardSelector;
