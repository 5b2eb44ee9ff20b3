//! carcache: a concurrent, liveness-aware CAR (Clock with Adaptive
//! Replacement) compute cache.
//!
//! ```text
//!   CarCacheBuilder ──► CarCache / ShardedCarCache
//!                            │
//!                            ├── ds::ClockList           T1, T2
//!                            ├── ds::OrderedEvictionSet  B1, B2
//!                            ├── ds::Liveness            weak-key oracle
//!                            └── traits::ValueComputer   runs on misses
//! ```
//!
//! ## Example
//!
//! ```
//! use carcache::prelude::*;
//!
//! let cache = CarCache::new(
//!     |path: &String| Ok::<_, ComputeError<usize, ()>>(path.split('/').count()),
//!     1024,
//!     false,
//! );
//! assert_eq!(cache.compute("a/b/c".to_string()), Ok(3));
//! assert!(cache.contains(&"a/b/c".to_string()));
//! ```

pub mod builder;
pub mod ds;
pub mod error;
pub mod policy;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;
pub mod traits;
