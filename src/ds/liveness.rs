//! Key liveness for weak-key caches.
//!
//! A cache built with `weak_keys = true` asks each tracked key whether it is
//! still reachable from outside the cache. Keys that report `false` are
//! dropped by `clear_stale_references()` and skipped by the clock sweep.
//!
//! ## Key Components
//!
//! - [`Liveness`]: the oracle. Plain value types are always live (the default
//!   method); implement it with an empty body for your own key types.
//! - [`WeakKey`]: a `std::sync::Weak<T>` with pointer identity. Live while at
//!   least one `Arc<T>` exists.
//!
//! ## Identity
//!
//! ```text
//!   Arc<T> ──strong──► [ allocation ] ◄──weak── WeakKey<T> (in cache)
//!                           ▲
//!   drop(Arc)               │ memory stays reserved while any Weak exists,
//!   strong_count == 0       │ so the address (the key's identity) cannot be
//!   is_live() == false      │ handed to a new Arc in the meantime
//! ```
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use carcache::ds::{Liveness, WeakKey};
//!
//! let owner = Arc::new("session".to_string());
//! let key = WeakKey::new(&owner);
//! assert!(key.is_live());
//! assert_eq!(key, WeakKey::new(&owner));
//!
//! drop(owner);
//! assert!(!key.is_live());
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::{Arc, Weak};

/// Reports whether a cache key is still externally reachable.
///
/// Only consulted by caches built with weak keys. The default implementation
/// treats every key as live.
pub trait Liveness {
    /// Returns `false` once the key's referent has been reclaimed.
    fn is_live(&self) -> bool {
        true
    }
}

macro_rules! always_live {
    ($($ty:ty),* $(,)?) => {
        $(impl Liveness for $ty {})*
    };
}

always_live!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, char, String,
    &'static str,
);

impl<T: ?Sized> Liveness for Arc<T> {}
impl<T: ?Sized> Liveness for Rc<T> {}
impl<T: ?Sized> Liveness for Box<T> {}
impl<T> Liveness for Vec<T> {}

impl<A: Liveness, B: Liveness> Liveness for (A, B) {
    fn is_live(&self) -> bool {
        self.0.is_live() && self.1.is_live()
    }
}

impl<A: Liveness, B: Liveness, C: Liveness> Liveness for (A, B, C) {
    fn is_live(&self) -> bool {
        self.0.is_live() && self.1.is_live() && self.2.is_live()
    }
}

impl<T: Liveness> Liveness for Option<T> {
    fn is_live(&self) -> bool {
        self.as_ref().is_none_or(Liveness::is_live)
    }
}

/// Weak, identity-compared handle to an `Arc<T>`.
///
/// Two `WeakKey`s are equal iff they point at the same allocation. Hashing
/// uses the allocation address, which stays reserved for as long as any
/// `WeakKey` to it exists.
pub struct WeakKey<T: ?Sized> {
    inner: Weak<T>,
}

impl<T: ?Sized> WeakKey<T> {
    /// Creates a weak key for `target`.
    pub fn new(target: &Arc<T>) -> Self {
        Self {
            inner: Arc::downgrade(target),
        }
    }

    /// Returns a strong handle if the referent is still alive.
    pub fn upgrade(&self) -> Option<Arc<T>> {
        self.inner.upgrade()
    }

    /// Returns the number of strong references to the referent.
    pub fn strong_count(&self) -> usize {
        self.inner.strong_count()
    }

    #[inline]
    fn addr(&self) -> usize {
        Weak::as_ptr(&self.inner) as *const () as usize
    }
}

impl<T: ?Sized> Liveness for WeakKey<T> {
    #[inline]
    fn is_live(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T: ?Sized> Clone for WeakKey<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> PartialEq for WeakKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for WeakKey<T> {}

impl<T: ?Sized> Hash for WeakKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<T: ?Sized> From<&Arc<T>> for WeakKey<T> {
    fn from(target: &Arc<T>) -> Self {
        Self::new(target)
    }
}

impl<T: ?Sized> fmt::Debug for WeakKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakKey")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("live", &self.is_live())
            .finish()
    }
}
