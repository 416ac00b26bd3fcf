//! # Shared execution context.
//!
//! [`Context`] is the mutable key/value store passed down a module tree.
//! Cloning the handle shares the underlying store; [`Context::fork`] makes
//! an independent copy of the key space.
//!
//! ## Sharing semantics
//! - A composite propagates **one** handle to every child, so siblings read
//!   and write the same store.
//! - Values are stored as `Arc<dyn Any>`; `fork` copies the map but shares
//!   the value allocations, so key-level mutation of a fork (insert,
//!   overwrite, remove) never affects the original.
//!
//! ## Example
//! ```rust
//! use modkit::Context;
//!
//! let ctx = Context::new();
//! ctx.set("retries", 3u32);
//! ctx.set("target", String::from("db-1"));
//!
//! assert_eq!(ctx.get::<u32>("retries"), Some(3));
//! assert_eq!(ctx.get_or("missing", 7u32), 7);
//!
//! let fork = ctx.fork();
//! fork.set("retries", 9u32);
//! assert_eq!(ctx.get::<u32>("retries"), Some(3));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

type Store = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// Shared, mutable key/value store for a module tree.
///
/// Cheap to clone (internally an `Arc`-backed map); all clones observe the
/// same data. Reads and writes are serialized by an internal `RwLock` —
/// concurrent siblings in a parallel composite must avoid key collisions,
/// but individual accesses are always consistent.
#[derive(Clone, Default)]
pub struct Context {
    store: Arc<RwLock<Store>>,
}

impl Context {
    /// Creates a new, empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.write().insert(key.into(), Arc::new(value));
    }

    /// Returns a clone of the value stored under `key`, if present and of
    /// type `T`.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.read()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Returns the value stored under `key`, or `default` when the key is
    /// absent or holds a different type.
    pub fn get_or<T: Clone + 'static>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Removes `key`; returns true if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// True if `key` is present (regardless of the stored type).
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True if the store has no keys.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Creates an independent copy of the key space.
    ///
    /// The fork starts with the same keys; value allocations are shared,
    /// but inserts/removes/overwrites on either side are invisible to the
    /// other.
    pub fn fork(&self) -> Context {
        let copy: Store = self.read().clone();
        Context {
            store: Arc::new(RwLock::new(copy)),
        }
    }

    /// True if `other` is a handle to the same underlying store.
    pub fn shares_store(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.read().keys().cloned().collect();
        f.debug_struct("Context").field("keys", &keys).finish()
    }
}
