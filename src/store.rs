//! The store contract
//!
//! Defines the capability set every backend adapter implements: CRUD,
//! batched writes, prefix iteration, and lifecycle close. Application code
//! depends on these traits only; engine-native types never cross this
//! boundary.

use std::path::Path;
use std::str::FromStr;

use crate::backends::{RedbStore, SledStore};
use crate::config::{RedbConfig, SledConfig};
use crate::context::Context;
use crate::error::{Result, StoreError};

// =============================================================================
// Core Contract
// =============================================================================

/// One open handle to a backend key-value store
///
/// Keys and values are raw byte sequences with no imposed schema. A store is
/// safe to share across threads; the backend serializes concurrent access
/// internally.
pub trait Store: Send + Sync {
    /// Insert or overwrite the value for `key`
    fn put(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<()>;

    /// Retrieve the current value for `key`
    ///
    /// Fails with [`StoreError::NotFound`] when the key is absent or was
    /// deleted. The returned bytes are an independent copy, never a view
    /// into engine memory.
    fn get(&self, ctx: &Context, key: &[u8]) -> Result<Vec<u8>>;

    /// Remove `key`. Deleting an absent key is not an error.
    fn delete(&self, ctx: &Context, key: &[u8]) -> Result<()>;

    /// Create a new, empty, uncommitted batch bound to this store
    ///
    /// Queued operations are invisible to readers until the batch commits.
    /// A batch must be committed exactly once or its writes are lost.
    fn batch(&self) -> Box<dyn Batch>;

    /// Iterate over keys starting with `prefix`, in the engine's
    /// byte-lexicographic order
    ///
    /// An empty prefix scans the whole store. Construction failures (for
    /// example on a closed store) surface through the cursor's `error()`
    /// rather than a crash.
    fn scan(&self, prefix: &[u8]) -> Box<dyn Cursor>;

    /// Release the engine handle
    ///
    /// Aggregates every cleanup failure instead of returning only the
    /// first. All further operations on this store return
    /// [`StoreError::Closed`].
    fn close(&self) -> Result<()>;
}

// =============================================================================
// Batch
// =============================================================================

/// An accumulating set of writes committed as one unit
///
/// Lifecycle: `Open` -> `Committed` (terminal). Operations on a committed
/// batch fail with [`StoreError::BatchCommitted`] on every backend; adapters
/// whose engine cannot signal reuse itself pre-check the state so the guard
/// fires before any native call. Not safe for concurrent use without
/// external serialization.
pub trait Batch: Send {
    /// Queue an insert/overwrite. Valid only before commit.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Queue a delete. Valid only before commit.
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Apply all queued operations atomically: either all become visible
    /// or none do. Valid exactly once.
    fn commit(&mut self, ctx: &Context) -> Result<()>;
}

// =============================================================================
// Cursor
// =============================================================================

/// A cursor over a prefix-bounded key range
///
/// Traversal protocol: `NotStarted` -> `Positioned` (zero or more times) ->
/// `Exhausted` (terminal). `key()` and `value()` are defined only while
/// positioned. Single-owner; not safe for concurrent traversal.
pub trait Cursor: Send {
    /// Advance to the next entry
    ///
    /// The first call positions on the first key within the prefix. Returns
    /// `false` permanently once the range is exhausted or a traversal fault
    /// occurred.
    fn next(&mut self) -> bool;

    /// Current key, or `None` when not positioned. Independent copy, safe
    /// to retain past the next `next()` call.
    fn key(&self) -> Option<Vec<u8>>;

    /// Current value, or `None` when not positioned. Independent copy.
    fn value(&self) -> Option<Vec<u8>>;

    /// The most recently observed traversal fault, or `None`. Does not
    /// reset after being read.
    fn error(&self) -> Option<&StoreError>;

    /// Free the underlying engine cursor. Safe to call in any state and
    /// repeatedly; dropping the cursor releases too.
    fn release(&mut self);
}

// =============================================================================
// Backend Selection
// =============================================================================

/// Available backend engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sled,
    Redb,
}

impl FromStr for Backend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sled" => Ok(Backend::Sled),
            "redb" => Ok(Backend::Redb),
            other => Err(StoreError::Backend(format!("unknown backend: {other}"))),
        }
    }
}

/// Open a store with default options for the selected backend
///
/// Runtime backend switching for callers that choose the engine from
/// configuration; code that knows its engine can call the adapter
/// constructors directly.
pub fn open_store(backend: Backend, dir: impl AsRef<Path>) -> Result<Box<dyn Store>> {
    match backend {
        Backend::Sled => Ok(Box::new(SledStore::open(SledConfig::new(dir.as_ref()))?)),
        Backend::Redb => Ok(Box::new(RedbStore::open(RedbConfig::new(dir.as_ref()))?)),
    }
}
