//! Sled backend adapter
//!
//! Maps the store contract onto sled's native primitives. Sled offers
//! native prefix iteration (`scan_prefix`) and a write batch that is
//! consumed when applied, so the adapter tracks commit state explicitly
//! and the reuse guard fires before any native call.

use std::fmt;

use parking_lot::RwLock;

use crate::config::SledConfig;
use crate::context::{run_with_context, Context};
use crate::error::{Result, StoreError};
use crate::store::{Batch, Cursor, Store};

fn backend_err(err: impl fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

// =============================================================================
// Store
// =============================================================================

/// Key-value store backed by sled
///
/// The handle slot is emptied by `close()`; every operation after that
/// returns [`StoreError::Closed`].
pub struct SledStore {
    db: RwLock<Option<sled::Db>>,
}

impl SledStore {
    /// Open or create a sled store per the given config
    ///
    /// A caller-supplied `options` object overrides the defaults wholesale,
    /// including the path it carries.
    pub fn open(config: SledConfig) -> Result<Self> {
        let options = match config.options {
            Some(options) => options,
            None => sled::Config::new().path(&config.dir),
        };
        let db = options.open().map_err(backend_err)?;
        tracing::debug!("opened sled store at {}", config.dir.display());
        Ok(Self { db: RwLock::new(Some(db)) })
    }

    fn with_db<T>(&self, f: impl FnOnce(&sled::Db) -> Result<T>) -> Result<T> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        f(db)
    }
}

impl Store for SledStore {
    fn put(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<()> {
        ctx.check()?;
        self.with_db(|db| {
            db.insert(key, value).map_err(backend_err)?;
            Ok(())
        })
    }

    fn get(&self, ctx: &Context, key: &[u8]) -> Result<Vec<u8>> {
        ctx.check()?;
        self.with_db(|db| match db.get(key).map_err(backend_err)? {
            Some(value) => Ok(value.to_vec()),
            None => Err(StoreError::NotFound),
        })
    }

    fn delete(&self, ctx: &Context, key: &[u8]) -> Result<()> {
        ctx.check()?;
        self.with_db(|db| {
            db.remove(key).map_err(backend_err)?;
            Ok(())
        })
    }

    fn batch(&self) -> Box<dyn Batch> {
        let guard = self.db.read();
        match guard.as_ref() {
            Some(db) => Box::new(SledBatch {
                db: Some(db.clone()),
                batch: Some(sled::Batch::default()),
                err: None,
            }),
            None => Box::new(SledBatch::failed(StoreError::Closed)),
        }
    }

    fn scan(&self, prefix: &[u8]) -> Box<dyn Cursor> {
        let guard = self.db.read();
        match guard.as_ref() {
            Some(db) => Box::new(SledCursor {
                iter: Some(db.scan_prefix(prefix)),
                current: None,
                err: None,
                exhausted: false,
            }),
            None => Box::new(SledCursor::failed(StoreError::Closed)),
        }
    }

    fn close(&self) -> Result<()> {
        let db = self.db.write().take().ok_or(StoreError::Closed)?;
        let mut failures = Vec::new();
        if let Err(err) = db.flush() {
            failures.push(err.to_string());
        }
        drop(db);
        if failures.is_empty() {
            tracing::debug!("closed sled store");
            Ok(())
        } else {
            tracing::warn!("sled close reported {} failure(s)", failures.len());
            Err(StoreError::CloseFailed(failures))
        }
    }
}

// =============================================================================
// Batch
// =============================================================================

/// Write batch bound to a sled store
///
/// Operations queue locally in a `sled::Batch`; commit applies them in one
/// atomic `apply_batch` call. The inner batch is taken on commit, so any
/// later use fails with [`StoreError::BatchCommitted`].
pub struct SledBatch {
    db: Option<sled::Db>,
    batch: Option<sled::Batch>,
    err: Option<StoreError>,
}

impl SledBatch {
    fn failed(err: StoreError) -> Self {
        Self { db: None, batch: None, err: Some(err) }
    }

    fn open_batch(&mut self) -> Result<&mut sled::Batch> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        self.batch.as_mut().ok_or(StoreError::BatchCommitted)
    }
}

impl Batch for SledBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.open_batch()?.insert(key, value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.open_batch()?.remove(key);
        Ok(())
    }

    fn commit(&mut self, ctx: &Context) -> Result<()> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        ctx.check()?;
        let batch = self.batch.take().ok_or(StoreError::BatchCommitted)?;
        let db = self.db.clone().ok_or(StoreError::Closed)?;
        run_with_context(ctx, move || db.apply_batch(batch).map_err(backend_err))
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Prefix cursor over a sled store
///
/// Wraps sled's native prefix iterator with the
/// NotStarted/Positioned/Exhausted protocol. A traversal fault exhausts the
/// cursor and is retained for `error()`.
pub struct SledCursor {
    iter: Option<sled::Iter>,
    current: Option<(sled::IVec, sled::IVec)>,
    err: Option<StoreError>,
    exhausted: bool,
}

impl SledCursor {
    fn failed(err: StoreError) -> Self {
        Self { iter: None, current: None, err: Some(err), exhausted: true }
    }
}

impl Cursor for SledCursor {
    fn next(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        let iter = match self.iter.as_mut() {
            Some(iter) => iter,
            None => {
                self.exhausted = true;
                return false;
            }
        };
        match iter.next() {
            Some(Ok(entry)) => {
                self.current = Some(entry);
                true
            }
            Some(Err(err)) => {
                self.err = Some(backend_err(err));
                self.current = None;
                self.exhausted = true;
                false
            }
            None => {
                self.current = None;
                self.exhausted = true;
                false
            }
        }
    }

    fn key(&self) -> Option<Vec<u8>> {
        self.current.as_ref().map(|(key, _)| key.to_vec())
    }

    fn value(&self) -> Option<Vec<u8>> {
        self.current.as_ref().map(|(_, value)| value.to_vec())
    }

    fn error(&self) -> Option<&StoreError> {
        self.err.as_ref()
    }

    fn release(&mut self) {
        self.iter = None;
        self.current = None;
        self.exhausted = true;
    }
}
