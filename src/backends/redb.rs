//! Redb backend adapter
//!
//! Maps the store contract onto redb's transactional primitives. Redb has
//! no native prefix iterator, so scans use an explicitly derived exclusive
//! upper bound, and the cursor streams the range in fixed-size batches from
//! a held read transaction instead of materializing the table.

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;
use redb::{Database, ReadTransaction, TableDefinition};

use crate::config::RedbConfig;
use crate::context::{run_with_context, Context};
use crate::error::{Result, StoreError};
use crate::prefix;
use crate::store::{Batch, Cursor, Store};

/// Single table holding every key-value pair
const DATA: TableDefinition<&[u8], &[u8]> = TableDefinition::new("kv");

/// Database file name inside the configured directory
const DB_FILENAME: &str = "polykv.redb";

/// Entries fetched per cursor batch
const SCAN_BATCH: usize = 256;

fn backend_err(err: impl fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

// =============================================================================
// Store
// =============================================================================

/// Key-value store backed by redb
///
/// Point operations open a transaction per call; the data table is created
/// once at open so reads never race table creation. The handle slot is
/// emptied by `close()`; every operation after that returns
/// [`StoreError::Closed`].
pub struct RedbStore {
    db: RwLock<Option<Arc<Database>>>,
}

impl RedbStore {
    /// Open or create a redb store per the given config
    pub fn open(config: RedbConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir).map_err(backend_err)?;
        let path = config.dir.join(DB_FILENAME);

        let mut builder = Database::builder();
        if let Some(cache_size) = config.cache_size {
            builder.set_cache_size(cache_size);
        }
        let db = builder.create(&path).map_err(backend_err)?;

        // Create the data table up front.
        let tx = db.begin_write().map_err(backend_err)?;
        {
            tx.open_table(DATA).map_err(backend_err)?;
        }
        tx.commit().map_err(backend_err)?;

        tracing::debug!("opened redb store at {}", path.display());
        Ok(Self { db: RwLock::new(Some(Arc::new(db))) })
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        f(db)
    }
}

impl Store for RedbStore {
    fn put(&self, ctx: &Context, key: &[u8], value: &[u8]) -> Result<()> {
        ctx.check()?;
        self.with_db(|db| {
            let tx = db.begin_write().map_err(backend_err)?;
            {
                let mut table = tx.open_table(DATA).map_err(backend_err)?;
                table.insert(key, value).map_err(backend_err)?;
            }
            tx.commit().map_err(backend_err)
        })
    }

    fn get(&self, ctx: &Context, key: &[u8]) -> Result<Vec<u8>> {
        ctx.check()?;
        self.with_db(|db| {
            let tx = db.begin_read().map_err(backend_err)?;
            let table = tx.open_table(DATA).map_err(backend_err)?;
            match table.get(key).map_err(backend_err)? {
                Some(guard) => Ok(guard.value().to_vec()),
                None => Err(StoreError::NotFound),
            }
        })
    }

    fn delete(&self, ctx: &Context, key: &[u8]) -> Result<()> {
        ctx.check()?;
        self.with_db(|db| {
            let tx = db.begin_write().map_err(backend_err)?;
            {
                let mut table = tx.open_table(DATA).map_err(backend_err)?;
                table.remove(key).map_err(backend_err)?;
            }
            tx.commit().map_err(backend_err)
        })
    }

    fn batch(&self) -> Box<dyn Batch> {
        let guard = self.db.read();
        match guard.as_ref() {
            Some(db) => Box::new(RedbBatch {
                db: Some(Arc::clone(db)),
                ops: Some(Vec::new()),
                err: None,
            }),
            None => Box::new(RedbBatch::failed(StoreError::Closed)),
        }
    }

    fn scan(&self, prefix: &[u8]) -> Box<dyn Cursor> {
        let guard = self.db.read();
        let db = match guard.as_ref() {
            Some(db) => db,
            None => return Box::new(RedbCursor::failed(StoreError::Closed)),
        };
        match db.begin_read() {
            Ok(tx) => Box::new(RedbCursor {
                tx: Some(tx),
                prefix: prefix.to_vec(),
                upper: prefix::upper_bound(prefix),
                buf: VecDeque::new(),
                after: None,
                maybe_more: true,
                current: None,
                err: None,
                exhausted: false,
            }),
            Err(err) => Box::new(RedbCursor::failed(backend_err(err))),
        }
    }

    fn close(&self) -> Result<()> {
        let db = self.db.write().take().ok_or(StoreError::Closed)?;
        // Redb commits are durable; dropping the handle releases the file
        // lock once outstanding batch references are gone.
        drop(db);
        tracing::debug!("closed redb store");
        Ok(())
    }
}

// =============================================================================
// Batch
// =============================================================================

enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Write batch bound to a redb store
///
/// Operations queue locally; commit applies them inside a single write
/// transaction so all of them become visible together. The queue is taken
/// on commit, so any later use fails with [`StoreError::BatchCommitted`].
pub struct RedbBatch {
    db: Option<Arc<Database>>,
    ops: Option<Vec<BatchOp>>,
    err: Option<StoreError>,
}

impl RedbBatch {
    fn failed(err: StoreError) -> Self {
        Self { db: None, ops: None, err: Some(err) }
    }

    fn open_ops(&mut self) -> Result<&mut Vec<BatchOp>> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        self.ops.as_mut().ok_or(StoreError::BatchCommitted)
    }
}

impl Batch for RedbBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.open_ops()?.push(BatchOp::Put(key.to_vec(), value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.open_ops()?.push(BatchOp::Delete(key.to_vec()));
        Ok(())
    }

    fn commit(&mut self, ctx: &Context) -> Result<()> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        ctx.check()?;
        let ops = self.ops.take().ok_or(StoreError::BatchCommitted)?;
        let db = self.db.clone().ok_or(StoreError::Closed)?;
        run_with_context(ctx, move || {
            let tx = db.begin_write().map_err(backend_err)?;
            {
                let mut table = tx.open_table(DATA).map_err(backend_err)?;
                for op in ops {
                    match op {
                        BatchOp::Put(key, value) => {
                            table.insert(key.as_slice(), value.as_slice()).map_err(backend_err)?;
                        }
                        BatchOp::Delete(key) => {
                            table.remove(key.as_slice()).map_err(backend_err)?;
                        }
                    }
                }
            }
            tx.commit().map_err(backend_err)
        })
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Prefix cursor over a redb store
///
/// Holds a read transaction for snapshot-consistent traversal and fetches
/// the range `[prefix, upper_bound)` in batches of [`SCAN_BATCH`] entries,
/// continuing after the last consumed key. Memory use is bounded by the
/// batch size regardless of range size.
pub struct RedbCursor {
    tx: Option<ReadTransaction>,
    prefix: Vec<u8>,
    upper: Option<Vec<u8>>,
    buf: VecDeque<(Vec<u8>, Vec<u8>)>,
    /// Last consumed key; the next fetch starts just past it.
    after: Option<Vec<u8>>,
    maybe_more: bool,
    current: Option<(Vec<u8>, Vec<u8>)>,
    err: Option<StoreError>,
    exhausted: bool,
}

impl RedbCursor {
    fn failed(err: StoreError) -> Self {
        Self {
            tx: None,
            prefix: Vec::new(),
            upper: None,
            buf: VecDeque::new(),
            after: None,
            maybe_more: false,
            current: None,
            err: Some(err),
            exhausted: true,
        }
    }

    fn fetch(&mut self) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(StoreError::Closed)?;
        let table = tx.open_table(DATA).map_err(backend_err)?;

        let lower: Bound<&[u8]> = match &self.after {
            Some(key) => Bound::Excluded(key.as_slice()),
            None => Bound::Included(self.prefix.as_slice()),
        };
        let upper: Bound<&[u8]> = match &self.upper {
            Some(bound) => Bound::Excluded(bound.as_slice()),
            None => Bound::Unbounded,
        };

        let range = table.range::<&[u8]>((lower, upper)).map_err(backend_err)?;
        self.maybe_more = false;
        for entry in range {
            let (key, value) = entry.map_err(backend_err)?;
            self.buf.push_back((key.value().to_vec(), value.value().to_vec()));
            if self.buf.len() >= SCAN_BATCH {
                self.maybe_more = true;
                break;
            }
        }
        Ok(())
    }
}

impl Cursor for RedbCursor {
    fn next(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        if self.buf.is_empty() && self.maybe_more {
            if let Err(err) = self.fetch() {
                self.err = Some(err);
                self.current = None;
                self.exhausted = true;
                self.tx = None;
                return false;
            }
        }
        match self.buf.pop_front() {
            Some(entry) => {
                self.after = Some(entry.0.clone());
                self.current = Some(entry);
                true
            }
            None => {
                self.current = None;
                self.exhausted = true;
                self.tx = None;
                false
            }
        }
    }

    fn key(&self) -> Option<Vec<u8>> {
        self.current.as_ref().map(|(key, _)| key.clone())
    }

    fn value(&self) -> Option<Vec<u8>> {
        self.current.as_ref().map(|(_, value)| value.clone())
    }

    fn error(&self) -> Option<&StoreError> {
        self.err.as_ref()
    }

    fn release(&mut self) {
        self.tx = None;
        self.buf.clear();
        self.current = None;
        self.maybe_more = false;
        self.exhausted = true;
    }
}
