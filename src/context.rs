//! Cooperative cancellation for store operations
//!
//! Every `Store` operation takes a [`Context`]. Cancellation is cooperative,
//! not preemptive: operations check the context at entry, and work that has
//! already reached the engine is not interrupted. For long engine calls whose
//! inputs can be made `'static` (batch commits), [`run_with_context`] races
//! the call against the cancel signal through a single-slot completion
//! channel and discards the result if it loses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;

use crate::error::{Result, StoreError};

// =============================================================================
// Context
// =============================================================================

/// Cancellation context for a store operation
///
/// Cheap to clone; all clones observe the same cancellation state.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    /// Becomes ready (disconnected) once the handle cancels.
    done: Option<Receiver<()>>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self {
            inner: Arc::new(Inner { cancelled: AtomicBool::new(false), deadline: None, done: None }),
        }
    }

    /// A cancellable context. Calling `cancel()` on the handle (or dropping
    /// it) cancels the context.
    pub fn with_cancel() -> (Self, CancelHandle) {
        Self::build(None)
    }

    /// A context that expires after `timeout`. The handle may cancel it
    /// earlier.
    pub fn with_timeout(timeout: Duration) -> (Self, CancelHandle) {
        Self::build(Some(Instant::now() + timeout))
    }

    fn build(deadline: Option<Instant>) -> (Self, CancelHandle) {
        let (tx, rx) = channel::bounded::<()>(1);
        let inner = Arc::new(Inner {
            cancelled: AtomicBool::new(false),
            deadline,
            done: Some(rx),
        });
        let ctx = Self { inner: Arc::clone(&inner) };
        let handle = CancelHandle { inner, tx: Some(tx) };
        (ctx, handle)
    }

    /// The current cancellation state: `Cancelled`, `DeadlineExceeded`, or
    /// none.
    pub fn err(&self) -> Option<StoreError> {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return Some(StoreError::Cancelled);
        }
        if let Some(deadline) = self.inner.deadline {
            if Instant::now() >= deadline {
                return Some(StoreError::DeadlineExceeded);
            }
        }
        None
    }

    /// Entry-point check: fail fast when the context is already done
    pub fn check(&self) -> Result<()> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn cancel_signal(&self) -> Receiver<()> {
        match &self.inner.done {
            Some(rx) => rx.clone(),
            None => channel::never(),
        }
    }

    fn deadline_signal(&self) -> Receiver<Instant> {
        match self.inner.deadline {
            Some(deadline) => channel::at(deadline),
            None => channel::never(),
        }
    }

    fn is_plain(&self) -> bool {
        self.inner.done.is_none() && self.inner.deadline.is_none()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.inner.cancelled.load(Ordering::Acquire))
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

// =============================================================================
// CancelHandle
// =============================================================================

/// Handle used to cancel a [`Context`]. Dropping the handle cancels too.
pub struct CancelHandle {
    inner: Arc<Inner>,
    tx: Option<Sender<()>>,
}

impl CancelHandle {
    /// Cancel the associated context
    pub fn cancel(mut self) {
        self.do_cancel();
    }

    fn do_cancel(&mut self) {
        self.inner.cancelled.store(true, Ordering::Release);
        // Closing the channel wakes every selector on the done signal.
        self.tx.take();
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.do_cancel();
    }
}

// =============================================================================
// Done-signal race
// =============================================================================

/// Run `work` while respecting the context's cancellation.
///
/// The work runs on a worker thread and its completion is raced against the
/// cancel signal and the deadline. If cancellation wins, the worker's late
/// result is discarded when it eventually arrives; the engine call itself is
/// not interrupted. Contexts with no cancel source and no deadline run the
/// work inline.
pub fn run_with_context<T, F>(ctx: &Context, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    ctx.check()?;

    if ctx.is_plain() {
        return work();
    }

    let (done_tx, done_rx) = channel::bounded::<Result<T>>(1);
    thread::spawn(move || {
        let _ = done_tx.send(work());
    });

    let cancel = ctx.cancel_signal();
    let deadline = ctx.deadline_signal();

    select! {
        recv(done_rx) -> res => {
            res.unwrap_or_else(|_| Err(StoreError::Backend("worker exited without a result".into())))
        }
        recv(cancel) -> _ => Err(StoreError::Cancelled),
        recv(deadline) -> _ => Err(StoreError::DeadlineExceeded),
    }
}
