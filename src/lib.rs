//! # PolyKV
//!
//! A uniform key-value storage contract over interchangeable embedded
//! engines:
//! - One polymorphic Store/Batch/Cursor interface
//! - Reference adapters for sled and redb
//! - Exactly-once batch commit with loud reuse rejection
//! - Prefix-bounded, byte-ordered iteration
//! - Cooperative, context-based cancellation
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application Code                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  Store / Batch / Cursor traits
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Contract Layer                            │
//! │        (batch state machine, cursor protocol, errors)        │
//! └──────────┬─────────────────────────────────┬────────────────┘
//!            │                                 │
//!            ▼                                 ▼
//!    ┌──────────────┐                  ┌──────────────┐
//!    │ Sled Adapter │                  │ Redb Adapter │
//!    │ (scan_prefix)│                  │ (range+bound)│
//!    └──────────────┘                  └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod context;
pub mod prefix;
pub mod store;
pub mod backends;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::{RedbConfig, SledConfig};
pub use context::{CancelHandle, Context};
pub use store::{open_store, Backend, Batch, Cursor, Store};
pub use backends::{RedbStore, SledStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of PolyKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
