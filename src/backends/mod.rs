//! Backend adapters
//!
//! One module per supported embedded engine. Each adapter maps the
//! Store/Batch/Cursor contract onto its engine's native primitives and
//! never leaks native handle types across the boundary.

pub mod redb;
pub mod sled;

pub use self::redb::RedbStore;
pub use self::sled::SledStore;
