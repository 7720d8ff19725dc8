//! Image byte storage for PhotoMesh.
//!
//! Defines the `Storage` abstraction the ingestion pipeline writes through, and
//! the local-filesystem backend. Keys are flat filenames generated from the
//! record id (`{uuid}.{ext}`); the original client filename is never part of a
//! key.

pub mod local;
pub mod traits;

pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
