//! Device-local persistence.
//!
//! # Responsibility
//! - Expose the device key-value primitive (`BlobStore`) over SQLite.
//! - Keep the full note collection as one JSON blob (`LocalStore`).
//!
//! # Invariants
//! - `LocalStore` operations never return errors to callers; failures are
//!   logged and degrade to an empty or unchanged collection.
//! - Every read-modify-write of the collection runs under one lock.

pub mod blob_store;
pub mod local_store;
