//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record exchanged by local and remote stores.
//! - Own the versioned JSON document shape and read-side validation.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - `updated_at` is the only timestamp used for conflict resolution.

pub mod note;
