//! Editing-surface services.
//!
//! # Responsibility
//! - Extract mention markers from editor HTML.
//! - Hold editor drafts and derive their connections.

pub mod draft;
pub mod mention;

pub use draft::NoteDraft;
pub use mention::{extract_mention_ids, union_mentions};
