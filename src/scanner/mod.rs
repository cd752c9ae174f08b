//! Library filesystem scanning.
//!
//! The [`walker`] enumerates audio files and their modification signals; the
//! synchronizer decides what to do with each one.

pub mod walker;

pub use walker::{classify, walk_roots, FileChange, WalkError, WalkItem, WalkOptions, WalkSummary};
