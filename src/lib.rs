//! Lyrebird - music library synchronization and artwork resolution
//!
//! This library crate exposes the engine for the binary and for integration
//! testing.

pub mod artwork;
pub mod config;
pub mod events;
pub mod extract;
pub mod providers;
pub mod scanner;
pub mod sync;
