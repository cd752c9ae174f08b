//! Lyrebird-Common: Shared types, identifiers, and utilities.
//!
//! This crate provides common functionality used across lyrebird:
//!
//! - **Entity Identifiers**: Type-safe wrappers for canonical album, artist and
//!   track identifiers, plus a guard against path traversal
//! - **Core Types**: Enums for artwork kinds, artwork sources and scan states
//! - **Path Utilities**: Audio extension allow-list and artwork file conventions
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use lyrebird_common::{AlbumId, EntityKind, Error, Result};
//! use lyrebird_common::paths::{audio_extensions, has_allowed_extension};
//! use std::path::Path;
//!
//! let album = AlbumId::parse("0b6b4ba0-d36f-47bd-b4ea-6a5b91842d29").unwrap();
//! assert_eq!(EntityKind::Album.to_string(), "album");
//! assert!(has_allowed_extension(Path::new("track.flac"), audio_extensions()));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("album"))
//! }
//! # let _ = album;
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
