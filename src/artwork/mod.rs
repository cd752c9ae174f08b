//! Album and artist artwork: discovery, acquisition, storage and serving.
//!
//! - [`cascade`] decides per entity whether to keep, import or fetch.
//! - [`local`] finds image files next to the audio files.
//! - [`storage`] owns the on-disk layout and serves stored images.
//! - [`thumbnail`] derives served thumbnails in the background.

pub mod cascade;
pub mod local;
pub mod storage;
pub mod thumbnail;

pub use cascade::{decide, ArtworkOutcome, ArtworkResolver, ArtworkTarget, Decision};
pub use local::{find_local_image, LocalImage};
pub use storage::{ArtworkStorage, ServedArtwork};
pub use thumbnail::{ThumbnailJob, ThumbnailPool};
