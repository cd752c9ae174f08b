//! Filesystem-level artwork storage.
//!
//! Images are organised by keyspace:
//!
//! ```text
//! <root>/album/source/<id>    original bytes as imported or downloaded
//! <root>/album/<id>.jpg       derived thumbnail, the canonical served image
//! <root>/artist/...
//! ```
//!
//! Every write goes through a temp file in the target directory followed by
//! a rename, so readers see either the old image or the new one.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use lyrebird_common::{is_path_safe, EntityKind, Error, Result};

/// Artwork bytes ready to serve.
#[derive(Debug, Clone)]
pub struct ServedArtwork {
    pub bytes: Vec<u8>,
    /// Modification time of the file the bytes came from.
    pub modified: DateTime<Utc>,
}

/// Filesystem manager for album and artist artwork.
#[derive(Debug, Clone)]
pub struct ArtworkStorage {
    root: PathBuf,
    jpeg_quality: u8,
}

impl ArtworkStorage {
    pub fn new(root: PathBuf, jpeg_quality: u8) -> Self {
        Self { root, jpeg_quality }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Path of the persisted source bytes for an entity.
    pub fn source_path(&self, kind: EntityKind, id: &str) -> Result<PathBuf> {
        check_id(id)?;
        Ok(self.root.join(kind.as_str()).join("source").join(id))
    }

    /// Path of the served thumbnail for an entity.
    pub fn image_path(&self, kind: EntityKind, id: &str) -> Result<PathBuf> {
        check_id(id)?;
        Ok(self.root.join(kind.as_str()).join(format!("{id}.jpg")))
    }

    /// Persist source bytes, replacing any previous source atomically.
    pub fn store_source(&self, kind: EntityKind, id: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.stage_source(kind, id, bytes)?.persist()
    }

    /// Write source bytes beside their final path without replacing the
    /// current source. Nothing changes until [`StagedSource::persist`].
    pub fn stage_source(&self, kind: EntityKind, id: &str, bytes: &[u8]) -> Result<StagedSource> {
        let target = self.source_path(kind, id)?;
        let file = stage(&target, bytes)?;
        Ok(StagedSource { file, target })
    }

    /// Read the stored image for an entity, resized to fit `size` if given.
    ///
    /// Falls back to the source bytes while the thumbnail has not been
    /// derived yet. Returns `Ok(None)` when nothing is stored.
    pub fn read_artwork(
        &self,
        kind: EntityKind,
        id: &str,
        size: Option<u32>,
    ) -> Result<Option<ServedArtwork>> {
        let thumbnail = self.image_path(kind, id)?;
        let source = self.source_path(kind, id)?;

        let path = if thumbnail.is_file() {
            thumbnail
        } else if source.is_file() {
            source
        } else {
            return Ok(None);
        };

        let modified = std::fs::metadata(&path)?.modified()?;
        let bytes = std::fs::read(&path)?;

        let bytes = match size {
            Some(size) => {
                let img = decode(&bytes)?;
                if img.width() > size || img.height() > size {
                    encode_jpeg(&fit_within(&img, size), self.jpeg_quality)?
                } else if image::guess_format(&bytes).ok() == Some(image::ImageFormat::Jpeg) {
                    bytes
                } else {
                    encode_jpeg(&img, self.jpeg_quality)?
                }
            }
            None => bytes,
        };

        Ok(Some(ServedArtwork {
            bytes,
            modified: DateTime::<Utc>::from(modified),
        }))
    }
}

/// Source bytes on disk but not yet in place. Dropping discards them.
#[derive(Debug)]
pub struct StagedSource {
    file: tempfile::NamedTempFile,
    target: PathBuf,
}

impl StagedSource {
    /// Rename over the target and return its path.
    pub fn persist(self) -> Result<PathBuf> {
        self.file.persist(&self.target).map_err(|e| Error::Io(e.error))?;
        Ok(self.target)
    }
}

fn check_id(id: &str) -> Result<()> {
    if is_path_safe(id) {
        Ok(())
    } else {
        Err(Error::invalid_input(format!("unsafe artwork id: {id:?}")))
    }
}

/// Decode image bytes of any supported format.
pub(crate) fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| Error::invalid_input(format!("undecodable image: {e}")))
}

/// Downscale to fit within `size` x `size`, preserving aspect ratio.
/// Images already inside the box are returned unchanged.
pub(crate) fn fit_within(img: &DynamicImage, size: u32) -> DynamicImage {
    if img.width() > size || img.height() > size {
        img.resize(size, size, FilterType::Lanczos3)
    } else {
        img.clone()
    }
}

/// Encode as baseline RGB JPEG.
pub(crate) fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| Error::internal(format!("failed to encode JPEG: {e}")))?;
    Ok(buf.into_inner())
}

/// Write via a sibling temp file and rename over the target.
pub(crate) fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    stage(target, bytes)?
        .persist(target)
        .map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Write `bytes` to a synced temp file in the target's directory.
fn stage(target: &Path, bytes: &[u8]) -> Result<tempfile::NamedTempFile> {
    let dir = target
        .parent()
        .ok_or_else(|| Error::invalid_input(format!("no parent directory: {}", target.display())))?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

#[cfg(test)]
pub(crate) mod test_images {
    use super::*;

    /// A solid-colour JPEG of the given dimensions.
    pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        encode_jpeg(&DynamicImage::ImageRgb8(img), 90).unwrap()
    }

    /// A solid-colour PNG of the given dimensions.
    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }
}
