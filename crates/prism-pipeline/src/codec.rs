//! The codec seam between the runners and image storage.
//!
//! The runners never touch the filesystem themselves: they decode sources
//! and encode results through a [`Codec`]. `prism-io` provides the PNG
//! implementation; [`MemoryCodec`] keeps images in a map, which is what
//! the runner tests use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::buffer::PixelBuffer;
use crate::types::CodecError;

/// Decodes images into and encodes images from [`PixelBuffer`]s.
///
/// Implementations are shared by every worker of a batch, so they must be
/// `Send + Sync`.
pub trait Codec: Send + Sync {
    /// Decode the image stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the image cannot be read or decoded.
    fn decode(&self, path: &Path) -> Result<PixelBuffer, CodecError>;

    /// Encode `image` and store it at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the image cannot be encoded or written.
    fn encode(&self, path: &Path, image: &PixelBuffer) -> Result<(), CodecError>;
}

/// In-memory codec keyed by path.
///
/// Records the order in which paths were encoded, so callers can check
/// when and in which order results were persisted.
#[derive(Debug, Default)]
pub struct MemoryCodec {
    images: Mutex<HashMap<PathBuf, PixelBuffer>>,
    writes: Mutex<Vec<PathBuf>>,
}

impl MemoryCodec {
    /// An empty codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `image` under `path` so it can be decoded later.
    pub fn insert(&self, path: impl Into<PathBuf>, image: PixelBuffer) {
        self.images
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(path.into(), image);
    }

    /// The image currently stored under `path`, if any.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<PixelBuffer> {
        self.images
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Every path passed to [`Codec::encode`], in call order.
    #[must_use]
    pub fn writes(&self) -> Vec<PathBuf> {
        self.writes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Codec for MemoryCodec {
    fn decode(&self, path: &Path) -> Result<PixelBuffer, CodecError> {
        self.get(path)
            .ok_or_else(|| CodecError::NotFound(path.to_path_buf()))
    }

    fn encode(&self, path: &Path, image: &PixelBuffer) -> Result<(), CodecError> {
        self.insert(path, image.clone());
        self.writes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(path.to_path_buf());
        Ok(())
    }
}
