//! PNG codec backed by the `image` crate.
//!
//! Sources in any bit depth or colour type the PNG decoder understands are
//! widened to 16-bit RGBA on decode. Results are always written as 16-bit
//! RGBA PNGs.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::png::PngEncoder;
use log::trace;
use prism_pipeline::{Codec, CodecError, PixelBuffer};

/// Reads and writes PNG files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl Codec for PngCodec {
    fn decode(&self, path: &Path) -> Result<PixelBuffer, CodecError> {
        let bytes = std::fs::read(path)?;
        let decoded = image::load_from_memory(&bytes)?;
        trace!(
            "decoded {} ({} bytes, {:?})",
            path.display(),
            bytes.len(),
            decoded.color()
        );
        Ok(PixelBuffer::from(decoded.into_rgba16()))
    }

    fn encode(&self, path: &Path, image: &PixelBuffer) -> Result<(), CodecError> {
        let writer = BufWriter::new(File::create(path)?);
        image.to_image().write_with_encoder(PngEncoder::new(writer))?;
        trace!("encoded {}", path.display());
        Ok(())
    }
}
