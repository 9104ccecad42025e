//! Pixel storage: the 16-bit RGBA buffer, the per-image buffer triple, and
//! isolated column tiles.
//!
//! Every buffer is row-major with four `u16` samples per pixel. Reads go
//! through [`PixelSource`], which applies the zero-fill boundary policy:
//! any coordinate outside the image reads as `[0, 0, 0, 0]`.

use std::mem;

use crate::partition::ColumnRange;
use crate::types::{Dimensions, PipelineError};

/// One RGBA pixel with 16 bits per channel.
pub type Rgba16 = [u16; 4];

/// Samples per pixel.
pub const CHANNELS: usize = 4;

/// `image` crate buffer with the same sample layout as [`PixelBuffer`].
pub type Rgba16Image = image::ImageBuffer<image::Rgba<u16>, Vec<u16>>;

/// Read access to pixels with the zero-fill boundary policy.
pub trait PixelSource {
    /// Dimensions of the full image this source belongs to.
    fn dimensions(&self) -> Dimensions;

    /// Pixel at `(x, y)` in image coordinates, or zero outside the image.
    fn pixel(&self, x: i64, y: i64) -> Rgba16;
}

/// Byte offset of pixel `(x, y)` in a row-major RGBA buffer of `width`.
pub(crate) const fn sample_index(width: u32, x: u32, y: u32) -> usize {
    (y as usize * width as usize + x as usize) * CHANNELS
}

/// A width x height grid of RGBA16 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    dimensions: Dimensions,
    samples: Vec<u16>,
}

impl PixelBuffer {
    /// Create a zeroed buffer.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let dimensions = Dimensions::new(width, height);
        Self {
            dimensions,
            samples: vec![0; dimensions.pixel_count() * CHANNELS],
        }
    }

    /// Create a buffer by evaluating `f` for every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Rgba16) -> Self {
        let mut buffer = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                buffer.put(x, y, f(x, y));
            }
        }
        buffer
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Raw samples, row-major RGBA.
    #[must_use]
    pub fn as_raw(&self) -> &[u16] {
        &self.samples
    }

    /// Pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the buffer.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Rgba16 {
        let i = sample_index(self.dimensions.width, x, y);
        [
            self.samples[i],
            self.samples[i + 1],
            self.samples[i + 2],
            self.samples[i + 3],
        ]
    }

    /// Overwrite pixel `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the buffer.
    pub fn put(&mut self, x: u32, y: u32, pixel: Rgba16) {
        let i = sample_index(self.dimensions.width, x, y);
        self.samples[i..i + CHANNELS].copy_from_slice(&pixel);
    }

    /// Copy `columns` of every row from `source` into `self`.
    ///
    /// # Panics
    ///
    /// Panics if the buffers have different dimensions or `columns`
    /// extends past the width.
    pub fn copy_columns_from(&mut self, source: &Self, columns: ColumnRange) {
        assert_eq!(self.dimensions, source.dimensions);
        if columns.is_empty() {
            return;
        }
        let width = self.dimensions.width;
        for y in 0..self.dimensions.height {
            let from = sample_index(width, columns.start, y);
            let to = from + columns.len() as usize * CHANNELS;
            self.samples[from..to].copy_from_slice(&source.samples[from..to]);
        }
    }

    /// Convert into an `image` crate buffer for encoding.
    #[must_use]
    pub fn to_image(&self) -> Rgba16Image {
        Rgba16Image::from_fn(self.width(), self.height(), |x, y| {
            image::Rgba(self.get(x, y))
        })
    }
}

impl PixelSource for PixelBuffer {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn pixel(&self, x: i64, y: i64) -> Rgba16 {
        self.dimensions
            .locate(x, y)
            .map_or([0; CHANNELS], |(x, y)| self.get(x, y))
    }
}

impl From<Rgba16Image> for PixelBuffer {
    fn from(image: Rgba16Image) -> Self {
        let (width, height) = image.dimensions();
        Self {
            dimensions: Dimensions::new(width, height),
            samples: image.into_raw(),
        }
    }
}

/// The three same-sized buffers an image is processed in.
///
/// At the start of every stage `current` holds the committed input and
/// `result` is the write target. `scratch` is only used while rotating a
/// column range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelTriple {
    /// Read source of the active stage.
    pub current: PixelBuffer,
    /// Write target of the active stage.
    pub result: PixelBuffer,
    /// Rotation helper.
    pub scratch: PixelBuffer,
}

impl PixelTriple {
    /// Build a triple around a decoded source image.
    #[must_use]
    pub fn new(source: PixelBuffer) -> Self {
        let (width, height) = (source.width(), source.height());
        Self {
            current: source,
            result: PixelBuffer::new(width, height),
            scratch: PixelBuffer::new(width, height),
        }
    }

    /// Reassemble a triple, checking that all buffers share dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if `result` or
    /// `scratch` differ in size from `current`.
    pub fn from_parts(
        current: PixelBuffer,
        result: PixelBuffer,
        scratch: PixelBuffer,
    ) -> Result<Self, PipelineError> {
        let expected = current.dimensions;
        for actual in [result.dimensions, scratch.dimensions] {
            if actual != expected {
                return Err(PipelineError::DimensionMismatch { expected, actual });
            }
        }
        Ok(Self {
            current,
            result,
            scratch,
        })
    }

    /// Dimensions shared by all three buffers.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.current.dimensions
    }

    /// Zero-copy rotation: the last stage's `result` becomes `current`.
    ///
    /// Only valid when the caller owns the full width, as the sequential
    /// runner does.
    pub fn swap(&mut self) {
        mem::swap(&mut self.current, &mut self.result);
    }

    /// Consume the triple, returning the image to persist.
    #[must_use]
    pub fn into_result(self) -> PixelBuffer {
        self.result
    }
}

/// An isolated copy of some columns of an image.
///
/// Input tiles hold their column range plus one halo column on each side
/// (where the image has one), so a 3x3 kernel evaluated on the tile gives
/// the same answer as on the full image. Output tiles hold exactly their
/// column range. A tile owns its samples, so sub-workers never share
/// memory with each other or with the buffer they were cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    columns: ColumnRange,
    origin: u32,
    image: Dimensions,
    pixels: PixelBuffer,
}

impl Tile {
    /// Copy `columns` of `source`, plus the halo, into a new input tile.
    #[must_use]
    pub fn extract(source: &PixelBuffer, columns: ColumnRange) -> Self {
        let image = source.dimensions;
        let origin = columns.start.saturating_sub(1);
        let end = columns.end.saturating_add(1).min(image.width).max(origin);
        let pixels = PixelBuffer::from_fn(end - origin, image.height, |x, y| {
            source.get(origin + x, y)
        });
        Self {
            columns,
            origin,
            image,
            pixels,
        }
    }

    /// A zeroed output tile covering exactly `columns` of an image of
    /// dimensions `image`.
    #[must_use]
    pub fn blank(columns: ColumnRange, image: Dimensions) -> Self {
        Self {
            columns,
            origin: columns.start,
            image,
            pixels: PixelBuffer::new(columns.len(), image.height),
        }
    }

    /// Write a pixel at image coordinates `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `x` lies outside the tile's stored columns.
    pub fn put(&mut self, x: u32, y: u32, pixel: Rgba16) {
        self.pixels.put(x - self.origin, y, pixel);
    }

    /// Copy the tile's own columns into `target` at their original offset.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if `target` is not the
    /// image this tile was cut from.
    pub fn composite_into(&self, target: &mut PixelBuffer) -> Result<(), PipelineError> {
        if target.dimensions != self.image {
            return Err(PipelineError::DimensionMismatch {
                expected: self.image,
                actual: target.dimensions,
            });
        }
        let offset = self.columns.start - self.origin;
        for y in 0..self.image.height {
            for x in 0..self.columns.len() {
                target.put(self.columns.start + x, y, self.pixels.get(offset + x, y));
            }
        }
        Ok(())
    }
}

impl PixelSource for Tile {
    fn dimensions(&self) -> Dimensions {
        self.image
    }

    fn pixel(&self, x: i64, y: i64) -> Rgba16 {
        if self.image.locate(x, y).is_none() {
            return [0; CHANNELS];
        }
        debug_assert!(
            x >= i64::from(self.origin) && x < i64::from(self.origin + self.pixels.width()),
            "read of column {x} outside tile halo",
        );
        self.pixels.pixel(x - i64::from(self.origin), y)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, |x, y| {
            [(x * 100) as u16, (y * 100) as u16, (x + y) as u16, 65535]
        })
    }

    #[test]
    fn new_buffer_is_zeroed() {
        let buffer = PixelBuffer::new(3, 2);
        assert_eq!(buffer.as_raw().len(), 3 * 2 * CHANNELS);
        assert!(buffer.as_raw().iter().all(|&s| s == 0));
    }

    #[test]
    fn out_of_range_reads_are_zero() {
        let buffer = gradient(4, 4);
        assert_eq!(buffer.pixel(-1, 0), [0; 4]);
        assert_eq!(buffer.pixel(0, -1), [0; 4]);
        assert_eq!(buffer.pixel(4, 0), [0; 4]);
        assert_eq!(buffer.pixel(0, 4), [0; 4]);
        assert_eq!(buffer.pixel(3, 3), buffer.get(3, 3));
    }

    #[test]
    fn image_conversion_preserves_samples() {
        let buffer = gradient(5, 3);
        let image = buffer.to_image();
        assert_eq!(image.dimensions(), (5, 3));
        assert_eq!(image.get_pixel(4, 2).0, buffer.get(4, 2));
        assert_eq!(PixelBuffer::from(image), buffer);
    }

    #[test]
    fn copy_columns_touches_only_the_range() {
        let source = gradient(6, 3);
        let mut target = PixelBuffer::new(6, 3);
        target.copy_columns_from(&source, ColumnRange::new(2, 4));
        for y in 0..3 {
            for x in 0..6 {
                let expected = if (2..4).contains(&x) {
                    source.get(x, y)
                } else {
                    [0; 4]
                };
                assert_eq!(target.get(x, y), expected, "at ({x},{y})");
            }
        }
    }

    #[test]
    fn swap_exchanges_current_and_result() {
        let mut triple = PixelTriple::new(gradient(3, 3));
        let source = triple.current.clone();
        triple.result.put(0, 0, [1, 2, 3, 4]);
        triple.swap();
        assert_eq!(triple.result, source);
        assert_eq!(triple.current.get(0, 0), [1, 2, 3, 4]);
    }

    #[test]
    fn from_parts_rejects_mismatched_buffers() {
        let result = PixelTriple::from_parts(
            PixelBuffer::new(3, 3),
            PixelBuffer::new(3, 3),
            PixelBuffer::new(2, 3),
        );
        assert!(matches!(
            result,
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn tile_reads_match_full_image_inside_halo() {
        let source = gradient(8, 4);
        let tile = Tile::extract(&source, ColumnRange::new(3, 5));
        for y in -1..=4 {
            for x in 2..=5 {
                assert_eq!(tile.pixel(x, y), source.pixel(x, y), "at ({x},{y})");
            }
        }
    }

    #[test]
    fn tile_at_image_edge_zero_fills_outside() {
        let source = gradient(4, 2);
        let tile = Tile::extract(&source, ColumnRange::new(0, 2));
        assert_eq!(tile.pixel(-1, 0), [0; 4]);
        assert_eq!(tile.pixel(2, 1), source.get(2, 1));
    }

    #[test]
    fn blank_tile_composites_at_original_offset() {
        let dims = Dimensions::new(5, 2);
        let mut tile = Tile::blank(ColumnRange::new(3, 5), dims);
        tile.put(3, 0, [7, 7, 7, 7]);
        tile.put(4, 1, [9, 9, 9, 9]);
        let mut target = PixelBuffer::from_fn(5, 2, |_, _| [1, 1, 1, 1]);
        tile.composite_into(&mut target).unwrap();
        assert_eq!(target.get(3, 0), [7, 7, 7, 7]);
        assert_eq!(target.get(4, 1), [9, 9, 9, 9]);
        assert_eq!(target.get(4, 0), [0, 0, 0, 0]);
        assert_eq!(target.get(2, 0), [1, 1, 1, 1]);
    }

    #[test]
    fn composite_into_wrong_image_is_rejected() {
        let tile = Tile::blank(ColumnRange::new(0, 2), Dimensions::new(4, 4));
        let mut target = PixelBuffer::new(3, 4);
        assert!(tile.composite_into(&mut target).is_err());
    }
}
