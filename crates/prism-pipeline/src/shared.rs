//! Buffers that several workers write through shared references.
//!
//! The BSP runner has every worker write its own column range of the same
//! image. Samples are stored as [`AtomicU16`] so this needs no `unsafe` and
//! no lock. Loads and stores are `Relaxed`: ordering between a write and a
//! later read in another worker comes from the stage barrier and the final
//! join, both of which synchronize through a mutex.

use std::sync::atomic::{AtomicU16, Ordering};

use crate::buffer::{CHANNELS, PixelBuffer, PixelSource, PixelTriple, Rgba16, sample_index};
use crate::partition::ColumnRange;
use crate::types::Dimensions;

/// A pixel buffer with atomically accessed samples.
#[derive(Debug)]
pub struct SharedBuffer {
    dimensions: Dimensions,
    samples: Vec<AtomicU16>,
}

impl SharedBuffer {
    /// Pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the buffer.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Rgba16 {
        let i = sample_index(self.dimensions.width, x, y);
        std::array::from_fn(|c| self.samples[i + c].load(Ordering::Relaxed))
    }

    /// Overwrite pixel `(x, y)`.
    ///
    /// Callers must only write columns they own for the current phase.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the buffer.
    pub fn put(&self, x: u32, y: u32, pixel: Rgba16) {
        let i = sample_index(self.dimensions.width, x, y);
        for (sample, value) in self.samples[i..i + CHANNELS].iter().zip(pixel) {
            sample.store(value, Ordering::Relaxed);
        }
    }

    /// Copy `columns` of every row from `source` into `self`.
    pub fn copy_columns_from(&self, source: &Self, columns: ColumnRange) {
        for y in 0..self.dimensions.height {
            for x in columns.columns() {
                self.put(x, y, source.get(x, y));
            }
        }
    }

    /// Copy the current contents into an ordinary buffer.
    #[must_use]
    pub fn snapshot(&self) -> PixelBuffer {
        PixelBuffer::from_fn(self.dimensions.width, self.dimensions.height, |x, y| {
            self.get(x, y)
        })
    }
}

impl From<&PixelBuffer> for SharedBuffer {
    fn from(buffer: &PixelBuffer) -> Self {
        Self {
            dimensions: buffer.dimensions(),
            samples: buffer.as_raw().iter().copied().map(AtomicU16::new).collect(),
        }
    }
}

impl PixelSource for SharedBuffer {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn pixel(&self, x: i64, y: i64) -> Rgba16 {
        self.dimensions
            .locate(x, y)
            .map_or([0; CHANNELS], |(x, y)| self.get(x, y))
    }
}

/// A [`PixelTriple`] whose buffers accept concurrent disjoint writes.
#[derive(Debug)]
pub struct SharedTriple {
    /// Read source of the active stage.
    pub current: SharedBuffer,
    /// Write target of the active stage.
    pub result: SharedBuffer,
    /// Rotation helper.
    pub scratch: SharedBuffer,
}

impl From<&PixelTriple> for SharedTriple {
    fn from(triple: &PixelTriple) -> Self {
        Self {
            current: SharedBuffer::from(&triple.current),
            result: SharedBuffer::from(&triple.result),
            scratch: SharedBuffer::from(&triple.scratch),
        }
    }
}

impl SharedTriple {
    /// Copy all three buffers back into an ordinary triple.
    #[must_use]
    pub fn snapshot(&self) -> PixelTriple {
        PixelTriple {
            current: self.current.snapshot(),
            result: self.result.snapshot(),
            scratch: self.scratch.snapshot(),
        }
    }
}
