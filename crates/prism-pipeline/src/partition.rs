//! Static column partitioning.
//!
//! Every parallel stage splits the image width into one contiguous
//! [`ColumnRange`] per worker. The split is by integer division, and the
//! remainder columns all go to the last worker, so shares may differ by up
//! to `workers - 1` columns.

use std::ops::Range;

/// Half-open interval `[start, end)` of image columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRange {
    /// First column (inclusive).
    pub start: u32,
    /// One past the last column.
    pub end: u32,
}

impl ColumnRange {
    /// Create a range. `end` is raised to `start` if it is smaller.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        if end < start {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Range covering the whole width of an image.
    #[must_use]
    pub const fn full(width: u32) -> Self {
        Self {
            start: 0,
            end: width,
        }
    }

    /// Number of columns in the range.
    #[must_use]
    pub const fn len(self) -> u32 {
        self.end - self.start
    }

    /// Returns `true` if the range covers no columns.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// Iterate over the columns in the range.
    #[must_use]
    pub const fn columns(self) -> Range<u32> {
        self.start..self.end
    }
}

/// Split `width` columns into one range per worker.
///
/// Worker `k` receives `[k * share, (k + 1) * share)` where
/// `share = width / workers`; the last worker's range is extended to
/// `width`. The ranges are returned in worker order and together cover
/// `[0, width)` exactly once. A `workers` value of zero is treated as one.
#[must_use = "returns the per-worker column ranges"]
pub fn partition(width: u32, workers: usize) -> Vec<ColumnRange> {
    let workers = u32::try_from(workers.max(1)).unwrap_or(u32::MAX);
    let share = width / workers;
    (0..workers)
        .map(|k| {
            let start = k * share;
            let end = if k + 1 == workers { width } else { start + share };
            ColumnRange::new(start, end)
        })
        .collect()
}
