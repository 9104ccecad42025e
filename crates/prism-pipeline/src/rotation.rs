//! Buffer rotation between stages.
//!
//! After a non-final stage, `result` must become the next stage's
//! `current`, and the old `current` is recycled as the next write target.
//! A worker that owns only part of the width rotates just its own columns
//! through `scratch`:
//!
//! ```text
//! scratch[range] <- current[range]
//! current[range] <- result[range]
//! result[range]  <- scratch[range]
//! ```
//!
//! A caller that owns the whole width can use [`PixelTriple::swap`]
//! instead, which exchanges the buffers without copying.

use crate::buffer::PixelTriple;
use crate::partition::ColumnRange;
use crate::shared::SharedTriple;

/// Rotate `columns` of an exclusively owned triple.
pub fn rotate_columns(triple: &mut PixelTriple, columns: ColumnRange) {
    let PixelTriple {
        current,
        result,
        scratch,
    } = triple;
    scratch.copy_columns_from(current, columns);
    current.copy_columns_from(result, columns);
    result.copy_columns_from(scratch, columns);
}

/// Rotate `columns` of a triple shared with other workers.
///
/// Only the calling worker may touch `columns` while this runs, and no
/// worker may read `current` until every worker has finished rotating.
pub fn rotate_shared_columns(triple: &SharedTriple, columns: ColumnRange) {
    triple.scratch.copy_columns_from(&triple.current, columns);
    triple.current.copy_columns_from(&triple.result, columns);
    triple.result.copy_columns_from(&triple.scratch, columns);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;
    use crate::partition::partition;

    fn triple() -> PixelTriple {
        let current = PixelBuffer::from_fn(7, 3, |x, y| [x as u16, y as u16, 1, 1]);
        let result = PixelBuffer::from_fn(7, 3, |x, y| [100 + x as u16, y as u16, 2, 2]);
        PixelTriple::from_parts(current, result, PixelBuffer::new(7, 3)).unwrap()
    }

    #[test]
    fn full_width_rotation_matches_swap() {
        let mut rotated = triple();
        let mut swapped = rotated.clone();
        rotate_columns(&mut rotated, ColumnRange::full(7));
        swapped.swap();
        assert_eq!(rotated.current, swapped.current);
        assert_eq!(rotated.result, swapped.result);
    }

    #[test]
    fn partial_rotation_leaves_other_columns_alone() {
        let original = triple();
        let mut rotated = original.clone();
        rotate_columns(&mut rotated, ColumnRange::new(2, 5));
        for y in 0..3 {
            for x in 0..7 {
                if (2..5).contains(&x) {
                    assert_eq!(rotated.current.get(x, y), original.result.get(x, y));
                    assert_eq!(rotated.result.get(x, y), original.current.get(x, y));
                } else {
                    assert_eq!(rotated.current.get(x, y), original.current.get(x, y));
                    assert_eq!(rotated.result.get(x, y), original.result.get(x, y));
                }
            }
        }
    }

    #[test]
    fn per_range_shared_rotation_equals_full_rotation() {
        let original = triple();
        let shared = SharedTriple::from(&original);
        for range in partition(7, 3) {
            rotate_shared_columns(&shared, range);
        }
        let mut expected = original;
        rotate_columns(&mut expected, ColumnRange::full(7));
        let actual = shared.snapshot();
        assert_eq!(actual.current, expected.current);
        assert_eq!(actual.result, expected.result);
    }
}
