//! Per-pixel effect kernels.
//!
//! Every effect maps one input buffer to one output buffer, one column
//! range at a time. Arithmetic is done in `f64`, saturated to the 16-bit
//! channel range, and truncated toward zero. Neighbour reads outside the
//! image go through [`PixelSource`] and are zero.

use crate::buffer::{PixelSource, Rgba16};
use crate::partition::ColumnRange;
use crate::types::Effect;

/// 3x3 convolution weights, indexed `[row][column]`.
pub type Kernel = [[f64; 3]; 3];

/// Sharpen: centre weight 5, orthogonal neighbours -1.
pub const SHARPEN: Kernel = [[0.0, -1.0, 0.0], [-1.0, 5.0, -1.0], [0.0, -1.0, 0.0]];

/// Uniform 3x3 box blur.
pub const BLUR: Kernel = [[1.0 / 9.0; 3]; 3];

/// Laplacian edge detector.
pub const EDGE_DETECT: Kernel = [[-1.0, -1.0, -1.0], [-1.0, 8.0, -1.0], [-1.0, -1.0, -1.0]];

impl Effect {
    /// The convolution kernel for this effect, or `None` for grayscale.
    #[must_use]
    pub const fn kernel(self) -> Option<&'static Kernel> {
        match self {
            Self::Grayscale => None,
            Self::Sharpen => Some(&SHARPEN),
            Self::Blur => Some(&BLUR),
            Self::EdgeDetect => Some(&EDGE_DETECT),
        }
    }
}

/// Saturate `value` to `[0, 65535]` and truncate to a channel sample.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_channel(value: f64) -> u16 {
    value.clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Grayscale one pixel: R, G and B all become their mean; alpha is kept.
#[must_use]
pub fn grayscale_pixel(pixel: Rgba16) -> Rgba16 {
    let [r, g, b, a] = pixel;
    let sum = u32::from(r) + u32::from(g) + u32::from(b);
    let gray = clamp_channel(f64::from(sum) / 3.0);
    [gray, gray, gray, a]
}

/// Convolve the 3x3 neighbourhood of `(x, y)` with `kernel`.
///
/// Colour channels are accumulated row by row, left to right; the fixed
/// order keeps results bit-identical across strategies. Alpha is taken
/// from the centre pixel.
#[must_use]
pub fn convolve_pixel<S: PixelSource + ?Sized>(
    kernel: &Kernel,
    source: &S,
    x: i64,
    y: i64,
) -> Rgba16 {
    let mut sum = [0.0_f64; 3];
    for (row, dy) in kernel.iter().zip(-1..=1) {
        for (&weight, dx) in row.iter().zip(-1..=1) {
            let neighbour = source.pixel(x + dx, y + dy);
            for (acc, &sample) in sum.iter_mut().zip(&neighbour) {
                *acc += f64::from(sample) * weight;
            }
        }
    }
    let alpha = source.pixel(x, y)[3];
    [
        clamp_channel(sum[0]),
        clamp_channel(sum[1]),
        clamp_channel(sum[2]),
        clamp_channel(f64::from(alpha)),
    ]
}

/// Apply `effect` to `columns` of `source` over the full height.
///
/// `sink` is called once per output pixel with its image coordinates.
/// Rows are visited top to bottom, columns left to right.
pub fn apply<S, F>(effect: Effect, source: &S, columns: ColumnRange, mut sink: F)
where
    S: PixelSource + ?Sized,
    F: FnMut(u32, u32, Rgba16),
{
    let height = source.dimensions().height;
    for y in 0..height {
        for x in columns.columns() {
            let (sx, sy) = (i64::from(x), i64::from(y));
            let pixel = match effect.kernel() {
                None => grayscale_pixel(source.pixel(sx, sy)),
                Some(kernel) => convolve_pixel(kernel, source, sx, sy),
            };
            sink(x, y, pixel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;

    const MAX: u16 = u16::MAX;

    fn uniform(width: u32, height: u32, pixel: Rgba16) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, |_, _| pixel)
    }

    fn run(effect: Effect, source: &PixelBuffer) -> PixelBuffer {
        let mut out = PixelBuffer::new(source.width(), source.height());
        apply(effect, source, ColumnRange::full(source.width()), |x, y, p| {
            out.put(x, y, p);
        });
        out
    }

    #[test]
    fn clamp_saturates_both_ends() {
        assert_eq!(clamp_channel(-12.5), 0);
        assert_eq!(clamp_channel(70_000.0), MAX);
        assert_eq!(clamp_channel(1234.99), 1234);
        assert_eq!(clamp_channel(f64::NAN), 0);
    }

    #[test]
    fn grayscale_averages_colour_and_keeps_alpha() {
        assert_eq!(grayscale_pixel([300, 600, 900, 17]), [600, 600, 600, 17]);
        // 1 + 2 + 2 = 5, 5 / 3 = 1.67 truncates to 1.
        assert_eq!(grayscale_pixel([1, 2, 2, 0]), [1, 1, 1, 0]);
        assert_eq!(grayscale_pixel([MAX, MAX, MAX, MAX]), [MAX; 4]);
    }

    #[test]
    fn edge_detect_saturates_isolated_bright_pixel() {
        // A max-value pixel surrounded by zeros: the centre sums to 8 * MAX
        // and clamps to MAX; every neighbour sums to -MAX and clamps to 0.
        let source = PixelBuffer::from_fn(3, 3, |x, y| {
            if (x, y) == (1, 1) {
                [MAX, MAX, MAX, MAX]
            } else {
                [0, 0, 0, MAX]
            }
        });
        let out = run(Effect::EdgeDetect, &source);
        assert_eq!(out.get(1, 1), [MAX, MAX, MAX, MAX]);
        for (x, y) in [(0, 0), (1, 0), (2, 0), (0, 1), (2, 1), (0, 2), (1, 2), (2, 2)] {
            assert_eq!(out.get(x, y), [0, 0, 0, MAX], "at ({x},{y})");
        }
    }

    #[test]
    fn edge_detect_of_uniform_interior_is_zero() {
        let source = uniform(5, 5, [4000, 5000, 6000, MAX]);
        let out = run(Effect::EdgeDetect, &source);
        assert_eq!(out.get(2, 2), [0, 0, 0, MAX]);
    }

    #[test]
    fn zero_fill_darkens_blurred_corners() {
        // Corner sees 4 of 9 neighbours, edge 6, interior 9.
        let source = uniform(3, 3, [9000, 9000, 9000, 1]);
        let out = run(Effect::Blur, &source);
        assert_eq!(out.get(0, 0), [4000, 4000, 4000, 1]);
        assert_eq!(out.get(1, 0), [6000, 6000, 6000, 1]);
    }

    #[test]
    fn sharpen_of_uniform_interior_is_identity() {
        let source = uniform(3, 3, [1000, 2000, 3000, 42]);
        let out = run(Effect::Sharpen, &source);
        assert_eq!(out.get(1, 1), [1000, 2000, 3000, 42]);
        // Corner loses two of four negative neighbours: 5v - 2v = 3v.
        assert_eq!(out.get(0, 0), [3000, 6000, 9000, 42]);
    }

    #[test]
    fn apply_writes_only_requested_columns() {
        let source = uniform(6, 2, [10, 20, 30, 40]);
        let mut touched = Vec::new();
        apply(Effect::Grayscale, &source, ColumnRange::new(2, 4), |x, y, _| {
            touched.push((x, y));
        });
        assert_eq!(touched, vec![(2, 0), (3, 0), (2, 1), (3, 1)]);
    }

    #[test]
    fn only_grayscale_has_no_kernel() {
        for effect in Effect::ALL {
            assert_eq!(effect.kernel().is_none(), effect == Effect::Grayscale);
        }
    }
}
