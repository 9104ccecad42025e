//! Shared types for the prism effect pipeline.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new set of dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Map signed coordinates onto the image, or `None` if they fall
    /// outside it.
    #[must_use]
    pub fn locate(self, x: i64, y: i64) -> Option<(u32, u32)> {
        let x = u32::try_from(x).ok().filter(|&x| x < self.width)?;
        let y = u32::try_from(y).ok().filter(|&y| y < self.height)?;
        Some((x, y))
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One effect stage, identified in plans by a single-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// `G`: average of R, G, B written to all three colour channels.
    #[serde(rename = "G")]
    Grayscale,
    /// `S`: 3x3 sharpen convolution.
    #[serde(rename = "S")]
    Sharpen,
    /// `B`: 3x3 box blur.
    #[serde(rename = "B")]
    Blur,
    /// `E`: 3x3 Laplacian edge detection.
    #[serde(rename = "E")]
    EdgeDetect,
}

impl Effect {
    /// Every effect, in code order `G`, `S`, `B`, `E`.
    pub const ALL: [Self; 4] = [Self::Grayscale, Self::Sharpen, Self::Blur, Self::EdgeDetect];

    /// The single-letter plan code.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Grayscale => 'G',
            Self::Sharpen => 'S',
            Self::Blur => 'B',
            Self::EdgeDetect => 'E',
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error returned when parsing an unknown effect code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown effect code {0:?} (expected one of G, S, B, E)")]
pub struct UnknownEffect(pub String);

impl FromStr for Effect {
    type Err = UnknownEffect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "G" => Ok(Self::Grayscale),
            "S" => Ok(Self::Sharpen),
            "B" => Ok(Self::Blur),
            "E" => Ok(Self::EdgeDetect),
            other => Err(UnknownEffect(other.to_owned())),
        }
    }
}

/// One line of a plan: which image to load and which effects to apply.
///
/// Serialized as `{"inPath": "a.png", "outPath": "a.png", "effects": ["G", "B"]}`.
/// `outPath` is accepted for compatibility with existing plan files but is
/// not used; output names are derived from the data-directory tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRecord {
    /// Input file name, relative to the tag's input directory.
    pub in_path: String,
    /// Ignored output hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_path: Option<String>,
    /// Effects to apply, in order.
    pub effects: Vec<Effect>,
}

/// A plan record resolved against a concrete input and output location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Human-readable name (the plan's input file name).
    pub name: String,
    /// Where to decode the source image from.
    pub input: PathBuf,
    /// Where to encode the final image to.
    pub output: PathBuf,
    /// Effects to apply, in order.
    pub effects: Vec<Effect>,
}

/// All jobs for one data-directory tag, processed as an independent batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Data-directory tag the batch was built for.
    pub tag: String,
    /// Jobs in plan order.
    pub jobs: Vec<Job>,
}

impl Batch {
    /// Total number of effect stages across all jobs.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.jobs.iter().map(|job| job.effects.len()).sum()
    }
}

/// Errors raised by an image codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Filesystem access failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The image container could not be decoded or encoded.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// No image is stored under the requested path.
    #[error("no image at {}", .0.display())]
    NotFound(PathBuf),
}

/// Errors that can occur while running a batch.
///
/// Every variant is fatal to the batch it occurred in.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A work item's source image could not be decoded.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        /// Path that was being decoded.
        path: PathBuf,
        /// Underlying codec failure.
        #[source]
        source: CodecError,
    },

    /// A work item's final image could not be encoded.
    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        /// Path that was being written.
        path: PathBuf,
        /// Underlying codec failure.
        #[source]
        source: CodecError,
    },

    /// Run configuration is invalid.
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    /// Two buffers that must share dimensions do not.
    #[error("buffer dimensions differ: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensions of the reference buffer.
        expected: Dimensions,
        /// Dimensions of the offending buffer.
        actual: Dimensions,
    },

    /// A stage fan-in did not receive exactly one tile per sub-worker.
    #[error("stage fan-in expected {expected} tiles, received {received}")]
    FanIn {
        /// Number of sub-workers launched for the stage.
        expected: usize,
        /// Number of tiles that actually arrived.
        received: usize,
    },

    /// The OS refused to start a worker thread.
    #[error("failed to start a worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// A worker thread panicked.
    #[error("a worker thread panicked")]
    WorkerPanicked,

    /// The batch was aborted because another worker failed.
    #[error("batch aborted after a worker failure")]
    Aborted,
}
