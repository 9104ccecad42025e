//! Run configuration: which strategy to use and how many workers.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::diagnostics::seconds;
use crate::types::PipelineError;

/// Concurrency strategy used to execute a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One worker processes every stage of every image in turn.
    #[default]
    Sequential,
    /// Persistent workers, one column slice each, joined at the end.
    Bsp,
    /// Streaming producer, consumer pool, per-stage fan-out/fan-in.
    Pipeline,
}

impl Strategy {
    /// Map the command-line mode word onto a strategy.
    ///
    /// No mode means sequential, `"pipeline"` means pipeline, and any
    /// other word selects BSP.
    #[must_use]
    pub fn from_mode(mode: Option<&str>) -> Self {
        match mode {
            None | Some("sequential") => Self::Sequential,
            Some("pipeline") => Self::Pipeline,
            Some(_) => Self::Bsp,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sequential => "sequential",
            Self::Bsp => "bsp",
            Self::Pipeline => "pipeline",
        })
    }
}

/// Settings for one run over one or more batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Which strategy executes the batch.
    pub strategy: Strategy,

    /// Worker count for the parallel strategies. Ignored by
    /// [`Strategy::Sequential`].
    pub workers: usize,

    /// Upper bound (exclusive) of the random pause the pipeline producer
    /// takes after handing off each image. Zero disables pacing.
    #[serde(with = "seconds")]
    pub max_delay: Duration,
}

impl RunConfig {
    /// Default producer pacing bound.
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(1000);

    /// Worker count matching the machine's available parallelism.
    #[must_use]
    pub fn default_workers() -> usize {
        std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
    }

    /// Check the configuration before any work is started.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if a parallel strategy is
    /// asked to run with zero workers.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.workers == 0 && self.strategy != Strategy::Sequential {
            return Err(PipelineError::InvalidConfig(format!(
                "{} strategy needs at least one worker",
                self.strategy
            )));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            workers: Self::default_workers(),
            max_delay: Self::DEFAULT_MAX_DELAY,
        }
    }
}
