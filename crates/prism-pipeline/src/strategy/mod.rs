//! The three batch runners and the dispatcher that picks one.
//!
//! Every runner takes the same [`Batch`] and [`Codec`] and, for the same
//! inputs, persists byte-identical images. They differ only in how the
//! work is spread across threads:
//!
//! - [`sequential`]: one thread, one image and one stage at a time.
//! - [`bsp`]: `W` persistent workers, each owning a column slice of every
//!   image for the whole batch.
//! - [`pipeline`]: a paced producer feeding `W` consumers, each of which
//!   fans every stage out to `W` sub-workers and fans the tiles back in.

pub mod bsp;
pub mod pipeline;
pub mod sequential;

use log::info;

use crate::codec::Codec;
use crate::config::{RunConfig, Strategy};
use crate::diagnostics::BatchReport;
use crate::types::{Batch, PipelineError};

/// Run `batch` with the strategy and worker count in `config`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` does not
/// validate, otherwise the first failure of the chosen runner.
pub fn run_batch<C: Codec + ?Sized>(
    batch: &Batch,
    config: &RunConfig,
    codec: &C,
) -> Result<BatchReport, PipelineError> {
    config.validate()?;
    info!(
        "{}: running {} images with {} x{}",
        batch.tag,
        batch.jobs.len(),
        config.strategy,
        config.workers,
    );
    let report = match config.strategy {
        Strategy::Sequential => sequential::run(batch, codec),
        Strategy::Bsp => bsp::run(batch, config.workers, codec),
        Strategy::Pipeline => pipeline::run(batch, config.workers, config.max_delay, codec),
    }?;
    info!(
        "{}: {} images done in {:.3}s",
        report.tag,
        report.images,
        report.elapsed.as_secs_f64()
    );
    Ok(report)
}

/// Pick the error to report from several failed workers.
///
/// Workers stopped by an abort report [`PipelineError::Aborted`]; the
/// failure that raised the abort is preferred over them.
pub(crate) fn first_cause(errors: impl IntoIterator<Item = PipelineError>) -> Option<PipelineError> {
    let mut aborted = None;
    for error in errors {
        if matches!(error, PipelineError::Aborted) {
            aborted.get_or_insert(error);
        } else {
            return Some(error);
        }
    }
    aborted
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::test_support::{batch, gradient};
    use super::*;
    use crate::types::Effect;

    fn config(strategy: Strategy, workers: usize) -> RunConfig {
        RunConfig {
            strategy,
            workers,
            max_delay: Duration::ZERO,
        }
    }

    #[test]
    fn every_strategy_writes_the_same_images() {
        let jobs = vec![
            ("a.png", gradient(11, 5), vec![Effect::Grayscale, Effect::Sharpen]),
            ("b.png", gradient(4, 9), vec![Effect::EdgeDetect, Effect::Blur, Effect::Grayscale]),
        ];
        let (reference_batch, reference) = batch(jobs.clone());
        run_batch(&reference_batch, &config(Strategy::Sequential, 1), &reference).unwrap();

        for strategy in [Strategy::Bsp, Strategy::Pipeline] {
            let (parallel_batch, codec) = batch(jobs.clone());
            let report = run_batch(&parallel_batch, &config(strategy, 3), &codec).unwrap();
            assert_eq!(report.strategy, strategy);
            assert_eq!(report.images, 2);
            for name in ["out/t_a.png", "out/t_b.png"] {
                assert_eq!(
                    codec.get(Path::new(name)),
                    reference.get(Path::new(name)),
                    "{strategy} {name}"
                );
            }
        }
    }

    #[test]
    fn zero_workers_fail_before_any_decode() {
        let (zero_batch, codec) = batch(vec![("a.png", gradient(3, 3), vec![Effect::Blur])]);
        let err = run_batch(&zero_batch, &config(Strategy::Pipeline, 0), &codec).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
        assert!(codec.writes().is_empty());
    }

    #[test]
    fn root_cause_wins_over_aborts() {
        let picked = first_cause([
            PipelineError::Aborted,
            PipelineError::WorkerPanicked,
            PipelineError::Aborted,
        ]);
        assert!(matches!(picked, Some(PipelineError::WorkerPanicked)));
        assert!(matches!(
            first_cause([PipelineError::Aborted]),
            Some(PipelineError::Aborted)
        ));
        assert!(first_cause(Vec::new()).is_none());
    }
}
