//! BSP runner: persistent workers over column slices.
//!
//! Every image of the batch is decoded up front. `W` workers are spawned
//! once and live for the whole batch; worker `k` owns slice `k` of every
//! image (see [`partition`]) and walks all images and stages in batch
//! order, writing only its own columns of each `result` buffer.
//!
//! Kernels read one column past a slice edge, so a stage's `current` must
//! not change under a neighbour that is still reading it. Each non-final
//! stage therefore ends in two barrier waits:
//!
//! ```text
//! compute own columns  -> barrier -> rotate own columns -> barrier
//! ```
//!
//! The last stage of an image needs no barrier: nothing reads that
//! image's buffers again until the final join.
//!
//! When a worker has walked everything it arrives at the [`JoinState`];
//! the driver blocks on the same join and only then persists the images,
//! in batch order.

use std::thread;
use std::time::Instant;

use log::{debug, warn};

use crate::codec::Codec;
use crate::config::Strategy;
use crate::diagnostics::BatchReport;
use crate::item::WorkItem;
use crate::join::{JoinState, StageBarrier};
use crate::kernel;
use crate::partition::{ColumnRange, partition};
use crate::rotation::rotate_shared_columns;
use crate::shared::SharedTriple;
use crate::spawn::Spawner;
use crate::strategy::first_cause;
use crate::types::{Batch, Effect, PipelineError};

/// An image as the workers see it: shared buffers plus everyone's slice.
struct SharedItem {
    effects: Vec<Effect>,
    triple: SharedTriple,
    slices: Vec<ColumnRange>,
}

impl SharedItem {
    fn new(item: &WorkItem, workers: usize) -> Self {
        Self {
            effects: item.effects.clone(),
            triple: SharedTriple::from(&item.triple),
            slices: partition(item.triple.dimensions().width, workers),
        }
    }
}

/// Releases every waiter if the owning worker unwinds, so a panic
/// surfaces as an error instead of a hang.
struct AbortOnPanic<'a> {
    barrier: &'a StageBarrier,
    join: &'a JoinState,
}

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.barrier.abort();
            self.join.abort();
        }
    }
}

/// Run every image of `batch` with `workers` persistent workers.
///
/// # Errors
///
/// Returns [`PipelineError::Decode`] before any worker starts if a source
/// cannot be decoded, [`PipelineError::Spawn`] if a worker thread cannot
/// be started, [`PipelineError::WorkerPanicked`] if a worker panics, and
/// [`PipelineError::Encode`] if a result cannot be persisted.
pub fn run<C: Codec + ?Sized>(
    batch: &Batch,
    workers: usize,
    codec: &C,
) -> Result<BatchReport, PipelineError> {
    run_with(batch, workers, codec, &Spawner::os())
}

fn run_with<C: Codec + ?Sized>(
    batch: &Batch,
    workers: usize,
    codec: &C,
    spawner: &Spawner,
) -> Result<BatchReport, PipelineError> {
    let started = Instant::now();
    let workers = workers.max(1);
    let mut items = batch
        .jobs
        .iter()
        .map(|job| WorkItem::load(job, codec))
        .collect::<Result<Vec<_>, _>>()?;
    let shared: Vec<SharedItem> = items
        .iter()
        .map(|item| SharedItem::new(item, workers))
        .collect();

    let signals = execute(&shared, workers, spawner)?;
    debug!("bsp: join observed {signals} completion signals");

    for (item, shared) in items.iter_mut().zip(&shared) {
        item.triple = shared.triple.snapshot();
        item.persist(codec)?;
    }

    Ok(BatchReport {
        tag: batch.tag.clone(),
        strategy: Strategy::Bsp,
        workers,
        images: items.len(),
        stages: batch.stage_count(),
        elapsed: started.elapsed(),
        join_signals: Some(signals),
        tiles_composited: None,
    })
}

/// Start `workers` workers over `items` and block on their completion
/// join.
///
/// Returns the number of completion signals the join observed. If a
/// worker cannot be started, the ones already running are released
/// through the barrier and join before the error is returned.
fn execute(
    items: &[SharedItem],
    workers: usize,
    spawner: &Spawner,
) -> Result<usize, PipelineError> {
    let barrier = StageBarrier::new(workers);
    let join = JoinState::new(workers);

    thread::scope(|scope| {
        let (barrier, join) = (&barrier, &join);
        let mut failures = Vec::new();
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            match spawner.spawn(scope, format!("bsp-{id}"), move || {
                worker(id, items, barrier, join)
            }) {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    barrier.abort();
                    join.abort();
                    failures.push(error);
                    break;
                }
            }
        }

        let waited = join.wait();
        failures.extend(handles.into_iter().filter_map(|handle| {
            handle
                .join()
                .unwrap_or(Err(PipelineError::WorkerPanicked))
                .err()
        }));
        match first_cause(failures) {
            Some(error) => Err(error),
            None => waited,
        }
    })
}

/// Body of worker `id`: walk every item, then arrive at the join.
fn worker(
    id: usize,
    items: &[SharedItem],
    barrier: &StageBarrier,
    join: &JoinState,
) -> Result<(), PipelineError> {
    let _guard = AbortOnPanic { barrier, join };
    if let Err(error) = walk(id, items, barrier) {
        warn!("bsp worker {id}: {error}");
        barrier.abort();
        join.abort();
        return Err(error);
    }
    join.arrive()
}

fn walk(id: usize, items: &[SharedItem], barrier: &StageBarrier) -> Result<(), PipelineError> {
    for item in items {
        let slice = item.slices[id];
        let triple = &item.triple;
        for (index, &effect) in item.effects.iter().enumerate() {
            kernel::apply(effect, &triple.current, slice, |x, y, pixel| {
                triple.result.put(x, y, pixel);
            });
            if index + 1 < item.effects.len() {
                barrier.wait()?;
                rotate_shared_columns(triple, slice);
                barrier.wait()?;
            }
        }
        debug!(
            "bsp worker {id}: columns {}..{} done ({} stages)",
            slice.start,
            slice.end,
            item.effects.len()
        );
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::buffer::{PixelBuffer, PixelTriple};
    use crate::strategy::sequential;
    use crate::strategy::test_support::{FailingCodec, batch, gradient, single_job_batch};

    fn sequential_output(source: &PixelBuffer, effects: &[Effect]) -> PixelBuffer {
        let mut triple = PixelTriple::new(source.clone());
        sequential::process(&mut triple, effects);
        triple.into_result()
    }

    #[test]
    fn matches_sequential_for_every_worker_count() {
        let source = gradient(10, 6);
        let effects = [Effect::Sharpen, Effect::Grayscale, Effect::EdgeDetect, Effect::Blur];
        let expected = sequential_output(&source, &effects);
        for workers in 1..=12 {
            let (job, codec) = single_job_batch(source.clone(), effects.to_vec());
            run(&job, workers, &codec).unwrap();
            assert_eq!(
                codec.get(Path::new("out/t_a.png")).unwrap(),
                expected,
                "workers {workers}"
            );
        }
    }

    #[test]
    fn driver_sees_one_signal_per_worker() {
        let (batch, codec) = single_job_batch(gradient(8, 4), vec![Effect::Blur, Effect::Blur]);
        let report = run(&batch, 5, &codec).unwrap();
        assert_eq!(report.join_signals, Some(5));
        assert_eq!(report.workers, 5);
        assert_eq!(report.stages, 2);
    }

    #[test]
    fn persists_in_batch_order() {
        let (ordered, codec) = batch(vec![
            ("c.png", gradient(5, 3), vec![Effect::Grayscale]),
            ("a.png", gradient(3, 5), vec![Effect::Blur, Effect::Sharpen]),
            ("b.png", gradient(7, 2), vec![]),
        ]);
        run(&ordered, 3, &codec).unwrap();
        assert_eq!(
            codec.writes(),
            vec![
                PathBuf::from("out/t_c.png"),
                PathBuf::from("out/t_a.png"),
                PathBuf::from("out/t_b.png"),
            ]
        );
        assert_eq!(codec.get(Path::new("out/t_b.png")).unwrap(), gradient(7, 2));
    }

    #[test]
    fn refused_worker_thread_fails_the_batch() {
        let (batch, codec) = single_job_batch(gradient(64, 4), vec![Effect::Blur, Effect::Blur]);
        // Only two of four workers start, so the first barrier never fills.
        let err = run_with(&batch, 4, &codec, &Spawner::limited(2)).unwrap_err();
        assert!(matches!(err, PipelineError::Spawn(_)), "{err}");
        assert!(codec.writes().is_empty());
    }

    #[test]
    fn panicking_worker_releases_peers_at_the_barrier() {
        let item = WorkItem {
            name: "a.png".to_owned(),
            effects: vec![Effect::Blur, Effect::Blur],
            output: PathBuf::from("out/t_a.png"),
            triple: PixelTriple::new(gradient(6, 3)),
        };
        let shared = SharedItem::new(&item, 1);
        // Worker 1 has no slice and panics while worker 0 heads for the barrier.
        let err = execute(&[shared], 2, &Spawner::os()).unwrap_err();
        assert!(matches!(err, PipelineError::WorkerPanicked), "{err}");
    }

    #[test]
    fn encode_failure_is_fatal() {
        let (jobs, codec) = batch(vec![
            ("a.png", gradient(5, 4), vec![Effect::Sharpen]),
            ("b.png", gradient(5, 4), vec![Effect::Blur]),
        ]);
        let codec = FailingCodec::refusing(codec, "out/t_a.png");
        let err = run(&jobs, 3, &codec).unwrap_err();
        assert!(
            matches!(err, PipelineError::Encode { ref path, .. } if path == Path::new("out/t_a.png")),
            "{err}"
        );
        assert!(codec.inner.writes().is_empty());
    }

    #[test]
    fn decode_failure_stops_before_any_write() {
        let (mut batch, codec) = single_job_batch(gradient(4, 4), vec![Effect::Blur]);
        batch.jobs[0].input = PathBuf::from("in/t/missing.png");
        let err = run(&batch, 2, &codec).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
        assert!(codec.writes().is_empty());
    }
}
