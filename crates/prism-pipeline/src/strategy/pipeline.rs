//! Pipeline runner: paced producer, consumer pool, per-stage fan-out.
//!
//! ```text
//! producer --(rendezvous)--> consumer x W --> persist
//!                               |
//!                               +-- per stage: sub-worker x W --> tiles --> fan-in
//! ```
//!
//! The producer decodes images in batch order and hands each one over a
//! zero-capacity channel, pausing for a random interval below the
//! configured bound after every hand-off. Each consumer owns the items it
//! receives outright. For every stage it partitions the image, gives each
//! sub-worker an isolated [`Tile`] of its columns (plus a one-column
//! halo), waits for one acknowledgement per sub-worker, and composites
//! the returned tiles into `result`. Sub-workers never touch the item's
//! buffers.
//!
//! Items finish in whatever order the consumers get to them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use rand::Rng;

use crate::buffer::{PixelBuffer, PixelTriple, Tile};
use crate::codec::Codec;
use crate::config::Strategy;
use crate::diagnostics::BatchReport;
use crate::item::WorkItem;
use crate::join::AbortSignal;
use crate::kernel;
use crate::partition::{ColumnRange, partition};
use crate::rotation::rotate_columns;
use crate::spawn::Spawner;
use crate::strategy::first_cause;
use crate::types::{Batch, Effect, Job, PipelineError};

/// Run `batch` with `workers` consumers, each fanning stages out to
/// `workers` sub-workers.
///
/// # Errors
///
/// Returns the first root-cause failure: [`PipelineError::Decode`] from
/// the producer, [`PipelineError::Encode`] or [`PipelineError::FanIn`]
/// from a consumer, [`PipelineError::Spawn`] if a thread cannot be
/// started, or [`PipelineError::WorkerPanicked`]. Images already
/// persisted when the failure happens stay persisted.
pub fn run<C: Codec + ?Sized>(
    batch: &Batch,
    workers: usize,
    max_delay: Duration,
    codec: &C,
) -> Result<BatchReport, PipelineError> {
    run_with(batch, workers, max_delay, codec, &Spawner::os())
}

fn run_with<C: Codec + ?Sized>(
    batch: &Batch,
    workers: usize,
    max_delay: Duration,
    codec: &C,
    spawner: &Spawner,
) -> Result<BatchReport, PipelineError> {
    let started = Instant::now();
    let workers = workers.max(1);
    let abort = AbortSignal::new();
    let tiles = AtomicUsize::new(0);
    let (tx, rx) = crossbeam_channel::bounded::<WorkItem>(0);

    let images = thread::scope(|scope| {
        let (abort, tiles) = (&abort, &tiles);
        let mut failures = Vec::new();
        let producer = spawner
            .spawn(scope, "producer".to_owned(), move || {
                produce(&batch.jobs, codec, max_delay, abort, tx)
            })?;
        let mut consumers = Vec::with_capacity(workers);
        for id in 0..workers {
            let rx = rx.clone();
            match spawner.spawn(scope, format!("consumer-{id}"), move || {
                consume(id, &rx, workers, codec, abort, tiles, spawner)
            }) {
                Ok(handle) => consumers.push(handle),
                Err(error) => {
                    abort.raise();
                    failures.push(error);
                    break;
                }
            }
        }
        // The producer's sends fail once every started consumer has quit.
        drop(rx);

        if let Err(error) = producer.join().unwrap_or(Err(PipelineError::WorkerPanicked)) {
            failures.push(error);
        }
        let mut images = 0;
        for consumer in consumers {
            match consumer.join().unwrap_or(Err(PipelineError::WorkerPanicked)) {
                Ok(done) => images += done,
                Err(error) => failures.push(error),
            }
        }
        first_cause(failures).map_or(Ok(images), Err)
    })?;

    Ok(BatchReport {
        tag: batch.tag.clone(),
        strategy: Strategy::Pipeline,
        workers,
        images,
        stages: batch.stage_count(),
        elapsed: started.elapsed(),
        join_signals: None,
        tiles_composited: Some(tiles.load(Ordering::Relaxed)),
    })
}

/// Decode each job in order and hand it to whichever consumer is free.
fn produce<C: Codec + ?Sized>(
    jobs: &[Job],
    codec: &C,
    max_delay: Duration,
    abort: &AbortSignal,
    tx: Sender<WorkItem>,
) -> Result<(), PipelineError> {
    let mut rng = rand::rng();
    for job in jobs {
        if abort.is_raised() {
            return Err(PipelineError::Aborted);
        }
        let item = WorkItem::load(job, codec).inspect_err(|error| {
            warn!("producer: {error}");
            abort.raise();
        })?;
        debug!("producer: handing off {}", item.name);
        // Fails only once every consumer has quit.
        tx.send(item).map_err(|_| PipelineError::Aborted)?;
        if !max_delay.is_zero() {
            thread::sleep(rng.random_range(Duration::ZERO..max_delay));
        }
    }
    Ok(())
}

/// Process and persist items until the producer hangs up.
///
/// Returns the number of items this consumer persisted.
fn consume<C: Codec + ?Sized>(
    id: usize,
    rx: &Receiver<WorkItem>,
    workers: usize,
    codec: &C,
    abort: &AbortSignal,
    tiles: &AtomicUsize,
    spawner: &Spawner,
) -> Result<usize, PipelineError> {
    let mut done = 0;
    for mut item in rx.iter() {
        if abort.is_raised() {
            return Err(PipelineError::Aborted);
        }
        process_item(&mut item, workers, tiles, spawner)
            .and_then(|()| item.persist(codec))
            .inspect_err(|error| {
                warn!("consumer {id}: {} failed: {error}", item.name);
                abort.raise();
            })?;
        debug!("consumer {id}: finished {}", item.name);
        done += 1;
    }
    Ok(done)
}

/// Run every stage of `item` through fan-out and fan-in.
fn process_item(
    item: &mut WorkItem,
    workers: usize,
    tiles: &AtomicUsize,
    spawner: &Spawner,
) -> Result<(), PipelineError> {
    let full = ColumnRange::full(item.triple.dimensions().width);
    let effects = item.effects.clone();
    for (index, effect) in effects.into_iter().enumerate() {
        let composited = fan_out_stage(effect, &mut item.triple, workers, spawner)?;
        tiles.fetch_add(composited, Ordering::Relaxed);
        if !item.is_last_stage(index) {
            rotate_columns(&mut item.triple, full);
        }
    }
    Ok(())
}

/// Apply one stage to `triple` with one sub-worker per column slice.
///
/// Returns the number of tiles composited into `triple.result`.
fn fan_out_stage(
    effect: Effect,
    triple: &mut PixelTriple,
    workers: usize,
    spawner: &Spawner,
) -> Result<usize, PipelineError> {
    let image = triple.dimensions();
    let slices = partition(image.width, workers);
    let expected = slices.len();
    let (tile_tx, tile_rx) = crossbeam_channel::bounded::<Tile>(expected);
    let (ack_tx, ack_rx) = crossbeam_channel::bounded::<()>(expected);
    let current = &triple.current;

    let (acks, panicked, refused) = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(expected);
        let mut refused = None;
        for (index, &slice) in slices.iter().enumerate() {
            let (tile_tx, ack_tx) = (tile_tx.clone(), ack_tx.clone());
            let started = spawner.spawn(scope, format!("stage-{effect}-{index}"), move || {
                let input = Tile::extract(current, slice);
                let mut output = Tile::blank(slice, image);
                kernel::apply(effect, &input, slice, |x, y, pixel| {
                    output.put(x, y, pixel);
                });
                // Both receivers outlive this scope.
                let _ = tile_tx.send(output);
                let _ = ack_tx.send(());
            });
            match started {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    refused = Some(error);
                    break;
                }
            }
        }
        drop((tile_tx, ack_tx));

        // Ends early once every sender is gone, so a refused spawn cannot
        // leave this waiting.
        let acks = ack_rx.iter().take(expected).count();
        let panicked = handles
            .into_iter()
            .map(thread::ScopedJoinHandle::join)
            .filter(Result::is_err)
            .count();
        (acks, panicked, refused)
    });

    if let Some(error) = refused {
        return Err(error);
    }
    if panicked > 0 {
        return Err(PipelineError::WorkerPanicked);
    }
    if acks != expected {
        return Err(PipelineError::FanIn {
            expected,
            received: acks,
        });
    }
    fan_in(&tile_rx, expected, &mut triple.result)
}

/// Composite every tile waiting in `tiles` into `result`.
///
/// # Errors
///
/// Returns [`PipelineError::FanIn`] unless exactly `expected` tiles were
/// waiting.
fn fan_in(
    tiles: &Receiver<Tile>,
    expected: usize,
    result: &mut PixelBuffer,
) -> Result<usize, PipelineError> {
    let mut received = 0;
    while let Ok(tile) = tiles.try_recv() {
        tile.composite_into(result)?;
        received += 1;
    }
    if received != expected {
        return Err(PipelineError::FanIn { expected, received });
    }
    Ok(received)
}
