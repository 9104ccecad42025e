//! Sequential runner: the single-threaded correctness baseline.

use std::time::Instant;

use log::debug;

use crate::buffer::PixelTriple;
use crate::codec::Codec;
use crate::config::Strategy;
use crate::diagnostics::BatchReport;
use crate::item::WorkItem;
use crate::kernel;
use crate::partition::ColumnRange;
use crate::types::{Batch, Effect, PipelineError};

/// Apply `effects` to `triple` over the full width.
///
/// Between stages the triple is rotated by [`PixelTriple::swap`]; after the
/// last stage `result` holds the output.
pub fn process(triple: &mut PixelTriple, effects: &[Effect]) {
    let columns = ColumnRange::full(triple.dimensions().width);
    for (index, &effect) in effects.iter().enumerate() {
        let PixelTriple {
            current, result, ..
        } = &mut *triple;
        kernel::apply(effect, &*current, columns, |x, y, pixel| {
            result.put(x, y, pixel);
        });
        if index + 1 < effects.len() {
            triple.swap();
        }
    }
}

/// Decode, process and persist every job of `batch`, one at a time.
///
/// # Errors
///
/// Returns the first decode or encode failure; later jobs are not run.
pub fn run<C: Codec + ?Sized>(batch: &Batch, codec: &C) -> Result<BatchReport, PipelineError> {
    let started = Instant::now();
    for job in &batch.jobs {
        let mut item = WorkItem::load(job, codec)?;
        process(&mut item.triple, &item.effects);
        debug!("sequential: finished {}", item.name);
        item.persist(codec)?;
    }
    Ok(BatchReport {
        tag: batch.tag.clone(),
        strategy: Strategy::Sequential,
        workers: 1,
        images: batch.jobs.len(),
        stages: batch.stage_count(),
        elapsed: started.elapsed(),
        join_signals: None,
        tiles_composited: None,
    })
}
